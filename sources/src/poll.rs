//! Shared helpers for the polling adapters (ADS-B, UAT, Kismet): a
//! rate-limited logger so a source stuck on a transient error doesn't
//! spam the log on every tick, and a sleep-respecting-cancellation
//! helper.

use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Logs at most once per `period` regardless of how often `log` is
/// called; matches the "missing-file/JSON-decode/HTTP-transient logged
/// at most once per 30s" requirement shared by the HTTP/file pollers.
pub struct RateLimitedLog {
    period: Duration,
    last: Option<Instant>,
}

impl RateLimitedLog {
    pub fn new(period: Duration) -> Self {
        Self { period, last: None }
    }

    pub fn log(&mut self, source: &str, message: impl std::fmt::Display) {
        let now = Instant::now();
        let should_log = match self.last {
            Some(last) => now.duration_since(last) >= self.period,
            None => true,
        };
        if should_log {
            warn!(source, "{message}");
            self.last = Some(now);
        }
    }
}

/// Sleeps for `dur` unless `cancel` fires first; returns `false` if
/// cancellation won the race so callers can break their poll loop.
pub async fn sleep_or_cancel(dur: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(dur) => true,
        _ = cancel.cancelled() => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_always_logs() {
        let mut log = RateLimitedLog::new(Duration::from_secs(30));
        assert!(log.last.is_none());
        log.log("test", "first");
        assert!(log.last.is_some());
    }

    #[test]
    fn rapid_second_call_is_suppressed() {
        let mut log = RateLimitedLog::new(Duration::from_secs(30));
        log.log("test", "first");
        let first = log.last;
        log.log("test", "second");
        assert_eq!(log.last, first);
    }
}
