//! The daemon's top-level configuration, loaded as HCL through
//! `ConfigEngine`. Every sink/source subsystem is optional: an absent
//! table means that subsystem is disabled.

use dragonsync_common::Versioned;
use dragonsync_macros::into_configfile;
use serde::{Deserialize, Serialize};

#[into_configfile(version = 1, filename = "config.hcl")]
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DragonSyncConfig {
    /// Identifier embedded in outgoing system-status CoT events.
    #[serde(default = "default_kit_id")]
    pub kit_id: String,

    #[serde(default)]
    pub zmq: ZmqConfig,
    #[serde(default)]
    pub adsb: Option<AdsbConfig>,
    #[serde(default)]
    pub uat: Option<UatConfig>,
    #[serde(default)]
    pub kismet: Option<KismetConfig>,
    #[serde(default)]
    pub fpv: FpvConfig,

    #[serde(default)]
    pub tak: Option<TakConfig>,
    #[serde(default)]
    pub multicast: Option<MulticastConfig>,
    #[serde(default)]
    pub mqtt: Option<MqttConfig>,
    #[serde(default)]
    pub third_party: Option<ThirdPartyConfig>,
    #[serde(default)]
    pub caching: Option<CachingConfig>,

    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub dispatcher: DispatcherTuning,
    #[serde(default)]
    pub enrichment: EnrichmentConfigFile,
    #[serde(default)]
    pub api: ApiConfig,
}

fn default_kit_id() -> String {
    "dragonsync-kit".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ZmqConfig {
    pub host: String,
    pub remoteid_port: u16,
    pub status_port: u16,
}

impl Default for ZmqConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), remoteid_port: 4224, status_port: 4225 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AdsbConfig {
    pub json_url: String,
    pub poll_interval_ms: u64,
    pub min_altitude_m: Option<f64>,
    pub max_altitude_m: Option<f64>,
}

impl Default for AdsbConfig {
    fn default() -> Self {
        Self { json_url: String::new(), poll_interval_ms: 2000, min_altitude_m: None, max_altitude_m: None }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct UatConfig {
    pub json_url: String,
    pub poll_interval_ms: u64,
}

impl Default for UatConfig {
    fn default() -> Self {
        Self { json_url: String::new(), poll_interval_ms: 2000 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct KismetConfig {
    pub url: String,
    pub username: Option<String>,
    /// Secret — redacted by `/config`.
    pub password: Option<String>,
    pub poll_interval_ms: u64,
}

impl Default for KismetConfig {
    fn default() -> Self {
        Self { url: String::new(), username: None, password: None, poll_interval_ms: 5000 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FpvConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub observer_lat: f64,
    pub observer_lon: f64,
    pub observer_alt_m: f64,
    pub confirm_only: bool,
}

impl Default for FpvConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".into(),
            port: 4226,
            observer_lat: 0.0,
            observer_lon: 0.0,
            observer_alt_m: 0.0,
            confirm_only: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TakProtocol {
    Tcp,
    Udp,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TakConfig {
    pub host: String,
    pub port: u16,
    pub protocol: TakProtocol,
    pub pkcs12_path: Option<String>,
    /// Secret — redacted by `/config`.
    pub pkcs12_password: Option<String>,
    pub skip_verify: bool,
}

impl Default for TakConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 8087,
            protocol: TakProtocol::Tcp,
            pkcs12_path: None,
            pkcs12_password: None,
            skip_verify: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MulticastConfig {
    pub group: String,
    pub port: u16,
    pub interface: Option<String>,
    pub ttl: u32,
}

impl Default for MulticastConfig {
    fn default() -> Self {
        Self { group: "239.2.3.1".into(), port: 6969, interface: None, ttl: 1 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    /// Secret — redacted by `/config`.
    pub password: Option<String>,
    pub base_topic: String,
    pub retain: bool,
    pub per_drone_topics: bool,
    pub ha_discovery: bool,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 1883,
            username: None,
            password: None,
            base_topic: "dragonsync".into(),
            retain: false,
            per_drone_topics: true,
            ha_discovery: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ThirdPartyConfig {
    pub endpoint: String,
    /// Secret — redacted by `/config`. Can also be supplied via the
    /// `DRAGONSYNC_THIRDPARTY_TOKEN` environment variable.
    pub token: Option<String>,
    pub drone_hz: f64,
    pub wardragon_hz: f64,
}

impl Default for ThirdPartyConfig {
    fn default() -> Self {
        Self { endpoint: String::new(), token: None, drone_hz: 1.0, wardragon_hz: 0.1 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CachingConfig {
    pub ttl_secs: u64,
}

impl Default for CachingConfig {
    fn default() -> Self {
        Self { ttl_secs: 120 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub max_trusted: usize,
    pub max_opportunistic: usize,
    pub mac_spam_window_secs: u64,
    pub mac_spam_threshold: usize,
    pub mac_spam_backoff_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_trusted: 30,
            max_opportunistic: 30,
            mac_spam_window_secs: 30,
            mac_spam_threshold: 5,
            mac_spam_backoff_secs: 60,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherTuning {
    pub tick_interval_ms: u64,
    pub rate_limit_secs: u64,
    pub inactivity_timeout_secs: u64,
    pub keep_alive_interval_secs: u64,
}

impl Default for DispatcherTuning {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            rate_limit_secs: 1,
            inactivity_timeout_secs: 30,
            keep_alive_interval_secs: 10,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfigFile {
    pub enabled: bool,
    pub rid_rate_limit_secs: u64,
    pub use_api_fallback: bool,
    /// Base URL of the registration-lookup API; required for the
    /// network fallback, ignored when `use_api_fallback` is false.
    pub api_base_url: Option<String>,
}

impl Default for EnrichmentConfigFile {
    fn default() -> Self {
        Self { enabled: true, rid_rate_limit_secs: 1, use_api_fallback: true, api_base_url: None }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { enabled: true, host: None, port: None }
    }
}

/// Field names `#[serde(rename = "...")]`-tagged as secret, redacted
/// wholesale by `/config` regardless of which subsystem they're in.
pub const SECRET_FIELDS: &[&str] = &["password", "pkcs12_password", "token"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_kit_id_and_version() {
        let cfg = DragonSyncConfig::new();
        assert_eq!(cfg.kit_id, "");
        assert_eq!(cfg.version(), 1);
    }

    #[test]
    fn parses_minimal_hcl_fragment() {
        let hcl = r#"
            kit_id = "kit-42"
            version = 1

            adsb {
              json_url = "http://localhost:8080/data/aircraft.json"
              poll_interval_ms = 3000
            }
        "#;
        let cfg: DragonSyncConfig = hcl::from_str(hcl).expect("valid hcl");
        assert_eq!(cfg.kit_id, "kit-42");
        assert_eq!(cfg.adsb.unwrap().poll_interval_ms, 3000);
        assert!(cfg.mqtt.is_none());
    }
}
