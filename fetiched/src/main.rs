//! The `dragonsyncd` daemon: loads configuration, wires every configured
//! source and sink into the registry/dispatcher, serves the read-only API,
//! and runs until SIGINT/SIGTERM/SIGHUP.

mod cli;
mod config;
mod error;

use clap::Parser;
use cli::Opts;
use config::{DragonSyncConfig, TakProtocol};
use dragonsync_common::{init_logging, ConfigEngine};
use dragonsync_engine::api::{self, ApiState};
use dragonsync_engine::sinks::caching::CachingSink;
use dragonsync_engine::sinks::cot_tcp::TcpSink;
use dragonsync_engine::sinks::cot_udp::UdpSink;
use dragonsync_engine::sinks::mqtt::MqttSink;
use dragonsync_engine::sinks::multicast::MulticastSink;
use dragonsync_engine::sinks::thirdparty::ThirdPartySink;
use dragonsync_engine::sinks::Sink;
use dragonsync_engine::{
    Dispatcher, DispatcherConfig, EnrichmentConfig, EnrichmentWorker, FaaApiLookup, RegistryLimits,
    SignalStore, SignalStoreLimits, TrackRegistry,
};
use dragonsync_formats::Position;
use dragonsync_sources::adsb::AdsbSource;
use dragonsync_sources::fpv::FpvSource;
use dragonsync_sources::kismet::KismetSource;
use dragonsync_sources::remoteid::RemoteIdSource;
use dragonsync_sources::system_status::SystemStatusSource;
use dragonsync_sources::uat::UatSource;
use dragonsync_sources::Source;
use error::DaemonError;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::unbounded_channel;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let opts = Opts::parse();

    if opts.debug {
        std::env::set_var("RUST_LOG", "debug");
    }
    if let Err(err) = init_logging(env!("CARGO_BIN_NAME"), opts.use_telemetry, opts.use_tree, None) {
        eprintln!("failed to initialize logging: {err}");
        std::process::exit(1);
    }

    let config = match ConfigEngine::<DragonSyncConfig>::load(opts.config.as_deref().and_then(|p| p.to_str()))
        .map_err(DaemonError::Config)
    {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(config).await {
        error!("{err}");
        std::process::exit(1);
    }
}

async fn run(config: DragonSyncConfig) -> eyre::Result<()> {
    let cancel = CancellationToken::new();
    let ctrlc_token = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("shutdown signal received");
        ctrlc_token.cancel();
    })?;

    let registry = Arc::new(TrackRegistry::new(RegistryLimits {
        max_trusted: config.registry.max_trusted,
        max_opportunistic: config.registry.max_opportunistic,
        mac_spam_window: Duration::from_secs(config.registry.mac_spam_window_secs),
        mac_spam_threshold: config.registry.mac_spam_threshold,
        mac_spam_backoff: Duration::from_secs(config.registry.mac_spam_backoff_secs),
    }));
    let signals = Arc::new(SignalStore::new(SignalStoreLimits::default()));

    let mut sinks: Vec<Arc<dyn Sink>> = Vec::new();
    let mut adsb_cache: Option<Arc<CachingSink>> = None;

    if let Some(tak) = &config.tak {
        match tak.protocol {
            TakProtocol::Tcp => {
                let tls = build_tls_connector(tak)?;
                let sink = TcpSink::spawn("tak", tak.host.clone(), tak.port, tls);
                sinks.push(Arc::new(sink));
            }
            TakProtocol::Udp => {
                let target = format!("{}:{}", tak.host, tak.port);
                let sink = UdpSink::bind("tak", target).await.map_err(DaemonError::ApiBind)?;
                sinks.push(Arc::new(sink));
            }
        }
    }

    if let Some(mc) = &config.multicast {
        let group = Ipv4Addr::from_str(&mc.group).unwrap_or(Ipv4Addr::new(239, 2, 3, 1));
        let iface = mc
            .interface
            .as_deref()
            .and_then(|s| Ipv4Addr::from_str(s).ok())
            .unwrap_or(Ipv4Addr::UNSPECIFIED);
        let sink = MulticastSink::bind("multicast", group, mc.port, iface, mc.ttl, None)
            .await
            .map_err(DaemonError::ApiBind)?;
        sinks.push(Arc::new(sink));
    }

    if let Some(mqtt) = &config.mqtt {
        let creds = mqtt.username.clone().zip(mqtt.password.clone());
        let sink = MqttSink::connect(
            "mqtt",
            &format!("{}-{}", config.kit_id, std::process::id()),
            &mqtt.host,
            mqtt.port,
            creds,
            mqtt.base_topic.clone(),
            mqtt.retain,
            mqtt.per_drone_topics,
            mqtt.ha_discovery,
        );
        sinks.push(Arc::new(sink));
    }

    if let Some(tp) = &config.third_party {
        let token = std::env::var("DRAGONSYNC_THIRDPARTY_TOKEN").ok().or_else(|| tp.token.clone());
        let sink = ThirdPartySink::new("third-party", tp.endpoint.clone(), token, tp.drone_hz, tp.wardragon_hz);
        sinks.push(Arc::new(sink));
    }

    if let Some(caching) = &config.caching {
        let sink = Arc::new(CachingSink::new("caching", Duration::from_secs(caching.ttl_secs)));
        adsb_cache = Some(sink.clone());
        sinks.push(sink);
    }

    let (tx, rx) = unbounded_channel();
    let mut source_handles = Vec::new();

    spawn_source(
        Arc::new(RemoteIdSource::new(
            "remoteid",
            format!("tcp://{}:{}", config.zmq.host, config.zmq.remoteid_port),
            "",
        )),
        tx.clone(),
        &cancel,
        &mut source_handles,
    );
    spawn_source(
        Arc::new(SystemStatusSource::new(
            "system-status",
            format!("tcp://{}:{}", config.zmq.host, config.zmq.status_port),
            "",
        )),
        tx.clone(),
        &cancel,
        &mut source_handles,
    );

    if let Some(adsb) = &config.adsb {
        let source = AdsbSource::new("adsb", adsb.json_url.clone(), Duration::from_millis(adsb.poll_interval_ms))
            .with_altitude_bounds(adsb.min_altitude_m, adsb.max_altitude_m);
        spawn_source(Arc::new(source), tx.clone(), &cancel, &mut source_handles);
    }

    if let Some(uat) = &config.uat {
        let source = UatSource::new("uat", uat.json_url.clone(), Duration::from_millis(uat.poll_interval_ms));
        spawn_source(Arc::new(source), tx.clone(), &cancel, &mut source_handles);
    }

    if let Some(kismet) = &config.kismet {
        let source = KismetSource::new(
            "kismet",
            kismet.url.clone(),
            kismet.username.clone(),
            kismet.password.clone(),
            Duration::from_millis(kismet.poll_interval_ms),
        );
        spawn_source(Arc::new(source), tx.clone(), &cancel, &mut source_handles);
    }

    if config.fpv.enabled {
        let observer = Position {
            lat: config.fpv.observer_lat,
            lon: config.fpv.observer_lon,
            alt_m: config.fpv.observer_alt_m,
        };
        let source = FpvSource::new(
            "fpv",
            format!("tcp://{}:{}", config.fpv.host, config.fpv.port),
            "",
            observer,
            config.fpv.confirm_only,
        );
        spawn_source(Arc::new(source), tx.clone(), &cancel, &mut source_handles);
    }
    drop(tx);

    let enrichment = if config.enrichment.enabled {
        let api_base_url = config.enrichment.api_base_url.clone().filter(|_| config.enrichment.use_api_fallback);
        let lookup = Arc::new(FaaApiLookup::new(api_base_url, std::collections::HashMap::new()));
        let worker_config = EnrichmentConfig {
            rid_rate_limit: Duration::from_secs(config.enrichment.rid_rate_limit_secs),
            ..EnrichmentConfig::default()
        };
        Some(EnrichmentWorker::spawn(lookup, registry.clone(), worker_config, cancel.clone()))
    } else {
        None
    };

    let status_mirror = Arc::new(Mutex::new(None));

    let mut dispatcher = Dispatcher::new(
        registry.clone(),
        signals.clone(),
        sinks.clone(),
        DispatcherConfig {
            tick_interval: Duration::from_millis(config.dispatcher.tick_interval_ms),
            rate_limit: Duration::from_secs(config.dispatcher.rate_limit_secs),
            inactivity_timeout: Duration::from_secs(config.dispatcher.inactivity_timeout_secs),
            keep_alive_interval: Duration::from_secs(config.dispatcher.keep_alive_interval_secs),
            kit_id: config.kit_id.clone(),
        },
    )
    .with_status_mirror(status_mirror.clone());
    if let Some(worker) = enrichment {
        dispatcher = dispatcher.with_enrichment(worker);
    }
    let dispatcher = Arc::new(dispatcher);

    let tick_handle = tokio::spawn({
        let dispatcher = dispatcher.clone();
        let cancel = cancel.clone();
        async move { dispatcher.run_ticks(cancel).await }
    });
    let ingest_handle = tokio::spawn({
        let dispatcher = dispatcher.clone();
        let cancel = cancel.clone();
        async move { dispatcher.run_ingest(rx, cancel).await }
    });

    let mut api_handle = None;
    if config.api.enabled {
        let redacted = serde_json::to_value(&config).unwrap_or_default();
        let redacted = api::redact_secrets(redacted, config::SECRET_FIELDS);
        let state = ApiState {
            registry: registry.clone(),
            signals: signals.clone(),
            adsb_cache,
            last_system_status: status_mirror,
            redacted_config: Arc::new(redacted),
            repo_path: std::env::var("DRAGONSYNC_REPO").ok(),
        };
        let host = std::env::var("DRAGONSYNC_API_HOST")
            .ok()
            .or_else(|| config.api.host.clone())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        let port = std::env::var("DRAGONSYNC_API_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .or(config.api.port)
            .unwrap_or(8088);
        let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await.map_err(DaemonError::ApiBind)?;
        info!(host, port, "api facade listening");
        let router = api::router(state);
        let cancel = cancel.clone();
        api_handle = Some(tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { cancel.cancelled().await })
                .await
        }));
    }

    cancel.cancelled().await;
    info!("shutting down");

    let _ = tick_handle.await;
    let _ = ingest_handle.await;
    for handle in source_handles {
        let _ = handle.await;
    }
    if let Some(handle) = api_handle {
        let _ = handle.await;
    }
    for sink in &sinks {
        if let Err(err) = sink.close().await {
            error!(sink = sink.name(), "close failed: {err}");
        }
    }

    Ok(())
}

fn spawn_source(
    source: Arc<dyn Source>,
    tx: tokio::sync::mpsc::UnboundedSender<dragonsync_sources::SourceEvent>,
    cancel: &CancellationToken,
    handles: &mut Vec<tokio::task::JoinHandle<()>>,
) {
    let cancel = cancel.clone();
    handles.push(tokio::spawn(async move {
        let name = source.name().to_string();
        if let Err(err) = source.run(tx, cancel).await {
            error!(source = name, "source terminated: {err}");
        }
    }));
}

fn build_tls_connector(tak: &config::TakConfig) -> Result<Option<tokio_native_tls::TlsConnector>, DaemonError> {
    let (path, password) = match (&tak.pkcs12_path, &tak.pkcs12_password) {
        (None, None) => return Ok(None),
        (Some(path), Some(password)) => (path, password),
        _ => return Err(DaemonError::MissingPkcs12),
    };
    let bytes = std::fs::read(path).map_err(|err| DaemonError::Pkcs12Read(path.clone(), err))?;
    let identity = native_tls::Identity::from_pkcs12(&bytes, password)?;
    let connector = native_tls::TlsConnector::builder()
        .identity(identity)
        .danger_accept_invalid_certs(tak.skip_verify)
        .build()?;
    Ok(Some(tokio_native_tls::TlsConnector::from(connector)))
}
