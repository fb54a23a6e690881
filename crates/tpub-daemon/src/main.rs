//! tpub-daemon entry point.
//!
//! Sets up tracing, resolves settings, builds the source, sink and store,
//! then runs the cycle driver until Ctrl-C or SIGTERM.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use tokio::sync::watch;
use tpub_config::Settings;
use tpub_daemon::{driver_timing, sink_options, topic_scheme, CycleDriver};
use tpub_db::MySqlSnapshotSource;
use tpub_sink::MqttSink;
use tpub_state::JsonFileStore;
use tracing::{info, warn};

/// How long startup waits for the first broker ConnAck before moving on.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience).
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let settings = Settings::from_env().context("failed to load configuration")?;
    info!(settings = %settings.to_log_json()?, "configuration loaded");

    let store = Arc::new(JsonFileStore::new(settings.tracking_file.clone()));
    let source = Arc::new(MySqlSnapshotSource::new(&settings.db));

    let sink = Arc::new(MqttSink::start(sink_options(&settings.broker)));
    match sink.connect(CONNECT_TIMEOUT).await {
        Ok(()) => info!(broker = sink.broker(), "connected to MQTT broker"),
        Err(e) => warn!(error = %e, "MQTT broker not reachable yet; cycles fail until it is"),
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_termination().await;
        info!("shutdown requested; finishing current cycle");
        let _ = stop_tx.send(true);
    });

    let mut driver = CycleDriver::new(
        source,
        Arc::clone(&sink),
        store,
        topic_scheme(&settings),
        driver_timing(&settings),
    );
    driver.run(stop_rx).await;
    drop(driver);

    match Arc::try_unwrap(sink) {
        Ok(sink) => sink.shutdown().await,
        Err(_) => warn!("MQTT sink still referenced at exit; skipping disconnect"),
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Ctrl-C handler unavailable");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn wait_for_termination() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "SIGTERM handler unavailable");
            ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() {
    ctrl_c().await;
}
