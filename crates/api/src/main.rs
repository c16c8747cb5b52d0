//! Driver Watch - Main Entry Point

use anyhow::Context;
use api::{build_state, init_logging, run_server, Settings};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("Failed to load configuration")?;
    init_logging(&settings.logging);

    info!("=== Driver Watch v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Hold {}ms, re-alert every {}ms, notify after {}ms",
        settings.monitoring.hold_ms,
        settings.monitoring.alert_period_ms,
        settings.monitoring.notify_threshold_ms
    );

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install metrics recorder")?;

    let state = build_state(&settings).await?.with_metrics(metrics);
    run_server(&settings.server.bind_addr, state).await
}
