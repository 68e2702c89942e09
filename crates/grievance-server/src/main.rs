use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use grievance_core::GrievanceConfig;
use grievance_engine::GrievanceEngine;
use grievance_server::ServerMetrics;
use tracing::info;

fn load_config() -> anyhow::Result<GrievanceConfig> {
    let mut config = match std::env::var("GRIEVANCE_CONFIG") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config {path}"))?;
            GrievanceConfig::from_toml(&raw).with_context(|| format!("parsing config {path}"))?
        }
        Err(_) => GrievanceConfig::default(),
    };
    if let Ok(bind) = std::env::var("GRIEVANCE_BIND") {
        config.server.bind_addr = bind;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    grievance_server::telemetry::init(&config.observability)?;

    let bind_addr = config.server.bind_addr.clone();
    let interval = Duration::from_secs(config.server.cycle_interval_secs.max(1));
    let engine = Arc::new(GrievanceEngine::new(config)?);
    let metrics = Arc::new(ServerMetrics::new().context("registering metrics")?);

    tokio::spawn(grievance_server::maintenance_loop(
        Arc::clone(&engine),
        Arc::clone(&metrics),
        interval,
    ));

    let app = grievance_server::router(engine, metrics);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    info!(addr = %bind_addr, "grievance server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
