use anyhow::Result;
use landau::logging::init_logging;
use landau::{CompanionEngine, Config, EngineStores};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// How often the vehicle snapshot is written to disk
const VEHICLE_CACHE_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid config: {}", e))?;
    init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Landau companion engine {} starting up",
        env!("APP_VERSION")
    );

    let stores = EngineStores::json_files(&config.persistence.data_dir)
        .map_err(|e| anyhow::anyhow!("Failed to open data directory: {}", e))?;
    let engine = Arc::new(
        CompanionEngine::new(&config, stores)
            .map_err(|e| anyhow::anyhow!("Failed to create engine: {}", e))?,
    );

    // Fire due charging schedules once a minute
    let schedule_engine = engine.clone();
    let schedule_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            schedule_engine.run_due_schedules(chrono::Utc::now());
        }
    });

    let cache_engine = engine.clone();
    let cache_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(VEHICLE_CACHE_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = cache_engine.cache_vehicle_state() {
                error!("Failed to cache vehicle state: {}", e);
            }
        }
    });

    let web_engine = engine.clone();
    let host = config.web.host.clone();
    let port = config.web.port;
    let web_task = tokio::spawn(async move {
        if let Err(e) = landau::web::serve(web_engine, &host, port).await {
            error!("Web server error: {}", e);
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    web_task.abort();
    schedule_task.abort();
    cache_task.abort();

    if engine.current_session().is_some()
        && let Err(e) = engine.stop_charging().await
    {
        error!("Failed to stop charging session: {}", e);
    }
    if let Err(e) = engine.cache_vehicle_state() {
        error!("Failed to cache vehicle state: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}
