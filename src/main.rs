//! Service entrypoint: load configuration, wire the engine, serve the
//! control surface until shutdown.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use sheetsync::api::{create_router, AppContext};
use sheetsync::engine::{
    AccountRegistry, ConcurrencyManager, SyncExecutor, SyncScheduler, SyncStateStore,
};
use sheetsync::infrastructure::logging::init_logging;
use sheetsync::infrastructure::state_repository::{
    InMemoryStateRepository, SqliteStateRepository, SyncStateRepository,
};
use sheetsync::infrastructure::{AppConfig, InMemoryDatastore, InMemorySheetBackend};

const DEFAULT_CONFIG_PATH: &str = "sheetsync.json";

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = AppConfig::load_or_default(&config_path).await?;

    init_logging(&config.logging)?;
    info!(config_path, "starting sheetsync");

    // Any mapping invariant violation is fatal here, before the scheduler
    // or the control surface exist.
    let registry = Arc::new(
        AccountRegistry::from_config(
            config.accounts.clone(),
            config.vps.clone(),
            config.expected_profiles.clone(),
        )
        .context("invalid account mapping configuration")?,
    );

    let repository: Arc<dyn SyncStateRepository> = match &config.database.path {
        Some(path) => Arc::new(
            SqliteStateRepository::connect(path)
                .await
                .with_context(|| format!("opening state database at {}", path.display()))?,
        ),
        None => {
            warn!("no database path configured, sync state will not survive restarts");
            Arc::new(InMemoryStateRepository::new())
        }
    };

    let store = Arc::new(SyncStateStore::new(repository));
    let hydrated = store.hydrate().await?;
    info!(hydrated, "sync state loaded");

    let concurrency = Arc::new(ConcurrencyManager::new(
        config.scheduler.global_concurrency,
        registry.vps_configs(),
    ));

    // Stand-in collaborators until the real spreadsheet backend and domain
    // datastore are wired in deployment.
    let backend = Arc::new(InMemorySheetBackend::new());
    let datastore = Arc::new(InMemoryDatastore::new());

    let executor = Arc::new(SyncExecutor::new(
        Arc::clone(&registry),
        Arc::clone(&store),
        datastore,
        backend,
        config.scheduler.master_sheet_id.clone(),
        Duration::from_secs(config.scheduler.execution_timeout_seconds),
    ));

    let scheduler = Arc::new(SyncScheduler::new(
        Arc::clone(&registry),
        Arc::clone(&store),
        Arc::clone(&concurrency),
        executor,
        config.effective_sheet_configs(),
        Duration::from_secs(config.scheduler.tick_seconds),
    ));
    scheduler.start().await;

    let context = Arc::new(AppContext {
        scheduler: Arc::clone(&scheduler),
        store,
        registry,
    });
    let router = create_router(context);

    let listener = tokio::net::TcpListener::bind(&config.scheduler.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.scheduler.listen_addr))?;
    info!(addr = %config.scheduler.listen_addr, "control surface listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("control surface failed")?;

    info!("shutting down, draining in-flight syncs");
    scheduler.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "failed to install shutdown handler");
    }
}
