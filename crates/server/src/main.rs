use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use grabarr_core::{
    batch::BatchPlanner,
    client::ClientRegistry,
    import::ImportJob,
    indexer::{IndexerRegistry, RateLimiterPool},
    ledger::SqliteLedger,
    library::SqliteLibrary,
    load_config,
    metadata::{InMemoryCatalog, MetadataProvider},
    monitor::AcquisitionMonitor,
    search::SearchAggregator,
    validate_config, AcquisitionService, EventBus,
};

use grabarr_server::api::create_router;
use grabarr_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var("GRABARR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!("Library root: {:?}", config.import.library_root);

    // Ledger and library share one database file.
    let ledger = Arc::new(
        SqliteLedger::new(&config.database.path).context("Failed to open acquisition ledger")?,
    );
    let library = Arc::new(
        SqliteLibrary::new(&config.database.path).context("Failed to open library store")?,
    );
    info!("Stores initialized");

    let metadata: Arc<dyn MetadataProvider> = match &config.metadata.catalog_path {
        Some(path) => {
            info!("Loading metadata catalog from {:?}", path);
            Arc::new(
                InMemoryCatalog::load(path)
                    .with_context(|| format!("Failed to load catalog from {:?}", path))?,
            )
        }
        None => {
            warn!("No metadata catalog configured, target validation will reject every id");
            Arc::new(InMemoryCatalog::new())
        }
    };

    let indexers = IndexerRegistry::from_config(&config.indexers, Arc::new(RateLimiterPool::new()))
        .context("Failed to build indexers")?;
    if indexers.enabled().is_empty() {
        warn!("No enabled indexers, searches will fail");
    }
    let clients =
        ClientRegistry::from_config(&config.clients).context("Failed to build download clients")?;
    if clients.enabled().is_empty() {
        warn!("No enabled download clients, acquisitions cannot start");
    }

    let events = EventBus::new(config.server.event_capacity);
    let aggregator = Arc::new(SearchAggregator::new(indexers, config.search.clone()));

    let importer = Arc::new(ImportJob::new(
        ledger.clone(),
        library.clone(),
        Arc::clone(&metadata),
        clients.clone(),
        events.clone(),
        config.import.clone(),
    ));

    let monitor = if config.monitor.enabled {
        let monitor = Arc::new(AcquisitionMonitor::new(
            config.monitor.clone(),
            ledger.clone(),
            clients.clone(),
            importer,
            events.clone(),
        ));
        monitor
            .start()
            .await
            .context("Failed to start acquisition monitor")?;
        info!("Acquisition monitor started");
        Some(monitor)
    } else {
        info!("Acquisition monitor disabled in config");
        None
    };

    let planner = BatchPlanner::new(config.batch.clone(), Arc::clone(&metadata), library.clone());
    let service = Arc::new(AcquisitionService::new(
        aggregator, clients, ledger, library, metadata, planner, events,
    ));

    let state = Arc::new(AppState::new(config.clone(), service, monitor.clone()));
    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    if let Some(ref monitor) = monitor {
        info!("Stopping acquisition monitor...");
        monitor.stop().await;
        info!("Acquisition monitor stopped");
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
