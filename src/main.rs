//! Slide Timer - A presentation countdown with a background coordinator
//!
//! This is the main entry point for the slide-timer daemon.

use std::sync::Arc;
use tokio::{net::TcpListener, sync::watch};
use tracing::info;

use slide_timer::{
    api::create_router,
    config::Config,
    foreground::{run_console, ForegroundController},
    services::{IndicatorHandle, LogBadgeSink, WakeScheduler},
    state::AppState,
    store::{FileStore, MemoryStore, StateStore},
    tasks::BackgroundCoordinator,
    utils::{shutdown_signal, Clock, SystemClock},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("slide_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting slide-timer v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, wake_interval={}min, state={}",
        config.host,
        config.port,
        config.wake_interval,
        if config.ephemeral { "memory".to_string() } else { config.state_file.display().to_string() }
    );

    let store: Arc<dyn StateStore> = if config.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(FileStore::open(&config.state_file))
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let indicator = IndicatorHandle::spawn(LogBadgeSink);
    let (scheduler, wakes) = WakeScheduler::new();

    let coordinator = Arc::new(BackgroundCoordinator::new(
        Arc::clone(&store),
        indicator.clone(),
        scheduler,
        Arc::clone(&clock),
        config.wake_interval,
    ));

    // Subscribe before recovery so no change slips between the two
    let changes = store.subscribe();
    coordinator.recover_on_start().await;
    tokio::spawn(Arc::clone(&coordinator).run(changes, wakes));

    // Create HTTP router with all endpoints
    let state = Arc::new(AppState::new(Arc::clone(&coordinator), config.port, config.host.clone()));
    let app = create_router(state);

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /message - updateBadge | getSettings | updateSettings");
    info!("  GET  /status  - Countdown, badge and alarm state");
    info!("  GET  /health  - Health check");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let console = if config.headless {
        info!("Running headless, background coordinator only");
        None
    } else {
        let controller = ForegroundController::new(Arc::clone(&store), indicator, clock)
            .with_scheduler(coordinator.scheduler().clone());
        Some(tokio::spawn(run_console(controller, shutdown_rx)))
    };

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(true);
    if let Some(console) = console {
        if let Err(e) = console.await {
            tracing::error!("Console task failed: {}", e);
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
