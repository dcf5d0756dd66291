mod api;
mod metrics;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediarr_core::{
    create_notification_system, load_config, validate_config, AcquisitionPipeline, LogSink,
    MediaRepository, PipelineScheduler, SanitizedConfig, SqliteRepository,
};

use api::create_router;
use state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for the notification channel
const NOTIFICATION_BUFFER_SIZE: usize = 100;

/// How long shutdown waits for queued notifications to be delivered
const DISPATCHER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

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

    let config_path = std::env::var("MEDIARR_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    info!(version = VERSION, "Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    let sanitized = SanitizedConfig::from(&config);
    let config_json = serde_json::to_string(&sanitized).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        config_hash = &config_hash[..16],
        config = %config_json,
        "Configuration loaded"
    );

    let repository: Arc<dyn MediaRepository> = Arc::new(
        SqliteRepository::new(&config.database.path)
            .context("Failed to open media repository")?,
    );
    info!("Database path: {:?}", config.database.path);

    let (notifier, dispatcher) =
        create_notification_system(Arc::new(LogSink), NOTIFICATION_BUFFER_SIZE);
    let dispatcher_handle = tokio::spawn(dispatcher.run());

    let pipeline = AcquisitionPipeline::from_config(&config, repository, notifier).await;
    let scheduler = Arc::new(PipelineScheduler::new(
        Arc::new(pipeline),
        config.scheduler.clone(),
    ));
    let loop_handles = scheduler.start();

    let state = Arc::new(AppState::new(Arc::clone(&scheduler)));
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
    scheduler.stop();
    for handle in loop_handles {
        let _ = handle.await;
    }

    // The pipeline holds the last notification handles; dropping it closes the channel.
    drop(scheduler);
    if tokio::time::timeout(DISPATCHER_DRAIN_TIMEOUT, dispatcher_handle)
        .await
        .is_err()
    {
        error!("Notification dispatcher did not drain in time");
    } else {
        info!("Notification dispatcher stopped");
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
