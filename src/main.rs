use std::sync::Arc;

use tokio::{signal, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use task_catalog::{
    config::{Config, LogFormat},
    db::{self, queries::SqliteTaskStore},
    registry::TaskTypeRegistry,
    scheduler::{self, EchoRunner},
    service::TaskCatalog,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.rust_log));
    match config.log_format {
        LogFormat::Json => subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => subscriber.with(tracing_subscriber::fmt::layer()).init(),
    }

    tracing::info!("Starting Task Catalog...");

    let pool = db::init_pool(&config.db_url).await?;
    tracing::info!("Database connection pool established.");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Migrations applied successfully.");

    // Task types are fixed from here on.
    let task_types = Arc::new(TaskTypeRegistry::with_types([EchoRunner::task_type()])?);
    tracing::info!(count = task_types.len(), "Task types registered.");

    let (scheduler_tx, scheduler_rx) = mpsc::channel::<()>(100);
    let cancel_token = CancellationToken::new();

    let catalog = TaskCatalog::new(
        Arc::new(SqliteTaskStore::new(pool.clone())),
        task_types,
        scheduler_tx,
    );

    let scheduler = tokio::spawn(scheduler::run_scheduler(
        catalog,
        Arc::new(EchoRunner),
        scheduler_rx,
        config.scheduler_idle,
        cancel_token.clone(),
    ));
    tracing::info!("Scheduler background task started.");

    shutdown_signal(cancel_token).await;
    scheduler.await?;
    pool.close().await;

    tracing::info!("Application shut down gracefully.");

    Ok(())
}

/// Listens for shutdown signals (Ctrl+C or termination) and triggers cancellation.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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

    tracing::info!("Shutdown signal received.");
    token.cancel();
}
