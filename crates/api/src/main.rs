use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use perfscope_api::background::job_retention;
use perfscope_api::config::ServerConfig;
use perfscope_api::engine::{AnalysisQueue, AnalysisRunner, SimulatedAnalyzer};
use perfscope_api::router::build_app_router;
use perfscope_api::state::AppState;
use perfscope_db::repositories::{JobStore, MemoryJobStore, PgJobStore};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "perfscope_api=debug,perfscope_db=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Job store ---
    let store: Arc<dyn JobStore> = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = perfscope_db::create_pool(&database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            perfscope_db::health_check(&pool)
                .await
                .expect("Database health check failed");
            tracing::info!("Database health check passed");

            perfscope_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(PgJobStore::new(pool))
        }
        Err(_) => {
            tracing::warn!(
                max_jobs = config.analysis.max_retained_jobs,
                "DATABASE_URL not set, jobs are kept in memory only"
            );
            Arc::new(MemoryJobStore::with_capacity_limit(
                config.analysis.max_retained_jobs,
            ))
        }
    };

    // --- Analysis runner ---
    let cancel = CancellationToken::new();
    let (queue, receiver) = AnalysisQueue::bounded(config.analysis.queue_capacity);
    let runner = AnalysisRunner::new(
        receiver,
        Arc::clone(&store),
        Arc::new(SimulatedAnalyzer::new(config.analysis.simulated_delay)),
        &config.analysis,
    );
    let runner_handle = tokio::spawn(runner.run(
        cancel.clone(),
        Duration::from_secs(config.shutdown_timeout_secs),
    ));

    // --- Retention ---
    let retention_handle = tokio::spawn(job_retention::run(
        Arc::clone(&store),
        config.analysis.retention,
        cancel.clone(),
    ));

    tracing::info!("Background services started (analysis runner, job retention)");

    // --- App state ---
    let state = AppState {
        store,
        config: Arc::new(config.clone()),
        queue,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    cancel.cancel();

    // The runner bounds its own drain by the shutdown timeout.
    if let Err(e) = runner_handle.await {
        tracing::error!(error = %e, "Analysis runner task failed");
    }
    let _ = tokio::time::timeout(Duration::from_secs(5), retention_handle).await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
