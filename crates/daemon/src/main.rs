//! CarWise Diagnosis Engine - Main Entry Point
//! JSON-RPC server + diagnosis worker pool

mod telemetry;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Import workspace crates
use carwise_api_rpc::{RpcServer, RpcServerConfig};
use carwise_core::application::diagnosis::DiagnosisService;
use carwise_core::application::retry::RetryPolicy;
use carwise_core::application::runner::DiagnosisJobRunner;
use carwise_core::application::worker::constants::{DEFAULT_WORKER_COUNT, JOB_TIMEOUT};
use carwise_core::application::worker::{shutdown_channel, Worker};
use carwise_core::application::{JobExecutor, RecoveryService};
use carwise_core::port::id_provider::UuidProvider;
use carwise_core::port::time_provider::SystemTimeProvider;
use carwise_infra_provider::{HttpAnalysisProvider, HttpProviderConfig, TracingMonitor};
use carwise_infra_sqlite::{create_pool, run_migrations, SqliteSessionRepository};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_DB_PATH: &str = "~/.carwise/carwise.db";
const DEFAULT_AI_ENDPOINT: &str = "http://127.0.0.1:8089";

fn init_logging() -> Option<WorkerGuard> {
    let log_format = std::env::var("CARWISE_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .expect("Failed to create env filter");

    if let Ok(log_dir) = std::env::var("CARWISE_LOG_DIR") {
        // File logging: daily-rolling JSON lines
        let appender = tracing_appender::rolling::daily(log_dir, "carwise-engine.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(non_blocking))
            .init();
        return Some(guard);
    }

    match log_format.as_str() {
        "json" => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            // Development: Pretty formatting with colors
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
    None
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging
    let _log_guard = init_logging();

    info!("CarWise Diagnosis Engine v{} starting...", VERSION);

    // 1.1. Initialize OpenTelemetry (optional)
    if let Err(e) = telemetry::init_telemetry() {
        tracing::warn!(error = ?e, "Failed to initialize OpenTelemetry (continuing without it)");
    }

    // 2. Load configuration
    let db_path = std::env::var("CARWISE_DB_PATH")
        .unwrap_or_else(|_| shellexpand::tilde(DEFAULT_DB_PATH).into_owned());

    let rpc_port: u16 = std::env::var("CARWISE_RPC_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(9630);

    let ai_endpoint = std::env::var("CARWISE_AI_ENDPOINT")
        .unwrap_or_else(|_| DEFAULT_AI_ENDPOINT.to_string());
    let ai_api_key = std::env::var("CARWISE_AI_API_KEY").ok();

    let worker_count: usize = std::env::var("CARWISE_WORKERS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_WORKER_COUNT);

    info!(db_path = %db_path, "Initializing database...");

    // 3. Initialize database
    let pool = create_pool(&db_path)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 4. Setup dependencies (DI wiring)
    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);
    let session_repo = Arc::new(SqliteSessionRepository::new(
        pool.clone(),
        time_provider.clone(),
    ));
    let monitor = Arc::new(TracingMonitor::new());

    let provider = Arc::new(
        HttpAnalysisProvider::new(HttpProviderConfig::new(ai_endpoint.clone(), ai_api_key))
            .map_err(|e| anyhow::anyhow!("Provider setup failed: {}", e))?,
    );
    info!(endpoint = %ai_endpoint, "Analysis provider configured");

    // 5. Run crash recovery
    info!("Running crash recovery...");
    let recovery_service = RecoveryService::new(
        session_repo.clone(),
        time_provider.clone(),
        None, // Use default recovery window
    );

    match recovery_service.recover_stuck_sessions().await {
        Ok(count) => info!(recovered_sessions = count, "Crash recovery completed"),
        Err(e) => tracing::error!(error = ?e, "Crash recovery failed"),
    }

    // 6. Start JSON-RPC server
    info!("Starting JSON-RPC server...");
    let service = Arc::new(DiagnosisService::new(
        session_repo.clone(),
        id_provider,
        time_provider.clone(),
    ));
    let rpc_config = RpcServerConfig {
        port: rpc_port,
        ..Default::default()
    };
    let rpc_server = RpcServer::new(rpc_config, service);
    let rpc_handle = rpc_server
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("RPC server start failed: {}", e))?;

    // 7. Start the worker pool
    info!(workers = worker_count, "Starting worker pool...");
    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    let runner = DiagnosisJobRunner::new(
        session_repo.clone(),
        provider,
        monitor.clone(),
        time_provider.clone(),
    );
    let executor = Arc::new(JobExecutor::new(
        runner,
        session_repo.clone(),
        monitor,
        time_provider.clone(),
        RetryPolicy::default(),
        JOB_TIMEOUT,
    ));

    let mut worker_handles = Vec::with_capacity(worker_count);
    for index in 0..worker_count {
        let worker = Worker::new(
            format!("worker-{}", index),
            session_repo.clone(),
            executor.clone(),
        );
        let shutdown = shutdown_rx.clone();
        worker_handles.push(tokio::spawn(async move {
            if let Err(e) = worker.run(shutdown).await {
                tracing::error!(error = ?e, "Worker failed");
            }
        }));
    }

    info!("System ready. Waiting for diagnosis requests...");
    info!("Press Ctrl+C to shutdown");

    // 8. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 9. Graceful shutdown
    shutdown_tx.shutdown();
    rpc_handle
        .stop()
        .map_err(|e| anyhow::anyhow!("RPC server stop failed: {}", e))?;
    for handle in worker_handles {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    info!("Shutdown complete.");

    Ok(())
}
