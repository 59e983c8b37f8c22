use std::sync::Arc;
use std::time::Duration;

use actix_multipart::form::MultipartFormConfig;
use actix_web::{web, App, HttpServer};
use clap::Parser;
use tokio::sync::Semaphore;
use tracing::info;
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

mod api;
mod config;
mod fetch;
mod ingest;
mod registry;
mod shutdown;
mod worker;

use crate::api::health::{health_config, HealthState};
use crate::api::job::handlers::job_config;
use crate::api::job::JobService;
use crate::api::validation;
use crate::fetch::HttpPageFetcher;
use crate::ingest::CsvSheetReader;
use crate::registry::JobRegistry;
use crate::shutdown::ShutdownCoordinator;
use crate::worker::{JobWorker, WorkerSettings};

/// Resolves company websites from uploaded spreadsheets.
#[derive(Parser, Debug)]
#[command(name = "website-resolver")]
struct Cli {
    /// Address to bind the HTTP server to, e.g. 0.0.0.0:3000
    #[arg(long)]
    bind: Option<String>,

    /// Directory for uploaded source files
    #[arg(long)]
    upload_dir: Option<std::path::PathBuf>,

    /// Directory for result CSV files
    #[arg(long)]
    results_dir: Option<std::path::PathBuf>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    // Load configuration from environment, then apply CLI overrides
    let mut config = config::Config::from_env();
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(upload_dir) = cli.upload_dir {
        config.upload_dir = upload_dir;
    }
    if let Some(results_dir) = cli.results_dir {
        config.results_dir = results_dir;
    }

    // Create data directories up front; everything downstream assumes them
    std::fs::create_dir_all(&config.upload_dir).expect("Failed to create upload directory");
    std::fs::create_dir_all(&config.results_dir).expect("Failed to create results directory");
    std::fs::create_dir_all(&config.log_dir).expect("Failed to create logs directory");

    init_tracing(&config.log_dir);

    info!("Starting website-resolver application");
    info!("Configuration loaded successfully:");
    info!("  - Bind address: {}", config.bind_addr);
    info!("  - Upload dir: {}", config.upload_dir.display());
    info!("  - Results dir: {}", config.results_dir.display());
    info!("  - Max payload size: {} bytes", config.max_payload_size);
    info!("  - Max concurrent jobs: {}", config.max_concurrent_jobs);
    info!("  - Search base URL: {}", config.search_base_url);

    let registry = Arc::new(JobRegistry::new());

    let fetcher = Arc::new(HttpPageFetcher::new().expect("Failed to build page fetcher"));
    let worker = Arc::new(JobWorker::new(
        fetcher,
        Arc::new(CsvSheetReader),
        Arc::new(Semaphore::new(config.max_concurrent_jobs)),
        WorkerSettings {
            results_dir: config.results_dir.clone(),
            search_base_url: config.search_base_url.clone(),
            navigation_timeout: Duration::from_millis(config.navigation_timeout_ms),
            selector_timeout: Duration::from_millis(config.selector_timeout_ms),
            item_delay: Duration::from_millis(config.item_delay_ms),
        },
    ));

    let job_service = web::Data::new(JobService::new(
        registry.clone(),
        worker,
        config.upload_dir.clone(),
    ));
    let health_state = web::Data::new(HealthState {
        registry: registry.clone(),
        upload_dir: config.upload_dir.clone(),
        results_dir: config.results_dir.clone(),
    });

    let max_payload_size = config.max_payload_size;
    let server = HttpServer::new(move || {
        // Configure payload size limits globally
        let payload_config = web::PayloadConfig::default().limit(max_payload_size);
        let multipart_config = MultipartFormConfig::default().total_limit(max_payload_size);

        App::new()
            .app_data(job_service.clone())
            .app_data(health_state.clone())
            .app_data(payload_config)
            .app_data(multipart_config)
            .app_data(validation::json_config())
            .configure(health_config)
            .configure(job_config)
    });

    info!("Server starting on http://{}", config.bind_addr);

    let server = server.bind(config.bind_addr.as_str())?.run();

    // Get server handle for graceful shutdown
    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    let coordinator = ShutdownCoordinator::new(server_handle, server_task, registry);
    coordinator.wait_for_shutdown().await
}

/// File-based logging with daily rotation and level separation, plus a
/// console layer. Log files land as logs/info.<date>.log and so on.
fn init_tracing(log_dir: &std::path::Path) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    let info_file = tracing_appender::rolling::daily(log_dir, "info.log");
    let warn_file = tracing_appender::rolling::daily(log_dir, "warn.log");
    let error_file = tracing_appender::rolling::daily(log_dir, "error.log");
    let debug_file = tracing_appender::rolling::daily(log_dir, "debug.log");

    let info_layer = tracing_subscriber::fmt::layer()
        .with_writer(info_file)
        .with_ansi(false)
        .with_filter(LevelFilter::INFO);

    let warn_layer = tracing_subscriber::fmt::layer()
        .with_writer(warn_file)
        .with_ansi(false)
        .with_filter(LevelFilter::WARN);

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_file)
        .with_ansi(false)
        .with_filter(LevelFilter::ERROR);

    let debug_layer = tracing_subscriber::fmt::layer()
        .with_writer(debug_file)
        .with_ansi(false)
        .with_filter(LevelFilter::DEBUG);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(info_layer)
        .with(warn_layer)
        .with(error_layer)
        .with(debug_layer)
        .init();
}
