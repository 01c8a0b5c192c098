//! Smart Alarm Server
//!
//! HTTP front door and process wiring: configuration, logging, metrics and
//! the background tasks that drive the alarm session.

use anyhow::{anyhow, Context};
use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod error;
mod routes;

use crate::config::{AppConfig, LoggingConfig, StorageBackend};
use gateway::{run_outbound, MqttGateway, Publisher};
use inference_engine::SleepClassifier;
use orchestrator::{AlarmController, AlarmPoller, IngestionCoordinator, SystemClock};
use storage::{CsvFileSink, MemorySink, SleepWindowSink};

/// Inbound messages buffered between the MQTT event loop and the coordinator
const INBOUND_CHANNEL_CAPACITY: usize = 256;

/// Application state shared across handlers
pub struct AppState {
    /// Broker publishing handle
    pub publisher: Publisher,
    /// Session owner, read for health reporting
    pub controller: Arc<AlarmController>,
    pub metrics: PrometheusHandle,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(
        publisher: Publisher,
        controller: Arc<AlarmController>,
        metrics: PrometheusHandle,
    ) -> Self {
        Self {
            publisher,
            controller,
            metrics,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/set_alarm", post(routes::alarms::set_alarm))
        .route("/health", get(routes::health::health))
        .route("/metrics", get(routes::health::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Initialize logging. `RUST_LOG` takes precedence over the configured level.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("invalid log filter {:?}", config.level))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| anyhow!("failed to set tracing subscriber: {}", e))
}

/// Start every component and serve HTTP until Ctrl-C
pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install metrics recorder")?;

    // Without a classifier there is nothing to serve
    let classifier = SleepClassifier::load(&config.model.manifest_path, config.tracking.window_size)
        .with_context(|| {
            format!(
                "failed to load sleep classifier from {}",
                config.model.manifest_path.display()
            )
        })?;

    let sink: Arc<dyn SleepWindowSink> = match config.storage.backend {
        StorageBackend::Csv => Arc::new(CsvFileSink::new(&config.storage.path)?),
        StorageBackend::Memory => Arc::new(MemorySink::new()),
    };

    let (publisher, driver) =
        MqttGateway::connect(&config.mqtt, config.connection.retry_policy())?;
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    let controller = Arc::new(AlarmController::new(
        Arc::new(classifier),
        sink,
        outbound_tx,
        Arc::new(SystemClock),
        config.tracking.sample_period(),
    ));

    tokio::spawn(async move {
        if let Err(e) = driver.run(inbound_tx).await {
            error!("MQTT event loop stopped: {}", e);
        }
    });
    tokio::spawn(run_outbound(publisher.clone(), outbound_rx));
    tokio::spawn(IngestionCoordinator::new(Arc::clone(&controller)).run(inbound_rx));
    tokio::spawn(AlarmPoller::new(Arc::clone(&controller), config.tracking.poll_interval()).run());

    let state = Arc::new(AppState::new(publisher, controller, metrics));
    let app = create_router(state);

    info!("Starting API server on {}", config.http.bind);
    let listener = tokio::net::TcpListener::bind(&config.http.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.http.bind))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
