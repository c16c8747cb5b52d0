//! Driver Watch API Server
//!
//! HTTP surface of the driver monitoring service: trip lifecycle, tick
//! ingestion, user directory and reporting projections.

use alerting::{tone, AudibleAlert, CommandAlarm, Monitor, SilentAlarm};
use axum::{extract::State, response::IntoResponse, routing::{get, post}, Json, Router};
use chrono::Utc;
use directory::UserDirectory;
use metrics_exporter_prometheus::PrometheusHandle;
use notify::AnyNotifier;
use serde::Serialize;
use std::sync::Arc;
use storage::Store;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

pub mod error;
mod routes;
pub mod settings;

pub use error::ApiError;
pub use settings::{AlarmKind, AlarmSettings, LoggingSettings, Settings};

/// Monitor wired to the configured backends
pub type AppMonitor = Monitor<Store, UserDirectory, AnyNotifier>;

/// Application state shared across handlers
pub struct AppState {
    pub monitor: AppMonitor,
    pub directory: Arc<UserDirectory>,
    /// Version string
    pub version: String,
    /// Start time
    pub start_time: std::time::Instant,
    /// Prometheus render handle, absent when no recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(monitor: AppMonitor, directory: Arc<UserDirectory>) -> Self {
        Self {
            monitor,
            directory,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: i64,
    pub version: String,
    pub uptime_seconds: u64,
    pub active_sessions: usize,
}

/// Create the application router
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route(
            "/api/v1/users",
            get(routes::users::list_users).post(routes::users::register_user),
        )
        .route("/api/v1/users/:username/email", post(routes::users::update_email))
        .route("/api/v1/managers/:manager_id/drivers", get(routes::users::drivers_for_manager))
        .route("/api/v1/drivers/unassigned", get(routes::users::unassigned_drivers))
        .route("/api/v1/drivers/:driver_id/manager", post(routes::users::assign_manager))
        .route(
            "/api/v1/drivers/:driver_id/sessions",
            post(routes::ticks::resume_session).get(routes::ticks::session_status),
        )
        .route("/api/v1/drivers/:driver_id/ticks", post(routes::ticks::ingest_tick))
        .route("/api/v1/drivers/:driver_id/events", get(routes::events::driver_events))
        .route("/api/v1/drivers/:driver_id/trips", get(routes::trips::driver_trips))
        .route("/api/v1/trips", post(routes::trips::start_trip))
        .route("/api/v1/trips/:trip_id/end", post(routes::trips::end_trip))
        .route("/api/v1/trips/:trip_id/events", get(routes::events::trip_events))
        .route("/api/v1/trips/:trip_id/summary", get(routes::trips::trip_summary))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now().timestamp(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        active_sessions: state.monitor.sessions().len().await,
    })
}

/// Prometheus exposition
async fn metrics_handler(State(state): State<SharedState>) -> String {
    state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

/// Initialize logging
///
/// `RUST_LOG` wins over the configured level. Calling this twice is harmless.
pub fn init_logging(settings: &LoggingSettings) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt().with_env_filter(filter).with_target(true);
    let result = if settings.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if result.is_err() {
        warn!("Tracing subscriber already installed");
    }
}

/// Build the cabin alarm device from configuration
pub fn build_alarm(settings: &AlarmSettings) -> Arc<dyn AudibleAlert> {
    match settings.kind {
        AlarmKind::Silent => Arc::new(SilentAlarm),
        AlarmKind::Command => {
            let path = &settings.command.sound_path;
            if settings.generate_tone && !path.exists() {
                match tone::write_siren(path, &tone::SirenSpec::default()) {
                    Ok(()) => info!("Generated alarm tone at {}", path.display()),
                    Err(e) => warn!("Could not generate alarm tone: {}", e),
                }
            }
            Arc::new(CommandAlarm::new(settings.command.clone()))
        }
    }
}

/// Build application state from configuration
pub async fn build_state(settings: &Settings) -> anyhow::Result<AppState> {
    let store = Arc::new(Store::open(&settings.storage).await?);
    let notifier = Arc::new(AnyNotifier::from_config(&settings.notifier).await?);
    let directory = Arc::new(UserDirectory::new());
    let alarm = build_alarm(&settings.alarm);

    let monitor = Monitor::new(
        settings.monitoring.clone(),
        store,
        Arc::clone(&directory),
        notifier,
        alarm,
    );
    Ok(AppState::new(monitor, directory))
}

/// Run the server until Ctrl-C, then release storage
pub async fn run_server(addr: &str, state: AppState) -> anyhow::Result<()> {
    let state = Arc::new(state);
    let app = create_router(Arc::clone(&state));

    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    state.monitor.store().close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
