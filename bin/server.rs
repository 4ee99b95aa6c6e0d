// Detector Batch - Web Server
// REST API over the batch jobs and the detector store

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use detector_batch::store::ENTITY_DETECTOR;
use detector_batch::{
    input_digest, record_batch_run, run_batch, DetectorStore, Operation, RunConfig, SqliteStore,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<Mutex<SqliteStore>>,
    config: Arc<RunConfig>,
}

impl AppState {
    fn store(&self) -> MutexGuard<'_, SqliteStore> {
        self.store.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        (
            StatusCode::OK,
            Json(Self {
                success: true,
                data: Some(data),
                error: None,
            }),
        )
            .into_response()
    }
}

fn fail(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(message.into()),
        }),
    )
        .into_response()
}

#[derive(Debug, Default, Deserialize)]
struct RunQuery {
    #[serde(default)]
    dry_run: bool,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> Response {
    ApiResponse::ok("OK")
}

/// POST /api/runs/:op - Run a batch over the CSV request body
async fn run_operation(
    State(state): State<AppState>,
    Path(op): Path<String>,
    Query(query): Query<RunQuery>,
    body: Bytes,
) -> Response {
    let operation: Operation = match op.parse() {
        Ok(operation) => operation,
        Err(message) => return fail(StatusCode::NOT_FOUND, message),
    };

    let mut config = (*state.config).clone();
    if query.dry_run {
        config.dry_run = true;
    }

    let store = state.store();
    let summary = match run_batch(body.as_ref(), operation, &config, &*store) {
        Ok(summary) => summary,
        Err(e) => {
            error!(operation = %operation, error = %e, "Batch aborted");
            return fail(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    let digest = input_digest(&body);
    if let Err(e) = record_batch_run(&*store, operation, &digest, &summary) {
        error!(digest = %digest, error = %e, "Could not record batch run");
    }
    info!(operation = %operation, digest = %digest, "{}", summary.final_line());

    ApiResponse::ok(summary)
}

/// GET /api/detectors/:xid - Current state of one detector
async fn get_detector(State(state): State<AppState>, Path(xid): Path<String>) -> Response {
    let store = state.store();
    match store.get_detector(&xid) {
        Ok(detector) => ApiResponse::ok(detector),
        Err(e) if e.is_not_found() => fail(StatusCode::NOT_FOUND, e.to_string()),
        Err(e) => {
            error!(xid = %xid, error = %e, "Error getting detector");
            fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /api/events/:xid - Audit trail of one detector
async fn get_events(State(state): State<AppState>, Path(xid): Path<String>) -> Response {
    let store = state.store();
    match store.events_for(ENTITY_DETECTOR, &xid) {
        Ok(events) => ApiResponse::ok(events),
        Err(e) => {
            error!(xid = %xid, error = %e, "Error getting events");
            fail(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/runs/:op", post(run_operation))
        .route("/detectors/:xid", get(get_detector))
        .route("/events/:xid", get(get_events))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive())
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("🌐 Detector Batch - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let db_path = std::env::var("DETECTOR_BATCH_DB").unwrap_or_else(|_| "detectors.db".to_string());
    let config = match std::env::var("DETECTOR_BATCH_CONFIG") {
        Ok(path) => RunConfig::from_file(&path)?,
        Err(_) => RunConfig::default(),
    };
    config.validate()?;

    let store = SqliteStore::open(&db_path)?;
    println!("✓ Database opened: {}", db_path);

    let state = AppState {
        store: Arc::new(Mutex::new(store)),
        config: Arc::new(config),
    };

    let addr = std::env::var("DETECTOR_BATCH_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    println!("\n🚀 Server running on http://{}", addr);
    println!("   POST /api/runs/{{create|edit|delete}}  (CSV body, ?dry_run=true)");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app(state)).await?;
    Ok(())
}
