//! HTTP surface.
//!
//! | Route        | Response                                   |
//! |--------------|--------------------------------------------|
//! | `GET /`      | plain-text banner                          |
//! | `GET /health`| `ok`                                       |
//! | `GET /qr`    | PNG or SVG image, or a plain-text error    |

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use log::{error, warn};
use tokio::sync::Semaphore;

use crate::config::ServiceConfig;
use crate::error::PipelineError;
use crate::pipeline::{Pipeline, QrResponse};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    /// One permit per encode/render job allowed to run at once.
    slots: Arc<Semaphore>,
    timeout: Duration,
    cache_max_age: u32,
}

impl AppState {
    pub const DEFAULT_MAX_IN_FLIGHT: usize = 32;

    pub fn new(pipeline: Pipeline, timeout: Duration, cache_max_age: u32) -> AppState {
        AppState {
            pipeline: Arc::new(pipeline),
            slots: Arc::new(Semaphore::new(AppState::DEFAULT_MAX_IN_FLIGHT)),
            timeout,
            cache_max_age,
        }
    }

    /// Caps the number of encode/render jobs running at once (at least one).
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> AppState {
        self.slots = Arc::new(Semaphore::new(max_in_flight.max(1)));
        self
    }

    pub fn from_config(config: &ServiceConfig) -> AppState {
        let pipeline = Pipeline::from_config(config);
        AppState::new(pipeline, config.request_timeout(), config.cache_max_age)
            .with_max_in_flight(config.max_in_flight as usize)
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/qr", get(qr))
        .with_state(state)
}

async fn root() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, TEXT_PLAIN)],
        "This is the QR code service. Try GET /qr?data=hello",
    )
}

async fn health() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, TEXT_PLAIN)], "ok")
}

async fn qr(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let work = run_job(&state, params);
    let result = match tokio::time::timeout(state.timeout, work).await {
        Ok(result) => result,
        Err(_) => Err(PipelineError::Internal(format!(
            "request exceeded its {}ms budget",
            state.timeout.as_millis()
        ))),
    };

    match result {
        Ok(response) => image_response(response, state.cache_max_age),
        Err(err) => error_response(&err),
    }
}

/// Waits for a free slot, then runs the pipeline on the blocking pool. The
/// slot stays taken until the job returns, even once nobody awaits it.
async fn run_job(
    state: &AppState,
    params: HashMap<String, String>,
) -> Result<QrResponse, PipelineError> {
    let permit = Arc::clone(&state.slots)
        .acquire_owned()
        .await
        .map_err(|_| PipelineError::Internal("worker slots closed".to_string()))?;
    let pipeline = Arc::clone(&state.pipeline);
    // encoding and rendering are CPU-bound, keep them off the reactor
    let work = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        pipeline.run(&params)
    });
    match work.await {
        Ok(result) => result,
        Err(join_err) => Err(PipelineError::Internal(format!("worker failed: {join_err}"))),
    }
}

fn image_response(response: QrResponse, cache_max_age: u32) -> Response {
    let content_type = HeaderValue::from_static(response.content_type());
    let disposition = HeaderValue::from_str(&response.content_disposition());
    let mut res = (StatusCode::OK, response.into_bytes()).into_response();
    let headers = res.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    if let Ok(disposition) = disposition {
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }
    if cache_max_age > 0 {
        if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={cache_max_age}")) {
            headers.insert(header::CACHE_CONTROL, value);
        }
    }
    res
}

fn error_response(err: &PipelineError) -> Response {
    if err.is_client_error() {
        warn!("rejected /qr request: {}", err);
    } else {
        error!("failed to generate QR code: {}", err);
    }
    let status = StatusCode::from_u16(err.status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let headers = [(header::CONTENT_TYPE, TEXT_PLAIN)];
    (status, headers, err.public_message()).into_response()
}
