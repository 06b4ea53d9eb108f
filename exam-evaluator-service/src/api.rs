//! HTTP API for the exam evaluator.
//!
//! - `GET /` liveness greeting
//! - `GET /health` and `GET /metrics` for monitoring
//! - `POST /evaluation/evaluate-exam` to grade an answer sheet by URL

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::CorsConfig;
use crate::error::ServiceError;
use crate::service::{EvaluationResult, EvaluationService};

const EVALUATION_SUCCEEDED_MESSAGE: &str = "Document analyzed and evaluated successfully";

/// Application state
pub struct AppState {
    pub service: Arc<EvaluationService>,
    pub start_time: Instant,
    pub metrics: Option<PrometheusHandle>,
}

/// Build the API router
pub fn router(state: AppState, cors: &CorsConfig) -> Router {
    let evaluation_routes = Router::new().route("/evaluate-exam", post(evaluate_exam_handler));

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .nest("/evaluation", evaluation_routes)
        .layer(cors_layer(cors))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if cors.allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}

// === Liveness & Monitoring ===

#[derive(Serialize)]
struct GreetingResponse {
    message: &'static str,
}

async fn root_handler() -> Json<GreetingResponse> {
    Json(GreetingResponse {
        message: "Exam evaluator is running",
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_seconds: u64,
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

// === Evaluation ===

#[derive(Debug, Deserialize)]
pub struct EvaluationRequest {
    pub pdf_url: String,
}

impl EvaluationRequest {
    /// Parse `pdf_url` as an absolute http(s) URL with a host
    fn parsed_url(&self) -> Result<Url, ServiceError> {
        let invalid = |reason: String| ServiceError::InvalidRequest {
            message: format!("pdf_url: {}", reason),
        };

        let url = Url::parse(self.pdf_url.trim()).map_err(|e| invalid(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported URL scheme '{}'", url.scheme())));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(invalid("URL has no host".to_string()));
        }
        Ok(url)
    }
}

#[derive(Debug, Serialize)]
pub struct EvaluationResponse {
    pub status: &'static str,
    pub data: EvaluationResult,
    pub message: &'static str,
}

async fn evaluate_exam_handler(
    State(state): State<Arc<AppState>>,
    request: Result<Json<EvaluationRequest>, JsonRejection>,
) -> Result<Json<EvaluationResponse>, ServiceError> {
    let Json(request) = request.map_err(|rejection| ServiceError::InvalidRequest {
        message: rejection.body_text(),
    })?;
    let pdf_url = request.parsed_url()?;
    let data = state.service.evaluate_exam(&pdf_url).await?;

    Ok(Json(EvaluationResponse {
        status: "success",
        data,
        message: EVALUATION_SUCCEEDED_MESSAGE,
    }))
}
