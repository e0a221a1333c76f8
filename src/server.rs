//! HTTP front end.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `[server].path` (default `/query`) | Ask a question and/or upload a document |
//! | `GET`  | `/health` | Health check (version and chunk count) |
//!
//! The query endpoint accepts `multipart/form-data` or a JSON object and
//! answers with `{"source": "...", "ai_answer": "..."}`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "missing_boundary", "message": "multipart content type has no boundary" } }
//! ```
//!
//! Decode and validation failures are 4xx; capability failures are 5xx.
//! A failing request never takes the process down.
//!
//! # CORS
//!
//! Any origin; methods `POST, GET, OPTIONS`; header `Content-Type`.
//! Preflight requests are answered by the CORS layer.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use lexrag_core::index::VectorIndex;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::form;
use crate::models::AnswerResult;
use crate::service::ServiceContext;

#[derive(Clone)]
struct AppState {
    service: Arc<ServiceContext>,
}

/// The application router, without a listener. Used by [`run_server`] and
/// by tests that bind their own port.
pub fn build_router(service: Arc<ServiceContext>) -> Router {
    let server = &service.config().server;
    let query_path = server.path.clone();
    let body_limit = server.max_upload_bytes;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route(&query_path, post(handle_query))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(AppState { service })
}

/// Bind `[server].bind` and serve until Ctrl-C.
pub async fn run_server(service: Arc<ServiceContext>) -> anyhow::Result<()> {
    let bind_addr = service.config().server.bind.clone();
    let query_path = service.config().server.path.clone();
    let app = build_router(service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %listener.local_addr()?, path = %query_path, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Converts a service [`Error`] into a JSON error response.
struct AppError(Error);

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        AppError(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        if status.is_server_error() {
            error!(code = self.0.code(), error = %self.0, "request failed");
        } else {
            warn!(code = self.0.code(), error = %self.0, "request rejected");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.0.code().to_string(),
                message: self.0.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

// ============ POST {path} ============

async fn handle_query(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AnswerResult>, AppError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let request = form::decode(content_type, &body)?;
    debug!(
        bytes = body.len(),
        upload = ?request.uploaded_file,
        legal_area = %request.legal_area,
        "decoded request"
    );

    let answer = state.service.handle(request).await?;
    info!(source = ?answer.source_kind, "answered");
    Ok(Json(answer))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    chunks: usize,
}

async fn handle_health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            chunks: state.service.index().snapshot().len(),
        }),
    )
}
