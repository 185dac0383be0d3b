//! HTTP route handlers.

pub mod knowledge;
pub mod stats;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::{Json, Router};
use tablerag_core::Error;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(stats::routes())
        .merge(knowledge::routes())
}

pub type ApiError = (StatusCode, Json<serde_json::Value>);

pub fn status_for(err: &Error) -> StatusCode {
    match err.root() {
        Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        Error::Decode { .. } | Error::Read(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::Consistency(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `{"error": ...}` body with the status mapped from the error kind.
pub fn error_response(err: Error) -> ApiError {
    (
        status_for(&err),
        Json(serde_json::json!({ "error": err.to_string() })),
    )
}

pub fn bad_request(message: impl Into<String>) -> ApiError {
    error_response(Error::InvalidArgument(message.into()))
}

/// Run blocking engine work off the async runtime.
pub async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> tablerag_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result.map_err(error_response),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": format!("worker task failed: {}", e) })),
        )),
    }
}
