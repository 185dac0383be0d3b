//! Knowledge routes: build from a path or an upload, query, graph view.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Multipart, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use tablerag_engine::{BuildReport, QueryResult};
use tablerag_store::GraphSnapshot;

use super::{bad_request, blocking, error_response, ApiError};
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/knowledge/build", post(build))
        .route("/knowledge/upload", post(upload))
        .route("/knowledge/query", post(query))
        .route("/knowledge/graph", get(graph))
}

#[derive(Deserialize)]
struct BuildRequest {
    path: String,
}

/// POST /api/knowledge/build: rebuild from a CSV path on the server.
async fn build(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BuildRequest>,
) -> Result<Json<BuildReport>, ApiError> {
    if req.path.trim().is_empty() {
        return Err(bad_request("path is required"));
    }
    let path = PathBuf::from(req.path);
    run_build(state, path).await
}

async fn run_build(state: Arc<AppState>, path: PathBuf) -> Result<Json<BuildReport>, ApiError> {
    let report = blocking(move || state.engine.build_with_cancel(&path, &state.shutdown)).await?;
    Ok(Json(report))
}

/// POST /api/knowledge/upload: save a multipart CSV under uploads/, then build.
///
/// Saved names carry a short unique prefix; same-named uploads never share a file.
async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<BuildReport>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("invalid multipart body: {}", e)))?
    {
        let filename = match field.file_name() {
            Some(name) => sanitize_filename(name),
            None => continue,
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("failed to read upload: {}", e)))?;

        let prefix = uuid::Uuid::new_v4().simple().to_string();
        let saved_name = format!("{}-{}", &prefix[..8], filename);
        let upload_path = state.config.data_paths.uploads.join(&saved_name);
        std::fs::write(&upload_path, &bytes).map_err(|e| error_response(e.into()))?;
        info!("Saved upload {} ({} bytes)", upload_path.display(), bytes.len());

        return run_build(state, upload_path).await;
    }
    Err(bad_request("no file in upload"))
}

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    k: Option<i64>,
}

/// POST /api/knowledge/query: nearest rows with their related values.
async fn query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<QueryResult>, ApiError> {
    let k = match req.k {
        None => state.engine.default_k(),
        Some(k) if k > 0 => k as usize,
        Some(k) => return Err(bad_request(format!("k must be positive, got {}", k))),
    };
    let result = blocking(move || state.engine.query(&req.query, k)).await?;
    Ok(Json(result))
}

#[derive(Deserialize)]
struct GraphParams {
    /// Comma-separated value node types to keep.
    types: Option<String>,
}

/// GET /api/knowledge/graph: nodes and edges, optionally filtered by type.
async fn graph(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GraphParams>,
) -> Json<GraphSnapshot> {
    let types: Option<Vec<String>> = params
        .types
        .map(|raw| {
            raw.split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
        })
        .filter(|t| !t.is_empty());
    Json(state.engine.graph_snapshot(types.as_deref()))
}

/// Sanitize a filename to prevent path traversal.
fn sanitize_filename(name: &str) -> String {
    let name = name.replace(['/', '\\'], "").replace("..", "");
    std::path::Path::new(&name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.csv")
        .to_string()
}
