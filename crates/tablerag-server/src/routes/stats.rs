//! Graph statistics route.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use tablerag_infer::Encoder;

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/stats", get(get_stats))
}

/// GET /api/stats: graph counts, connectivity and engine status.
async fn get_stats(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let stats = state.engine.stats();
    let vectors = state.engine.vector_count().unwrap_or(0);

    Json(serde_json::json!({
        "num_nodes": stats.num_nodes,
        "num_edges": stats.num_edges,
        "node_types": stats.node_types,
        "is_connected": stats.is_connected,
        "num_row_nodes": stats.num_row_nodes,
        "num_value_nodes": stats.num_value_nodes,
        "num_components": stats.num_components,
        "num_vectors": vectors,
        "encoder": state.engine.encoder().model_id(),
        "status": state.engine.status(),
    }))
}
