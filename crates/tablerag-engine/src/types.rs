//! Engine result types.

use serde::Serialize;
use tablerag_store::GraphNode;

/// Summary of a completed build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    /// Path of the dataset, or `<table>` for in-memory tables.
    pub source: String,
    /// Encoding the source decoded with. `None` for in-memory tables.
    pub encoding: Option<String>,
    pub rows: usize,
    pub nodes: usize,
    pub edges: usize,
    pub elapsed_ms: u64,
}

/// One retrieved row with its one-hop neighborhood.
#[derive(Debug, Clone, Serialize)]
pub struct ContextRecord {
    /// Row node id, same as the vector id.
    pub id: String,
    pub node: GraphNode,
    /// Value nodes adjacent to the row, in column order.
    pub neighbors: Vec<GraphNode>,
    /// Cosine distance of the hit; smaller is closer.
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub query: String,
    pub relevant_contexts: Vec<ContextRecord>,
}

impl QueryResult {
    pub fn empty(query: &str) -> Self {
        Self {
            query: query.to_string(),
            relevant_contexts: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.relevant_contexts.is_empty()
    }
}

/// Lifecycle of the loaded dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum EngineStatus {
    /// No build has been attempted yet.
    Unbuilt,
    Ready { source: String, rows: usize },
    /// The last build failed; stores were cleared and a rebuild is needed.
    Failed { reason: String },
}
