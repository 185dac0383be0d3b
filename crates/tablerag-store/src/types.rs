//! Vector record and search hit types.

use ndarray::Array1;
use serde::Serialize;
use tablerag_core::Attributes;

/// One row's entry in a vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    /// Same string as the row node id in the graph.
    pub id: String,
    pub embedding: Array1<f32>,
    /// Row attributes plus `row_id`.
    pub metadata: Attributes,
    /// The text that was embedded. Kept for inspection, not used in scoring.
    pub document: String,
}

/// A nearest-neighbor result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorHit {
    pub id: String,
    /// Cosine distance (`1 - cosine similarity`); smaller is closer.
    pub distance: f32,
}
