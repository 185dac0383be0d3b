//! tablerag store: row/value knowledge graph and cosine vector indexes.

pub mod embedding;
pub mod graph;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod types;
pub mod vector;

pub use graph::{
    GraphEdge, GraphNode, GraphSnapshot, GraphStats, KnowledgeGraph, NodeKind, SnapshotEdge,
    SnapshotNode,
};
pub use memory::InMemoryVectorIndex;
pub use sqlite::SqliteVectorIndex;
pub use types::*;
pub use vector::VectorIndex;
