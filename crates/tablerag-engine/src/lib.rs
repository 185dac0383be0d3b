//! Table knowledge engine.
//!
//! `KnowledgeBuilder` turns a table into row/value graph nodes and one batch
//! of row embeddings. `HybridRetriever` answers a query with the nearest rows
//! by cosine distance, each expanded to its directly connected values.
//! `Engine` owns the stores and serializes builds against queries.

pub mod builder;
pub mod engine;
pub mod prompt;
pub mod retriever;
pub mod types;

pub use builder::{row_document, KnowledgeBuilder};
pub use engine::Engine;
pub use retriever::HybridRetriever;
pub use types::*;
