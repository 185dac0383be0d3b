//! Database schema SQL for the durable vector index.

/// Vector records keyed by row id. `seq` preserves insertion order so
/// equal-distance ties resolve the same way after a reload.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS vector_records (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    embedding BLOB NOT NULL,
    metadata_json TEXT NOT NULL,
    document TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS index_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

pub const META_EMBEDDING_DIM: &str = "embedding_dim";
