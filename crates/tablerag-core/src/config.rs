//! Configuration and data directory management.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{Error, Result};

/// Encodings tried, in order, when the source encoding is unknown.
pub const DEFAULT_ENCODINGS: &[&str] = &["utf-8", "gbk", "big5", "gb18030"];

/// Paths to all tablerag data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Durable vector index directory (`data/vectordb/`).
    pub vectordb: PathBuf,
    /// Uploaded datasets (`data/uploads/`).
    pub uploads: PathBuf,
    /// Encoder model files (`data/models/`).
    pub models: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            vectordb: root.join("vectordb"),
            uploads: root.join("uploads"),
            models: root.join("models"),
            root,
        };
        paths.ensure_dirs()?;
        Ok(paths)
    }

    fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.vectordb)?;
        std::fs::create_dir_all(&self.uploads)?;
        std::fs::create_dir_all(&self.models)?;
        debug!("Data directories ready under {}", self.root.display());
        Ok(())
    }
}

/// Which vector index implementation backs the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    /// Process-local matrix, lost on restart.
    Memory,
    /// SQLite file under `vectordb/`.
    Sqlite,
}

impl std::str::FromStr for VectorBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(Error::Config(format!("unknown vector backend: {}", other))),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths.
    pub data_paths: DataPaths,
    /// Embedding dimension (384 for all-MiniLM-L6-v2).
    pub embedding_dim: usize,
    /// Number of contexts returned when a query does not name `k`.
    pub default_k: usize,
    /// Source encodings tried in order.
    pub encoding_candidates: Vec<String>,
    pub vector_backend: VectorBackend,
}

impl EngineConfig {
    /// Defaults rooted at `data_dir`, without reading the environment.
    pub fn new(data_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self {
            port: 3003,
            data_paths: DataPaths::new(data_dir)?,
            embedding_dim: 384,
            default_k: 3,
            encoding_candidates: DEFAULT_ENCODINGS.iter().map(|e| e.to_string()).collect(),
            vector_backend: VectorBackend::Sqlite,
        })
    }

    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::new(data_dir)?;

        if let Some(port) = env_parse::<u16>("PORT")? {
            config.port = port;
        }
        if let Some(dim) = env_parse::<usize>("TABLERAG_EMBEDDING_DIM")? {
            if dim == 0 {
                return Err(Error::Config("TABLERAG_EMBEDDING_DIM must be positive".into()));
            }
            config.embedding_dim = dim;
        }
        if let Some(k) = env_parse::<usize>("TABLERAG_DEFAULT_K")? {
            if k == 0 {
                return Err(Error::Config("TABLERAG_DEFAULT_K must be positive".into()));
            }
            config.default_k = k;
        }
        if let Ok(list) = std::env::var("TABLERAG_ENCODINGS") {
            let encodings: Vec<String> = list
                .split(',')
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect();
            if encodings.is_empty() {
                return Err(Error::Config("TABLERAG_ENCODINGS is empty".into()));
            }
            config.encoding_candidates = encodings;
        }
        if let Ok(backend) = std::env::var("TABLERAG_VECTOR_BACKEND") {
            config.vector_backend = backend.parse()?;
        }

        Ok(config)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("invalid value for {}: {}", key, raw))),
        Err(_) => Ok(None),
    }
}
