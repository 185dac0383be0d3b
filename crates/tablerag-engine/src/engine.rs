//! The engine: one graph, one vector index, one encoder, one lock.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use tablerag_core::{EngineConfig, Error, Result, VectorBackend, DEFAULT_ENCODINGS};
use tablerag_infer::{create_encoder, Encoder, QueryCache};
use tablerag_ingest::{CsvSource, Table, TabularSource};
use tablerag_store::{
    GraphSnapshot, GraphStats, InMemoryVectorIndex, KnowledgeGraph, SqliteVectorIndex, VectorIndex,
};

use crate::builder::KnowledgeBuilder;
use crate::retriever::HybridRetriever;
use crate::types::{BuildReport, EngineStatus, QueryResult};

struct EngineState {
    graph: KnowledgeGraph,
    status: EngineStatus,
}

/// Table knowledge engine.
///
/// Builds take the write lock for their whole run, so queries never observe
/// a half-populated graph. Queries, stats and snapshots share the read lock.
pub struct Engine {
    encoder: Arc<dyn Encoder>,
    index: Arc<dyn VectorIndex>,
    source: Box<dyn TabularSource>,
    state: RwLock<EngineState>,
    cache: QueryCache,
    encodings: Vec<String>,
    default_k: usize,
}

impl Engine {
    pub fn new(encoder: Arc<dyn Encoder>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            encoder,
            index,
            source: Box::new(CsvSource::new()),
            state: RwLock::new(EngineState {
                graph: KnowledgeGraph::new(),
                status: EngineStatus::Unbuilt,
            }),
            cache: QueryCache::default_cache(),
            encodings: DEFAULT_ENCODINGS.iter().map(|e| e.to_string()).collect(),
            default_k: 3,
        }
    }

    /// Engine wired from configuration: best available encoder, and the
    /// configured vector backend sized to the encoder's dimension.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let encoder = create_encoder(&config.data_paths.models, config.embedding_dim);
        let dim = encoder.dimension();
        if dim != config.embedding_dim {
            warn!(
                "Encoder {} produces {}-dim vectors, overriding configured {}",
                encoder.model_id(),
                dim,
                config.embedding_dim
            );
        }

        let index: Arc<dyn VectorIndex> = match config.vector_backend {
            VectorBackend::Memory => Arc::new(InMemoryVectorIndex::new(dim)),
            VectorBackend::Sqlite => Arc::new(SqliteVectorIndex::open(&config.data_paths.vectordb, dim)?),
        };
        info!(
            "Engine ready: encoder={}, backend={:?}, dim={}",
            encoder.model_id(),
            config.vector_backend,
            dim
        );

        Ok(Self::new(encoder, index)
            .with_encodings(config.encoding_candidates.clone())
            .with_default_k(config.default_k))
    }

    pub fn with_source(mut self, source: impl TabularSource + 'static) -> Self {
        self.source = Box::new(source);
        self
    }

    pub fn with_encodings(mut self, encodings: Vec<String>) -> Self {
        self.encodings = encodings;
        self
    }

    pub fn with_default_k(mut self, k: usize) -> Self {
        self.default_k = k;
        self
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    pub fn encodings(&self) -> &[String] {
        &self.encodings
    }

    /// Replace all held state with the dataset at `path`.
    pub fn build(&self, path: &Path) -> Result<BuildReport> {
        self.build_with_cancel(path, &CancellationToken::new())
    }

    pub fn build_with_cancel(&self, path: &Path, cancel: &CancellationToken) -> Result<BuildReport> {
        let label = path.display().to_string();
        self.run_build(label, cancel, || {
            let decoded = self.source.read(path, &self.encodings)?;
            Ok((decoded.table, Some(decoded.encoding)))
        })
    }

    /// Replace all held state with an already-decoded table.
    pub fn build_table(&self, table: Table) -> Result<BuildReport> {
        self.run_build("<table>".to_string(), &CancellationToken::new(), || {
            Ok((table, None))
        })
    }

    fn run_build<F>(&self, source: String, cancel: &CancellationToken, load: F) -> Result<BuildReport>
    where
        F: FnOnce() -> Result<(Table, Option<String>)>,
    {
        let started = Instant::now();
        let mut state = self.state.write();
        let EngineState { graph, status } = &mut *state;

        let outcome = (|| -> Result<(usize, Option<String>)> {
            let mut builder = KnowledgeBuilder::new(&mut *graph, self.index.as_ref(), self.encoder.as_ref())
                .with_cancellation(cancel);
            builder.reset()?;
            let (table, encoding) = load()?;
            let rows = builder.populate(&table)?;
            Ok((rows, encoding))
        })();

        match outcome {
            Ok((rows, encoding)) => {
                let report = BuildReport {
                    source: source.clone(),
                    encoding,
                    rows,
                    nodes: graph.node_count(),
                    edges: graph.edge_count(),
                    elapsed_ms: started.elapsed().as_millis() as u64,
                };
                *status = EngineStatus::Ready { source, rows };
                info!(
                    "Build of {} finished in {}ms: {} rows, {} nodes, {} edges",
                    report.source, report.elapsed_ms, report.rows, report.nodes, report.edges
                );
                Ok(report)
            }
            Err(e) => {
                error!("Build of {} failed: {}", source, e);
                graph.clear();
                if let Err(clear_err) = self.index.clear() {
                    warn!("Could not clear vector index after failed build: {}", clear_err);
                }
                *status = EngineStatus::Failed {
                    reason: e.to_string(),
                };
                Err(e)
            }
        }
    }

    /// Nearest rows to `text` with their one-hop neighborhoods.
    pub fn query(&self, text: &str, k: usize) -> Result<QueryResult> {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be positive".into()));
        }

        let state = self.state.read();
        match &state.status {
            EngineStatus::Failed { .. } => Err(Error::Consistency(
                "last build failed, rebuild required".into(),
            )),
            EngineStatus::Unbuilt => Ok(QueryResult::empty(text)),
            EngineStatus::Ready { .. } => {
                HybridRetriever::new(&state.graph, self.index.as_ref(), self.encoder.as_ref())
                    .with_cache(&self.cache)
                    .retrieve(text, k)
            }
        }
    }

    pub fn query_default(&self, text: &str) -> Result<QueryResult> {
        self.query(text, self.default_k)
    }

    pub fn stats(&self) -> GraphStats {
        self.state.read().graph.stats()
    }

    pub fn graph_snapshot(&self, types: Option<&[String]>) -> GraphSnapshot {
        self.state.read().graph.snapshot(types)
    }

    /// Read guard over the live graph. Builds wait until it is dropped.
    pub fn graph(&self) -> MappedRwLockReadGuard<'_, KnowledgeGraph> {
        RwLockReadGuard::map(self.state.read(), |s| &s.graph)
    }

    pub fn status(&self) -> EngineStatus {
        self.state.read().status.clone()
    }

    pub fn encoder(&self) -> &dyn Encoder {
        self.encoder.as_ref()
    }

    pub fn index(&self) -> &dyn VectorIndex {
        self.index.as_ref()
    }

    pub fn vector_count(&self) -> Result<usize> {
        self.index.len()
    }
}
