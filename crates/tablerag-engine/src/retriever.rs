//! Hybrid retriever: vector kNN over rows, then one-hop graph expansion.

use tracing::{debug, warn};

use tablerag_core::{Error, Result};
use tablerag_infer::{Encoder, QueryCache};
use tablerag_store::{KnowledgeGraph, VectorIndex};

use crate::types::{ContextRecord, QueryResult};

/// Read-only view over both stores for answering one query.
pub struct HybridRetriever<'a> {
    graph: &'a KnowledgeGraph,
    index: &'a dyn VectorIndex,
    encoder: &'a dyn Encoder,
    cache: Option<&'a QueryCache>,
}

impl<'a> HybridRetriever<'a> {
    pub fn new(graph: &'a KnowledgeGraph, index: &'a dyn VectorIndex, encoder: &'a dyn Encoder) -> Self {
        Self {
            graph,
            index,
            encoder,
            cache: None,
        }
    }

    /// Memoize query embeddings in `cache`.
    pub fn with_cache(mut self, cache: &'a QueryCache) -> Self {
        self.cache = Some(cache);
        self
    }

    fn embed(&self, text: &str) -> Result<ndarray::Array1<f32>> {
        if let Some(embedding) = self.cache.and_then(|c| c.get(text)) {
            return Ok(embedding);
        }
        let embedding = self.encoder.encode(text).map_err(|e| {
            warn!("Failed to embed query {:?}: {}", text, e);
            match e {
                Error::Inference(msg) => Error::Inference(format!("query {:?}: {}", text, msg)),
                other => other,
            }
        })?;
        if let Some(cache) = self.cache {
            cache.put(text.to_string(), embedding.clone());
        }
        Ok(embedding)
    }

    /// Up to `k` rows closest to `text`, closest first, each with its
    /// directly connected value nodes.
    pub fn retrieve(&self, text: &str, k: usize) -> Result<QueryResult> {
        if k == 0 {
            return Err(Error::InvalidArgument("k must be positive".into()));
        }
        if self.graph.is_empty() {
            debug!("Query on empty graph");
            return Ok(QueryResult::empty(text));
        }

        let embedding = self.embed(text)?;
        let hits = self.index.query_knn(&embedding, k)?;

        let relevant_contexts = hits
            .into_iter()
            .map(|hit| {
                let node = self.graph.row_node(&hit.id).ok_or_else(|| {
                    Error::Consistency(format!(
                        "vector index returned {} which has no row node",
                        hit.id
                    ))
                })?;
                let neighbors = self
                    .graph
                    .row_neighbors(&hit.id)
                    .unwrap_or_default()
                    .into_iter()
                    .cloned()
                    .collect();
                Ok(ContextRecord {
                    id: hit.id,
                    node: node.clone(),
                    neighbors,
                    score: f64::from(hit.distance),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Query {:?} matched {} rows", text, relevant_contexts.len());
        Ok(QueryResult {
            query: text.to_string(),
            relevant_contexts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::KnowledgeBuilder;
    use ndarray::Array1;
    use tablerag_core::CellValue;
    use tablerag_infer::HashingEncoder;
    use tablerag_ingest::Table;
    use tablerag_store::{InMemoryVectorIndex, VectorRecord};

    fn setup() -> (KnowledgeGraph, InMemoryVectorIndex, HashingEncoder) {
        let table = Table::new(
            vec!["city".into(), "age".into()],
            vec![
                vec!["NYC".into(), CellValue::Int(30)],
                vec!["LA".into(), CellValue::Int(25)],
                vec!["NYC".into(), CellValue::Null],
            ],
        )
        .unwrap();
        let mut graph = KnowledgeGraph::new();
        let index = InMemoryVectorIndex::new(64);
        let encoder = HashingEncoder::new(64);
        KnowledgeBuilder::new(&mut graph, &index, &encoder)
            .populate(&table)
            .unwrap();
        (graph, index, encoder)
    }

    #[test]
    fn test_zero_k_rejected() {
        let (graph, index, encoder) = setup();
        let err = HybridRetriever::new(&graph, &index, &encoder)
            .retrieve("NYC", 0)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_neighbors_follow_column_order() {
        let (graph, index, encoder) = setup();
        let result = HybridRetriever::new(&graph, &index, &encoder)
            .retrieve("LA 25", 1)
            .unwrap();

        let ctx = &result.relevant_contexts[0];
        assert_eq!(ctx.id, "row_1");
        let ids: Vec<&str> = ctx.neighbors.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["city_LA", "age_25"]);
        assert!(ctx.score < 0.01);
    }

    #[test]
    fn test_k_larger_than_rows() {
        let (graph, index, encoder) = setup();
        let result = HybridRetriever::new(&graph, &index, &encoder)
            .retrieve("NYC", 10)
            .unwrap();
        assert_eq!(result.relevant_contexts.len(), 3);
        let scores: Vec<f64> = result.relevant_contexts.iter().map(|c| c.score).collect();
        assert!(scores.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_empty_graph_returns_nothing() {
        let graph = KnowledgeGraph::new();
        let index = InMemoryVectorIndex::new(8);
        let encoder = HashingEncoder::new(8);
        let result = HybridRetriever::new(&graph, &index, &encoder)
            .retrieve("anything", 3)
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(result.query, "anything");
    }

    #[test]
    fn test_diverged_stores_are_a_consistency_error() {
        let (graph, _, encoder) = setup();
        let stray = InMemoryVectorIndex::new(64);
        stray
            .insert_batch(vec![VectorRecord {
                id: "row_99".into(),
                embedding: Array1::from_elem(64, 1.0),
                metadata: Default::default(),
                document: String::new(),
            }])
            .unwrap();

        let err = HybridRetriever::new(&graph, &stray, &encoder)
            .retrieve("NYC", 1)
            .unwrap_err();
        assert!(matches!(err, Error::Consistency(_)));
    }

    #[test]
    fn test_cache_is_filled() {
        let (graph, index, encoder) = setup();
        let cache = QueryCache::default_cache();
        let retriever = HybridRetriever::new(&graph, &index, &encoder).with_cache(&cache);

        let first = retriever.retrieve("NYC", 2).unwrap();
        let second = retriever.retrieve("NYC", 2).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().hits, 1);

        let ids = |r: &QueryResult| r.relevant_contexts.iter().map(|c| c.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
    }
}
