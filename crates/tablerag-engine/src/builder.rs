//! Knowledge builder: table -> graph nodes/edges + one batch of vectors.

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use tablerag_core::{Attributes, CellValue, Error, Result};
use tablerag_infer::Encoder;
use tablerag_ingest::Table;
use tablerag_store::{graph::row_node_id, KnowledgeGraph, VectorIndex, VectorRecord};

/// Populates a graph and a vector index from one table.
///
/// The builder is the only writer of both stores. Callers hold whatever lock
/// guards the graph for the whole run.
pub struct KnowledgeBuilder<'a> {
    graph: &'a mut KnowledgeGraph,
    index: &'a dyn VectorIndex,
    encoder: &'a dyn Encoder,
    cancel: Option<&'a CancellationToken>,
}

impl<'a> KnowledgeBuilder<'a> {
    pub fn new(
        graph: &'a mut KnowledgeGraph,
        index: &'a dyn VectorIndex,
        encoder: &'a dyn Encoder,
    ) -> Self {
        Self {
            graph,
            index,
            encoder,
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn check_cancelled(&self, row: Option<usize>) -> Result<()> {
        match self.cancel {
            Some(token) if token.is_cancelled() => Err(Error::build_at(row, Error::Cancelled)),
            _ => Ok(()),
        }
    }

    /// Clear the graph and every vector record.
    pub fn reset(&mut self) -> Result<()> {
        self.check_cancelled(None)?;
        self.graph.clear();
        self.index.clear().map_err(|e| {
            error!("Failed to clear vector index: {}", e);
            Error::build_at(None, e)
        })?;
        debug!("Cleared graph and vector index");
        Ok(())
    }

    /// Run the row pass and the bulk insert. Returns the number of rows.
    ///
    /// Expects empty stores; call [`reset`](Self::reset) first.
    pub fn populate(&mut self, table: &Table) -> Result<usize> {
        let mut records = Vec::with_capacity(table.len());

        for (i, row) in table.rows().iter().enumerate() {
            self.check_cancelled(Some(i))?;
            let record = self.add_row(table.columns(), i, row).map_err(|e| {
                error!("Knowledge build failed at row {}: {}", i, e);
                Error::build_at(Some(i), e)
            })?;
            records.push(record);
        }

        self.check_cancelled(None)?;
        let rows = records.len();
        if rows > 0 {
            self.index.insert_batch(records).map_err(|e| {
                error!("Bulk vector insert of {} rows failed: {}", rows, e);
                Error::build_at(None, e)
            })?;
        }

        info!(
            "Built knowledge graph: {} rows, {} nodes, {} edges",
            rows,
            self.graph.node_count(),
            self.graph.edge_count()
        );
        Ok(rows)
    }

    fn add_row(&mut self, columns: &[String], index: usize, row: &[CellValue]) -> Result<VectorRecord> {
        let attributes: Attributes =
            columns.iter().cloned().zip(row.iter().cloned()).collect();
        let row_idx = self.graph.add_row_node(index, attributes.clone())?;

        for (column, value) in columns.iter().zip(row) {
            if value.is_null() {
                continue;
            }
            let value_idx = self.graph.get_or_add_value_node(column, value);
            self.graph.connect(row_idx, value_idx, column);
        }

        let document = row_document(row);
        let embedding = self.encoder.encode(&document)?;

        let id = row_node_id(index);
        let mut metadata = attributes;
        metadata.insert("row_id".to_string(), CellValue::text(id.clone()));

        Ok(VectorRecord {
            id,
            embedding,
            metadata,
            document,
        })
    }
}

/// Canonical forms of the non-null cells, space-joined in column order.
pub fn row_document(row: &[CellValue]) -> String {
    row.iter()
        .filter(|v| !v.is_null())
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;
    use tablerag_infer::HashingEncoder;
    use tablerag_store::InMemoryVectorIndex;

    fn city_table() -> Table {
        Table::new(
            vec!["city".into(), "age".into()],
            vec![
                vec!["NYC".into(), CellValue::Int(30)],
                vec!["NYC".into(), CellValue::Int(25)],
            ],
        )
        .unwrap()
    }

    /// Fails on any document containing "boom".
    struct FailingEncoder;

    impl Encoder for FailingEncoder {
        fn encode(&self, text: &str) -> Result<Array1<f32>> {
            if text.contains("boom") {
                Err(Error::Inference("encoder exploded".into()))
            } else {
                Ok(Array1::from_elem(4, 0.5))
            }
        }

        fn dimension(&self) -> usize {
            4
        }

        fn model_id(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn test_row_document_skips_nulls() {
        let row = vec![
            CellValue::text("NYC"),
            CellValue::Null,
            CellValue::Float(30.0),
            CellValue::Bool(true),
        ];
        assert_eq!(row_document(&row), "NYC 30.0 True");
    }

    #[test]
    fn test_populate_mirrors_rows_in_index() {
        let mut graph = KnowledgeGraph::new();
        let index = InMemoryVectorIndex::new(32);
        let encoder = HashingEncoder::new(32);

        let mut builder = KnowledgeBuilder::new(&mut graph, &index, &encoder);
        builder.reset().unwrap();
        let rows = builder.populate(&city_table()).unwrap();

        assert_eq!(rows, 2);
        assert_eq!(index.len().unwrap(), 2);
        assert_eq!(graph.row_count(), 2);
        assert_eq!(graph.node_count(), 5);

        let record = index.get("row_1").unwrap().unwrap();
        assert_eq!(record.document, "NYC 25");
        assert_eq!(record.metadata["row_id"], CellValue::text("row_1"));
        assert_eq!(record.metadata["age"], CellValue::Int(25));
    }

    #[test]
    fn test_row_id_metadata_overrides_column() {
        let table = Table::new(
            vec!["row_id".into()],
            vec![vec![CellValue::text("custom")]],
        )
        .unwrap();
        let mut graph = KnowledgeGraph::new();
        let index = InMemoryVectorIndex::new(16);
        let encoder = HashingEncoder::new(16);

        KnowledgeBuilder::new(&mut graph, &index, &encoder)
            .populate(&table)
            .unwrap();

        let record = index.get("row_0").unwrap().unwrap();
        assert_eq!(record.metadata["row_id"], CellValue::text("row_0"));
        assert_eq!(
            graph.row_node("row_0").unwrap().attributes["row_id"],
            CellValue::text("custom")
        );
    }

    #[test]
    fn test_zero_rows_skips_insert() {
        let table = Table::new(vec!["city".into()], vec![]).unwrap();
        let mut graph = KnowledgeGraph::new();
        let index = InMemoryVectorIndex::new(8);
        let encoder = HashingEncoder::new(8);

        let rows = KnowledgeBuilder::new(&mut graph, &index, &encoder)
            .populate(&table)
            .unwrap();
        assert_eq!(rows, 0);
        assert!(graph.is_empty());
        assert!(index.is_empty().unwrap());
    }

    #[test]
    fn test_encoder_failure_reports_row() {
        let table = Table::new(
            vec!["word".into()],
            vec![vec!["fine".into()], vec!["boom".into()], vec!["later".into()]],
        )
        .unwrap();
        let mut graph = KnowledgeGraph::new();
        let index = InMemoryVectorIndex::new(4);

        let err = KnowledgeBuilder::new(&mut graph, &index, &FailingEncoder)
            .populate(&table)
            .unwrap_err();
        match err {
            Error::Build { row, source } => {
                assert_eq!(row, Some(1));
                assert!(matches!(*source, Error::Inference(_)));
            }
            other => panic!("expected build error, got {:?}", other),
        }
        // Nothing reaches the index when the row pass fails.
        assert!(index.is_empty().unwrap());
    }

    #[test]
    fn test_cancelled_before_reset() {
        let mut graph = KnowledgeGraph::new();
        let index = InMemoryVectorIndex::new(8);
        let encoder = HashingEncoder::new(8);
        let token = CancellationToken::new();
        token.cancel();

        let err = KnowledgeBuilder::new(&mut graph, &index, &encoder)
            .with_cancellation(&token)
            .reset()
            .unwrap_err();
        assert!(matches!(err.root(), Error::Cancelled));
    }

    #[test]
    fn test_cancelled_during_row_pass() {
        let mut graph = KnowledgeGraph::new();
        let index = InMemoryVectorIndex::new(8);
        let encoder = HashingEncoder::new(8);
        let token = CancellationToken::new();
        token.cancel();

        let err = KnowledgeBuilder::new(&mut graph, &index, &encoder)
            .with_cancellation(&token)
            .populate(&city_table())
            .unwrap_err();
        match err {
            Error::Build { row, source } => {
                assert_eq!(row, Some(0));
                assert!(matches!(*source, Error::Cancelled));
            }
            other => panic!("expected build error, got {:?}", other),
        }
    }
}
