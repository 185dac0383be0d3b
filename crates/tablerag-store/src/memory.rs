//! Process-local vector index.

use std::collections::{HashMap, HashSet};

use ndarray::Array1;
use parking_lot::RwLock;
use tablerag_core::{Error, Result};

use crate::embedding::CosineMatrix;
use crate::types::{VectorHit, VectorRecord};
use crate::vector::VectorIndex;

pub struct InMemoryVectorIndex {
    inner: RwLock<MemoryInner>,
    dim: usize,
}

struct MemoryInner {
    matrix: CosineMatrix,
    records: HashMap<String, VectorRecord>,
}

impl InMemoryVectorIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            inner: RwLock::new(MemoryInner {
                matrix: CosineMatrix::new(dim),
                records: HashMap::new(),
            }),
            dim,
        }
    }
}

impl VectorIndex for InMemoryVectorIndex {
    fn clear(&self) -> Result<()> {
        let mut inner = self.inner.write();
        inner.matrix.clear();
        inner.records.clear();
        Ok(())
    }

    fn insert_batch(&self, records: Vec<VectorRecord>) -> Result<()> {
        let mut inner = self.inner.write();

        // Validate everything first so a rejected batch leaves no partial writes.
        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            inner.matrix.check_dim(&record.embedding, &record.id)?;
            if inner.records.contains_key(&record.id) || !seen.insert(record.id.as_str()) {
                return Err(Error::Storage(format!("duplicate vector id: {}", record.id)));
            }
        }

        for record in records {
            inner.matrix.push(record.id.clone(), &record.embedding)?;
            inner.records.insert(record.id.clone(), record);
        }
        Ok(())
    }

    fn query_knn(&self, embedding: &Array1<f32>, k: usize) -> Result<Vec<VectorHit>> {
        self.inner.read().matrix.knn(embedding, k)
    }

    fn len(&self) -> Result<usize> {
        Ok(self.inner.read().records.len())
    }

    fn get(&self, id: &str) -> Result<Option<VectorRecord>> {
        Ok(self.inner.read().records.get(id).cloned())
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}
