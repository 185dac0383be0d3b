//! Vector index abstraction.

use ndarray::Array1;
use tablerag_core::Result;

use crate::types::{VectorHit, VectorRecord};

/// Cosine-distance nearest-neighbor index keyed by row id.
///
/// Methods take `&self`; implementations synchronize internally.
pub trait VectorIndex: Send + Sync {
    /// Remove every record. Clearing an empty index succeeds.
    fn clear(&self) -> Result<()>;

    /// Insert a batch atomically. Rejects wrong dimensions and ids that are
    /// already present (in the index or twice in the batch).
    fn insert_batch(&self, records: Vec<VectorRecord>) -> Result<()>;

    /// Up to `k` records ordered by ascending cosine distance. Equal
    /// distances keep insertion order.
    fn query_knn(&self, embedding: &Array1<f32>, k: usize) -> Result<Vec<VectorHit>>;

    /// Number of stored records.
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Fetch a stored record by id.
    fn get(&self, id: &str) -> Result<Option<VectorRecord>>;

    /// Dimensionality accepted by this index.
    fn dimension(&self) -> usize;
}
