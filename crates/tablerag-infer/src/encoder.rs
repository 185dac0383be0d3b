//! Encoder trait.
//!
//! One encoder instance serves both build and query for an engine's
//! lifetime, so row and query vectors live in the same space.

use ndarray::Array1;
use tablerag_core::Result;

/// Turns text into a fixed-length vector.
pub trait Encoder: Send + Sync {
    /// Encode one text. Deterministic for a fixed model.
    fn encode(&self, text: &str) -> Result<Array1<f32>>;

    /// Encode a batch of texts, failing on the first error.
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Array1<f32>>> {
        texts.iter().map(|t| self.encode(t)).collect()
    }

    /// Output dimensionality, fixed for the encoder's lifetime.
    fn dimension(&self) -> usize;

    /// Identifier of the model behind this encoder.
    fn model_id(&self) -> &str;
}
