//! tablerag infer: text encoders and the query embedding cache.
//!
//! Provides the `Encoder` trait used at both build and query time.
//! When the `onnx` feature is enabled and model files are present,
//! `OnnxEncoder` loads all-MiniLM-L6-v2 for 384-dim embeddings.
//! Without it, the deterministic `HashingEncoder` is used.

pub mod cache;
pub mod encoder;
pub mod hashing;
pub mod onnx_encoder;

pub use cache::QueryCache;
pub use encoder::Encoder;
pub use hashing::HashingEncoder;

#[cfg(feature = "onnx")]
pub use onnx_encoder::OnnxEncoder;

use std::path::Path;
use std::sync::Arc;

/// Create the best available encoder for the given model directory.
///
/// Tries ONNX first (if feature enabled and model files present),
/// falls back to `HashingEncoder` with dimension `dim`.
pub fn create_encoder(model_dir: &Path, dim: usize) -> Arc<dyn Encoder> {
    #[cfg(feature = "onnx")]
    {
        match OnnxEncoder::load(model_dir) {
            Ok(encoder) => {
                tracing::info!("Using ONNX encoder (dim={})", encoder.dimension());
                return Arc::new(encoder);
            }
            Err(e) => {
                tracing::warn!("ONNX encoder unavailable: {}. Falling back to hashing encoder.", e);
            }
        }
    }

    #[cfg(not(feature = "onnx"))]
    {
        let _ = model_dir;
        tracing::info!("ONNX feature disabled. Using hashing encoder (dim={}).", dim);
    }

    Arc::new(HashingEncoder::new(dim))
}
