//! Deterministic feature-hashing encoder.
//!
//! Word tokens and their character trigrams are hashed (SHA-256) into a
//! fixed number of signed buckets, then the vector is L2-normalized. No
//! model files are needed and output is stable across processes and
//! platforms, which keeps a persisted vector index valid across restarts.

use ndarray::Array1;
use sha2::{Digest, Sha256};

use crate::encoder::Encoder;
use tablerag_core::{Error, Result};

const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

pub struct HashingEncoder {
    dim: usize,
    model_id: String,
}

impl HashingEncoder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim: dim.max(1),
            model_id: format!("hashing-sha256-{}", dim.max(1)),
        }
    }

    fn add_feature(&self, vector: &mut Array1<f32>, kind: u8, feature: &str, weight: f32) {
        let mut hasher = Sha256::new();
        hasher.update([kind]);
        hasher.update(feature.as_bytes());
        let digest = hasher.finalize();

        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dim as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };

        vector[bucket] += sign * weight;
    }
}

/// Lowercased alphanumeric runs.
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn trigrams(token: &str) -> Vec<String> {
    let padded: Vec<char> = std::iter::once('^')
        .chain(token.chars())
        .chain(std::iter::once('$'))
        .collect();
    padded.windows(3).map(|w| w.iter().collect()).collect()
}

impl Encoder for HashingEncoder {
    fn encode(&self, text: &str) -> Result<Array1<f32>> {
        let mut vector = Array1::<f32>::zeros(self.dim);

        for token in tokenize(text) {
            self.add_feature(&mut vector, b'w', &token, WORD_WEIGHT);
            for gram in trigrams(&token) {
                self.add_feature(&mut vector, b't', &gram, TRIGRAM_WEIGHT);
            }
        }

        let norm = vector.dot(&vector).sqrt();
        if !norm.is_finite() {
            return Err(Error::Inference(format!(
                "non-finite embedding norm for text of {} bytes",
                text.len()
            )));
        }
        if norm > 1e-9 {
            vector /= norm;
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
