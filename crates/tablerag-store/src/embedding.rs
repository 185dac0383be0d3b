//! Embedding blobs and the normalized matrix behind cosine search.

use ndarray::{Array1, Array2};
use tablerag_core::{Error, Result};

use crate::types::VectorHit;

/// Serialize an embedding as little-endian f32 bytes.
pub fn encode_f32_blob(embedding: &Array1<f32>) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Inverse of [`encode_f32_blob`].
pub fn decode_f32_blob(bytes: &[u8]) -> Result<Array1<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(Error::Storage(format!(
            "embedding blob length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Unit-length copy of `v`; zero vectors stay zero.
pub fn normalized(v: &Array1<f32>) -> Array1<f32> {
    let norm = v.dot(v).sqrt();
    if norm > 1e-9 {
        v / norm
    } else {
        v.clone()
    }
}

/// Row-normalized embeddings plus the id of each row, in insertion order.
///
/// Cosine similarity against a normalized query is a single mat-vec product.
pub struct CosineMatrix {
    matrix: Array2<f32>,
    ids: Vec<String>,
    dim: usize,
}

impl CosineMatrix {
    pub fn new(dim: usize) -> Self {
        Self {
            matrix: Array2::zeros((0, dim)),
            ids: Vec::new(),
            dim,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.matrix = Array2::zeros((0, self.dim));
        self.ids.clear();
    }

    pub fn check_dim(&self, embedding: &Array1<f32>, id: &str) -> Result<()> {
        if embedding.len() != self.dim {
            return Err(Error::Storage(format!(
                "vector {} has dimension {}, index expects {}",
                id,
                embedding.len(),
                self.dim
            )));
        }
        Ok(())
    }

    pub fn push(&mut self, id: String, embedding: &Array1<f32>) -> Result<()> {
        self.check_dim(embedding, &id)?;
        self.matrix
            .push_row(normalized(embedding).view())
            .map_err(|e| Error::Storage(format!("matrix append failed: {}", e)))?;
        self.ids.push(id);
        Ok(())
    }

    /// `k` nearest rows by cosine distance, ties in insertion order.
    pub fn knn(&self, query: &Array1<f32>, k: usize) -> Result<Vec<VectorHit>> {
        self.check_dim(query, "query")?;
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let q = normalized(query);
        let similarities = self.matrix.dot(&q);

        let mut ranked: Vec<(usize, f32)> = similarities
            .iter()
            .enumerate()
            .map(|(i, &s)| (i, (1.0 - s).clamp(0.0, 2.0)))
            .collect();
        // Stable sort keeps insertion order among equal distances.
        ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);

        Ok(ranked
            .into_iter()
            .map(|(i, distance)| VectorHit {
                id: self.ids[i].clone(),
                distance,
            })
            .collect())
    }
}
