//! Exact nearest-neighbour index over embedded chunks

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Chunk;

/// Search result with chunk and similarity
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// The retrieved chunk
    pub chunk: Chunk,
    /// Cosine similarity (-1.0 to 1.0, higher is better)
    pub similarity: f32,
}

/// Brute-force cosine index. Documents here are a single upload, so a
/// linear scan is fast enough and always exact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    dimensions: usize,
    chunks: Vec<Chunk>,
}

impl FlatIndex {
    /// Create an empty index for vectors of `dimensions` components
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            chunks: Vec::new(),
        }
    }

    /// Build an index from embedded chunks
    pub fn from_chunks(dimensions: usize, chunks: Vec<Chunk>) -> Result<Self> {
        let mut index = Self::new(dimensions);
        for chunk in chunks {
            index.insert(chunk)?;
        }
        Ok(index)
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Add a chunk; its embedding must match the index dimension
    pub fn insert(&mut self, chunk: Chunk) -> Result<()> {
        self.check_dimensions(chunk.embedding.len())?;
        self.chunks.push(chunk);
        Ok(())
    }

    /// Remove everything
    pub fn clear(&mut self) {
        self.chunks.clear();
    }

    /// The `top_k` most similar chunks, best first; ties keep insertion order
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        self.check_dimensions(query.len())?;
        if top_k == 0 || self.chunks.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| (i, cosine_similarity(query, &chunk.embedding)))
            .collect();

        // stable sort preserves insertion order between equal scores
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(i, similarity)| SearchResult {
                chunk: self.chunks[i].clone(),
                similarity,
            })
            .collect())
    }

    fn check_dimensions(&self, got: usize) -> Result<()> {
        if got != self.dimensions {
            return Err(Error::vector_db(format!(
                "Embedding dimension mismatch: index has {}, got {}",
                self.dimensions, got
            )));
        }
        Ok(())
    }
}

/// Cosine similarity; zero vectors score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
