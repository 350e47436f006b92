use std::hash::{DefaultHasher, Hash, Hasher};

use anyhow::Result;
use regex::Regex;

/// The embedding capability behind the search service.
///
/// Query and corpus vectors must come from the same implementation so they
/// share one vector space. A model-backed embedder can be swapped in here
/// without touching the search or ingestion paths.
pub trait TextEmbedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
    fn dimension(&self) -> usize;
}

/// Deterministic feature-hashing bag-of-tokens embedder.
///
/// Lowercased Unicode word tokens are hashed into a fixed number of buckets
/// and the resulting term-frequency vector is L2-normalized. Non-negative
/// components keep cosine similarity in [0, 1].
#[derive(Debug)]
pub struct HashingEmbedder {
    dimension: usize,
    token_re: Regex,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            anyhow::bail!("embedding dimension must be at least 1");
        }
        Ok(Self {
            dimension,
            token_re: Regex::new(r"[\p{L}\p{N}]+")?,
        })
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.token_re
            .find_iter(&lowered)
            .map(|m| m.as_str().to_string())
            .collect()
    }

    fn bucket(&self, token: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        usize::try_from(hasher.finish() % self.dimension as u64).unwrap_or(0)
    }
}

impl TextEmbedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in self.tokenize(text) {
            vector[self.bucket(&token)] += 1.0;
        }
        Ok(normalize(vector))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// L2 normalization. The zero vector stays zero so texts with no tokens
/// score 0 against everything instead of producing NaN.
pub fn normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

/// Cosine similarity clamped to [0, 1]. Both inputs are expected to be
/// normalized, so this reduces to a dot product.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum::<f32>();
    dot.clamp(0.0, 1.0)
}
