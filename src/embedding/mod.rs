//! Embedding generation: provider contract, content-addressed cache, and
//! batched dispatch with bounded concurrency.

use async_trait::async_trait;
use thiserror::Error;

pub mod batch;
pub mod cache;

pub use batch::BatchEmbedder;
pub use cache::EmbeddingCache;

use crate::error::LexikaError;

/// Failure modes an embedding or prediction provider must distinguish.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("provider rate limited")]
    RateLimited,
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("invalid provider input: {0}")]
    InvalidInput(String),
    #[error("provider call timed out")]
    Timeout,
}

impl ProviderError {
    /// Transient failures are retried and counted against the circuit
    /// breaker; invalid input is neither.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Unavailable(_) | Self::Timeout)
    }
}

impl From<ProviderError> for LexikaError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::InvalidInput(msg) => Self::InvalidQuery(msg),
            other => Self::ProviderUnavailable(other.to_string()),
        }
    }
}

/// Capability that turns text into fixed-dimension vectors.
///
/// Implementations are external services in production; the built-in
/// [`HashEmbeddingProvider`] serves offline use and tests.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts. The output has one vector per input text,
    /// in input order, each of [`Self::dimension`] length.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    /// Fixed output dimension.
    fn dimension(&self) -> usize;

    /// Model identity, combined with text hashes to form cache keys.
    fn model_id(&self) -> &str;
}

/// Deterministic FNV-1a token-hash embedder.
///
/// No ML model dependencies: each token is hashed into a bucket and the
/// resulting histogram is l2-normalized. Quality is far below a learned
/// model but it is fast, offline, and stable across runs, which is what
/// the CLI demo and the test suite need.
pub struct HashEmbeddingProvider {
    dim: usize,
    model: String,
}

impl HashEmbeddingProvider {
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            model: "hash-fnv1a".to_string(),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dim];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let hash = fnv1a(token.to_lowercase().as_bytes());
            let bucket = (hash % self.dim as u64) as usize;
            // Sign bit from a higher hash bit keeps buckets roughly centered.
            let sign = if hash & (1 << 32) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        l2_normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(ProviderError::InvalidInput("empty text".to_string()));
        }
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Normalize a vector to unit length in place. Zero vectors are left as-is.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity between two equal-length vectors, in [-1, 1].
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
