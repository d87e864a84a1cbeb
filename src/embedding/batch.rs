//! Chunked, concurrency-bounded dispatch of embedding requests.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::try_join_all;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::debug;

use super::{EmbeddingProvider, ProviderError};

/// Splits large input lists into provider-sized chunks and dispatches them
/// with bounded concurrency so a burst of indexing work cannot overwhelm
/// the external service.
pub struct BatchEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    semaphore: Arc<Semaphore>,
    call_timeout: Duration,
}

impl BatchEmbedder {
    #[must_use]
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
        max_concurrency: usize,
        call_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
            semaphore: Arc::new(Semaphore::new(max_concurrency.max(1))),
            call_timeout,
        }
    }

    /// Embed all texts, preserving input order.
    ///
    /// Chunks run concurrently up to the configured limit; each chunk call
    /// carries its own timeout, which is reported as
    /// [`ProviderError::Timeout`]. Every returned vector is validated
    /// against the provider's declared dimension.
    pub async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let chunks: Vec<Vec<String>> = texts
            .chunks(self.batch_size)
            .map(<[String]>::to_vec)
            .collect();
        debug!(
            texts = texts.len(),
            chunks = chunks.len(),
            "dispatching embedding batches"
        );

        let futures = chunks.into_iter().map(|chunk| {
            let provider = Arc::clone(&self.provider);
            let semaphore = Arc::clone(&self.semaphore);
            let call_timeout = self.call_timeout;
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| ProviderError::Unavailable("semaphore closed".to_string()))?;
                match timeout(call_timeout, provider.embed(&chunk)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout),
                }
            }
        });

        // try_join_all preserves chunk order, so flattening restores the
        // original text order.
        let chunk_results = try_join_all(futures).await?;
        let vectors: Vec<Vec<f32>> = chunk_results.into_iter().flatten().collect();

        if vectors.len() != texts.len() {
            return Err(ProviderError::Unavailable(format!(
                "provider returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        let expected = self.provider.dimension();
        for vector in &vectors {
            if vector.len() != expected {
                return Err(ProviderError::InvalidInput(format!(
                    "provider returned dimension {} (expected {expected})",
                    vector.len()
                )));
            }
        }
        Ok(vectors)
    }
}
