//! Hybrid search orchestration.
//!
//! A request resolves its query embedding through the cache and the
//! guarded provider, then fans out to the vector index and the lexical
//! provider concurrently. Either path may fail or time out without
//! failing the request; only the loss of both is an error.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::SearchConfig;
use crate::embedding::{BatchEmbedder, EmbeddingCache};
use crate::error::{LexikaError, Result};
use crate::index::{Filter, MetadataValue, VectorIndex};
use crate::resilience::{CircuitBreaker, CircuitState, RetryPolicy, retry_with_backoff};
use crate::search::fusion::{self, FusionConfig};
use crate::search::lexical::LexicalSearchProvider;
use crate::search::{Collection, SearchOptions, SearchResponse, SearchResult, SearchStrategy, Source};

/// Metadata field reserved for collection scoping.
const COLLECTION_FIELD: &str = "collection";

/// Orchestrates embedding resolution, vector and lexical retrieval, and
/// RRF fusion.
pub struct HybridSearchEngine {
    cache: Arc<EmbeddingCache>,
    embedder: Arc<BatchEmbedder>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    index: Arc<RwLock<VectorIndex>>,
    lexical: Arc<dyn LexicalSearchProvider>,
    config: SearchConfig,
}

impl HybridSearchEngine {
    #[must_use]
    pub fn new(
        cache: Arc<EmbeddingCache>,
        embedder: Arc<BatchEmbedder>,
        breaker: Arc<CircuitBreaker>,
        retry: RetryPolicy,
        index: Arc<RwLock<VectorIndex>>,
        lexical: Arc<dyn LexicalSearchProvider>,
        config: SearchConfig,
    ) -> Self {
        Self {
            cache,
            embedder,
            breaker,
            retry,
            index,
            lexical,
            config,
        }
    }

    /// Embed a document and upsert it into the vector index. The
    /// collection is stored as reserved metadata so queries stay scoped.
    pub async fn index_document(
        &self,
        collection: Collection,
        id: impl Into<String>,
        text: &str,
        mut metadata: std::collections::HashMap<String, MetadataValue>,
    ) -> Result<()> {
        let vectors = self.resolve_embeddings(&[text.to_string()]).await?;
        let vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| LexikaError::ProviderUnavailable("empty embedding batch".into()))?;
        metadata.insert(
            COLLECTION_FIELD.to_string(),
            MetadataValue::from(collection.to_string().as_str()),
        );
        self.index.write().upsert(id, vector, metadata)
    }

    /// Remove a document from the vector index.
    pub fn remove_document(&self, id: &str) {
        self.index.write().delete(id);
    }

    /// Execute a search request.
    ///
    /// The strategy is resolved once up front: lexical-only when the
    /// embedding circuit is already open, vector-first when fusion is
    /// disabled, hybrid otherwise. A degraded response (one path down)
    /// is still a success, tagged by `source`.
    pub async fn search(
        &self,
        query: &str,
        collection: Collection,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        options.validate()?;
        if query.trim().is_empty() {
            return Err(LexikaError::InvalidQuery("empty query".to_string()));
        }

        let started = Instant::now();
        let threshold = options
            .threshold
            .unwrap_or(self.config.similarity_threshold);
        let strategy = if self.breaker.state() == CircuitState::Open {
            SearchStrategy::LexicalOnly
        } else if options.enable_fusion {
            SearchStrategy::Hybrid
        } else {
            SearchStrategy::VectorOnly
        };
        debug!(query, %collection, ?strategy, "search dispatch");

        // Both legs run concurrently; the slower one bounds latency, not
        // their sum.
        let vector_leg = async {
            match strategy {
                SearchStrategy::LexicalOnly => {
                    Err(LexikaError::ProviderUnavailable("embedding circuit open".into()))
                }
                _ => match timeout(
                    self.config.vector_timeout,
                    self.vector_search(query, collection, options, threshold),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(LexikaError::ProviderUnavailable(
                        "vector path timed out".into(),
                    )),
                },
            }
        };
        let lexical_leg = async {
            match timeout(
                self.config.lexical_timeout,
                self.lexical.search(query, collection, options.limit),
            )
            .await
            {
                Ok(Ok(hits)) => Ok(hits
                    .into_iter()
                    .map(|hit| SearchResult {
                        id: hit.id,
                        score: 1.0 / (hit.rank as f32 + 1.0),
                        source: Source::Lexical,
                        metadata: hit.metadata,
                    })
                    .collect::<Vec<_>>()),
                Ok(Err(err)) => Err(LexikaError::from(err)),
                Err(_) => Err(LexikaError::ProviderUnavailable(
                    "lexical path timed out".into(),
                )),
            }
        };
        let (vector_outcome, lexical_outcome) = tokio::join!(vector_leg, lexical_leg);

        let (mut results, source) = match (vector_outcome, lexical_outcome) {
            (Ok(vector), Ok(lexical)) if strategy == SearchStrategy::Hybrid => {
                let fused = fusion::fuse(&vector, &lexical, &FusionConfig::from(&self.config));
                (fused, Source::Hybrid)
            }
            (Ok(vector), _) => (vector, Source::Vector),
            (Err(vector_err), Ok(lexical)) => {
                warn!(error = %vector_err, "vector path failed, serving lexical-only results");
                (lexical, Source::Lexical)
            }
            (Err(vector_err), Err(lexical_err)) => {
                return Err(LexikaError::TotalFailure(format!(
                    "vector: {vector_err}; lexical: {lexical_err}"
                )));
            }
        };

        let total_results = results.len();
        results.truncate(options.limit);

        Ok(SearchResponse {
            results,
            source,
            total_results,
            processing_time_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// Vector leg: embedding resolution plus index query, scoped to the
    /// collection, with the similarity threshold applied before any
    /// fusion happens.
    async fn vector_search(
        &self,
        query: &str,
        collection: Collection,
        options: &SearchOptions,
        threshold: f32,
    ) -> Result<Vec<SearchResult>> {
        let vectors = self.resolve_embeddings(&[query.to_string()]).await?;
        let query_vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| LexikaError::ProviderUnavailable("empty embedding batch".into()))?;

        let mut filters = Vec::with_capacity(options.filters.len() + 1);
        filters.push(Filter::eq(
            COLLECTION_FIELD,
            MetadataValue::from(collection.to_string().as_str()),
        ));
        filters.extend(options.filters.iter().cloned());

        let hits = self
            .index
            .read()
            .query(&query_vector, options.limit, &filters)?;

        Ok(hits
            .into_iter()
            .filter(|(_, score)| *score >= threshold)
            .map(|(item, score)| SearchResult {
                id: item.id,
                score,
                source: Source::Vector,
                metadata: item.metadata,
            })
            .collect())
    }

    /// Cache-first embedding resolution; misses go through retry and the
    /// circuit breaker.
    async fn resolve_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let embedder = Arc::clone(&self.embedder);
        let breaker = Arc::clone(&self.breaker);
        let retry = self.retry;

        self.cache
            .get_or_compute(texts, move |uncached| async move {
                breaker
                    .execute(|| retry_with_backoff(retry, || embedder.embed_all(&uncached)))
                    .await
            })
            .await
            .map_err(LexikaError::from)
    }

    /// Embedding cache statistics, for diagnostics output.
    #[must_use]
    pub fn cache_stats(&self) -> crate::embedding::cache::CacheStats {
        self.cache.stats()
    }

    /// Live item count in the vector index.
    #[must_use]
    pub fn indexed_items(&self) -> usize {
        self.index.read().len()
    }
}
