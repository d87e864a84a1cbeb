//! Failure-path behavior of the search engine: lexical fallback while
//! the embedding provider is down, circuit-breaker trip and recovery,
//! and the hard total-failure case.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use lexika::LexikaError;
use lexika::config::{IndexConfig, ResilienceConfig, SearchConfig};
use lexika::embedding::{
    BatchEmbedder, EmbeddingCache, EmbeddingProvider, ProviderError, l2_normalize,
};
use lexika::index::VectorIndex;
use lexika::resilience::{CircuitBreaker, CircuitState, RetryPolicy};
use lexika::search::{
    Collection, HybridSearchEngine, LexicalHit, LexicalSearchProvider, MemoryLexicalIndex,
    SearchOptions, Source,
};

const DIM: usize = 8;

/// Deterministic provider that can be switched into a failing state.
struct FlakyProvider {
    failing: AtomicBool,
}

impl FlakyProvider {
    fn healthy() -> Self {
        Self {
            failing: AtomicBool::new(false),
        }
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmbeddingProvider for FlakyProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("provider offline".to_string()));
        }
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.0f32; DIM];
                for (i, byte) in text.bytes().enumerate() {
                    vector[i % DIM] += f32::from(byte);
                }
                l2_normalize(&mut vector);
                vector
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn model_id(&self) -> &str {
        "flaky-test"
    }
}

struct FailingLexical;

#[async_trait]
impl LexicalSearchProvider for FailingLexical {
    async fn search(
        &self,
        _query: &str,
        _collection: Collection,
        _limit: usize,
    ) -> Result<Vec<LexicalHit>, ProviderError> {
        Err(ProviderError::Unavailable("lexical backend down".to_string()))
    }
}

/// Delays every embed call to make per-leg latency observable.
struct SlowProvider {
    inner: FlakyProvider,
    delay: Duration,
}

#[async_trait]
impl EmbeddingProvider for SlowProvider {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        tokio::time::sleep(self.delay).await;
        self.inner.embed(texts).await
    }

    fn dimension(&self) -> usize {
        DIM
    }

    fn model_id(&self) -> &str {
        "slow-test"
    }
}

struct SlowLexical {
    inner: Arc<MemoryLexicalIndex>,
    delay: Duration,
}

#[async_trait]
impl LexicalSearchProvider for SlowLexical {
    async fn search(
        &self,
        query: &str,
        collection: Collection,
        limit: usize,
    ) -> Result<Vec<LexicalHit>, ProviderError> {
        tokio::time::sleep(self.delay).await;
        self.inner.search(query, collection, limit).await
    }
}

struct Harness {
    engine: HybridSearchEngine,
    provider: Arc<FlakyProvider>,
    breaker: Arc<CircuitBreaker>,
}

fn harness(resilience: &ResilienceConfig, lexical: Arc<dyn LexicalSearchProvider>) -> Harness {
    let provider = Arc::new(FlakyProvider::healthy());
    let cache = Arc::new(EmbeddingCache::new(
        "flaky-test",
        64,
        Duration::from_secs(3600),
    ));
    let embedder = Arc::new(BatchEmbedder::new(
        Arc::clone(&provider) as Arc<dyn EmbeddingProvider>,
        100,
        5,
        Duration::from_secs(1),
    ));
    let breaker = Arc::new(CircuitBreaker::new("embedding", resilience));
    let index = Arc::new(RwLock::new(VectorIndex::new(DIM, &IndexConfig::default())));

    let engine = HybridSearchEngine::new(
        cache,
        embedder,
        Arc::clone(&breaker),
        RetryPolicy::from_config(resilience),
        index,
        lexical,
        SearchConfig::default(),
    );
    Harness {
        engine,
        provider,
        breaker,
    }
}

fn fast_resilience() -> ResilienceConfig {
    ResilienceConfig {
        failure_threshold: 2,
        reset_timeout: Duration::from_millis(50),
        max_retries: 0,
        retry_base_delay: Duration::from_millis(1),
    }
}

fn memory_lexical() -> Arc<MemoryLexicalIndex> {
    let lexical = Arc::new(MemoryLexicalIndex::new());
    lexical.add_document(
        Collection::Vocabulary,
        "hund",
        "der Hund dog canine pet",
        HashMap::new(),
    );
    lexical
}

#[tokio::test]
async fn test_vector_failure_degrades_to_lexical() {
    let h = harness(&fast_resilience(), memory_lexical());
    h.provider.set_failing(true);

    let response = h
        .engine
        .search("dog", Collection::Vocabulary, &SearchOptions::default())
        .await
        .expect("degraded search must still succeed");

    assert_eq!(response.source, Source::Lexical);
    assert_eq!(response.results[0].id, "hund");
}

#[tokio::test]
async fn test_breaker_opens_after_threshold_and_routes_lexical_only() {
    let h = harness(&fast_resilience(), memory_lexical());
    h.provider.set_failing(true);

    for _ in 0..2 {
        h.engine
            .search("dog", Collection::Vocabulary, &SearchOptions::default())
            .await
            .expect("degraded search");
    }
    assert_eq!(h.breaker.state(), CircuitState::Open);

    // With the circuit open the provider is never consulted; a healthy
    // provider would still be skipped.
    h.provider.set_failing(false);
    let response = h
        .engine
        .search("dog", Collection::Vocabulary, &SearchOptions::default())
        .await
        .expect("lexical-only search");
    assert_eq!(response.source, Source::Lexical);
    assert_eq!(h.breaker.state(), CircuitState::Open);
}

#[tokio::test]
async fn test_half_open_trial_recovers_hybrid_search() {
    let h = harness(&fast_resilience(), memory_lexical());

    // Failed embeddings are never cached, so the same query keeps
    // exercising the provider on every attempt.
    h.provider.set_failing(true);
    for _ in 0..2 {
        h.engine
            .search("dog", Collection::Vocabulary, &SearchOptions::default())
            .await
            .expect("degraded search");
    }
    assert_eq!(h.breaker.state(), CircuitState::Open);

    h.provider.set_failing(false);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(h.breaker.state(), CircuitState::HalfOpen);

    let response = h
        .engine
        .search("dog", Collection::Vocabulary, &SearchOptions::default())
        .await
        .expect("recovered search");

    assert_eq!(response.source, Source::Hybrid);
    assert_eq!(h.breaker.state(), CircuitState::Closed);
    assert!(response.results.iter().any(|r| r.id == "hund"));
}

#[tokio::test]
async fn test_slow_legs_overlap_instead_of_adding_up() {
    let delay = Duration::from_millis(300);
    let provider = Arc::new(SlowProvider {
        inner: FlakyProvider::healthy(),
        delay,
    });
    let cache = Arc::new(EmbeddingCache::new(
        "slow-test",
        64,
        Duration::from_secs(3600),
    ));
    let embedder = Arc::new(BatchEmbedder::new(
        Arc::clone(&provider) as Arc<dyn EmbeddingProvider>,
        100,
        5,
        Duration::from_secs(2),
    ));
    let resilience = fast_resilience();
    let engine = HybridSearchEngine::new(
        cache,
        embedder,
        Arc::new(CircuitBreaker::new("embedding", &resilience)),
        RetryPolicy::from_config(&resilience),
        Arc::new(RwLock::new(VectorIndex::new(DIM, &IndexConfig::default()))),
        Arc::new(SlowLexical {
            inner: memory_lexical(),
            delay,
        }),
        SearchConfig::default(),
    );

    let started = std::time::Instant::now();
    engine
        .search("dog", Collection::Vocabulary, &SearchOptions::default())
        .await
        .expect("hybrid search with slow legs");
    let elapsed = started.elapsed();

    // Two 300 ms legs dispatched together finish in roughly one delay;
    // sequential dispatch would take at least 600 ms.
    assert!(
        elapsed < Duration::from_millis(500),
        "legs ran sequentially: {elapsed:?}"
    );
}

#[tokio::test]
async fn test_both_paths_down_is_total_failure() {
    let h = harness(&fast_resilience(), Arc::new(FailingLexical));
    h.provider.set_failing(true);

    let result = h
        .engine
        .search("dog", Collection::Vocabulary, &SearchOptions::default())
        .await;

    assert!(matches!(result, Err(LexikaError::TotalFailure(_))));
}
