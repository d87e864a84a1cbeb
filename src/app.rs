//! Composition root.
//!
//! Components never construct their own dependencies: the context builds
//! the cache, index, breakers, engine, and scheduler once and hands out
//! the inbound contract methods. Lifecycle (background flush task,
//! shutdown) is owned here, not by the components.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::Config;
use crate::embedding::{BatchEmbedder, EmbeddingCache, EmbeddingProvider, HashEmbeddingProvider};
use crate::error::Result;
use crate::graph::{GraphEdge, GraphNode, GraphStore};
use crate::index::{MetadataValue, VectorIndex};
use crate::resilience::{CircuitBreaker, RetryPolicy};
use crate::scheduler::{
    HistoryPredictor, InteractionQueue, LearningPredictor, ReviewCard, ScheduleEntry,
    SpacedRepetitionScheduler, spawn_flush_task,
};
use crate::search::{
    Collection, HybridSearchEngine, MemoryLexicalIndex, SearchOptions, SearchResponse,
};

/// Everything a request needs, wired once at startup.
pub struct EngineContext {
    pub config: Config,
    engine: HybridSearchEngine,
    scheduler: SpacedRepetitionScheduler,
    graph: Arc<GraphStore>,
    lexical: Arc<MemoryLexicalIndex>,
    queue: Arc<InteractionQueue>,
    predictor: Arc<dyn LearningPredictor>,
    flush_task: Option<JoinHandle<()>>,
}

impl EngineContext {
    /// Build the full engine from configuration. The periodic interaction
    /// flush task is spawned onto the current runtime.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let provider = Arc::new(HashEmbeddingProvider::new(config.embedding.dimension));
        let cache = Arc::new(EmbeddingCache::new(
            provider.model_id(),
            config.embedding.cache_capacity,
            config.embedding.cache_ttl,
        ));
        let embedder = Arc::new(BatchEmbedder::new(
            provider,
            config.embedding.batch_size,
            config.embedding.max_concurrency,
            config.embedding.timeout,
        ));
        let embedding_breaker = Arc::new(CircuitBreaker::new("embedding", &config.resilience));
        let predictor_breaker = Arc::new(CircuitBreaker::new("predictor", &config.resilience));
        let retry = RetryPolicy::from_config(&config.resilience);

        let index = Arc::new(RwLock::new(VectorIndex::new(
            config.embedding.dimension,
            &config.index,
        )));
        let lexical = Arc::new(MemoryLexicalIndex::new());
        let graph = Arc::new(GraphStore::new());
        let queue = Arc::new(InteractionQueue::new(config.scheduler.queue_capacity));
        let predictor: Arc<dyn LearningPredictor> = Arc::new(HistoryPredictor::new());

        let engine = HybridSearchEngine::new(
            cache,
            embedder,
            embedding_breaker,
            retry,
            index,
            Arc::clone(&lexical) as Arc<dyn crate::search::LexicalSearchProvider>,
            config.search.clone(),
        );
        let scheduler = SpacedRepetitionScheduler::new(
            Some(Arc::clone(&predictor)),
            predictor_breaker,
            Arc::clone(&graph),
            Arc::clone(&queue),
            config.scheduler.clone(),
            config.graph.clone(),
        );

        let flush_task = tokio::runtime::Handle::try_current().ok().map(|_| {
            spawn_flush_task(
                Arc::clone(&queue),
                Arc::clone(&predictor),
                config.scheduler.flush_interval,
            )
        });

        Ok(Self {
            config,
            engine,
            scheduler,
            graph,
            lexical,
            queue,
            predictor,
            flush_task,
        })
    }

    /// Index a document into both retrieval paths.
    pub async fn index_document(
        &self,
        collection: Collection,
        id: &str,
        text: &str,
        metadata: HashMap<String, MetadataValue>,
    ) -> Result<()> {
        self.engine
            .index_document(collection, id, text, metadata.clone())
            .await?;
        self.lexical.add_document(collection, id, text, metadata);
        Ok(())
    }

    /// Remove a document from both retrieval paths.
    pub fn remove_document(&self, collection: Collection, id: &str) {
        self.engine.remove_document(id);
        self.lexical.remove_document(collection, id);
    }

    /// Inbound search contract.
    pub async fn search(
        &self,
        query: &str,
        collection: Collection,
        options: &SearchOptions,
    ) -> Result<SearchResponse> {
        self.engine.search(query, collection, options).await
    }

    /// Inbound review-event contract.
    pub async fn record_review(
        &self,
        user_id: &str,
        item_id: &str,
        quality: u8,
        response_time_ms: u64,
    ) -> Result<ReviewCard> {
        self.scheduler
            .record_review(user_id, item_id, quality, response_time_ms)
            .await
    }

    /// Inbound schedule-query contract.
    pub fn get_schedule(&self, user_id: &str, limit: usize) -> Result<Vec<ScheduleEntry>> {
        self.scheduler.get_schedule(user_id, limit)
    }

    /// Graph neighbors of an item, ranked by decayed weight.
    #[must_use]
    pub fn related(&self, item_id: &str) -> Vec<(GraphNode, f32)> {
        self.graph.related_to(item_id, &self.config.graph)
    }

    pub fn add_graph_node(&self, node: GraphNode) {
        self.graph.add_node(node);
    }

    pub fn add_graph_edge(&self, edge: GraphEdge) -> Result<()> {
        self.graph.add_edge(edge)
    }

    #[must_use]
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            indexed_items: self.engine.indexed_items(),
            cache: self.engine.cache_stats(),
            graph_nodes: self.graph.node_count(),
            review_cards: self.scheduler.card_count(),
            queued_interactions: self.queue.len(),
        }
    }

    /// Flush the interaction queue and stop the background drain task.
    pub async fn shutdown(mut self) {
        if let Some(task) = self.flush_task.take() {
            task.abort();
        }
        self.queue.flush_now(self.predictor.as_ref()).await;
        debug!("engine context shut down");
    }
}

/// Diagnostics snapshot for the stats command.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineStats {
    pub indexed_items: usize,
    pub cache: crate::embedding::cache::CacheStats,
    pub graph_nodes: usize,
    pub review_cards: usize,
    pub queued_interactions: usize,
}
