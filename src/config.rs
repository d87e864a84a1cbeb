use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LexikaError, Result};

/// Engine configuration.
///
/// Loaded from a TOML file (global config dir, then an explicit path or
/// `LEXIKA_CONFIG`), patch-merged over defaults, then overridden by
/// `LEXIKA_*` environment variables. Every tuning knob the engine exposes
/// lives here so deployments can adjust behavior without code changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub resilience: ResilienceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            embedding: EmbeddingConfig::default(),
            index: IndexConfig::default(),
            search: SearchConfig::default(),
            graph: GraphConfig::default(),
            scheduler: SchedulerConfig::default(),
            resilience: ResilienceConfig::default(),
        }
    }
}

impl Config {
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("LEXIKA_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            if let Some(patch) = Self::load_patch(&path)? {
                config.merge_patch(patch);
            }
        } else if let Some(global) = Self::load_global()? {
            config.merge_patch(global);
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("lexika/config.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| LexikaError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| LexikaError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.embedding {
            self.embedding.merge(patch);
        }
        if let Some(patch) = patch.index {
            self.index.merge(patch);
        }
        if let Some(patch) = patch.search {
            self.search.merge(patch);
        }
        if let Some(patch) = patch.graph {
            self.graph.merge(patch);
        }
        if let Some(patch) = patch.scheduler {
            self.scheduler.merge(patch);
        }
        if let Some(patch) = patch.resilience {
            self.resilience.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_string("LEXIKA_EMBEDDING_MODEL") {
            self.embedding.model = value;
        }
        if let Some(value) = env_usize("LEXIKA_EMBEDDING_DIMENSION")? {
            self.embedding.dimension = value;
        }
        if let Some(value) = env_usize("LEXIKA_EMBEDDING_BATCH_SIZE")? {
            self.embedding.batch_size = value;
        }
        if let Some(value) = env_usize("LEXIKA_EMBEDDING_MAX_CONCURRENCY")? {
            self.embedding.max_concurrency = value;
        }
        if let Some(value) = env_u64("LEXIKA_EMBEDDING_CACHE_TTL_SECONDS")? {
            self.embedding.cache_ttl = Duration::from_secs(value);
        }
        if let Some(value) = env_usize("LEXIKA_EMBEDDING_CACHE_CAPACITY")? {
            self.embedding.cache_capacity = value;
        }

        if let Some(value) = env_usize("LEXIKA_INDEX_M")? {
            self.index.m = value;
        }
        if let Some(value) = env_usize("LEXIKA_INDEX_EF_CONSTRUCTION")? {
            self.index.ef_construction = value;
        }
        if let Some(value) = env_usize("LEXIKA_INDEX_EF_SEARCH")? {
            self.index.ef_search = value;
        }

        if let Some(value) = env_f32("LEXIKA_SEARCH_RRF_K")? {
            self.search.rrf_k = value;
        }
        if let Some(value) = env_f32("LEXIKA_SEARCH_VECTOR_WEIGHT")? {
            self.search.vector_weight = value;
        }
        if let Some(value) = env_f32("LEXIKA_SEARCH_LEXICAL_WEIGHT")? {
            self.search.lexical_weight = value;
        }
        if let Some(value) = env_f32("LEXIKA_SEARCH_SIMILARITY_THRESHOLD")? {
            self.search.similarity_threshold = value;
        }

        if let Some(value) = env_usize("LEXIKA_GRAPH_MAX_DEPTH")? {
            self.graph.max_depth = value;
        }
        if let Some(value) = env_f32("LEXIKA_GRAPH_DECAY")? {
            self.graph.decay = value;
        }
        if let Some(value) = env_f32("LEXIKA_GRAPH_MIN_EDGE_WEIGHT")? {
            self.graph.min_edge_weight = value;
        }

        if let Some(value) = env_f32("LEXIKA_SCHEDULER_BLEND_WEIGHT")? {
            self.scheduler.blend_weight = value;
        }
        if let Some(value) = env_f32("LEXIKA_SCHEDULER_CONFIDENCE_GATE")? {
            self.scheduler.confidence_gate = value;
        }
        if let Some(value) = env_u64("LEXIKA_SCHEDULER_FLUSH_INTERVAL_SECONDS")? {
            self.scheduler.flush_interval = Duration::from_secs(value);
        }

        if let Some(value) = env_u32("LEXIKA_RESILIENCE_FAILURE_THRESHOLD")? {
            self.resilience.failure_threshold = value;
        }
        if let Some(value) = env_u64("LEXIKA_RESILIENCE_RESET_TIMEOUT_SECONDS")? {
            self.resilience.reset_timeout = Duration::from_secs(value);
        }
        if let Some(value) = env_u32("LEXIKA_RESILIENCE_MAX_RETRIES")? {
            self.resilience.max_retries = value;
        }

        Ok(())
    }

    /// Reject configurations the engine cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.embedding.dimension == 0 {
            return Err(LexikaError::Config("embedding.dimension must be > 0".into()));
        }
        if self.index.m == 0 {
            return Err(LexikaError::Config("index.m must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.search.similarity_threshold) {
            return Err(LexikaError::Config(
                "search.similarity_threshold must be within [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.graph.decay) {
            return Err(LexikaError::Config("graph.decay must be within [0, 1]".into()));
        }
        if !(0.0..=1.0).contains(&self.scheduler.blend_weight) {
            return Err(LexikaError::Config(
                "scheduler.blend_weight must be within [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

/// Embedding provider, batching, and cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model identifier baked into cache keys; distinct models never collide.
    #[serde(default)]
    pub model: String,
    /// Fixed vector dimension; mismatched vectors are rejected at the index.
    #[serde(default)]
    pub dimension: usize,
    /// Maximum texts per provider call.
    #[serde(default)]
    pub batch_size: usize,
    /// Maximum concurrent chunk calls to the provider.
    #[serde(default)]
    pub max_concurrency: usize,
    /// Per-call timeout for embedding requests.
    #[serde(default, with = "humantime_serde")]
    pub timeout: Duration,
    /// TTL for cached embeddings.
    #[serde(default, with = "humantime_serde")]
    pub cache_ttl: Duration,
    /// LRU capacity of the embedding cache (entries).
    #[serde(default)]
    pub cache_capacity: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "hash-fnv1a".to_string(),
            dimension: 384,
            batch_size: 100,
            max_concurrency: 5,
            timeout: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            cache_capacity: 4096,
        }
    }
}

impl EmbeddingConfig {
    fn merge(&mut self, patch: EmbeddingPatch) {
        if let Some(value) = patch.model {
            self.model = value;
        }
        if let Some(value) = patch.dimension {
            self.dimension = value;
        }
        if let Some(value) = patch.batch_size {
            self.batch_size = value;
        }
        if let Some(value) = patch.max_concurrency {
            self.max_concurrency = value;
        }
        if let Some(value) = patch.timeout {
            self.timeout = value;
        }
        if let Some(value) = patch.cache_ttl {
            self.cache_ttl = value;
        }
        if let Some(value) = patch.cache_capacity {
            self.cache_capacity = value;
        }
    }
}

/// HNSW tuning parameters.
///
/// `m` trades index size and build time against recall; `ef_construction`
/// and `ef_search` raise recall at the cost of latency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default)]
    pub m: usize,
    #[serde(default)]
    pub ef_construction: usize,
    #[serde(default)]
    pub ef_search: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 50,
        }
    }
}

impl IndexConfig {
    fn merge(&mut self, patch: IndexPatch) {
        if let Some(value) = patch.m {
            self.m = value;
        }
        if let Some(value) = patch.ef_construction {
            self.ef_construction = value;
        }
        if let Some(value) = patch.ef_search {
            self.ef_search = value;
        }
    }
}

/// Hybrid search and RRF fusion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// RRF k parameter.
    #[serde(default)]
    pub rrf_k: f32,
    /// Weight multiplier applied to vector-path rank scores before summing.
    #[serde(default)]
    pub vector_weight: f32,
    /// Weight multiplier applied to lexical-path rank scores before summing.
    #[serde(default)]
    pub lexical_weight: f32,
    /// Minimum cosine score a vector candidate needs to enter fusion.
    #[serde(default)]
    pub similarity_threshold: f32,
    /// Timeout for the vector path (embedding + index query).
    #[serde(default, with = "humantime_serde")]
    pub vector_timeout: Duration,
    /// Timeout for the lexical path.
    #[serde(default, with = "humantime_serde")]
    pub lexical_timeout: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            rrf_k: 60.0,
            vector_weight: 1.2,
            lexical_weight: 1.0,
            similarity_threshold: 0.7,
            vector_timeout: Duration::from_secs(10),
            lexical_timeout: Duration::from_secs(5),
        }
    }
}

impl SearchConfig {
    fn merge(&mut self, patch: SearchPatch) {
        if let Some(value) = patch.rrf_k {
            self.rrf_k = value;
        }
        if let Some(value) = patch.vector_weight {
            self.vector_weight = value;
        }
        if let Some(value) = patch.lexical_weight {
            self.lexical_weight = value;
        }
        if let Some(value) = patch.similarity_threshold {
            self.similarity_threshold = value;
        }
        if let Some(value) = patch.vector_timeout {
            self.vector_timeout = value;
        }
        if let Some(value) = patch.lexical_timeout {
            self.lexical_timeout = value;
        }
    }
}

/// Relationship graph traversal defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub max_depth: usize,
    /// Per-hop weight decay during traversal.
    #[serde(default)]
    pub decay: f32,
    /// Edges below this weight are pruned from traversal.
    #[serde(default)]
    pub min_edge_weight: f32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            decay: 0.8,
            min_edge_weight: 0.3,
        }
    }
}

impl GraphConfig {
    fn merge(&mut self, patch: GraphPatch) {
        if let Some(value) = patch.max_depth {
            self.max_depth = value;
        }
        if let Some(value) = patch.decay {
            self.decay = value;
        }
        if let Some(value) = patch.min_edge_weight {
            self.min_edge_weight = value;
        }
    }
}

/// Spaced-repetition scheduler and predictor-bridge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Share of the final interval taken from the predictor (0 = pure
    /// SM-2 baseline, 1 = predictor only).
    #[serde(default)]
    pub blend_weight: f32,
    /// Minimum predictor confidence required before blending.
    #[serde(default)]
    pub confidence_gate: f32,
    /// Timeout for predictor calls.
    #[serde(default, with = "humantime_serde")]
    pub predictor_timeout: Duration,
    /// Interval between background flushes of queued interactions.
    #[serde(default, with = "humantime_serde")]
    pub flush_interval: Duration,
    /// Bound on the interaction queue; overflow drops oldest entries.
    #[serde(default)]
    pub queue_capacity: usize,
    /// Maximum related item ids attached to each schedule entry.
    #[serde(default)]
    pub max_related: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            blend_weight: 0.5,
            confidence_gate: 0.5,
            predictor_timeout: Duration::from_secs(3),
            flush_interval: Duration::from_secs(30),
            queue_capacity: 1024,
            max_related: 5,
        }
    }
}

impl SchedulerConfig {
    fn merge(&mut self, patch: SchedulerPatch) {
        if let Some(value) = patch.blend_weight {
            self.blend_weight = value;
        }
        if let Some(value) = patch.confidence_gate {
            self.confidence_gate = value;
        }
        if let Some(value) = patch.predictor_timeout {
            self.predictor_timeout = value;
        }
        if let Some(value) = patch.flush_interval {
            self.flush_interval = value;
        }
        if let Some(value) = patch.queue_capacity {
            self.queue_capacity = value;
        }
        if let Some(value) = patch.max_related {
            self.max_related = value;
        }
    }
}

/// Circuit breaker and retry settings shared by guarded capabilities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Consecutive failures before the circuit opens.
    #[serde(default)]
    pub failure_threshold: u32,
    /// Cooldown before an open circuit admits a half-open trial call.
    #[serde(default, with = "humantime_serde")]
    pub reset_timeout: Duration,
    /// Retries for transient failures before breaker accounting takes over.
    #[serde(default)]
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    #[serde(default, with = "humantime_serde")]
    pub retry_base_delay: Duration,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(100),
        }
    }
}

impl ResilienceConfig {
    fn merge(&mut self, patch: ResiliencePatch) {
        if let Some(value) = patch.failure_threshold {
            self.failure_threshold = value;
        }
        if let Some(value) = patch.reset_timeout {
            self.reset_timeout = value;
        }
        if let Some(value) = patch.max_retries {
            self.max_retries = value;
        }
        if let Some(value) = patch.retry_base_delay {
            self.retry_base_delay = value;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub embedding: Option<EmbeddingPatch>,
    pub index: Option<IndexPatch>,
    pub search: Option<SearchPatch>,
    pub graph: Option<GraphPatch>,
    pub scheduler: Option<SchedulerPatch>,
    pub resilience: Option<ResiliencePatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct EmbeddingPatch {
    pub model: Option<String>,
    pub dimension: Option<usize>,
    pub batch_size: Option<usize>,
    pub max_concurrency: Option<usize>,
    #[serde(default, with = "humantime_serde::option")]
    pub timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde::option")]
    pub cache_ttl: Option<Duration>,
    pub cache_capacity: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct IndexPatch {
    pub m: Option<usize>,
    pub ef_construction: Option<usize>,
    pub ef_search: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SearchPatch {
    pub rrf_k: Option<f32>,
    pub vector_weight: Option<f32>,
    pub lexical_weight: Option<f32>,
    pub similarity_threshold: Option<f32>,
    #[serde(default, with = "humantime_serde::option")]
    pub vector_timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde::option")]
    pub lexical_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct GraphPatch {
    pub max_depth: Option<usize>,
    pub decay: Option<f32>,
    pub min_edge_weight: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SchedulerPatch {
    pub blend_weight: Option<f32>,
    pub confidence_gate: Option<f32>,
    #[serde(default, with = "humantime_serde::option")]
    pub predictor_timeout: Option<Duration>,
    #[serde(default, with = "humantime_serde::option")]
    pub flush_interval: Option<Duration>,
    pub queue_capacity: Option<usize>,
    pub max_related: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ResiliencePatch {
    pub failure_threshold: Option<u32>,
    #[serde(default, with = "humantime_serde::option")]
    pub reset_timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    #[serde(default, with = "humantime_serde::option")]
    pub retry_base_delay: Option<Duration>,
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn env_u32(key: &str) -> Result<Option<u32>> {
    match std::env::var(key) {
        Ok(value) => value
            .parse::<u32>()
            .map(Some)
            .map_err(|err| LexikaError::Config(format!("invalid {key} value {value}: {err}"))),
        Err(_) => Ok(None),
    }
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|err| LexikaError::Config(format!("invalid {key} value {value}: {err}"))),
        Err(_) => Ok(None),
    }
}

fn env_usize(key: &str) -> Result<Option<usize>> {
    match std::env::var(key) {
        Ok(value) => value
            .parse::<usize>()
            .map(Some)
            .map_err(|err| LexikaError::Config(format!("invalid {key} value {value}: {err}"))),
        Err(_) => Ok(None),
    }
}

fn env_f32(key: &str) -> Result<Option<f32>> {
    match std::env::var(key) {
        Ok(value) => value
            .parse::<f32>()
            .map(Some)
            .map_err(|err| LexikaError::Config(format!("invalid {key} value {value}: {err}"))),
        Err(_) => Ok(None),
    }
}
