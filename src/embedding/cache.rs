//! Content-addressed embedding cache with TTL expiration.
//!
//! Keys are sha256 hashes of normalized text combined with the model
//! identifier, so distinct models never collide and re-embedding after a
//! model change supersedes old entries instead of mutating them. Cache
//! writes are fire-and-forget: a locked or full cache never fails the
//! caller, it just means recomputation later.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use sha2::{Digest, Sha256};
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use super::ProviderError;

/// A cached embedding with its insertion time for TTL accounting.
#[derive(Debug, Clone)]
struct CachedVector {
    vector: Vec<f32>,
    inserted_at: Instant,
}

/// Hit/miss counters for monitoring and tuning.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Thread-safe LRU cache mapping normalized text to embedding vectors.
///
/// All operations use the try-lock pattern: contention is treated as a
/// miss on reads and a no-op on writes.
pub struct EmbeddingCache {
    entries: Mutex<LruCache<String, CachedVector>>,
    stats: Mutex<CacheStats>,
    model: String,
    ttl: Duration,
}

impl EmbeddingCache {
    /// Create a cache for the given model with an entry capacity and TTL.
    #[must_use]
    pub fn new(model: impl Into<String>, capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            stats: Mutex::new(CacheStats::default()),
            model: model.into(),
            ttl,
        }
    }

    /// Cache key: sha256 over NFC-normalized, trimmed, lowercased text,
    /// suffixed with the model identifier.
    fn cache_key(&self, text: &str) -> String {
        let normalized: String = text.trim().to_lowercase().nfc().collect();
        let digest = Sha256::digest(normalized.as_bytes());
        format!("{}:{}", hex::encode(digest), self.model)
    }

    /// Get a cached embedding. Expired entries count as misses and are
    /// evicted lazily.
    pub fn get(&self, text: &str) -> Option<Vec<f32>> {
        let key = self.cache_key(text);
        self.get_by_key(&key)
    }

    fn get_by_key(&self, key: &str) -> Option<Vec<f32>> {
        let mut entries = self.entries.try_lock().ok()?;
        let mut stats = self.stats.try_lock().ok()?;

        match entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                stats.hits += 1;
                Some(entry.vector.clone())
            }
            Some(_) => {
                entries.pop(key);
                stats.misses += 1;
                None
            }
            None => {
                stats.misses += 1;
                None
            }
        }
    }

    /// Store an embedding. Silently no-ops if the cache is locked.
    pub fn put(&self, text: &str, vector: Vec<f32>) {
        let key = self.cache_key(text);
        self.put_by_key(key, vector);
    }

    fn put_by_key(&self, key: String, vector: Vec<f32>) {
        if let Ok(mut entries) = self.entries.try_lock() {
            entries.put(
                key,
                CachedVector {
                    vector,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    /// Resolve embeddings for `texts`, computing only the uncached subset.
    ///
    /// Output order always matches input order regardless of the hit/miss
    /// pattern. Duplicate uncached texts are deduplicated before the
    /// compute call and fanned back out afterwards. A failed compute
    /// propagates; failed cache writes do not.
    pub async fn get_or_compute<F, Fut>(
        &self,
        texts: &[String],
        compute: F,
    ) -> Result<Vec<Vec<f32>>, ProviderError>
    where
        F: FnOnce(Vec<String>) -> Fut + Send,
        Fut: Future<Output = Result<Vec<Vec<f32>>, ProviderError>> + Send,
    {
        let keys: Vec<String> = texts.iter().map(|t| self.cache_key(t)).collect();
        let mut resolved: Vec<Option<Vec<f32>>> = vec![None; texts.len()];

        for (i, key) in keys.iter().enumerate() {
            resolved[i] = self.get_by_key(key);
        }

        // Deduplicate misses by key, preserving first-occurrence order.
        let mut pending: Vec<(String, String)> = Vec::new();
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for (i, key) in keys.iter().enumerate() {
            if resolved[i].is_none() && !seen.contains_key(key.as_str()) {
                seen.insert(key, pending.len());
                pending.push((key.clone(), texts[i].clone()));
            }
        }

        if pending.is_empty() {
            return Ok(resolved.into_iter().flatten().collect());
        }

        debug!(
            total = texts.len(),
            misses = pending.len(),
            "computing uncached embeddings"
        );

        let inputs: Vec<String> = pending.iter().map(|(_, text)| text.clone()).collect();
        let computed = compute(inputs).await?;
        if computed.len() != pending.len() {
            return Err(ProviderError::Unavailable(format!(
                "provider returned {} vectors for {} inputs",
                computed.len(),
                pending.len()
            )));
        }

        let mut by_key: HashMap<String, Vec<f32>> = HashMap::with_capacity(pending.len());
        for ((key, _), vector) in pending.into_iter().zip(computed) {
            self.put_by_key(key.clone(), vector.clone());
            by_key.insert(key, vector);
        }

        let mut out = Vec::with_capacity(texts.len());
        for (i, key) in keys.iter().enumerate() {
            match resolved[i].take() {
                Some(vector) => out.push(vector),
                None => match by_key.get(key) {
                    Some(vector) => out.push(vector.clone()),
                    None => {
                        return Err(ProviderError::Unavailable(
                            "computed batch missing an input".to_string(),
                        ));
                    }
                },
            }
        }
        Ok(out)
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        self.stats.try_lock().map(|s| *s).unwrap_or_default()
    }

    /// Number of live entries (expired entries may still be counted until
    /// their lazy eviction).
    pub fn len(&self) -> usize {
        self.entries.try_lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all entries and reset counters.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.try_lock() {
            entries.clear();
        }
        if let Ok(mut stats) = self.stats.try_lock() {
            *stats = CacheStats::default();
        }
    }
}
