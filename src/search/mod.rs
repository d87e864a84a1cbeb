//! Hybrid search: vector + lexical retrieval fused with RRF.

pub mod engine;
pub mod fusion;
pub mod lexical;

pub use engine::HybridSearchEngine;
pub use fusion::{FusionConfig, fuse};
pub use lexical::{LexicalHit, LexicalSearchProvider, MemoryLexicalIndex};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{LexikaError, Result};
use crate::index::{Filter, MetadataValue};

/// Maximum result count a single request may ask for.
pub const MAX_LIMIT: usize = 100;

/// Searchable collections exposed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Vocabulary,
    Images,
    Descriptions,
}

impl std::str::FromStr for Collection {
    type Err = LexikaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "vocabulary" => Ok(Self::Vocabulary),
            "images" => Ok(Self::Images),
            "descriptions" => Ok(Self::Descriptions),
            other => Err(LexikaError::InvalidQuery(format!(
                "unknown collection {other} (expected vocabulary|images|descriptions)"
            ))),
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Vocabulary => write!(f, "vocabulary"),
            Self::Images => write!(f, "images"),
            Self::Descriptions => write!(f, "descriptions"),
        }
    }
}

/// Which retrieval path produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Vector,
    Lexical,
    Hybrid,
}

/// Retrieval strategy, resolved once per request from the options and the
/// health of the vector path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    VectorOnly,
    LexicalOnly,
    Hybrid,
}

/// One ranked search hit. Ephemeral, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    /// Relevance in [0, 1]; for hybrid results this is the normalized
    /// fused RRF score.
    pub score: f32,
    pub source: Source,
    #[serde(default)]
    pub metadata: HashMap<String, MetadataValue>,
}

/// Envelope returned to callers, tagged with the path that produced it so
/// degraded responses stay distinguishable from full ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub source: Source,
    pub total_results: usize,
    pub processing_time_ms: u64,
}

/// Per-request options.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    /// Overrides the configured similarity threshold when set.
    pub threshold: Option<f32>,
    pub filters: Vec<Filter>,
    pub enable_fusion: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            threshold: None,
            filters: Vec::new(),
            enable_fusion: true,
        }
    }
}

impl SearchOptions {
    /// Validate request bounds before any work happens.
    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 || self.limit > MAX_LIMIT {
            return Err(LexikaError::InvalidQuery(format!(
                "limit must be within 1..={MAX_LIMIT}, got {}",
                self.limit
            )));
        }
        if let Some(threshold) = self.threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(LexikaError::InvalidQuery(format!(
                    "threshold must be within [0, 1], got {threshold}"
                )));
            }
        }
        for filter in &self.filters {
            filter.validate()?;
        }
        Ok(())
    }
}
