//! Reciprocal Rank Fusion of vector and lexical result lists.
//!
//! RRF is rank-based, not score-based: each list contributes
//! `weight / (k + rank + 1)` per item (0-indexed rank, k typically 60, the
//! value recommended by Cormack, Clarke, and Buettcher, SIGIR 2009), and
//! contributions are summed per id. Rank-based fusion sidesteps the
//! incomparable score scales of cosine similarity and keyword relevance.

use std::collections::HashMap;

use crate::config::SearchConfig;
use crate::search::{SearchResult, Source};

/// Fusion parameters.
#[derive(Debug, Clone, Copy)]
pub struct FusionConfig {
    /// RRF k parameter.
    pub k: f32,
    pub vector_weight: f32,
    pub lexical_weight: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            k: 60.0,
            vector_weight: 1.2,
            lexical_weight: 1.0,
        }
    }
}

impl From<&SearchConfig> for FusionConfig {
    fn from(config: &SearchConfig) -> Self {
        Self {
            k: config.rrf_k,
            vector_weight: config.vector_weight,
            lexical_weight: config.lexical_weight,
        }
    }
}

#[derive(Debug)]
struct FusedEntry {
    rrf_score: f32,
    vector_rank: Option<usize>,
    lexical_rank: Option<usize>,
    /// First-seen result for this id, kept for its metadata.
    result: SearchResult,
}

/// Fuse two ranked lists into one, tagged `Source::Hybrid`.
///
/// Fully deterministic: ties in fused score break by original vector
/// rank, then lexical rank, then id. Fused scores are normalized so the
/// top result scores 1.0, keeping the [0, 1] contract.
#[must_use]
pub fn fuse(
    vector_results: &[SearchResult],
    lexical_results: &[SearchResult],
    config: &FusionConfig,
) -> Vec<SearchResult> {
    let mut entries: HashMap<&str, FusedEntry> = HashMap::new();

    for (rank, result) in vector_results.iter().enumerate() {
        let contribution = config.vector_weight / (config.k + rank as f32 + 1.0);
        entries
            .entry(result.id.as_str())
            .and_modify(|e| {
                e.rrf_score += contribution;
                e.vector_rank.get_or_insert(rank);
            })
            .or_insert_with(|| FusedEntry {
                rrf_score: contribution,
                vector_rank: Some(rank),
                lexical_rank: None,
                result: result.clone(),
            });
    }

    for (rank, result) in lexical_results.iter().enumerate() {
        let contribution = config.lexical_weight / (config.k + rank as f32 + 1.0);
        entries
            .entry(result.id.as_str())
            .and_modify(|e| {
                e.rrf_score += contribution;
                e.lexical_rank.get_or_insert(rank);
            })
            .or_insert_with(|| FusedEntry {
                rrf_score: contribution,
                vector_rank: None,
                lexical_rank: Some(rank),
                result: result.clone(),
            });
    }

    let mut fused: Vec<FusedEntry> = entries.into_values().collect();
    fused.sort_by(|a, b| {
        b.rrf_score
            .total_cmp(&a.rrf_score)
            .then_with(|| rank_key(a.vector_rank).cmp(&rank_key(b.vector_rank)))
            .then_with(|| rank_key(a.lexical_rank).cmp(&rank_key(b.lexical_rank)))
            .then_with(|| a.result.id.cmp(&b.result.id))
    });

    let top = fused.first().map_or(1.0, |e| e.rrf_score).max(f32::MIN_POSITIVE);
    fused
        .into_iter()
        .map(|entry| SearchResult {
            id: entry.result.id,
            score: (entry.rrf_score / top).clamp(0.0, 1.0),
            source: Source::Hybrid,
            metadata: entry.result.metadata,
        })
        .collect()
}

/// Missing ranks sort after every present rank.
const fn rank_key(rank: Option<usize>) -> usize {
    match rank {
        Some(r) => r,
        None => usize::MAX,
    }
}
