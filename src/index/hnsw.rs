//! HNSW (Hierarchical Navigable Small World) vector index.
//!
//! Supports incremental upsert, tombstone deletion, and k-nearest-neighbor
//! queries under cosine similarity. `m` controls graph connectivity,
//! `ef_construction` the candidate pool during insertion, and `ef_search`
//! the candidate pool during queries; all three come from configuration.
//!
//! Deleted nodes stay in the graph as waypoints so traversal quality does
//! not degrade, but they never appear in results.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::config::IndexConfig;
use crate::embedding::cosine_similarity;
use crate::error::{LexikaError, Result};
use crate::index::filter::{Filter, MetadataValue};

/// Over-fetch multiplier when metadata filters may discard candidates.
const FILTER_OVERFETCH: usize = 3;

/// An item stored in the index: one per domain entity.
#[derive(Debug, Clone)]
pub struct IndexedItem {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: HashMap<String, MetadataValue>,
}

#[derive(Debug)]
struct Node {
    item: IndexedItem,
    /// Neighbor lists, one per layer up to this node's level.
    neighbors: Vec<Vec<usize>>,
    deleted: bool,
}

/// Distance-ordered traversal candidate. Smaller distance = closer.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    dist: f32,
    idx: usize,
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.dist
            .total_cmp(&other.dist)
            .then_with(|| self.idx.cmp(&other.idx))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// ANN index over fixed-dimension vectors.
///
/// Single-writer semantics: all mutation goes through `upsert`/`delete`
/// by id. The index is the sole owner of its items.
pub struct VectorIndex {
    nodes: Vec<Node>,
    id_map: HashMap<String, usize>,
    entry_point: Option<usize>,
    max_level: usize,
    dimension: usize,
    m: usize,
    ef_construction: usize,
    ef_search: usize,
    /// 1 / ln(m), the standard level-sampling factor.
    level_norm: f64,
    rng: StdRng,
    live: usize,
}

impl VectorIndex {
    #[must_use]
    pub fn new(dimension: usize, config: &IndexConfig) -> Self {
        let m = config.m.max(2);
        Self {
            nodes: Vec::new(),
            id_map: HashMap::new(),
            entry_point: None,
            max_level: 0,
            dimension,
            m,
            ef_construction: config.ef_construction.max(m),
            ef_search: config.ef_search.max(1),
            level_norm: 1.0 / (m as f64).ln(),
            rng: StdRng::from_os_rng(),
            live: 0,
        }
    }

    /// Number of live (non-tombstoned) items.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.live
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Insert or replace the item with this id.
    ///
    /// Replacement tombstones the old node and inserts a fresh one, so
    /// exactly one live entry per id exists afterwards. Wrong-dimension
    /// vectors are rejected before the graph is touched.
    pub fn upsert(
        &mut self,
        id: impl Into<String>,
        vector: Vec<f32>,
        metadata: HashMap<String, MetadataValue>,
    ) -> Result<()> {
        let id = id.into();
        if vector.len() != self.dimension {
            return Err(LexikaError::IndexInconsistency(format!(
                "vector for {id} has dimension {} (index expects {})",
                vector.len(),
                self.dimension
            )));
        }

        if self.id_map.contains_key(&id) {
            debug!(id = %id, "replacing existing index entry");
            self.delete(&id);
        }

        let level = self.sample_level();
        let idx = self.nodes.len();
        self.nodes.push(Node {
            item: IndexedItem {
                id: id.clone(),
                vector,
                metadata,
            },
            neighbors: vec![Vec::new(); level + 1],
            deleted: false,
        });
        self.id_map.insert(id, idx);
        self.live += 1;

        let Some(entry) = self.entry_point else {
            self.entry_point = Some(idx);
            self.max_level = level;
            return Ok(());
        };

        let query = self.nodes[idx].item.vector.clone();
        let mut current = entry;

        // Greedy descent through layers above the new node's level.
        for layer in ((level + 1)..=self.max_level).rev() {
            current = self.greedy_closest(&query, current, layer);
        }

        // Connect on each shared layer, wiring bidirectional links.
        for layer in (0..=level.min(self.max_level)).rev() {
            let found = self.search_layer(&query, current, self.ef_construction, layer);
            current = found.first().map_or(current, |c| c.idx);

            let max_links = self.max_links(layer);
            let selected: Vec<usize> =
                found.iter().take(self.m).map(|c| c.idx).collect();
            self.nodes[idx].neighbors[layer] = selected.clone();

            for neighbor in selected {
                self.nodes[neighbor].neighbors[layer].push(idx);
                if self.nodes[neighbor].neighbors[layer].len() > max_links {
                    self.prune_neighbors(neighbor, layer, max_links);
                }
            }
        }

        if level > self.max_level {
            self.max_level = level;
            self.entry_point = Some(idx);
        }
        Ok(())
    }

    /// Tombstone the item with this id. Unknown ids are a no-op.
    pub fn delete(&mut self, id: &str) {
        if let Some(idx) = self.id_map.remove(id) {
            if !self.nodes[idx].deleted {
                self.nodes[idx].deleted = true;
                self.live -= 1;
            }
        }
    }

    /// k-nearest-neighbor query.
    ///
    /// Scores are cosine similarity mapped to [0, 1] (1.0 = identical
    /// direction). With filters present the search over-fetches 3×k before
    /// post-filtering so filtered queries can still fill k results. An
    /// empty index yields an empty result set, not an error.
    pub fn query(
        &self,
        vector: &[f32],
        k: usize,
        filters: &[Filter],
    ) -> Result<Vec<(IndexedItem, f32)>> {
        if vector.len() != self.dimension {
            return Err(LexikaError::IndexInconsistency(format!(
                "query vector has dimension {} (index expects {})",
                vector.len(),
                self.dimension
            )));
        }
        for filter in filters {
            filter.validate()?;
        }

        let Some(entry) = self.entry_point else {
            return Ok(Vec::new());
        };
        if self.live == 0 || k == 0 {
            return Ok(Vec::new());
        }

        let fetch_k = if filters.is_empty() {
            k
        } else {
            k.saturating_mul(FILTER_OVERFETCH)
        };
        let ef = self.ef_search.max(fetch_k);

        let mut current = entry;
        for layer in (1..=self.max_level).rev() {
            current = self.greedy_closest(vector, current, layer);
        }
        let found = self.search_layer(vector, current, ef, 0);

        let mut results = Vec::with_capacity(k);
        for candidate in found {
            let node = &self.nodes[candidate.idx];
            if node.deleted {
                continue;
            }
            if !filters.iter().all(|f| f.matches(&node.item.metadata)) {
                continue;
            }
            let score = (1.0 - candidate.dist + 1.0) / 2.0;
            results.push((node.item.clone(), score.clamp(0.0, 1.0)));
            if results.len() == k {
                break;
            }
        }

        if !filters.is_empty() && results.len() < k {
            debug!(
                requested = k,
                returned = results.len(),
                "post-filtering exhausted the over-fetched candidate pool"
            );
        }
        Ok(results)
    }

    /// Exponentially distributed layer assignment.
    fn sample_level(&mut self) -> usize {
        let uniform: f64 = self.rng.random::<f64>().max(f64::MIN_POSITIVE);
        let level = (-uniform.ln() * self.level_norm).floor() as usize;
        // Cap growth so a pathological sample cannot allocate huge towers.
        level.min(16)
    }

    const fn max_links(&self, layer: usize) -> usize {
        // Layer 0 keeps 2*m links per standard practice.
        if layer == 0 { self.m * 2 } else { self.m }
    }

    fn distance(&self, query: &[f32], idx: usize) -> f32 {
        1.0 - cosine_similarity(query, &self.nodes[idx].item.vector)
    }

    /// Single-step greedy descent: repeatedly move to the closest neighbor
    /// until no improvement remains.
    fn greedy_closest(&self, query: &[f32], start: usize, layer: usize) -> usize {
        let mut current = start;
        let mut current_dist = self.distance(query, current);
        loop {
            let mut improved = false;
            if layer < self.nodes[current].neighbors.len() {
                for &neighbor in &self.nodes[current].neighbors[layer] {
                    let dist = self.distance(query, neighbor);
                    if dist < current_dist {
                        current = neighbor;
                        current_dist = dist;
                        improved = true;
                    }
                }
            }
            if !improved {
                return current;
            }
        }
    }

    /// Best-first beam search within one layer. Returns candidates sorted
    /// by ascending distance, at most `ef` of them.
    fn search_layer(&self, query: &[f32], entry: usize, ef: usize, layer: usize) -> Vec<Candidate> {
        let mut visited: HashSet<usize> = HashSet::new();
        visited.insert(entry);

        let entry_candidate = Candidate {
            dist: self.distance(query, entry),
            idx: entry,
        };

        // Min-heap of nodes to expand, max-heap of the best found so far.
        let mut to_expand: BinaryHeap<Reverse<Candidate>> = BinaryHeap::new();
        let mut best: BinaryHeap<Candidate> = BinaryHeap::new();
        to_expand.push(Reverse(entry_candidate));
        best.push(entry_candidate);

        while let Some(Reverse(candidate)) = to_expand.pop() {
            let worst_best = best.peek().map_or(f32::INFINITY, |c| c.dist);
            if candidate.dist > worst_best && best.len() >= ef {
                break;
            }

            if layer >= self.nodes[candidate.idx].neighbors.len() {
                continue;
            }
            for &neighbor in &self.nodes[candidate.idx].neighbors[layer] {
                if !visited.insert(neighbor) {
                    continue;
                }
                let dist = self.distance(query, neighbor);
                let worst = best.peek().map_or(f32::INFINITY, |c| c.dist);
                if best.len() < ef || dist < worst {
                    let next = Candidate { dist, idx: neighbor };
                    to_expand.push(Reverse(next));
                    best.push(next);
                    if best.len() > ef {
                        best.pop();
                    }
                }
            }
        }

        let mut found = best.into_vec();
        found.sort();
        found
    }

    /// Keep only the `max_links` closest neighbors of a node on a layer.
    fn prune_neighbors(&mut self, idx: usize, layer: usize, max_links: usize) {
        let origin = self.nodes[idx].item.vector.clone();
        let mut scored: Vec<Candidate> = self.nodes[idx].neighbors[layer]
            .iter()
            .map(|&n| Candidate {
                dist: self.distance(&origin, n),
                idx: n,
            })
            .collect();
        scored.sort();
        scored.dedup_by_key(|c| c.idx);
        if scored.len() > max_links {
            warn!(
                node = %self.nodes[idx].item.id,
                layer,
                "pruning over-connected node"
            );
        }
        self.nodes[idx].neighbors[layer] = scored.into_iter().take(max_links).map(|c| c.idx).collect();
    }
}
