//! Directed, weighted relationship graph over vocabulary items.
//!
//! Edges are directed; logically symmetric relations (synonym↔synonym)
//! are stored as two edges. Traversal decays edge weight per hop so
//! indirect relationships rank below direct ones.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use parking_lot::RwLock;

use crate::config::GraphConfig;
use crate::error::{LexikaError, Result};

/// Kind of vocabulary entity a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Word,
    Phrase,
    Image,
    Description,
}

/// Kind of relationship an edge encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Synonym,
    Antonym,
    Translation,
    Related,
    RootFamily,
}

/// A vocabulary item in the graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

/// A directed, weighted relationship between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source_id: String,
    pub target_id: String,
    pub kind: EdgeKind,
    /// Relationship strength in [0, 1]. Decay is applied at query time,
    /// never stored.
    pub weight: f32,
}

#[derive(Debug, Default)]
struct GraphInner {
    nodes: HashMap<String, GraphNode>,
    adjacency: HashMap<String, Vec<GraphEdge>>,
}

/// Append-only graph store with bounded-depth traversal.
#[derive(Debug, Default)]
pub struct GraphStore {
    inner: RwLock<GraphInner>,
}

impl GraphStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a node by id.
    pub fn add_node(&self, node: GraphNode) {
        let mut inner = self.inner.write();
        inner.nodes.insert(node.id.clone(), node);
    }

    /// Add a directed edge.
    ///
    /// Both endpoints must already exist, the weight must lie in [0, 1],
    /// and self-loops are rejected.
    pub fn add_edge(&self, edge: GraphEdge) -> Result<()> {
        if edge.source_id == edge.target_id {
            return Err(LexikaError::GraphConstraint(format!(
                "self-loop on {}",
                edge.source_id
            )));
        }
        if !(0.0..=1.0).contains(&edge.weight) {
            return Err(LexikaError::GraphConstraint(format!(
                "edge weight {} outside [0, 1]",
                edge.weight
            )));
        }

        let mut inner = self.inner.write();
        if !inner.nodes.contains_key(&edge.source_id) {
            return Err(LexikaError::GraphConstraint(format!(
                "edge source {} does not exist",
                edge.source_id
            )));
        }
        if !inner.nodes.contains_key(&edge.target_id) {
            return Err(LexikaError::GraphConstraint(format!(
                "edge target {} does not exist",
                edge.target_id
            )));
        }

        inner
            .adjacency
            .entry(edge.source_id.clone())
            .or_default()
            .push(edge);
        Ok(())
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<GraphNode> {
        self.inner.read().nodes.get(id).cloned()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.read().nodes.len()
    }

    /// Nodes reachable from `id`, ranked by decayed effective weight.
    ///
    /// Breadth-first up to `max_depth` hops. Each hop multiplies the
    /// accumulated weight by the edge weight and the configured decay, so
    /// a depth-1 synonym at weight 1.0 scores `decay` and a depth-2
    /// neighbor at most `decay²`. Edges below `min_edge_weight` are
    /// pruned; a visited set keeps cycles and duplicates out. The start
    /// node itself is never returned.
    #[must_use]
    pub fn related_to(
        &self,
        id: &str,
        config: &GraphConfig,
    ) -> Vec<(GraphNode, f32)> {
        let inner = self.inner.read();
        if !inner.nodes.contains_key(id) {
            return Vec::new();
        }

        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(id);

        let mut results: Vec<(GraphNode, f32)> = Vec::new();
        let mut frontier: VecDeque<(&str, f32, usize)> = VecDeque::new();
        frontier.push_back((id, 1.0, 0));

        while let Some((current, accumulated, depth)) = frontier.pop_front() {
            if depth == config.max_depth {
                continue;
            }
            let Some(edges) = inner.adjacency.get(current) else {
                continue;
            };
            for edge in edges {
                if edge.weight < config.min_edge_weight {
                    continue;
                }
                if !visited.insert(edge.target_id.as_str()) {
                    continue;
                }
                let effective = accumulated * edge.weight * config.decay;
                if let Some(node) = inner.nodes.get(&edge.target_id) {
                    results.push((node.clone(), effective));
                }
                frontier.push_back((edge.target_id.as_str(), effective, depth + 1));
            }
        }

        results.sort_by(|(na, wa), (nb, wb)| {
            wb.total_cmp(wa).then_with(|| na.id.cmp(&nb.id))
        });
        results
    }

    /// Convenience for schedule enrichment: top related ids only.
    #[must_use]
    pub fn related_ids(&self, id: &str, config: &GraphConfig, limit: usize) -> Vec<String> {
        self.related_to(id, config)
            .into_iter()
            .take(limit)
            .map(|(node, _)| node.id)
            .collect()
    }
}
