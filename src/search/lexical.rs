//! Lexical search contract and an in-memory reference implementation.
//!
//! Production deployments plug in an external keyword-search service; the
//! engine only consumes the result contract. [`MemoryLexicalIndex`] exists
//! for the CLI demo and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::embedding::ProviderError;
use crate::index::MetadataValue;
use crate::search::Collection;

/// One hit from the lexical path: rank-ordered, no comparable score.
#[derive(Debug, Clone)]
pub struct LexicalHit {
    pub id: String,
    /// 0-indexed rank within the result list.
    pub rank: usize,
    pub metadata: HashMap<String, MetadataValue>,
}

/// External keyword-search capability.
#[async_trait]
pub trait LexicalSearchProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        collection: Collection,
        limit: usize,
    ) -> Result<Vec<LexicalHit>, ProviderError>;
}

#[derive(Debug, Clone)]
struct LexicalDoc {
    id: String,
    tokens: Vec<String>,
    metadata: HashMap<String, MetadataValue>,
}

/// Token-overlap keyword index over per-collection document lists.
///
/// Scoring is the count of distinct query tokens present in the document,
/// ties broken by id, which is crude next to a real BM25 backend but
/// deterministic and dependency-free.
#[derive(Default)]
pub struct MemoryLexicalIndex {
    collections: RwLock<HashMap<Collection, Vec<LexicalDoc>>>,
}

impl MemoryLexicalIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a document by id.
    pub fn add_document(
        &self,
        collection: Collection,
        id: impl Into<String>,
        text: &str,
        metadata: HashMap<String, MetadataValue>,
    ) {
        let id = id.into();
        let doc = LexicalDoc {
            id: id.clone(),
            tokens: tokenize(text),
            metadata,
        };
        let mut collections = self.collections.write();
        let docs = collections.entry(collection).or_default();
        if let Some(existing) = docs.iter_mut().find(|d| d.id == id) {
            *existing = doc;
        } else {
            docs.push(doc);
        }
    }

    pub fn remove_document(&self, collection: Collection, id: &str) {
        let mut collections = self.collections.write();
        if let Some(docs) = collections.get_mut(&collection) {
            docs.retain(|d| d.id != id);
        }
    }
}

#[async_trait]
impl LexicalSearchProvider for MemoryLexicalIndex {
    async fn search(
        &self,
        query: &str,
        collection: Collection,
        limit: usize,
    ) -> Result<Vec<LexicalHit>, ProviderError> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Err(ProviderError::InvalidInput("empty query".to_string()));
        }

        let collections = self.collections.read();
        let Some(docs) = collections.get(&collection) else {
            return Ok(Vec::new());
        };

        let mut scored: Vec<(usize, &LexicalDoc)> = docs
            .iter()
            .filter_map(|doc| {
                let overlap = query_tokens
                    .iter()
                    .filter(|t| doc.tokens.contains(*t))
                    .count();
                (overlap > 0).then_some((overlap, doc))
            })
            .collect();
        scored.sort_by(|(sa, da), (sb, db)| sb.cmp(sa).then_with(|| da.id.cmp(&db.id)));

        Ok(scored
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(rank, (_, doc))| LexicalHit {
                id: doc.id.clone(),
                rank,
                metadata: doc.metadata.clone(),
            })
            .collect())
    }
}

fn tokenize(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect();
    tokens.sort_unstable();
    tokens.dedup();
    tokens
}
