//! Approximate-nearest-neighbor vector index and metadata filtering.

pub mod filter;
pub mod hnsw;

pub use filter::{Filter, FilterOp, MetadataValue};
pub use hnsw::{IndexedItem, VectorIndex};
