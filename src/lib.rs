//! lexika - hybrid semantic search and learning-optimization engine.
//!
//! Combines approximate-nearest-neighbor vector search, lexical keyword
//! search, a weighted relationship graph over vocabulary items, and an
//! SM-2 spaced-repetition scheduler augmented by learned predictions.
//! External providers (embeddings, predictions) are guarded by a circuit
//! breaker with retry and degraded-mode fallback.

pub mod app;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod graph;
pub mod index;
pub mod resilience;
pub mod scheduler;
pub mod search;

pub use config::Config;
pub use error::{LexikaError, Result};
