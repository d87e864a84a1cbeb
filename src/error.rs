//! Crate-wide error taxonomy.
//!
//! Degraded paths (one search leg down, predictor unavailable) are recovered
//! locally and never surface here; only the cases a caller must distinguish
//! become `LexikaError` variants.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, LexikaError>;

#[derive(Debug, Error)]
pub enum LexikaError {
    /// A guarded capability (embedding provider, predictor) is down, its
    /// circuit is open, or the call timed out.
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Malformed request: bad filters, out-of-range limit or threshold,
    /// empty query. Surfaced immediately, never retried.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Vector dimension mismatch or similar data-quality violation at the
    /// index boundary. Rejected before insertion.
    #[error("index inconsistency: {0}")]
    IndexInconsistency(String),

    /// Both the vector and lexical search paths failed. The only search
    /// error that propagates as a hard failure.
    #[error("all search paths failed: {0}")]
    TotalFailure(String),

    /// Graph invariant violation (missing endpoint, self-loop, weight out
    /// of range).
    #[error("graph constraint violated: {0}")]
    GraphConstraint(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LexikaError {
    /// Whether a retry could plausibly succeed. Invalid input never
    /// qualifies; the retry layer consults this before backing off.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::ProviderUnavailable(_))
    }
}
