//! Error types for the tiered catalog client

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the tiered catalog client
#[derive(Error, Debug)]
pub enum Error {
    /// Key absent in a tier. Expected during normal operation; the
    /// orchestrator handles it internally and it never reaches callers.
    #[error("not found in tier")]
    Miss,

    /// A stored record under the expected key has the wrong kind. This
    /// signals corruption or an implementation bug, never a plain miss.
    #[error("unexpected record kind for key {key}: expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Remote API rejected the configured credentials (401)
    #[error("invalid API token")]
    Unauthorized,

    /// Remote API returned a non-2xx status other than 401
    #[error("unexpected status code {0}")]
    UnexpectedStatus(u16),

    /// HTTP transport error
    #[error("remote request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record encode/decode error
    #[error("record encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Local store write rejected for lack of space
    #[error("local store over budget: need {needed} more bytes, {in_use} in use of {budget}")]
    CapacityExceeded {
        needed: u64,
        in_use: u64,
        budget: u64,
    },

    /// The configured retention policy cannot reclaim space
    #[error("no eviction policy configured")]
    EvictionUnsupported,

    /// Remote endpoint could not be parsed into a usable URL
    #[error("invalid remote endpoint: {0}")]
    InvalidEndpoint(String),

    /// Operation invoked on an unconfigured (noop) tier
    #[error("tier not configured")]
    NotConfigured,

    /// No album with the requested name exists in the catalog
    #[error("album not found: {0}")]
    AlbumNotFound(String),

    /// Every tier missed or failed and no stale fallback was available
    #[error("no tier could satisfy the request: {0}")]
    AllTiersFailed(String),
}

impl Error {
    /// True for errors the read cascade treats as an ordinary miss.
    pub fn is_miss(&self) -> bool {
        matches!(self, Error::Miss)
    }
}
