//! Tier Configuration
//!
//! Plain configuration structs for the three tiers. Parsing and validation
//! happen upstream; this crate receives final values and has no expectation
//! on how they were produced.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the remote catalog API.
#[derive(Debug, Clone, Default)]
pub struct RemoteConfig {
    /// Base URL of the catalog server, e.g. `https://photos.example.net`.
    /// The API path segment is appended automatically.
    pub endpoint: String,

    /// API key sent with every request.
    pub api_key: String,

    /// Per-request timeout applied by the HTTP client.
    pub timeout: Option<Duration>,
}

impl RemoteConfig {
    /// Overwrite endpoint and API key from `MEDIASTOR_API_ENDPOINT` and
    /// `MEDIASTOR_API_KEY`. Environment variables take precedence over
    /// whatever the struct already holds.
    pub fn hydrate_from_env(&mut self) {
        if let Ok(v) = std::env::var("MEDIASTOR_API_ENDPOINT") {
            self.endpoint = v;
        }
        if let Ok(v) = std::env::var("MEDIASTOR_API_KEY") {
            self.api_key = v;
        }
    }

    /// Build a config from the environment alone.
    pub fn from_env() -> Self {
        let mut conf = Self::default();
        conf.hydrate_from_env();
        conf
    }
}

/// Configuration for the in-memory cache tier.
#[derive(Debug, Clone)]
pub struct MemoryCacheConfig {
    /// Total byte budget for cached objects. Slot capacity is derived from
    /// this once at construction.
    pub byte_budget: u64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            // Room for ~85 typical assets
            byte_budget: 256 * 1000 * 1000,
        }
    }
}

/// Configuration for the on-disk local tier.
#[derive(Debug, Clone)]
pub struct LocalStoreConfig {
    /// Pre-created, writable directory holding one file per stored key.
    pub root: PathBuf,

    /// Total byte budget for the root directory's contents.
    pub byte_budget: u64,
}

impl LocalStoreConfig {
    pub fn new(root: impl Into<PathBuf>, byte_budget: u64) -> Self {
        Self {
            root: root.into(),
            byte_budget,
        }
    }
}
