//! mediastor - Tiered Read-Through Cache for Remote Media Catalogs
//!
//! A client that fronts a remote media catalog API with an in-memory cache
//! and an on-disk local store. Callers ask for catalog objects (albums, album
//! membership metadata, asset payloads) by identifier; the client decides
//! which tier satisfies the request and propagates freshly-fetched remote
//! data downward into the faster tiers.
//!
//! # Architecture
//!
//! ```text
//! caller ──▶ Client ──▶ MemoryTier ──▶ LocalTier ──▶ RemoteCatalog
//!                        (RAM, LRU)     (disk,         (HTTP)
//!                                        budgeted)
//!                 ◀───────── best-effort write-back ─────────
//! ```
//!
//! Reads cascade cache → local → remote and short-circuit on the first tier
//! with fresh data. Collection results (album lists, album membership) expire
//! after a configurable refresh interval and fall back to the newest stale
//! copy when the remote is unreachable; asset payloads are immutable and
//! never expire.
//!
//! # Example
//!
//! ```no_run
//! use mediastor::{Client, LocalStoreConfig, MemoryCacheConfig, RemoteConfig};
//!
//! # async fn run() -> mediastor::Result<()> {
//! let client = Client::builder()
//!     .with_memory_cache(MemoryCacheConfig::default())
//!     .with_local_store(LocalStoreConfig::new("/var/lib/mediastor", 2_000_000_000))
//!     .with_remote(RemoteConfig {
//!         endpoint: "https://photos.example.net".into(),
//!         api_key: std::env::var("MEDIASTOR_API_KEY").unwrap_or_default(),
//!         timeout: None,
//!     })
//!     .build()?;
//!
//! for album in client.get_albums().await? {
//!     println!("{} ({} assets)", album.name, album.asset_count);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`catalog`] - Data model mirroring the remote API
//! - [`client`] - The tiered orchestrator
//! - [`config`] - Tier configuration structs
//! - [`error`] - Error types
//! - [`remote`] - HTTP accessor for the remote catalog
//! - [`tier`] - Tier traits and the memory/local/noop implementations

pub mod catalog;
pub mod client;
pub mod config;
pub mod error;
pub mod remote;
pub mod tier;

// Re-export commonly used types
pub use catalog::{
    Album, AlbumId, AlbumOrder, Asset, AssetId, AssetKind, AssetMetadata, ExifInfo, Timestamped,
};
pub use client::{Client, ClientBuilder, Diagnostics, DEFAULT_REFRESH_INTERVAL};
pub use config::{LocalStoreConfig, MemoryCacheConfig, RemoteConfig};
pub use error::{Error, Result};
pub use remote::RemoteCatalog;
pub use tier::{
    LocalTier, MemoryTier, NoEviction, NoopTier, RetentionPolicy, StoreKey, TierName, TierRead,
    TierStore,
};
