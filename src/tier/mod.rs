//! Tiered Storage Abstraction
//!
//! The client composes three backing stores (in-memory cache, on-disk local
//! store, remote catalog) queried in a fixed cascade order. This module
//! defines the capability traits the orchestrator dispatches through, the
//! shared key scheme, and the always-miss noop tier used for anything left
//! unconfigured.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                         Client                            │
//! ├───────────────────────────────────────────────────────────┤
//! │  MemoryTier (RAM)   │  LocalTier (disk)  │  RemoteCatalog │
//! │  TierStore          │  TierStore         │  TierRead      │
//! └───────────────────────────────────────────────────────────┘
//! ```

mod local;
mod memory;

pub use local::{LocalTier, NoEviction, RetentionPolicy};
pub use memory::{MemoryTier, AVERAGE_ASSET_SIZE};

use std::fmt;

use async_trait::async_trait;

use crate::catalog::{Album, AlbumId, Asset, AssetId, AssetMetadata, Timestamped};
use crate::error::{Error, Result};

// =============================================================================
// Tier identity
// =============================================================================

/// Which tier an operation ran against. Used for logging and for attributing
/// failures when every tier has been exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TierName {
    /// In-memory cache
    Cache,
    /// On-disk local store
    Local,
    /// Remote catalog API
    Remote,
    /// Unconfigured placeholder
    Noop,
}

impl fmt::Display for TierName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierName::Cache => write!(f, "cache"),
            TierName::Local => write!(f, "local"),
            TierName::Remote => write!(f, "remote"),
            TierName::Noop => write!(f, "noop"),
        }
    }
}

// =============================================================================
// Key scheme
// =============================================================================

/// Tagged key under which the tiers multiplex all three record kinds in one
/// keyspace. The rendered form doubles as the local tier's file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// The full album list
    Albums,
    /// One album's asset metadata list
    AlbumAssets(AlbumId),
    /// One asset's payload and metadata
    Asset(AssetId),
}

impl StoreKey {
    /// Record kind label, used in mismatch diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreKey::Albums => "albums",
            StoreKey::AlbumAssets(_) => "album-assets",
            StoreKey::Asset(_) => "asset",
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKey::Albums => write!(f, "albums"),
            StoreKey::AlbumAssets(id) => write!(f, "album-{id}"),
            StoreKey::Asset(id) => write!(f, "asset-{id}"),
        }
    }
}

// =============================================================================
// Capability traits
// =============================================================================

/// Read capabilities shared by every tier.
///
/// `Err(Error::Miss)` means the tier does not hold the requested key; the
/// cascade treats any other error the same way but logs it louder.
#[async_trait]
pub trait TierRead: Send + Sync {
    /// Which tier this is, for logs and failure attribution.
    fn name(&self) -> TierName;

    /// The full album list, stamped with its original fetch time.
    async fn albums(&self) -> Result<Timestamped<Vec<Album>>>;

    /// One album's asset metadata list, stamped with its original fetch time.
    async fn album_assets(&self, album: &AlbumId) -> Result<Timestamped<Vec<AssetMetadata>>>;

    /// One asset's payload. Assets carry no timestamp: payloads are immutable.
    async fn asset(&self, metadata: &AssetMetadata) -> Result<Asset>;

    /// Lightweight connectivity probe. Never mutates caller-visible state.
    async fn check_connected(&self) -> Result<()>;
}

/// Write capabilities of the cache and local tiers.
///
/// Stores accept timestamped values so write-back preserves the original
/// fetch time instead of laundering stale data into fresh data.
#[async_trait]
pub trait TierStore: TierRead {
    async fn store_albums(&self, albums: &Timestamped<Vec<Album>>) -> Result<()>;

    async fn store_album_assets(
        &self,
        album: &AlbumId,
        assets: &Timestamped<Vec<AssetMetadata>>,
    ) -> Result<()>;

    async fn store_asset(&self, asset: &Asset) -> Result<()>;
}

// =============================================================================
// Noop tier
// =============================================================================

/// Placeholder for an unconfigured tier: every read misses, every write
/// succeeds without storing anything. Keeps the cascade free of per-tier
/// presence checks.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTier;

#[async_trait]
impl TierRead for NoopTier {
    fn name(&self) -> TierName {
        TierName::Noop
    }

    async fn albums(&self) -> Result<Timestamped<Vec<Album>>> {
        Err(Error::Miss)
    }

    async fn album_assets(&self, _album: &AlbumId) -> Result<Timestamped<Vec<AssetMetadata>>> {
        Err(Error::Miss)
    }

    async fn asset(&self, _metadata: &AssetMetadata) -> Result<Asset> {
        Err(Error::Miss)
    }

    async fn check_connected(&self) -> Result<()> {
        Err(Error::NotConfigured)
    }
}

#[async_trait]
impl TierStore for NoopTier {
    async fn store_albums(&self, _albums: &Timestamped<Vec<Album>>) -> Result<()> {
        Ok(())
    }

    async fn store_album_assets(
        &self,
        _album: &AlbumId,
        _assets: &Timestamped<Vec<AssetMetadata>>,
    ) -> Result<()> {
        Ok(())
    }

    async fn store_asset(&self, _asset: &Asset) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
