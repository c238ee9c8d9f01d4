//! In-Memory Cache Tier
//!
//! Bounded recency-ordered store multiplexing the three record kinds under
//! one tagged keyspace. Capacity is counted in slots, derived once at
//! construction from the configured byte budget and a constant estimate of a
//! typical asset payload size; the least recently used slot is evicted on
//! overflow.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::catalog::{Album, AlbumId, Asset, AssetMetadata, Timestamped};
use crate::config::MemoryCacheConfig;
use crate::error::{Error, Result};

use super::{StoreKey, TierName, TierRead, TierStore};

/// Assumed size of a typical asset payload. Not measured at runtime.
pub const AVERAGE_ASSET_SIZE: u64 = 3_000_000;

/// Tagged union of everything the cache can hold. Lookups go through typed
/// accessors keyed by the matching [`StoreKey`] variant, so a kind mismatch
/// cannot be constructed through this tier's own API.
#[derive(Debug, Clone)]
enum Record {
    Albums(Timestamped<Vec<Album>>),
    AlbumAssets(Timestamped<Vec<AssetMetadata>>),
    Asset(Asset),
}

impl Record {
    fn kind(&self) -> &'static str {
        match self {
            Record::Albums(_) => "albums",
            Record::AlbumAssets(_) => "album-assets",
            Record::Asset(_) => "asset",
        }
    }
}

#[derive(Debug)]
struct Slot {
    record: Record,
    /// Recency clock value at last access
    last_used: u64,
}

#[derive(Debug, Default)]
struct Inner {
    slots: HashMap<StoreKey, Slot>,
    clock: u64,
}

impl Inner {
    fn touch(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// In-memory cache tier.
///
/// All state sits behind one mutex: the recency order is global, so sharding
/// would buy nothing here. Reads clone records out, keeping cached state out
/// of callers' reach; payload clones are cheap (`Bytes` is reference
/// counted).
pub struct MemoryTier {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl MemoryTier {
    /// Create a tier sized from the configured byte budget. At least one slot
    /// is always available, however small the budget.
    pub fn new(conf: MemoryCacheConfig) -> Self {
        let capacity = (conf.byte_budget / AVERAGE_ASSET_SIZE).max(1) as usize;
        Self {
            inner: Mutex::new(Inner::default()),
            capacity,
        }
    }

    /// Slot capacity derived at construction.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, key: &StoreKey) -> Result<Record> {
        let mut inner = self.inner.lock();
        let tick = inner.touch();
        let slot = inner.slots.get_mut(key).ok_or(Error::Miss)?;
        slot.last_used = tick;
        Ok(slot.record.clone())
    }

    fn put(&self, key: StoreKey, record: Record) {
        let mut inner = self.inner.lock();
        let tick = inner.touch();

        if !inner.slots.contains_key(&key) && inner.slots.len() >= self.capacity {
            // Evict the least recently used slot. A linear scan is fine:
            // capacity is budget-bounded and eviction only runs on overflow.
            if let Some(victim) = inner
                .slots
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(k, _)| k.clone())
            {
                tracing::debug!(key = %victim, "memory tier evicting least recently used slot");
                inner.slots.remove(&victim);
            }
        }

        inner.slots.insert(
            key,
            Slot {
                record,
                last_used: tick,
            },
        );
    }

    fn mismatch(key: &StoreKey, found: &Record) -> Error {
        Error::TypeMismatch {
            key: key.to_string(),
            expected: key.kind(),
            found: found.kind(),
        }
    }
}

#[async_trait]
impl TierRead for MemoryTier {
    fn name(&self) -> TierName {
        TierName::Cache
    }

    async fn albums(&self) -> Result<Timestamped<Vec<Album>>> {
        let key = StoreKey::Albums;
        match self.get(&key)? {
            Record::Albums(albums) => Ok(albums),
            other => Err(Self::mismatch(&key, &other)),
        }
    }

    async fn album_assets(&self, album: &AlbumId) -> Result<Timestamped<Vec<AssetMetadata>>> {
        let key = StoreKey::AlbumAssets(album.clone());
        match self.get(&key)? {
            Record::AlbumAssets(assets) => Ok(assets),
            other => Err(Self::mismatch(&key, &other)),
        }
    }

    async fn asset(&self, metadata: &AssetMetadata) -> Result<Asset> {
        let key = StoreKey::Asset(metadata.id.clone());
        match self.get(&key)? {
            Record::Asset(asset) => Ok(asset),
            other => Err(Self::mismatch(&key, &other)),
        }
    }

    async fn check_connected(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl TierStore for MemoryTier {
    async fn store_albums(&self, albums: &Timestamped<Vec<Album>>) -> Result<()> {
        self.put(StoreKey::Albums, Record::Albums(albums.clone()));
        Ok(())
    }

    async fn store_album_assets(
        &self,
        album: &AlbumId,
        assets: &Timestamped<Vec<AssetMetadata>>,
    ) -> Result<()> {
        self.put(
            StoreKey::AlbumAssets(album.clone()),
            Record::AlbumAssets(assets.clone()),
        );
        Ok(())
    }

    async fn store_asset(&self, asset: &Asset) -> Result<()> {
        self.put(
            StoreKey::Asset(asset.metadata.id.clone()),
            Record::Asset(asset.clone()),
        );
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
