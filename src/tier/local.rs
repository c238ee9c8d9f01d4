//! Local Disk Tier
//!
//! Persists catalog records across restarts, one encoded file per key under a
//! configured root directory. Every write is preceded by capacity accounting
//! against a byte budget; reclaiming space is delegated to a pluggable
//! [`RetentionPolicy`], and the shipped [`NoEviction`] policy always refuses,
//! so over-budget writes fail closed.
//!
//! The usage scan and the subsequent write are not atomic across concurrent
//! writers: two stores racing past the budget check can leave the directory
//! transiently over budget. Known limitation.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};

use crate::catalog::{Album, AlbumId, Asset, AssetMetadata, Timestamped};
use crate::config::LocalStoreConfig;
use crate::error::{Error, Result};

use super::{StoreKey, TierName, TierRead, TierStore};

// =============================================================================
// Retention policy
// =============================================================================

/// Strategy for making room when a write would exceed the byte budget.
///
/// Implementations return the number of bytes actually freed. Supplying a
/// real policy touches nothing in the cascade logic.
pub trait RetentionPolicy: Send + Sync {
    /// Human-readable policy name, for logs.
    fn name(&self) -> &'static str;

    /// Try to free at least `bytes_needed` under `root`.
    fn reclaim(&self, root: &Path, bytes_needed: u64) -> Result<u64>;
}

/// The default policy: no eviction. Reclaim requests always fail, so writes
/// that would exceed the budget are rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEviction;

impl RetentionPolicy for NoEviction {
    fn name(&self) -> &'static str {
        "no-eviction"
    }

    fn reclaim(&self, _root: &Path, _bytes_needed: u64) -> Result<u64> {
        Err(Error::EvictionUnsupported)
    }
}

// =============================================================================
// On-disk record encoding
// =============================================================================

/// Serde adapter storing payload bytes as base64 text inside the JSON record.
mod payload_b64 {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(payload: &Bytes, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(payload))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Bytes, D::Error> {
        let text = String::deserialize(deserializer)?;
        BASE64
            .decode(text.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

/// Encoded form of one stored key's value. The encoding is an internal
/// detail; only round-trip fidelity is contracted.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
enum StoredRecord {
    Albums(Timestamped<Vec<Album>>),
    AlbumAssets(Timestamped<Vec<AssetMetadata>>),
    Asset {
        metadata: AssetMetadata,
        #[serde(with = "payload_b64")]
        payload: Bytes,
    },
}

impl StoredRecord {
    fn kind(&self) -> &'static str {
        match self {
            StoredRecord::Albums(_) => "albums",
            StoredRecord::AlbumAssets(_) => "album-assets",
            StoredRecord::Asset { .. } => "asset",
        }
    }
}

// =============================================================================
// Local tier
// =============================================================================

/// Disk-backed store tier.
pub struct LocalTier {
    root: PathBuf,
    budget: u64,
    retention: Box<dyn RetentionPolicy>,
}

impl LocalTier {
    /// Create a tier over a pre-created, writable root directory, with the
    /// default [`NoEviction`] retention policy.
    pub fn new(conf: LocalStoreConfig) -> Self {
        Self::with_retention(conf, NoEviction)
    }

    /// Create a tier with a custom retention policy.
    pub fn with_retention(conf: LocalStoreConfig, retention: impl RetentionPolicy + 'static) -> Self {
        Self {
            root: conf.root,
            budget: conf.byte_budget,
            retention: Box::new(retention),
        }
    }

    /// Configured byte budget.
    pub fn budget(&self) -> u64 {
        self.budget
    }

    fn path_for(&self, key: &StoreKey) -> PathBuf {
        self.root.join(key.to_string())
    }

    /// Total bytes occupied by files directly under the root. Unreadable
    /// entries and subdirectories are skipped; an unreadable root is fatal.
    pub async fn bytes_in_use(&self) -> Result<u64> {
        let mut dir = fs::read_dir(&self.root).await?;
        let mut total = 0u64;
        while let Some(entry) = dir.next_entry().await? {
            match entry.metadata().await {
                Ok(md) if md.is_file() => total += md.len(),
                Ok(_) => {}
                Err(err) => {
                    debug!(entry = %entry.path().display(), %err, "skipping unreadable entry");
                }
            }
        }
        Ok(total)
    }

    async fn read_record(&self, key: &StoreKey) -> Result<StoredRecord> {
        let path = self.path_for(key);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Err(Error::Miss),
            Err(err) => {
                debug!(key = %key, %err, "unreadable record treated as miss");
                return Err(Error::Miss);
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(record) => Ok(record),
            Err(err) => {
                debug!(key = %key, %err, "undecodable record treated as miss");
                Err(Error::Miss)
            }
        }
    }

    async fn write_record(&self, key: &StoreKey, record: &StoredRecord) -> Result<()> {
        let encoded = serde_json::to_vec(record)?;
        let path = self.path_for(key);

        let in_use = self.bytes_in_use().await?;
        let occupied_by_key = match fs::metadata(&path).await {
            Ok(md) => md.len(),
            Err(_) => 0,
        };
        let projected = in_use.saturating_sub(occupied_by_key) + encoded.len() as u64;

        if projected > self.budget {
            let shortfall = projected - self.budget;
            match self.retention.reclaim(&self.root, shortfall) {
                Ok(freed) if freed >= shortfall => {
                    debug!(policy = self.retention.name(), freed, "retention policy made room");
                }
                Ok(freed) => {
                    warn!(
                        policy = self.retention.name(),
                        freed, shortfall, "retention policy freed too little"
                    );
                    return Err(Error::CapacityExceeded {
                        needed: shortfall - freed,
                        in_use,
                        budget: self.budget,
                    });
                }
                Err(err) => {
                    warn!(policy = self.retention.name(), %err, "retention policy cannot reclaim");
                    return Err(Error::CapacityExceeded {
                        needed: shortfall,
                        in_use,
                        budget: self.budget,
                    });
                }
            }
        }

        // Write through a temp file in the same directory so a failed or
        // rejected write never leaves a partial record under the key.
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&encoded)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|err| Error::Io(err.error))?;

        debug!(key = %key, bytes = encoded.len(), "stored record");
        Ok(())
    }

    fn mismatch(key: &StoreKey, found: &StoredRecord) -> Error {
        Error::TypeMismatch {
            key: key.to_string(),
            expected: key.kind(),
            found: found.kind(),
        }
    }
}

#[async_trait]
impl TierRead for LocalTier {
    fn name(&self) -> TierName {
        TierName::Local
    }

    async fn albums(&self) -> Result<Timestamped<Vec<Album>>> {
        let key = StoreKey::Albums;
        match self.read_record(&key).await? {
            StoredRecord::Albums(albums) => Ok(albums),
            other => Err(Self::mismatch(&key, &other)),
        }
    }

    async fn album_assets(&self, album: &AlbumId) -> Result<Timestamped<Vec<AssetMetadata>>> {
        let key = StoreKey::AlbumAssets(album.clone());
        match self.read_record(&key).await? {
            StoredRecord::AlbumAssets(assets) => Ok(assets),
            other => Err(Self::mismatch(&key, &other)),
        }
    }

    async fn asset(&self, metadata: &AssetMetadata) -> Result<Asset> {
        let key = StoreKey::Asset(metadata.id.clone());
        match self.read_record(&key).await? {
            StoredRecord::Asset { metadata, payload } => Ok(Asset { metadata, payload }),
            other => Err(Self::mismatch(&key, &other)),
        }
    }

    async fn check_connected(&self) -> Result<()> {
        let md = fs::metadata(&self.root).await?;
        if md.is_dir() {
            Ok(())
        } else {
            Err(Error::NotConfigured)
        }
    }
}

#[async_trait]
impl TierStore for LocalTier {
    async fn store_albums(&self, albums: &Timestamped<Vec<Album>>) -> Result<()> {
        self.write_record(&StoreKey::Albums, &StoredRecord::Albums(albums.clone()))
            .await
    }

    async fn store_album_assets(
        &self,
        album: &AlbumId,
        assets: &Timestamped<Vec<AssetMetadata>>,
    ) -> Result<()> {
        self.write_record(
            &StoreKey::AlbumAssets(album.clone()),
            &StoredRecord::AlbumAssets(assets.clone()),
        )
        .await
    }

    async fn store_asset(&self, asset: &Asset) -> Result<()> {
        self.write_record(
            &StoreKey::Asset(asset.metadata.id.clone()),
            &StoredRecord::Asset {
                metadata: asset.metadata.clone(),
                payload: asset.payload.clone(),
            },
        )
        .await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AssetId, AssetKind};
    use assert_matches::assert_matches;

    fn make_metadata(id: &str) -> AssetMetadata {
        AssetMetadata {
            id: AssetId::from(id),
            kind: AssetKind::Image,
            display_name: format!("{id}.jpg"),
            duration: None,
            exif: None,
            people: vec![],
        }
    }

    fn make_asset(id: &str, payload: &[u8]) -> Asset {
        Asset::new(make_metadata(id), Bytes::copy_from_slice(payload))
    }

    fn make_album(id: &str, name: &str) -> Album {
        Album {
            id: AlbumId::from(id),
            name: name.into(),
            description: String::new(),
            order: Default::default(),
            asset_count: 0,
        }
    }

    fn tier_in(dir: &Path, budget: u64) -> LocalTier {
        LocalTier::new(LocalStoreConfig::new(dir, budget))
    }

    #[tokio::test]
    async fn asset_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let tier = tier_in(dir.path(), 1_000_000);
        let asset = make_asset("a1", b"\x00\x01raw jpeg bytes\xff");

        tier.store_asset(&asset).await.unwrap();

        let got = tier.asset(&make_metadata("a1")).await.unwrap();
        assert_eq!(got, asset);
    }

    #[tokio::test]
    async fn albums_round_trip_preserves_fetch_time() {
        let dir = tempfile::tempdir().unwrap();
        let tier = tier_in(dir.path(), 1_000_000);
        let albums = Timestamped::now(vec![make_album("al1", "Trips"), make_album("al2", "Pets")]);

        tier.store_albums(&albums).await.unwrap();

        let got = tier.albums().await.unwrap();
        assert_eq!(got.value, albums.value);
        assert_eq!(got.fetched_at, albums.fetched_at);
    }

    #[tokio::test]
    async fn album_assets_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let tier = tier_in(dir.path(), 1_000_000);
        let album = AlbumId::from("al1");
        let assets = Timestamped::now(vec![make_metadata("m1"), make_metadata("m2")]);

        tier.store_album_assets(&album, &assets).await.unwrap();

        let got = tier.album_assets(&album).await.unwrap();
        assert_eq!(got.value, assets.value);
    }

    #[tokio::test]
    async fn absent_keys_miss() {
        let dir = tempfile::tempdir().unwrap();
        let tier = tier_in(dir.path(), 1_000_000);

        assert_matches!(tier.albums().await, Err(Error::Miss));
        assert_matches!(tier.asset(&make_metadata("nope")).await, Err(Error::Miss));
    }

    #[tokio::test]
    async fn undecodable_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let tier = tier_in(dir.path(), 1_000_000);

        std::fs::write(dir.path().join("albums"), b"{ not json").unwrap();

        assert_matches!(tier.albums().await, Err(Error::Miss));
    }

    #[tokio::test]
    async fn wrong_record_kind_is_a_type_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let tier = tier_in(dir.path(), 1_000_000);

        // A valid albums record parked under an asset key.
        tier.store_albums(&Timestamped::now(vec![make_album("al1", "Trips")]))
            .await
            .unwrap();
        std::fs::rename(dir.path().join("albums"), dir.path().join("asset-a1")).unwrap();

        assert_matches!(
            tier.asset(&make_metadata("a1")).await,
            Err(Error::TypeMismatch { .. })
        );
    }

    #[tokio::test]
    async fn over_budget_write_fails_with_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let tier = tier_in(dir.path(), 64);

        let result = tier.store_asset(&make_asset("big", &[0u8; 4096])).await;
        assert_matches!(result, Err(Error::CapacityExceeded { .. }));

        assert!(!dir.path().join("asset-big").exists());
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn second_write_over_budget_leaves_first_intact() {
        let dir = tempfile::tempdir().unwrap();
        let tier = tier_in(dir.path(), 2_500);

        tier.store_asset(&make_asset("first", &[1u8; 1000]))
            .await
            .unwrap();

        let result = tier.store_asset(&make_asset("second", &[2u8; 1000])).await;
        assert_matches!(result, Err(Error::CapacityExceeded { .. }));

        assert_matches!(tier.asset(&make_metadata("first")).await, Ok(_));
        assert!(!dir.path().join("asset-second").exists());
    }

    #[tokio::test]
    async fn rewriting_a_key_reuses_its_own_budget_share() {
        let dir = tempfile::tempdir().unwrap();
        let tier = tier_in(dir.path(), 2_500);

        tier.store_asset(&make_asset("only", &[1u8; 1000]))
            .await
            .unwrap();
        // Same key, same size: the bytes already under the key must not be
        // double counted.
        tier.store_asset(&make_asset("only", &[2u8; 1000]))
            .await
            .unwrap();

        let got = tier.asset(&make_metadata("only")).await.unwrap();
        assert_eq!(got.payload.as_ref(), &[2u8; 1000][..]);
    }

    #[tokio::test]
    async fn usage_scan_skips_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let tier = tier_in(dir.path(), 1_000_000);

        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/inner"), [0u8; 512]).unwrap();
        std::fs::write(dir.path().join("albums"), b"xyz").unwrap();

        assert_eq!(tier.bytes_in_use().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn unreadable_root_is_fatal_to_the_scan() {
        let tier = tier_in(Path::new("/definitely/not/a/real/root"), 1_000_000);
        assert_matches!(tier.bytes_in_use().await, Err(Error::Io(_)));
    }

    #[tokio::test]
    async fn custom_retention_policy_can_make_room() {
        struct DropEverything;

        impl RetentionPolicy for DropEverything {
            fn name(&self) -> &'static str {
                "drop-everything"
            }

            fn reclaim(&self, root: &Path, _bytes_needed: u64) -> Result<u64> {
                let mut freed = 0;
                for entry in std::fs::read_dir(root)? {
                    let entry = entry?;
                    if entry.metadata()?.is_file() {
                        freed += entry.metadata()?.len();
                        std::fs::remove_file(entry.path())?;
                    }
                }
                Ok(freed)
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let tier = LocalTier::with_retention(
            LocalStoreConfig::new(dir.path(), 2_500),
            DropEverything,
        );

        tier.store_asset(&make_asset("first", &[1u8; 1000]))
            .await
            .unwrap();
        // Needs the policy to clear "first" before it fits.
        tier.store_asset(&make_asset("second", &[2u8; 1000]))
            .await
            .unwrap();

        assert_matches!(tier.asset(&make_metadata("first")).await, Err(Error::Miss));
        assert_matches!(tier.asset(&make_metadata("second")).await, Ok(_));
    }
}
