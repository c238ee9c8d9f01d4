//! Catalog Data Model
//!
//! Types mirroring the remote media catalog API: albums, asset metadata, and
//! full assets. Serde renames follow the API's wire names so the same
//! definitions decode HTTP responses and round-trip through the local store.

use std::fmt;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Identifiers
// =============================================================================

/// Server-issued album identifier, usually in the shape of UUIDv4.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlbumId(pub String);

/// Server-issued asset identifier, usually in the shape of UUIDv4.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub String);

impl fmt::Display for AlbumId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AlbumId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// =============================================================================
// Albums
// =============================================================================

/// Display order an album requests for its assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AlbumOrder {
    /// Oldest assets first
    #[serde(rename = "asc")]
    Ascending,
    /// Newest assets first
    #[serde(rename = "desc")]
    Descending,
    /// Server did not specify an order
    #[default]
    #[serde(other)]
    Unspecified,
}

/// Relevant album information retrieved from the catalog API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Album {
    /// Album identifier
    pub id: AlbumId,
    /// Human-readable album name
    #[serde(rename = "albumName")]
    pub name: String,
    /// Free-form album description
    #[serde(default)]
    pub description: String,
    /// Requested asset ordering
    #[serde(rename = "order", default)]
    pub order: AlbumOrder,
    /// Number of assets in the album
    #[serde(rename = "assetCount", default)]
    pub asset_count: u64,
}

// =============================================================================
// Assets
// =============================================================================

/// Broad media kind of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
    #[serde(rename = "IMAGE")]
    Image,
    #[serde(rename = "VIDEO")]
    Video,
    /// Anything the API reports that is neither image nor video
    #[serde(other, rename = "OTHER")]
    Other,
}

/// EXIF data associated with an asset. The API returns nulls freely, so every
/// field is optional.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExifInfo {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub date_time_original: Option<String>,
    pub time_zone: Option<String>,
    pub latitude: Option<f32>,
    pub longitude: Option<f32>,
}

/// Asset information retrieved from the catalog API. Identifies the logical
/// asset without its payload; immutable once fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMetadata {
    /// Asset identifier
    pub id: AssetId,
    /// Media kind
    #[serde(rename = "type")]
    pub kind: AssetKind,
    /// Original file name, used for display
    #[serde(rename = "originalFileName", default)]
    pub display_name: String,
    /// Play duration for video assets, as reported by the server
    #[serde(default)]
    pub duration: Option<String>,
    /// EXIF data, when the server has extracted it
    #[serde(rename = "exifInfo", default)]
    pub exif: Option<ExifInfo>,
    /// Recognized people, kept as loose objects since the shape varies by
    /// server version
    #[serde(default)]
    pub people: Vec<serde_json::Value>,
}

/// A full asset: metadata plus the downloaded payload bytes.
///
/// Payloads are treated as immutable: once fetched they are never considered
/// stale, unlike the collection results they were discovered through.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub metadata: AssetMetadata,
    pub payload: Bytes,
}

impl Asset {
    pub fn new(metadata: AssetMetadata, payload: impl Into<Bytes>) -> Self {
        Self {
            metadata,
            payload: payload.into(),
        }
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

// =============================================================================
// Timestamped collection results
// =============================================================================

/// A fetched value paired with its fetch time.
///
/// Only collection-shaped results (the album list, an album's asset metadata)
/// carry a timestamp: catalog membership can change behind our back, while
/// individual asset payloads cannot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timestamped<T> {
    pub value: T,
    pub fetched_at: DateTime<Utc>,
}

impl<T> Timestamped<T> {
    /// Wrap a value stamped with the current time.
    pub fn now(value: T) -> Self {
        Self {
            value,
            fetched_at: Utc::now(),
        }
    }

    /// Wrap a value with an explicit fetch time.
    pub fn at(value: T, fetched_at: DateTime<Utc>) -> Self {
        Self { value, fetched_at }
    }

    /// Whether this result's age exceeds the refresh interval. A zero
    /// interval means results never expire.
    pub fn is_stale(&self, refresh_interval: std::time::Duration) -> bool {
        if refresh_interval.is_zero() {
            return false;
        }
        let age = Utc::now().signed_duration_since(self.fetched_at);
        age > chrono::Duration::from_std(refresh_interval).unwrap_or(chrono::Duration::MAX)
    }

    /// Map the wrapped value, keeping the fetch time.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Timestamped<U> {
        Timestamped {
            value: f(self.value),
            fetched_at: self.fetched_at,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
