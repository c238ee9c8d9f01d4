//! Remote Catalog Tier
//!
//! Read-only HTTP accessor for the authoritative media catalog. Every request
//! is rewritten onto the configured API base and carries the API key header,
//! so call sites only name paths. Non-2xx responses are drained and mapped
//! into typed errors. No retries at this layer.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

use crate::catalog::{Album, AlbumId, Asset, AssetId, AssetMetadata, Timestamped};
use crate::config::RemoteConfig;
use crate::error::{Error, Result};
use crate::tier::{TierName, TierRead};

/// Header carrying the API credential.
const API_KEY_HEADER: &str = "x-api-key";

/// Applied when the configuration does not set a timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the remote catalog API.
#[derive(Debug)]
pub struct RemoteCatalog {
    base: Url,
    api_key: String,
    http: reqwest::Client,
}

impl RemoteCatalog {
    /// Build a client from the configured endpoint and API key. The endpoint
    /// is canonicalized so its path is the API root.
    pub fn new(conf: RemoteConfig) -> Result<Self> {
        let mut base = Url::parse(&conf.endpoint)
            .map_err(|err| Error::InvalidEndpoint(format!("{}: {err}", conf.endpoint)))?;
        if base.path() != "/api" {
            base.set_path("/api");
        }

        let http = reqwest::Client::builder()
            .timeout(conf.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;

        Ok(Self {
            base,
            api_key: conf.api_key,
            http,
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // Url::join would swallow the /api prefix; extend the path instead.
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        url
    }

    async fn get(&self, url: Url) -> Result<Response> {
        debug!(%url, "remote catalog request");
        let response = self
            .http
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;
        Self::check_status(response).await
    }

    /// Map a non-2xx response into a typed error, draining the body so the
    /// connection can be reused.
    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let _ = response.bytes().await;
        if status == StatusCode::UNAUTHORIZED {
            Err(Error::Unauthorized)
        } else {
            Err(Error::UnexpectedStatus(status.as_u16()))
        }
    }

    /// Retrieve all albums in the catalog.
    pub async fn list_albums(&self) -> Result<Vec<Album>> {
        let response = self.get(self.url(&["albums"])).await?;
        Ok(response.json().await?)
    }

    /// Retrieve the asset metadata for one album.
    pub async fn list_album_assets(&self, album: &AlbumId) -> Result<Vec<AssetMetadata>> {
        #[derive(Deserialize)]
        struct AlbumDetail {
            #[serde(default)]
            assets: Vec<AssetMetadata>,
        }

        let response = self.get(self.url(&["albums", &album.0])).await?;
        let detail: AlbumDetail = response.json().await?;
        Ok(detail.assets)
    }

    /// Retrieve the metadata for a single asset.
    pub async fn fetch_asset_metadata(&self, id: &AssetId) -> Result<AssetMetadata> {
        let response = self.get(self.url(&["assets", &id.0])).await?;
        Ok(response.json().await?)
    }

    /// Download the asset associated with the metadata. The server's preview
    /// rendition is fetched; it is what display surfaces consume.
    pub async fn fetch_asset(&self, metadata: &AssetMetadata) -> Result<Asset> {
        let mut url = self.url(&["assets", &metadata.id.0, "thumbnail"]);
        url.set_query(Some("size=preview"));

        let response = self.get(url).await?;
        let payload = response.bytes().await?;
        Ok(Asset {
            metadata: metadata.clone(),
            payload,
        })
    }

    /// Retrieve an asset along with its metadata in one call. Convenience for
    /// [`fetch_asset_metadata`](Self::fetch_asset_metadata) followed by
    /// [`fetch_asset`](Self::fetch_asset).
    pub async fn fetch_asset_by_id(&self, id: &AssetId) -> Result<Asset> {
        let metadata = self.fetch_asset_metadata(id).await?;
        self.fetch_asset(&metadata).await
    }

    /// Sanity-check request against the current-user endpoint. Succeeds only
    /// if the server answers 2xx with valid JSON.
    pub async fn is_connected(&self) -> Result<()> {
        let response = self.get(self.url(&["users", "me"])).await?;
        let _body: serde_json::Value = response.json().await?;
        Ok(())
    }
}

#[async_trait]
impl TierRead for RemoteCatalog {
    fn name(&self) -> TierName {
        TierName::Remote
    }

    async fn albums(&self) -> Result<Timestamped<Vec<Album>>> {
        Ok(Timestamped::now(self.list_albums().await?))
    }

    async fn album_assets(&self, album: &AlbumId) -> Result<Timestamped<Vec<AssetMetadata>>> {
        Ok(Timestamped::now(self.list_album_assets(album).await?))
    }

    async fn asset(&self, metadata: &AssetMetadata) -> Result<Asset> {
        self.fetch_asset(metadata).await
    }

    async fn check_connected(&self) -> Result<()> {
        self.is_connected().await
    }
}

// =============================================================================
// Tests
// =============================================================================
