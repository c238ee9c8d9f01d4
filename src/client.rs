//! Tiered Catalog Client
//!
//! Composes the in-memory cache, the local disk store, and the remote catalog
//! behind one façade. Reads cascade cache → local → remote, short-circuiting
//! on the first tier that returns fresh data; remote results are written back
//! into the faster tiers on a best-effort basis. Collection reads carry a
//! staleness policy with a stale-fallback degraded mode; asset reads do not,
//! since payloads are immutable once fetched.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::catalog::{Album, AlbumId, Asset, AssetMetadata, Timestamped};
use crate::config::{LocalStoreConfig, MemoryCacheConfig, RemoteConfig};
use crate::error::{Error, Result};
use crate::remote::RemoteCatalog;
use crate::tier::{LocalTier, MemoryTier, NoopTier, TierName, TierRead, TierStore};

/// Collections fetched longer ago than this are refreshed from the remote
/// when the builder is not given an interval. Zero disables expiry.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(15 * 60);

// =============================================================================
// Builder
// =============================================================================

/// Configures and constructs a [`Client`]. Each tier is optional; anything
/// left unconfigured becomes an always-miss noop tier.
pub struct ClientBuilder {
    cache: Option<Arc<dyn TierStore>>,
    local: Option<Arc<dyn TierStore>>,
    remote: Option<Arc<dyn TierRead>>,
    remote_conf: Option<RemoteConfig>,
    refresh_interval: Duration,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            cache: None,
            local: None,
            remote: None,
            remote_conf: None,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable the in-memory cache tier.
    pub fn with_memory_cache(mut self, conf: MemoryCacheConfig) -> Self {
        self.cache = Some(Arc::new(MemoryTier::new(conf)));
        self
    }

    /// Enable the on-disk local tier.
    pub fn with_local_store(mut self, conf: LocalStoreConfig) -> Self {
        self.local = Some(Arc::new(LocalTier::new(conf)));
        self
    }

    /// Enable the remote catalog tier.
    pub fn with_remote(mut self, conf: RemoteConfig) -> Self {
        self.remote_conf = Some(conf);
        self
    }

    /// Use a caller-supplied cache tier implementation.
    pub fn with_cache_tier(mut self, tier: Arc<dyn TierStore>) -> Self {
        self.cache = Some(tier);
        self
    }

    /// Use a caller-supplied local tier implementation.
    pub fn with_local_tier(mut self, tier: Arc<dyn TierStore>) -> Self {
        self.local = Some(tier);
        self
    }

    /// Use a caller-supplied remote tier implementation.
    pub fn with_remote_tier(mut self, tier: Arc<dyn TierRead>) -> Self {
        self.remote = Some(tier);
        self
    }

    /// How long collection results stay fresh. Zero means they never expire.
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Construct the client. Fails only if a configured remote endpoint
    /// cannot be parsed.
    pub fn build(self) -> Result<Client> {
        let remote = match (self.remote, self.remote_conf) {
            (Some(tier), _) => Some(tier),
            (None, Some(conf)) => Some(Arc::new(RemoteCatalog::new(conf)?) as Arc<dyn TierRead>),
            (None, None) => None,
        };

        Ok(Client {
            cache_configured: self.cache.is_some(),
            local_configured: self.local.is_some(),
            remote_configured: remote.is_some(),
            cache: self.cache.unwrap_or_else(|| Arc::new(NoopTier)),
            local: self.local.unwrap_or_else(|| Arc::new(NoopTier)),
            remote: remote.unwrap_or_else(|| Arc::new(NoopTier)),
            refresh_interval: self.refresh_interval,
        })
    }
}

// =============================================================================
// Diagnostics
// =============================================================================

/// Snapshot of how the client is wired, for startup logging.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    pub cache_configured: bool,
    pub local_configured: bool,
    pub remote_configured: bool,
    /// `None` when the remote connectivity probe succeeded.
    pub remote_connect_error: Option<String>,
}

// =============================================================================
// Client
// =============================================================================

/// Tiered read-through client for the media catalog.
///
/// Constructed once at startup and shared for the process lifetime; all
/// operations are safe to invoke concurrently. Mutable state lives inside the
/// tiers, which synchronize themselves.
pub struct Client {
    cache: Arc<dyn TierStore>,
    local: Arc<dyn TierStore>,
    remote: Arc<dyn TierRead>,
    cache_configured: bool,
    local_configured: bool,
    remote_configured: bool,
    refresh_interval: Duration,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("cache_configured", &self.cache_configured)
            .field("local_configured", &self.local_configured)
            .field("remote_configured", &self.remote_configured)
            .field("refresh_interval", &self.refresh_interval)
            .finish()
    }
}

/// Bookkeeping for one cascading collection read.
struct Cascade<T> {
    /// Most recent stale result seen so far, kept for degraded fallback.
    last_known_good: Option<Timestamped<T>>,
    /// Per-tier failure notes for the aggregate error.
    failures: Vec<(TierName, String)>,
}

impl<T> Cascade<T> {
    fn new() -> Self {
        Self {
            last_known_good: None,
            failures: Vec::new(),
        }
    }

    fn note_failure(&mut self, tier: TierName, err: &Error) {
        self.failures.push((tier, err.to_string()));
    }

    /// Keep the newer of the remembered and the offered stale result.
    fn offer_stale(&mut self, candidate: Timestamped<T>) {
        match &self.last_known_good {
            Some(kept) if kept.fetched_at >= candidate.fetched_at => {}
            _ => self.last_known_good = Some(candidate),
        }
    }

    fn into_aggregate_error(self) -> Error {
        let detail = self
            .failures
            .iter()
            .map(|(tier, err)| format!("{tier}: {err}"))
            .collect::<Vec<_>>()
            .join("; ");
        Error::AllTiersFailed(detail)
    }
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Handle one store tier's answer for a collection read. Returns the
    /// value when it is fresh enough to short-circuit the cascade.
    fn accept_collection<T>(
        &self,
        tier: TierName,
        what: &str,
        result: Result<Timestamped<T>>,
        cascade: &mut Cascade<T>,
    ) -> Option<Timestamped<T>> {
        match result {
            Ok(hit) if !hit.is_stale(self.refresh_interval) => {
                debug!(%tier, what, "fresh hit");
                Some(hit)
            }
            Ok(stale) => {
                debug!(%tier, what, fetched_at = %stale.fetched_at, "stale hit, continuing cascade");
                cascade.offer_stale(stale);
                None
            }
            Err(Error::Miss) => {
                debug!(%tier, what, "miss");
                cascade.note_failure(tier, &Error::Miss);
                None
            }
            Err(err @ Error::TypeMismatch { .. }) => {
                warn!(%tier, what, %err, "stored record has the wrong kind, treating as miss");
                cascade.note_failure(tier, &err);
                None
            }
            Err(err) => {
                warn!(%tier, what, %err, "tier failed, continuing cascade");
                cascade.note_failure(tier, &err);
                None
            }
        }
    }

    /// The full album list, via the tier cascade.
    pub async fn get_albums(&self) -> Result<Vec<Album>> {
        let mut cascade = Cascade::new();

        if let Some(hit) =
            self.accept_collection(TierName::Cache, "albums", self.cache.albums().await, &mut cascade)
        {
            return Ok(hit.value);
        }

        if let Some(hit) =
            self.accept_collection(TierName::Local, "albums", self.local.albums().await, &mut cascade)
        {
            self.advise(TierName::Cache, "albums", self.cache.store_albums(&hit).await);
            return Ok(hit.value);
        }

        info!("fetching albums from remote");
        match self.remote.albums().await {
            Ok(fresh) => {
                let (cache_result, local_result) = tokio::join!(
                    self.cache.store_albums(&fresh),
                    self.local.store_albums(&fresh),
                );
                self.advise(TierName::Cache, "albums", cache_result);
                self.advise(TierName::Local, "albums", local_result);
                Ok(fresh.value)
            }
            Err(err) => {
                cascade.note_failure(TierName::Remote, &err);
                self.degrade(cascade, "albums")
            }
        }
    }

    /// One album's asset metadata list, via the tier cascade.
    pub async fn get_album_assets(&self, album: &AlbumId) -> Result<Vec<AssetMetadata>> {
        let mut cascade = Cascade::new();
        let what = "album assets";

        if let Some(hit) = self.accept_collection(
            TierName::Cache,
            what,
            self.cache.album_assets(album).await,
            &mut cascade,
        ) {
            return Ok(hit.value);
        }

        if let Some(hit) = self.accept_collection(
            TierName::Local,
            what,
            self.local.album_assets(album).await,
            &mut cascade,
        ) {
            self.advise(
                TierName::Cache,
                what,
                self.cache.store_album_assets(album, &hit).await,
            );
            return Ok(hit.value);
        }

        info!(album = %album, "fetching album assets from remote");
        match self.remote.album_assets(album).await {
            Ok(fresh) => {
                let (cache_result, local_result) = tokio::join!(
                    self.cache.store_album_assets(album, &fresh),
                    self.local.store_album_assets(album, &fresh),
                );
                self.advise(TierName::Cache, what, cache_result);
                self.advise(TierName::Local, what, local_result);
                Ok(fresh.value)
            }
            Err(err) => {
                cascade.note_failure(TierName::Remote, &err);
                self.degrade(cascade, what)
            }
        }
    }

    /// One asset's payload, via the tier cascade. No staleness checks apply:
    /// a cache or local hit is returned unconditionally.
    pub async fn get_asset(&self, metadata: &AssetMetadata) -> Result<Asset> {
        let mut cascade = Cascade::<()>::new();
        let what = "asset";

        match self.cache.asset(metadata).await {
            Ok(asset) => {
                debug!(id = %metadata.id, "asset hit in cache tier");
                return Ok(asset);
            }
            Err(err) => self.note_asset_failure(TierName::Cache, &err, &mut cascade),
        }

        match self.local.asset(metadata).await {
            Ok(asset) => {
                debug!(id = %metadata.id, "asset hit in local tier");
                self.advise(TierName::Cache, what, self.cache.store_asset(&asset).await);
                return Ok(asset);
            }
            Err(err) => self.note_asset_failure(TierName::Local, &err, &mut cascade),
        }

        info!(id = %metadata.id, "fetching asset from remote");
        match self.remote.asset(metadata).await {
            Ok(asset) => {
                let (cache_result, local_result) = tokio::join!(
                    self.cache.store_asset(&asset),
                    self.local.store_asset(&asset),
                );
                self.advise(TierName::Cache, what, cache_result);
                self.advise(TierName::Local, what, local_result);
                Ok(asset)
            }
            Err(err) => {
                cascade.note_failure(TierName::Remote, &err);
                Err(cascade.into_aggregate_error())
            }
        }
    }

    /// Find an album by its display name, resolving through the cached album
    /// list.
    pub async fn get_album_by_name(&self, name: &str) -> Result<Album> {
        let albums = self.get_albums().await?;
        albums
            .into_iter()
            .find(|album| album.name == name)
            .ok_or_else(|| Error::AlbumNotFound(name.to_string()))
    }

    /// Report how the client is wired and whether the remote answers. The
    /// connectivity probe runs on every call; nothing is cached here.
    pub async fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            cache_configured: self.cache_configured,
            local_configured: self.local_configured,
            remote_configured: self.remote_configured,
            remote_connect_error: self.remote.check_connected().await.err().map(|e| e.to_string()),
        }
    }

    /// Configured refresh interval for collection results.
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    fn note_asset_failure(&self, tier: TierName, err: &Error, cascade: &mut Cascade<()>) {
        match err {
            Error::Miss => debug!(%tier, "asset miss"),
            Error::TypeMismatch { .. } => {
                warn!(%tier, %err, "stored record has the wrong kind, treating as miss")
            }
            _ => warn!(%tier, %err, "tier failed, continuing cascade"),
        }
        cascade.note_failure(tier, err);
    }

    /// Resolve a collection cascade whose remote leg failed: fall back to the
    /// newest stale result if one was seen, otherwise aggregate the failures.
    fn degrade<T>(&self, cascade: Cascade<T>, what: &str) -> Result<T> {
        if let Some(stale) = cascade.last_known_good {
            warn!(
                what,
                fetched_at = %stale.fetched_at,
                "remote unavailable, returning stale result"
            );
            return Ok(stale.value);
        }
        Err(cascade.into_aggregate_error())
    }

    /// Log-and-forget a write-back result. Warming faster tiers must never
    /// fail the read that triggered it.
    fn advise(&self, tier: TierName, what: &str, result: Result<()>) {
        if let Err(err) = result {
            warn!(%tier, what, %err, "write-back failed");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AssetKind;
    use assert_matches::assert_matches;
    use bytes::Bytes;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn make_album(id: &str, name: &str) -> Album {
        Album {
            id: AlbumId::from(id),
            name: name.into(),
            description: String::new(),
            order: Default::default(),
            asset_count: 0,
        }
    }

    fn make_metadata(id: &str) -> AssetMetadata {
        AssetMetadata {
            id: crate::catalog::AssetId::from(id),
            kind: AssetKind::Image,
            display_name: format!("{id}.jpg"),
            duration: None,
            exif: None,
            people: vec![],
        }
    }

    /// Scripted remote: serves a fixed album list, counts calls, and can be
    /// switched into a failing state.
    #[derive(Default)]
    struct ScriptedRemote {
        albums: Vec<Album>,
        calls: AtomicUsize,
        down: AtomicBool,
    }

    impl ScriptedRemote {
        fn serving(albums: Vec<Album>) -> Self {
            Self {
                albums,
                ..Default::default()
            }
        }

        fn take_down(&self) {
            self.down.store(true, Ordering::SeqCst);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn check_up(&self) -> Result<()> {
            if self.down.load(Ordering::SeqCst) {
                Err(Error::UnexpectedStatus(503))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait::async_trait]
    impl TierRead for ScriptedRemote {
        fn name(&self) -> TierName {
            TierName::Remote
        }

        async fn albums(&self) -> Result<Timestamped<Vec<Album>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.check_up()?;
            Ok(Timestamped::now(self.albums.clone()))
        }

        async fn album_assets(&self, _album: &AlbumId) -> Result<Timestamped<Vec<AssetMetadata>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.check_up()?;
            Ok(Timestamped::now(vec![make_metadata("m1")]))
        }

        async fn asset(&self, metadata: &AssetMetadata) -> Result<Asset> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.check_up()?;
            Ok(Asset::new(metadata.clone(), Bytes::from_static(b"payload")))
        }

        async fn check_connected(&self) -> Result<()> {
            self.check_up()
        }
    }

    fn client_with(
        cache: Option<Arc<dyn TierStore>>,
        remote: Arc<ScriptedRemote>,
        refresh: Duration,
    ) -> Client {
        let mut builder = Client::builder()
            .with_remote_tier(remote)
            .refresh_interval(refresh);
        if let Some(cache) = cache {
            builder = builder.with_cache_tier(cache);
        }
        builder.build().unwrap()
    }

    fn memory_tier() -> Arc<MemoryTier> {
        Arc::new(MemoryTier::new(MemoryCacheConfig::default()))
    }

    #[tokio::test]
    async fn remote_only_client_serves_albums() {
        let remote = Arc::new(ScriptedRemote::serving(vec![make_album("a1", "Trips")]));
        let client = client_with(None, Arc::clone(&remote), Duration::from_secs(600));

        let albums = client.get_albums().await.unwrap();
        assert_eq!(albums.len(), 1);
        assert_eq!(remote.calls(), 1);
    }

    #[tokio::test]
    async fn cache_hit_skips_the_remote() {
        let remote = Arc::new(ScriptedRemote::serving(vec![make_album("a1", "Trips")]));
        let cache = memory_tier();
        let client = client_with(
            Some(cache.clone()),
            Arc::clone(&remote),
            Duration::from_secs(600),
        );

        client.get_albums().await.unwrap();
        assert_eq!(remote.calls(), 1);

        // Within the refresh window: the cache must answer alone.
        client.get_albums().await.unwrap();
        assert_eq!(remote.calls(), 1);
    }

    #[tokio::test]
    async fn stale_cache_falls_through_to_remote() {
        let remote = Arc::new(ScriptedRemote::serving(vec![make_album("a1", "Fresh")]));
        let cache = memory_tier();

        let stale = Timestamped::at(
            vec![make_album("a1", "Stale")],
            Utc::now() - chrono::Duration::hours(2),
        );
        cache.store_albums(&stale).await.unwrap();

        let client = client_with(
            Some(cache.clone()),
            Arc::clone(&remote),
            Duration::from_secs(600),
        );

        let albums = client.get_albums().await.unwrap();
        assert_eq!(albums[0].name, "Fresh");
        assert_eq!(remote.calls(), 1);

        // The fresh result was written back; the cache now short-circuits.
        client.get_albums().await.unwrap();
        assert_eq!(remote.calls(), 1);
    }

    #[tokio::test]
    async fn stale_cache_is_returned_when_remote_is_down() {
        let remote = Arc::new(ScriptedRemote::serving(vec![]));
        remote.take_down();
        let cache = memory_tier();

        let stale = Timestamped::at(
            vec![make_album("a1", "Old but usable")],
            Utc::now() - chrono::Duration::hours(2),
        );
        cache.store_albums(&stale).await.unwrap();

        let client = client_with(
            Some(cache.clone()),
            Arc::clone(&remote),
            Duration::from_secs(600),
        );

        let albums = client.get_albums().await.unwrap();
        assert_eq!(albums[0].name, "Old but usable");
    }

    #[tokio::test]
    async fn zero_interval_keeps_old_results_fresh() {
        let remote = Arc::new(ScriptedRemote::serving(vec![make_album("a1", "Remote")]));
        let cache = memory_tier();

        let old = Timestamped::at(
            vec![make_album("a1", "Ancient")],
            Utc::now() - chrono::Duration::days(30),
        );
        cache.store_albums(&old).await.unwrap();

        let client = client_with(Some(cache), Arc::clone(&remote), Duration::ZERO);

        let albums = client.get_albums().await.unwrap();
        assert_eq!(albums[0].name, "Ancient");
        assert_eq!(remote.calls(), 0);
    }

    #[tokio::test]
    async fn all_noop_tiers_aggregate_failures() {
        let client = Client::builder().build().unwrap();

        assert_matches!(client.get_albums().await, Err(Error::AllTiersFailed(_)));
        assert_matches!(
            client.get_album_assets(&AlbumId::from("a")).await,
            Err(Error::AllTiersFailed(_))
        );
        assert_matches!(
            client.get_asset(&make_metadata("x")).await,
            Err(Error::AllTiersFailed(_))
        );
    }

    #[tokio::test]
    async fn aggregate_error_names_each_tier() {
        let client = Client::builder().build().unwrap();

        let err = client.get_albums().await.unwrap_err();
        let text = err.to_string();
        assert!(text.contains("cache:"), "unexpected error text: {text}");
        assert!(text.contains("local:"), "unexpected error text: {text}");
        assert!(text.contains("remote:"), "unexpected error text: {text}");
    }

    #[tokio::test]
    async fn album_by_name_resolves_through_the_cascade() {
        let remote = Arc::new(ScriptedRemote::serving(vec![
            make_album("a1", "Trips"),
            make_album("a2", "Pets"),
        ]));
        let client = client_with(None, Arc::clone(&remote), Duration::from_secs(600));

        let album = client.get_album_by_name("Pets").await.unwrap();
        assert_eq!(album.id, AlbumId::from("a2"));

        assert_matches!(
            client.get_album_by_name("Nope").await,
            Err(Error::AlbumNotFound(_))
        );
    }

    #[tokio::test]
    async fn diagnostics_reports_wiring_and_probe() {
        let remote = Arc::new(ScriptedRemote::serving(vec![]));
        let client = client_with(Some(memory_tier()), Arc::clone(&remote), Duration::ZERO);

        let diag = client.diagnostics().await;
        assert!(diag.cache_configured);
        assert!(!diag.local_configured);
        assert!(diag.remote_configured);
        assert_eq!(diag.remote_connect_error, None);

        remote.take_down();
        let diag = client.diagnostics().await;
        assert!(diag.remote_connect_error.is_some());
    }

    #[tokio::test]
    async fn diagnostics_with_no_remote_reports_unconfigured() {
        let client = Client::builder().build().unwrap();

        let diag = client.diagnostics().await;
        assert!(!diag.remote_configured);
        assert_eq!(
            diag.remote_connect_error.as_deref(),
            Some("tier not configured")
        );
    }

    #[tokio::test]
    async fn newest_stale_result_wins_the_degraded_fallback() {
        let remote = Arc::new(ScriptedRemote::serving(vec![]));
        remote.take_down();

        let cache = memory_tier();
        let local = memory_tier();

        // Local holds the newer stale copy.
        cache
            .store_albums(&Timestamped::at(
                vec![make_album("a1", "Older")],
                Utc::now() - chrono::Duration::hours(4),
            ))
            .await
            .unwrap();
        local
            .store_albums(&Timestamped::at(
                vec![make_album("a1", "Newer")],
                Utc::now() - chrono::Duration::hours(1),
            ))
            .await
            .unwrap();

        let client = Client::builder()
            .with_cache_tier(cache)
            .with_local_tier(local)
            .with_remote_tier(remote)
            .refresh_interval(Duration::from_secs(60))
            .build()
            .unwrap();

        let albums = client.get_albums().await.unwrap();
        assert_eq!(albums[0].name, "Newer");
    }
}
