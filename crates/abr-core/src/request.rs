use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use abr_cache::{SingleFlight, SingleFlightError};
use abr_config::{ConfigStore, keys};
use abr_db::{RequestRecord, Store};
use abr_indexer::{EnricherRegistry, IndexerGateway};
use abr_meta::MetadataClient;
use abr_model::{Book, ProcessingStatus, Region};
use abr_ranking::rank;
use abr_torrent::{AddRequest, TorrentClient};
use tracing::{info, instrument, warn};

use crate::config_snapshot::{load_ranking_config, snapshot_for_adapters};
use crate::error::{CoreError, CoreResult};
use crate::scanner;
use crate::torrent_hash::{hash_from_magnet, hash_from_torrent_bytes};

const SINGLE_FLIGHT_TIMEOUT: Duration = Duration::from_millis(50);

const ADAPTER_CONFIG_KEYS: &[&str] = &[keys::PROWLARR_BASE_URL, keys::PROWLARR_API_KEY];

/// Result of a query-and-dispatch pass. None of these are errors: a
/// `CoreError` is reserved for requests that can't even be looked up or
/// a misconfigured dependency, not for "nothing worth downloading yet".
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// A torrent was added (or one was already active/completed).
    Dispatched(RequestRecord),
    /// The aggregator returned no sources at all for this query.
    Uncached,
    /// Sources came back but none survived ranking's hard gate.
    NoAcceptableSource,
    /// Another caller is already querying/dispatching this identifier.
    Querying,
}

/// Owns the request lifecycle: creation, the query-and-dispatch pass
/// that turns a pending request into an active torrent, deletion, and
/// retry. Mirrors `mlm_core`'s top-level request handler, generalized
/// from a single pinned indexer to the pluggable gateway/ranking/torrent
/// trio built in this crate's sibling crates.
pub struct RequestService {
    store: Arc<Store>,
    config: Arc<ConfigStore<Arc<Store>>>,
    meta: Arc<MetadataClient>,
    gateway: Arc<IndexerGateway>,
    enrichers: Arc<EnricherRegistry>,
    torrent: Arc<dyn TorrentClient>,
    http: reqwest::Client,
    dispatch_lock: SingleFlight<String>,
}

impl RequestService {
    pub fn new(
        store: Arc<Store>,
        config: Arc<ConfigStore<Arc<Store>>>,
        meta: Arc<MetadataClient>,
        gateway: Arc<IndexerGateway>,
        enrichers: Arc<EnricherRegistry>,
        torrent: Arc<dyn TorrentClient>,
    ) -> Self {
        Self {
            store,
            config,
            meta,
            gateway,
            enrichers,
            torrent,
            http: reqwest::Client::new(),
            dispatch_lock: SingleFlight::new(),
        }
    }

    /// Resolves a book by identifier, preferring a fresh cache row over a
    /// metadata-provider round trip, and upserts whatever is found.
    #[instrument(skip(self))]
    pub async fn resolve_book(&self, identifier: &str, region: Region) -> CoreResult<Book> {
        let ttl_secs = self.config.get_int(keys::BOOK_CACHE_TTL_SECS, 86_400).await.unwrap_or(86_400);
        if let Ok(mut cached) = self.store.get_existing_books(&[identifier.to_string()], ttl_secs)
            && let Some(book) = cached.remove(identifier)
        {
            return Ok(book);
        }

        let book = self
            .meta
            .fetch_book(identifier, region)
            .await
            .ok_or_else(|| CoreError::NotFound(format!("no book found for identifier {identifier}")))?;

        let mut merged = self.store.upsert_books(vec![book.clone()]).await?;
        Ok(merged.pop().unwrap_or(book))
    }

    /// Creates (or returns the existing) request for `(identifier,
    /// user)`, then immediately kicks off one query-and-dispatch pass.
    /// Fails before any row is written if the book is already marked
    /// downloaded or is already present on disk under the library root.
    #[instrument(skip(self))]
    pub async fn create_request(
        &self,
        identifier: &str,
        user: &str,
        region: Region,
    ) -> CoreResult<(RequestRecord, DispatchOutcome)> {
        if self.store.is_book_downloaded(identifier)? {
            return Err(CoreError::Conflict(format!("{identifier} is already downloaded")));
        }

        if let Some(library_path) = self.config.get(keys::LIBRARY_PATH).await.ok().flatten() {
            let root = PathBuf::from(&library_path);
            if root.is_absolute() && scanner::find_by_identifier(&root, identifier).is_some() {
                return Err(CoreError::Conflict(format!("{identifier} already exists in the library")));
            }
        }

        self.resolve_book(identifier, region).await?;

        let existing = self.store.get_request(identifier, user)?;
        let record = match existing {
            Some(record) => record,
            None => {
                let record = RequestRecord::new(identifier, user, Some(region.code().to_string()));
                self.store.insert_request(record.clone()).await?;
                info!(identifier, user, "request created");
                record
            }
        };

        let outcome = self.query_and_dispatch(identifier, user).await?;
        let refreshed = self.store.get_request(identifier, user)?.unwrap_or(record);
        Ok((refreshed, outcome))
    }

    /// Searches, ranks, and submits a torrent for a pending request. A
    /// request that already has an active or completed dispatch (a
    /// torrent hash, or a non-pending/non-failed status) is reported as
    /// already `Dispatched` rather than re-queried.
    #[instrument(skip(self))]
    pub async fn query_and_dispatch(&self, identifier: &str, user: &str) -> CoreResult<DispatchOutcome> {
        let record = self
            .store
            .get_request(identifier, user)?
            .ok_or_else(|| CoreError::NotFound(format!("no request for {identifier}/{user}")))?;

        if record.torrent_hash.is_some() || (record.status() != ProcessingStatus::Pending && !record.status().is_failed()) {
            return Ok(DispatchOutcome::Dispatched(record));
        }

        let guard = match self.dispatch_lock.try_acquire(identifier.to_string(), SINGLE_FLIGHT_TIMEOUT).await {
            Ok(guard) => guard,
            Err(SingleFlightError::InProgress) => return Ok(DispatchOutcome::Querying),
        };

        let prowlarr_base = self.config.get(keys::PROWLARR_BASE_URL).await.ok().flatten();
        let prowlarr_key = self.config.get(keys::PROWLARR_API_KEY).await.ok().flatten();
        let (Some(_base), Some(_key)) = (&prowlarr_base, &prowlarr_key) else {
            drop(guard);
            return Err(CoreError::Misconfigured("prowlarr_base_url/prowlarr_api_key are not configured".to_string()));
        };

        let book = self
            .store
            .get_book(identifier)?
            .ok_or_else(|| CoreError::NotFound(format!("no cached book for {identifier}")))?;

        let categories = self.int_list(keys::PROWLARR_CATEGORIES).await;
        let indexer_ids = self.int_list(keys::PROWLARR_INDEXERS).await;
        let limit = self.config.get_int(keys::PROWLARR_SEARCH_LIMIT, 50).await.unwrap_or(50).max(1) as u32;
        let ttl_secs = self.config.get_int(keys::PROWLARR_SOURCE_TTL, 3_600).await.unwrap_or(3_600);

        let mut sources = self.gateway.search(&book, &categories, &indexer_ids, limit, Duration::from_secs(ttl_secs.max(0) as u64), false).await;
        if sources.is_empty() {
            drop(guard);
            return Ok(DispatchOutcome::Uncached);
        }

        let adapter_config = snapshot_for_adapters(&self.config, ADAPTER_CONFIG_KEYS).await;
        self.enrichers.enrich(&book, &mut sources, &adapter_config).await;

        let ranking_config = load_ranking_config(&self.config).await;
        let ranked = rank(&book, sources, &ranking_config);
        let Some(top) = ranked.into_iter().next() else {
            drop(guard);
            return Ok(DispatchOutcome::NoAcceptableSource);
        };

        let category = self.config.get(keys::QBIT_CATEGORY).await.ok().flatten();
        let save_path = self.config.get(keys::QBIT_SAVE_PATH).await.ok().flatten();
        let tags = vec![format!("asin:{identifier}")];

        let (payload, is_magnet, hash) = if let Some(magnet) = &top.source.magnet_url {
            (magnet.clone().into_bytes(), true, hash_from_magnet(magnet))
        } else if let Some(url) = &top.source.download_url {
            match self.http.get(url).send().await.and_then(|r| r.error_for_status()) {
                Ok(resp) => match resp.bytes().await {
                    Ok(bytes) => {
                        let hash = hash_from_torrent_bytes(&bytes);
                        (bytes.to_vec(), false, hash)
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to read torrent body");
                        drop(guard);
                        return Ok(DispatchOutcome::NoAcceptableSource);
                    }
                },
                Err(e) => {
                    warn!(error = %e, "failed to download torrent file");
                    drop(guard);
                    return Ok(DispatchOutcome::NoAcceptableSource);
                }
            }
        } else {
            drop(guard);
            return Ok(DispatchOutcome::NoAcceptableSource);
        };

        let add_request = AddRequest { payload, is_magnet, tags, category, save_path };
        let added = self.torrent.add(add_request).await;
        drop(guard);

        if !added {
            let mut record = record;
            record.set_status(ProcessingStatus::Failed("torrent daemon rejected add".to_string()));
            self.store.save_request(record.clone()).await?;
            return Ok(DispatchOutcome::Dispatched(record));
        }

        let mut record = record;
        record.torrent_hash = hash;
        record.download_state = Some("queued".to_string());
        record.set_status(ProcessingStatus::DownloadInitiated);
        self.store.save_request(record.clone()).await?;
        info!(identifier, hash = ?record.torrent_hash, "torrent dispatched");
        Ok(DispatchOutcome::Dispatched(record))
    }

    async fn int_list(&self, key: &str) -> Vec<i64> {
        self.config.get_list(key).await.unwrap_or_default().iter().filter_map(|s| s.parse().ok()).collect()
    }

    /// Removes the request row(s) and, if a torrent is attached, tears it
    /// down on the daemon first (files kept; the user may still want the
    /// partial download).
    #[instrument(skip(self))]
    pub async fn delete_request(&self, identifier: &str, user: &str, all_users: bool) -> CoreResult<usize> {
        let victims = if all_users {
            self.store.requests_for_asin(identifier)?
        } else {
            self.store.get_request(identifier, user)?.into_iter().collect()
        };
        for victim in &victims {
            if let Some(hash) = &victim.torrent_hash {
                let _ = self.torrent.delete(hash, false).await;
            }
        }
        let removed = self.store.delete_requests(identifier, user, all_users).await?;
        Ok(removed)
    }

    /// Resets a request to `pending` and re-runs query-and-dispatch. Used
    /// both for a user-initiated retry and for the monitor's
    /// torrent-went-missing self-heal.
    #[instrument(skip(self))]
    pub async fn retry_request(&self, identifier: &str, user: &str) -> CoreResult<DispatchOutcome> {
        let record = self
            .store
            .retry_request(identifier, user)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("no request for {identifier}/{user}")))?;
        let _ = record;
        self.query_and_dispatch(identifier, user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abr_config::keys;
    use abr_db::Store;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct AlwaysRejectTorrent {
        add_called: AtomicBool,
    }

    #[async_trait]
    impl TorrentClient for AlwaysRejectTorrent {
        async fn login(&self) -> abr_torrent::LoginResult {
            abr_torrent::LoginResult { ok: true, status_code: 200, text: "Ok.".to_string() }
        }
        async fn add(&self, _request: AddRequest) -> bool {
            self.add_called.store(true, Ordering::SeqCst);
            false
        }
        async fn list(&self, _filter: abr_torrent::ListFilter) -> Vec<abr_torrent::TorrentInfo> {
            Vec::new()
        }
        async fn tag(&self, _hash: &str, _tags: &[String]) -> bool {
            true
        }
        async fn delete(&self, _hash: &str, _delete_files: bool) -> bool {
            true
        }
        async fn test(&self) -> abr_torrent::TestResult {
            abr_torrent::TestResult { ok: true, message: "ok".to_string() }
        }
    }

    fn sample_book() -> Book {
        Book {
            asin: "B1".to_string(),
            title: "Sample".to_string(),
            subtitle: None,
            authors: vec!["Author".to_string()],
            narrators: vec![],
            cover_url: None,
            release_date: None,
            runtime_minutes: Some(600),
            series: vec![],
            genres: vec![],
            publisher: None,
            description: None,
            language: None,
        }
    }

    async fn service() -> (RequestService, Arc<Store>) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let config = Arc::new(ConfigStore::new(store.clone()));
        let meta = Arc::new(MetadataClient::new(
            Box::new(abr_meta::PrimaryProvider::new("http://example.invalid")),
            Box::new(abr_meta::SecondaryProvider::new("http://example.invalid")),
        ));
        let gateway = Arc::new(IndexerGateway::new("http://example.invalid", "key"));
        let enrichers = Arc::new(EnricherRegistry::new(Vec::new()));
        let torrent: Arc<dyn TorrentClient> = Arc::new(AlwaysRejectTorrent { add_called: AtomicBool::new(false) });
        config.set(keys::PROWLARR_BASE_URL, "http://example.invalid").await.unwrap();
        config.set(keys::PROWLARR_API_KEY, "key").await.unwrap();
        store.upsert_books(vec![sample_book()]).await.unwrap();
        (RequestService::new(store.clone(), config, meta, gateway, enrichers, torrent), store)
    }

    #[tokio::test]
    async fn query_and_dispatch_with_no_sources_is_uncached() {
        let (svc, store) = service().await;
        let record = RequestRecord::new("B1", "alice", None);
        store.insert_request(record).await.unwrap();
        let outcome = svc.query_and_dispatch("B1", "alice").await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Uncached);
    }

    #[tokio::test]
    async fn already_dispatched_request_short_circuits() {
        let (svc, store) = service().await;
        let mut record = RequestRecord::new("B1", "alice", None);
        record.torrent_hash = Some("deadbeef".to_string());
        store.insert_request(record).await.unwrap();
        let outcome = svc.query_and_dispatch("B1", "alice").await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::Dispatched(r) if r.torrent_hash.as_deref() == Some("deadbeef")));
    }

    #[tokio::test]
    async fn missing_request_is_not_found() {
        let (svc, _store) = service().await;
        let err = svc.query_and_dispatch("missing", "alice").await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }
}
