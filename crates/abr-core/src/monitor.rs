use std::path::PathBuf;
use std::sync::Arc;

use abr_config::{ConfigStore, keys};
use abr_db::Store;
use abr_model::ProcessingStatus;
use abr_torrent::{ListFilter, TorrentClient, TorrentInfo};
use tracing::{info, instrument, warn};

use crate::processor::Processor;

/// Periodic reconciliation between the Request table and the torrent
/// daemon's live state: advances download progress, hands finished
/// downloads to the `Processor`, and self-heals a request whose
/// recorded hash no longer exists on the daemon (re-added externally,
/// daemon restart that rewrote IDs, etc.) by locating it again through
/// the `asin:<id>` tag. Grounded on `mlm_core`'s torrent reconcile tick,
/// generalized from one tracker's category filter to a configurable one.
pub struct Monitor {
    store: Arc<Store>,
    config: Arc<ConfigStore<Arc<Store>>>,
    torrent: Arc<dyn TorrentClient>,
    processor: Arc<Processor>,
}

impl Monitor {
    pub fn new(
        store: Arc<Store>,
        config: Arc<ConfigStore<Arc<Store>>>,
        torrent: Arc<dyn TorrentClient>,
        processor: Arc<Processor>,
    ) -> Self {
        Self { store, config, torrent, processor }
    }

    /// One reconciliation pass. Never returns an error: every failure
    /// mode here (a daemon outage, a bad config value, an individual
    /// request's processing error) is handled per-request and logged,
    /// so one bad row never stalls the whole tick.
    #[instrument(skip(self))]
    pub async fn tick(&self) {
        let category = self.config.get(keys::QBIT_CATEGORY).await.ok().flatten();
        let torrents = self.torrent.list(ListFilter { filter: None, category: category.clone() }).await;

        let downloaded = match self.store.downloaded_asins() {
            Ok(set) => set,
            Err(e) => {
                warn!(error = %e, "monitor: failed to load downloaded asins");
                return;
            }
        };
        let pending = match self.store.requests_pending_monitor(&downloaded) {
            Ok(rows) => rows,
            Err(e) => {
                warn!(error = %e, "monitor: failed to load pending requests");
                return;
            }
        };

        for request in pending {
            self.reconcile_one(request, &torrents).await;
        }
    }

    async fn reconcile_one(&self, mut request: abr_db::RequestRecord, torrents: &[TorrentInfo]) {
        let Some(hash) = &request.torrent_hash else {
            return;
        };

        let info = torrents.iter().find(|t| t.hash.eq_ignore_ascii_case(hash)).cloned().or_else(|| {
            let tag = format!("asin:{}", request.asin);
            torrents.iter().find(|t| t.tags.iter().any(|existing| existing == &tag)).cloned()
        });

        let Some(info) = info else {
            warn!(asin = %request.asin, hash, "monitor: torrent missing, marking failed");
            request.set_status(ProcessingStatus::Failed("torrent_missing".to_string()));
            let _ = self.store.save_request(request).await;
            return;
        };

        if info.hash != *hash {
            info!(asin = %request.asin, old_hash = hash, new_hash = %info.hash, "monitor: self-healed torrent hash via asin tag");
            request.torrent_hash = Some(info.hash.clone());
        }

        if info.progress < 1.0 {
            request.download_progress = (info.progress as f32) * 0.9;
            if request.status() == ProcessingStatus::DownloadInitiated {
                request.set_status(ProcessingStatus::Queued);
            } else {
                request.touch();
            }
            let _ = self.store.save_request(request).await;
            return;
        }

        if request.status().is_terminal() {
            return;
        }

        let library_root = self.config.get(keys::LIBRARY_PATH).await.ok().flatten();
        let folder_pattern = self.config.get_or(keys::FOLDER_PATTERN, "{author}/{title} ({year})").await.unwrap_or_else(|_| "{author}/{title} ({year})".to_string());
        let file_pattern = self.config.get_or(keys::FILE_PATTERN, "{title}").await.unwrap_or_else(|_| "{title}".to_string());
        let use_series_folders = self.config.get_bool(keys::USE_SERIES_FOLDERS, false).await.unwrap_or(false);

        let Some(library_root) = library_root else {
            request.set_status(ProcessingStatus::Failed("library_path is not configured".to_string()));
            let _ = self.store.save_request(request).await;
            return;
        };

        let download_path = PathBuf::from(&info.content_path);
        let complete_action = self.config.get_or(keys::QBIT_COMPLETE_ACTION, "copy").await.unwrap_or_else(|_| "copy".to_string());
        let delete_source = complete_action == "move";

        match self
            .processor
            .process_download(&request, &download_path, &PathBuf::from(&library_root), &folder_pattern, &file_pattern, use_series_folders, delete_source)
            .await
        {
            Ok(dest) => {
                info!(asin = %request.asin, dest = %dest.display(), "monitor: processing complete");
                let _ = self.torrent.tag(&info.hash, &["processed".to_string()]).await;
                if complete_action == "remove" {
                    let _ = self.torrent.delete(&info.hash, false).await;
                }
            }
            Err(reason) => {
                warn!(asin = %request.asin, %reason, "monitor: processing failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abr_db::RequestRecord;
    use abr_model::Book;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct StubTorrent {
        torrents: Mutex<Vec<TorrentInfo>>,
    }

    #[async_trait]
    impl TorrentClient for StubTorrent {
        async fn login(&self) -> abr_torrent::LoginResult {
            abr_torrent::LoginResult { ok: true, status_code: 200, text: "Ok.".to_string() }
        }
        async fn add(&self, _request: abr_torrent::AddRequest) -> bool {
            true
        }
        async fn list(&self, _filter: ListFilter) -> Vec<TorrentInfo> {
            self.torrents.lock().unwrap().clone()
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

    fn torrent_info(hash: &str, progress: f64, tags: &[&str]) -> TorrentInfo {
        TorrentInfo {
            hash: hash.to_string(),
            name: "name".to_string(),
            content_path: "/downloads/name".to_string(),
            state: "downloading".to_string(),
            progress,
            dlspeed: 0,
            eta: 0,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            category: "audiobooks".to_string(),
        }
    }

    fn book() -> Book {
        Book {
            asin: "B1".to_string(),
            title: "Sample".to_string(),
            subtitle: None,
            authors: vec!["Author".to_string()],
            narrators: vec![],
            cover_url: None,
            release_date: None,
            runtime_minutes: None,
            series: vec![],
            genres: vec![],
            publisher: None,
            description: None,
            language: None,
        }
    }

    async fn monitor_with(torrents: Vec<TorrentInfo>) -> (Monitor, Arc<Store>) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let config = Arc::new(ConfigStore::new(store.clone()));
        let torrent: Arc<dyn TorrentClient> = Arc::new(StubTorrent { torrents: Mutex::new(torrents) });
        let processor = Arc::new(Processor::new(store.clone()));
        store.upsert_books(vec![book()]).await.unwrap();
        (Monitor::new(store.clone(), config, torrent, processor), store)
    }

    #[tokio::test]
    async fn in_progress_torrent_advances_scaled_progress() {
        let (monitor, store) = monitor_with(vec![torrent_info("HASH1", 0.5, &["asin:B1"])]).await;
        let mut record = RequestRecord::new("B1", "alice", None);
        record.torrent_hash = Some("HASH1".to_string());
        record.set_status(ProcessingStatus::DownloadInitiated);
        store.insert_request(record.clone()).await.unwrap();

        monitor.reconcile_one(record, &monitor.torrent.list(ListFilter::default()).await).await;

        let updated = store.get_request("B1", "alice").unwrap().unwrap();
        assert_eq!(updated.download_progress, 0.45);
        assert_eq!(updated.status(), ProcessingStatus::Queued);
    }

    #[tokio::test]
    async fn missing_torrent_marks_request_failed() {
        let (monitor, store) = monitor_with(vec![]).await;
        let mut record = RequestRecord::new("B1", "alice", None);
        record.torrent_hash = Some("GONE".to_string());
        store.insert_request(record.clone()).await.unwrap();

        monitor.reconcile_one(record, &[]).await;

        let updated = store.get_request("B1", "alice").unwrap().unwrap();
        assert!(updated.status().is_failed());
    }

    #[tokio::test]
    async fn hash_self_heals_via_asin_tag_when_original_hash_is_gone() {
        let (monitor, store) = monitor_with(vec![torrent_info("NEWHASH", 0.5, &["asin:B1"])]).await;
        let mut record = RequestRecord::new("B1", "alice", None);
        record.torrent_hash = Some("OLDHASH".to_string());
        store.insert_request(record.clone()).await.unwrap();

        let torrents = monitor.torrent.list(ListFilter::default()).await;
        monitor.reconcile_one(record, &torrents).await;

        let updated = store.get_request("B1", "alice").unwrap().unwrap();
        assert_eq!(updated.torrent_hash.as_deref(), Some("NEWHASH"));
    }
}
