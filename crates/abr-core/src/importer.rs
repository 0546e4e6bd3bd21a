use std::path::PathBuf;
use std::sync::Arc;

use abr_config::{ConfigStore, keys};
use abr_db::{ImportItemRecord, ImportItemStatus, ImportSessionRecord, ImportSessionStatus, RequestRecord, Store};
use abr_meta::MetadataClient;
use abr_model::{ProcessingStatus, Region};
use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use crate::error::{CoreError, CoreResult};
use crate::matcher;
use crate::processor::Processor;
use crate::scanner::{self, BookUnit};

const SCAN_CONCURRENCY: usize = 5;
const IMPORT_CONCURRENCY: usize = 5;

/// A match scoring at or above this is trusted automatically; anything
/// lower is left for a human to confirm rather than risk filing the
/// wrong book. Mirrors `abr-ranking`'s own stance of a hard gate over a
/// soft score everywhere a wrong-automatic-match would be expensive to
/// undo.
const MATCH_ACCEPT_THRESHOLD: f64 = 0.82;

/// Drives the library scanner (`L`) and match engine (`M`) over a
/// session's root, then the import executor (`N`) over the resulting
/// `matched` items. Grounded on `mlm_core`'s scan-then-import pipeline,
/// generalized from its fixed single-tracker match step to this crate's
/// `matcher` module.
pub struct Importer {
    store: Arc<Store>,
    config: Arc<ConfigStore<Arc<Store>>>,
    meta: Arc<MetadataClient>,
    processor: Arc<Processor>,
}

impl Importer {
    pub fn new(store: Arc<Store>, config: Arc<ConfigStore<Arc<Store>>>, meta: Arc<MetadataClient>, processor: Arc<Processor>) -> Self {
        Self { store, config, meta, processor }
    }

    pub async fn start_session(&self, root_path: String, owner: String) -> CoreResult<ImportSessionRecord> {
        Ok(self.store.create_import_session(root_path, owner).await?)
    }

    /// Scans `session.root_path`, matching each discovered unit against
    /// the metadata client with up to `SCAN_CONCURRENCY` lookups
    /// in flight, then leaves the session `review_ready`.
    #[instrument(skip(self, session))]
    pub async fn run_scan(&self, session: &ImportSessionRecord, region: Region) -> CoreResult<()> {
        let root = PathBuf::from(&session.root_path);
        let units = scanner::scan(&root);
        let semaphore = Arc::new(Semaphore::new(SCAN_CONCURRENCY));
        let mut handles = Vec::with_capacity(units.len());
        for unit in units {
            let semaphore = semaphore.clone();
            let meta = self.meta.clone();
            let store = self.store.clone();
            let session_id = session.id.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
                let item = match_one(&meta, &session_id, &unit, region).await;
                if let Err(e) = store.add_import_item(item).await {
                    warn!(error = %e, "failed to persist import item");
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
        self.store.set_import_session_status(&session.id, ImportSessionStatus::ReviewReady).await?;
        info!(session_id = %session.id, "scan complete, awaiting review");
        Ok(())
    }

    /// Drives every `matched` item in `session_id` through the
    /// processor, bounded at `IMPORT_CONCURRENCY` concurrent transfers.
    /// Settles the session to `completed` once every item has settled.
    #[instrument(skip(self))]
    pub async fn run_import(&self, session_id: &str, owner: &str) -> CoreResult<()> {
        let session = self.store.get_import_session(session_id)?.ok_or_else(|| CoreError::NotFound(format!("no import session {session_id}")))?;
        self.store.set_import_session_status(session_id, ImportSessionStatus::Importing).await?;

        let is_reconciliation = session.root_path == ImportSessionRecord::RECONCILIATION_ROOT;
        let matched = self.store.items_for_session_with_status(session_id, ImportItemStatus::Matched)?;

        let library_root = self.config.get(keys::LIBRARY_PATH).await.ok().flatten().unwrap_or_default();
        let folder_pattern = self.config.get_or(keys::FOLDER_PATTERN, "{author}/{title} ({year})").await.unwrap_or_else(|_| "{author}/{title} ({year})".to_string());
        let file_pattern = self.config.get_or(keys::FILE_PATTERN, "{title}").await.unwrap_or_else(|_| "{title}".to_string());
        let use_series_folders = self.config.get_bool(keys::USE_SERIES_FOLDERS, false).await.unwrap_or(false);

        let semaphore = Arc::new(Semaphore::new(IMPORT_CONCURRENCY));
        let mut handles = Vec::with_capacity(matched.len());
        for item in matched {
            let semaphore = semaphore.clone();
            let store = self.store.clone();
            let processor = self.processor.clone();
            let owner = owner.to_string();
            let library_root = library_root.clone();
            let folder_pattern = folder_pattern.clone();
            let file_pattern = file_pattern.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore is never closed");
                import_one(&store, &processor, item, &owner, is_reconciliation, &library_root, &folder_pattern, &file_pattern, use_series_folders).await
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }

        self.store.set_import_session_status(session_id, ImportSessionStatus::Completed).await?;
        info!(session_id, "import run settled");
        Ok(())
    }
}

async fn match_one(meta: &MetadataClient, session_id: &str, unit: &BookUnit, region: Region) -> ImportItemRecord {
    let mut item = ImportItemRecord::new(session_id.to_string(), unit.source_path());
    let guess = scanner::derive_guess(unit);
    item.detected_title = guess.title.clone();
    item.detected_author = guess.author.clone();

    if let Some(asin) = matcher::identifier_in_path(&item.source_path) {
        item.match_asin = Some(asin);
        item.match_score = Some(1.0);
        item.status = ImportItemStatus::Matched;
        return item;
    }

    let candidates = matcher::find_candidates(meta, &guess, region).await;
    match candidates.into_iter().next() {
        Some(top) if top.score >= MATCH_ACCEPT_THRESHOLD => {
            item.match_asin = Some(top.book.asin);
            item.match_score = Some(top.score as f32);
            item.status = ImportItemStatus::Matched;
        }
        Some(top) => {
            item.match_score = Some(top.score as f32);
            item.status = ImportItemStatus::Missing;
        }
        None => {
            item.status = ImportItemStatus::Missing;
        }
    }
    item
}

/// The download path `process_download`'s own `WalkDir` walk expects: a
/// single file, a directory, or (for a sibling collection) their common
/// parent directory — `WalkDir` over that parent naturally picks up
/// just those audio files.
fn download_path_for(source_path: &str) -> PathBuf {
    let first = source_path.split('|').next().unwrap_or(source_path);
    let path = PathBuf::from(first);
    if source_path.contains('|') { path.parent().map(|p| p.to_path_buf()).unwrap_or(path) } else { path }
}

#[allow(clippy::too_many_arguments)]
async fn import_one(
    store: &Arc<Store>,
    processor: &Arc<Processor>,
    mut item: ImportItemRecord,
    owner: &str,
    is_reconciliation: bool,
    library_root: &str,
    folder_pattern: &str,
    file_pattern: &str,
    use_series_folders: bool,
) {
    let Some(asin) = item.match_asin.clone() else {
        item.status = ImportItemStatus::Error;
        item.error_msg = Some("matched item has no asin".to_string());
        let _ = store.save_import_item(item).await;
        return;
    };

    let request = match store.get_request(&asin, owner) {
        Ok(Some(record)) => record,
        Ok(None) => {
            let record = RequestRecord::new(&asin, owner, None);
            if let Err(e) = store.insert_request(record.clone()).await {
                item.status = ImportItemStatus::Error;
                item.error_msg = Some(e.to_string());
                let _ = store.save_import_item(item).await;
                return;
            }
            record
        }
        Err(e) => {
            item.status = ImportItemStatus::Error;
            item.error_msg = Some(e.to_string());
            let _ = store.save_import_item(item).await;
            return;
        }
    };

    let delete_source = is_reconciliation;
    let download_path = download_path_for(&item.source_path);

    let result = if is_reconciliation {
        let book = match store.get_book(&asin) {
            Ok(Some(book)) => book,
            _ => {
                item.status = ImportItemStatus::Error;
                item.error_msg = Some("no cached book metadata for reconciliation".to_string());
                let _ = store.save_import_item(item).await;
                return;
            }
        };
        processor.reorganize_in_place(&book, &download_path).await.map(|_| download_path.clone())
    } else {
        processor
            .process_download(&request, &download_path, &PathBuf::from(library_root), folder_pattern, file_pattern, use_series_folders, delete_source)
            .await
    };

    match result {
        Ok(_) => {
            item.status = ImportItemStatus::Imported;
        }
        Err(reason) => {
            item.status = ImportItemStatus::Error;
            item.error_msg = Some(reason.chars().take(500).collect());
            if request.status() == ProcessingStatus::Pending {
                let mut failed = request;
                failed.set_status(ProcessingStatus::Failed(item.error_msg.clone().unwrap_or_default()));
                let _ = store.save_request(failed).await;
            }
        }
    }
    let _ = store.save_import_item(item).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use abr_meta::{PrimaryProvider, SecondaryProvider};

    fn client() -> MetadataClient {
        MetadataClient::new(Box::new(PrimaryProvider::new("http://localhost:1")), Box::new(SecondaryProvider::new("http://localhost:1")))
    }

    #[tokio::test]
    async fn identifier_in_path_short_circuits_match_one() {
        let unit = BookUnit::SingleFile(PathBuf::from("/library/B0C1H26C46/book.m4b"));
        let item = match_one(&client(), "session-1", &unit, Region::Us).await;
        assert_eq!(item.match_asin.as_deref(), Some("B0C1H26C46"));
        assert_eq!(item.status, ImportItemStatus::Matched);
        assert_eq!(item.match_score, Some(1.0));
    }

    #[test]
    fn download_path_for_collection_resolves_to_shared_parent() {
        let joined = "/lib/Book/a.mp3|/lib/Book/b.mp3";
        assert_eq!(download_path_for(joined), PathBuf::from("/lib/Book"));
    }

    #[test]
    fn download_path_for_single_file_is_itself() {
        assert_eq!(download_path_for("/lib/Book/a.mp3"), PathBuf::from("/lib/Book/a.mp3"));
    }
}
