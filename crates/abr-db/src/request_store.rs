use abr_model::ProcessingStatus;
use tracing::instrument;

use crate::models::RequestRecord;
use crate::store::{DbError, Store};

impl Store {
    pub fn get_request(&self, asin: &str, user: &str) -> Result<Option<RequestRecord>, DbError> {
        let r = self.db().r_transaction()?;
        let record = r.get().primary(RequestRecord::key(asin, user))?;
        Ok(record)
    }

    pub fn requests_for_asin(&self, asin: &str) -> Result<Vec<RequestRecord>, DbError> {
        let r = self.db().r_transaction()?;
        let all = r
            .scan()
            .primary::<RequestRecord>()?
            .all()?
            .filter_map(|r| r.ok())
            .filter(|r| r.asin == asin)
            .collect();
        Ok(all)
    }

    /// All requests eligible for the monitor to consider: book not
    /// downloaded, has a hash or a non-pending status, and not already
    /// terminally failed. `downloaded_asins` is supplied by the caller
    /// (joined against `BookRecord` by the monitor) rather than computed
    /// here, to keep this a single-table scan.
    pub fn requests_pending_monitor(
        &self,
        downloaded_asins: &std::collections::HashSet<String>,
    ) -> Result<Vec<RequestRecord>, DbError> {
        let r = self.db().r_transaction()?;
        let all = r
            .scan()
            .primary::<RequestRecord>()?
            .all()?
            .filter_map(|r| r.ok())
            .filter(|req| {
                !downloaded_asins.contains(&req.asin)
                    && (req.torrent_hash.is_some() || req.processing_status != "pending")
                    && !req.status().is_failed()
            })
            .collect();
        Ok(all)
    }

    #[instrument(skip(self))]
    pub async fn insert_request(&self, record: RequestRecord) -> Result<(), DbError> {
        let (_guard, rw) = self.rw().await?;
        rw.insert(record)?;
        rw.commit()?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn save_request(&self, record: RequestRecord) -> Result<(), DbError> {
        let (_guard, rw) = self.rw().await?;
        rw.upsert(record)?;
        rw.commit()?;
        Ok(())
    }

    /// Reset to `pending`, clear the hash, zero progress, queue the
    /// download state.
    pub async fn retry_request(&self, asin: &str, user: &str) -> Result<Option<RequestRecord>, DbError> {
        let (_guard, rw) = self.rw().await?;
        let record: Option<RequestRecord> = rw.get().primary(RequestRecord::key(asin, user))?;
        let Some(mut record) = record else {
            rw.commit()?;
            return Ok(None);
        };
        record.torrent_hash = None;
        record.download_progress = 0.0;
        record.download_state = Some("queued".to_string());
        record.set_status(ProcessingStatus::Pending);
        rw.upsert(record.clone())?;
        rw.commit()?;
        Ok(Some(record))
    }

    /// Remove Request rows for `(identifier, user)`, or every user's row
    /// for that identifier when `all_users` is set (admin path). Caller
    /// is responsible for tearing down any associated torrent first.
    pub async fn delete_requests(
        &self,
        asin: &str,
        user: &str,
        all_users: bool,
    ) -> Result<usize, DbError> {
        let (_guard, rw) = self.rw().await?;
        let victims: Vec<RequestRecord> = rw
            .scan()
            .primary::<RequestRecord>()?
            .all()?
            .filter_map(|r| r.ok())
            .filter(|r| r.asin == asin && (all_users || r.user == user))
            .collect();
        let count = victims.len();
        for v in victims {
            rw.remove(v)?;
        }
        rw.commit()?;
        Ok(count)
    }
}
