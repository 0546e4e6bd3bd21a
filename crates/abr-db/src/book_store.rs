use std::collections::HashMap;

use abr_model::Book;
use time::OffsetDateTime;
use tracing::{debug, info, instrument};

use crate::models::BookRecord;
use crate::store::{DbError, Store};

impl Store {
    /// Only books that are fresh (`updated_at` within `ttl`) *and*
    /// complete (non-empty `series`) count as cache hits; anything else
    /// is treated as stale to force a re-fetch from the metadata client.
    #[instrument(skip(self, identifiers))]
    pub fn get_existing_books(
        &self,
        identifiers: &[String],
        ttl_secs: i64,
    ) -> Result<HashMap<String, Book>, DbError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let r = self.db().r_transaction()?;
        let mut out = HashMap::new();
        for asin in identifiers {
            let record: Option<BookRecord> = r.get().primary(asin.clone())?;
            if let Some(record) = record
                && record.is_fresh(ttl_secs, now)
            {
                out.insert(record.asin.clone(), record.to_book());
            }
        }
        Ok(out)
    }

    /// Preserve `downloaded` on an existing row, overwrite everything
    /// else; insert new rows outright. Returns the merged, store-attached
    /// books.
    #[instrument(skip(self, books))]
    pub async fn upsert_books(&self, books: Vec<Book>) -> Result<Vec<Book>, DbError> {
        let (_guard, rw) = self.rw().await?;
        let mut merged = Vec::with_capacity(books.len());
        for book in books {
            let existing: Option<BookRecord> = rw.get().primary(book.asin.clone())?;
            let downloaded = existing.map(|e| e.downloaded).unwrap_or(false);
            let record = BookRecord::from_book(book, downloaded);
            merged.push(record.to_book());
            rw.upsert(record)?;
        }
        rw.commit()?;
        Ok(merged)
    }

    pub fn get_book(&self, asin: &str) -> Result<Option<Book>, DbError> {
        let r = self.db().r_transaction()?;
        let record: Option<BookRecord> = r.get().primary(asin.to_string())?;
        Ok(record.map(|r| r.to_book()))
    }

    pub fn is_book_downloaded(&self, asin: &str) -> Result<bool, DbError> {
        let r = self.db().r_transaction()?;
        let record: Option<BookRecord> = r.get().primary(asin.to_string())?;
        Ok(record.map(|r| r.downloaded).unwrap_or(false))
    }

    /// Every asin currently flagged `downloaded`, used by the monitor to
    /// exclude already-finished books from its pending scan in one
    /// query rather than per-request lookups.
    pub fn downloaded_asins(&self) -> Result<std::collections::HashSet<String>, DbError> {
        let r = self.db().r_transaction()?;
        let out = r
            .scan()
            .primary::<BookRecord>()?
            .all()?
            .filter_map(|b| b.ok())
            .filter(|b| b.downloaded)
            .map(|b| b.asin)
            .collect();
        Ok(out)
    }

    pub async fn mark_downloaded(&self, asin: &str) -> Result<(), DbError> {
        let (_guard, rw) = self.rw().await?;
        let record: Option<BookRecord> = rw.get().primary(asin.to_string())?;
        if let Some(mut record) = record {
            record.downloaded = true;
            rw.upsert(record)?;
        }
        rw.commit()?;
        Ok(())
    }

    /// Deletes a book only when legal: not referenced by any Request.
    /// Returns `false` without mutating anything if the book is still
    /// referenced.
    pub async fn delete_book_if_unreferenced(&self, asin: &str) -> Result<bool, DbError> {
        let (_guard, rw) = self.rw().await?;
        let referenced = rw
            .scan()
            .primary::<crate::models::RequestRecord>()?
            .all()?
            .filter_map(|r| r.ok())
            .any(|r| r.asin == asin);
        if referenced {
            rw.commit()?;
            return Ok(false);
        }
        let record: Option<BookRecord> = rw.get().primary(asin.to_string())?;
        if let Some(record) = record {
            rw.remove(record)?;
        }
        rw.commit()?;
        Ok(true)
    }

    /// Background janitor: delete any Book older than `ttl` that is
    /// neither referenced by a Request nor flagged `downloaded`. Scans
    /// once under a read transaction, then mutates row-by-row.
    #[instrument(skip(self))]
    pub async fn clear_old_book_caches(&self, ttl_secs: i64) -> Result<usize, DbError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let stale_asins: Vec<String> = {
            let r = self.db().r_transaction()?;
            r.scan()
                .primary::<BookRecord>()?
                .all()?
                .filter_map(|b| b.ok())
                .filter(|b| !b.downloaded && now - b.updated_at > ttl_secs)
                .map(|b| b.asin)
                .collect()
        };

        let mut removed = 0;
        for asin in stale_asins {
            if self.delete_book_if_unreferenced(&asin).await? {
                removed += 1;
            }
        }
        if removed > 0 {
            info!(removed, "book cache janitor: evicted stale books");
        } else {
            debug!("book cache janitor: nothing to evict");
        }
        Ok(removed)
    }
}
