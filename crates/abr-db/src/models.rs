//! Durable records. One current version per entity — no `v01..v18`
//! migration chain like `mlm_db`'s, since this schema starts fresh.
//!
//! Stored timestamps are Unix seconds (`i64`) rather than a custom
//! `Timestamp` newtype, so `native_db`'s built-in `ToKey` impl for `i64`
//! covers every secondary key here without a hand-rolled key impl.

use native_db::{ToKey, native_db};
use native_model::{Model, native_model};
use serde::{Deserialize, Serialize};

use abr_model::{Book, ProcessingStatus, ReleaseDate, SeriesEntry};

fn now_unix() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum StoredReleaseDate {
    Date(i64),
    Year(i32),
}

impl From<ReleaseDate> for StoredReleaseDate {
    fn from(value: ReleaseDate) -> Self {
        match value {
            ReleaseDate::Date(d) => {
                let dt = d.midnight().assume_utc();
                StoredReleaseDate::Date(dt.unix_timestamp())
            }
            ReleaseDate::Year(y) => StoredReleaseDate::Year(y),
        }
    }
}

impl From<StoredReleaseDate> for ReleaseDate {
    fn from(value: StoredReleaseDate) -> Self {
        match value {
            StoredReleaseDate::Date(ts) => {
                let dt = time::OffsetDateTime::from_unix_timestamp(ts).unwrap_or(
                    time::OffsetDateTime::UNIX_EPOCH,
                );
                ReleaseDate::Date(dt.date())
            }
            StoredReleaseDate::Year(y) => ReleaseDate::Year(y),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StoredSeriesEntry {
    pub name: String,
    pub index: Option<String>,
}

impl From<SeriesEntry> for StoredSeriesEntry {
    fn from(value: SeriesEntry) -> Self {
        Self { name: value.name, index: value.index }
    }
}

impl From<StoredSeriesEntry> for SeriesEntry {
    fn from(value: StoredSeriesEntry) -> Self {
        Self { name: value.name, index: value.index }
    }
}

/// Durable book metadata cache. `downloaded` is cleared by nothing in
/// the metadata pipeline; only the processor sets it.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[native_model(id = 1, version = 1)]
#[native_db]
pub struct BookRecord {
    #[primary_key]
    pub asin: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub authors: Vec<String>,
    pub narrators: Vec<String>,
    pub cover_url: Option<String>,
    pub release_date: Option<StoredReleaseDate>,
    pub runtime_minutes: Option<u32>,
    pub series: Vec<StoredSeriesEntry>,
    pub genres: Vec<String>,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
    pub downloaded: bool,
    #[secondary_key]
    pub updated_at: i64,
}

impl BookRecord {
    pub fn from_book(book: Book, downloaded: bool) -> Self {
        Self {
            asin: book.asin,
            title: book.title,
            subtitle: book.subtitle,
            authors: book.authors,
            narrators: book.narrators,
            cover_url: book.cover_url,
            release_date: book.release_date.map(Into::into),
            runtime_minutes: book.runtime_minutes,
            series: book.series.into_iter().map(Into::into).collect(),
            genres: book.genres,
            publisher: book.publisher,
            description: book.description,
            language: book.language,
            downloaded,
            updated_at: now_unix(),
        }
    }

    pub fn to_book(&self) -> Book {
        Book {
            asin: self.asin.clone(),
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            authors: self.authors.clone(),
            narrators: self.narrators.clone(),
            cover_url: self.cover_url.clone(),
            release_date: self.release_date.clone().map(Into::into),
            runtime_minutes: self.runtime_minutes,
            series: self.series.clone().into_iter().map(Into::into).collect(),
            genres: self.genres.clone(),
            publisher: self.publisher.clone(),
            description: self.description.clone(),
            language: self.language.clone(),
        }
    }

    /// The freshness + completeness gate used by the book cache lookup.
    pub fn is_fresh(&self, ttl_secs: i64, now: i64) -> bool {
        (now - self.updated_at) <= ttl_secs && !self.series.is_empty()
    }
}

/// A user's request for a book. Primary key is `"<asin>:<user>"`,
/// enforcing the unique-on-`(book, user)` invariant the same way
/// `mlm_db::Torrent` keys on its hash/id.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[native_model(id = 2, version = 1)]
#[native_db]
pub struct RequestRecord {
    #[primary_key]
    pub id: String,
    #[secondary_key]
    pub asin: String,
    pub user: String,
    pub region: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    pub torrent_hash: Option<String>,
    pub download_progress: f32,
    pub download_state: Option<String>,
    pub processing_status: String,
}

impl RequestRecord {
    pub fn key(asin: &str, user: &str) -> String {
        format!("{asin}:{user}")
    }

    pub fn new(asin: &str, user: &str, region: Option<String>) -> Self {
        let now = now_unix();
        Self {
            id: Self::key(asin, user),
            asin: asin.to_string(),
            user: user.to_string(),
            region,
            created_at: now,
            updated_at: now,
            torrent_hash: None,
            download_progress: 0.0,
            download_state: None,
            processing_status: ProcessingStatus::Pending.to_string(),
        }
    }

    pub fn status(&self) -> ProcessingStatus {
        self.processing_status.parse().unwrap()
    }

    pub fn set_status(&mut self, status: ProcessingStatus) {
        self.processing_status = status.to_string();
        self.updated_at = now_unix();
    }

    pub fn touch(&mut self) {
        self.updated_at = now_unix();
    }
}

/// A single library-import run against a root path.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ImportSessionStatus {
    Scanning,
    ReviewReady,
    Importing,
    Completed,
    Failed,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[native_model(id = 3, version = 1)]
#[native_db]
pub struct ImportSessionRecord {
    #[primary_key]
    pub id: String,
    pub root_path: String,
    pub status: ImportSessionStatus,
    pub created_at: i64,
    pub owner: String,
}

impl ImportSessionRecord {
    pub const RECONCILIATION_ROOT: &'static str = "__INTERNAL_LIBRARY__";

    pub fn new(root_path: String, owner: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            root_path,
            status: ImportSessionStatus::Scanning,
            created_at: now_unix(),
            owner,
        }
    }

    pub fn is_reconciliation(&self) -> bool {
        self.root_path == Self::RECONCILIATION_ROOT
    }
}

/// One discovered unit (folder or loose file) within an import session.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ImportItemStatus {
    Pending,
    Matched,
    Missing,
    Imported,
    Ignored,
    Error,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[native_model(id = 4, version = 1)]
#[native_db]
pub struct ImportItemRecord {
    #[primary_key]
    pub id: String,
    #[secondary_key]
    pub session_id: String,
    pub source_path: String,
    pub detected_title: Option<String>,
    pub detected_author: Option<String>,
    pub match_asin: Option<String>,
    pub match_score: Option<f32>,
    pub status: ImportItemStatus,
    pub error_msg: Option<String>,
}

impl ImportItemRecord {
    pub fn new(session_id: String, source_path: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id,
            source_path,
            detected_title: None,
            detected_author: None,
            match_asin: None,
            match_score: None,
            status: ImportItemStatus::Pending,
            error_msg: None,
        }
    }
}

/// A single durable config key/value row backing `abr-config`.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[native_model(id = 5, version = 1)]
#[native_db]
pub struct ConfigEntryRecord {
    #[primary_key]
    pub key: String,
    pub value: String,
}

pub static MODELS: once_cell::sync::Lazy<native_db::Models> = once_cell::sync::Lazy::new(|| {
    let mut models = native_db::Models::new();
    models.define::<BookRecord>().unwrap();
    models.define::<RequestRecord>().unwrap();
    models.define::<ImportSessionRecord>().unwrap();
    models.define::<ImportItemRecord>().unwrap();
    models.define::<ConfigEntryRecord>().unwrap();
    models
});
