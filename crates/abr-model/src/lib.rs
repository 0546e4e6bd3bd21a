//! Shared value types used across the request-to-library pipeline.
//!
//! Nothing in this crate is persisted directly; `abr-db` defines the
//! `native_db`-backed records and converts to/from these types at its
//! boundary, the way `mlm_db` owns storage while `mlm_parse`/`mlm_mam`
//! trade in plain values.

mod processing_status;
mod region;
mod source;
mod user;

pub use processing_status::ProcessingStatus;
pub use region::Region;
pub use source::{BookMetadata, Protocol, Source, SourceKey};
pub use user::UserGroup;

/// A book's release-date precision varies by provider; we keep the raw
/// calendar date when we have one, falling back to a bare year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ReleaseDate {
    Date(time::Date),
    Year(i32),
}

impl ReleaseDate {
    pub fn year(&self) -> i32 {
        match self {
            ReleaseDate::Date(d) => d.year(),
            ReleaseDate::Year(y) => *y,
        }
    }
}

/// A series membership: name plus an optional within-series index.
///
/// Source metadata sometimes embeds the index in the name (`" #<index>"`)
/// instead of carrying it separately; we always normalize to the
/// separate form and only re-embed it when formatting for display (see
/// `abr-core::naming`).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SeriesEntry {
    pub name: String,
    pub index: Option<String>,
}

impl SeriesEntry {
    pub fn display(&self) -> String {
        match &self.index {
            Some(idx) => format!("{} #{idx}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Normalized book fields shared by the metadata client, the ranking
/// engine, and the processor. `abr-db::BookRecord` wraps this plus
/// storage-only fields (`downloaded`, `updated_at`).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Book {
    pub asin: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub authors: Vec<String>,
    pub narrators: Vec<String>,
    pub cover_url: Option<String>,
    pub release_date: Option<ReleaseDate>,
    pub runtime_minutes: Option<u32>,
    pub series: Vec<SeriesEntry>,
    pub genres: Vec<String>,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub language: Option<String>,
}

impl Book {
    pub fn first_author(&self) -> &str {
        self.authors.first().map(String::as_str).unwrap_or("Unknown")
    }

    pub fn primary_series(&self) -> Option<&SeriesEntry> {
        self.series.first()
    }

    pub fn runtime_seconds(&self) -> u64 {
        self.runtime_minutes.unwrap_or(0) as u64 * 60
    }
}
