use std::collections::BTreeSet;

/// A candidate download source returned by the indexer aggregator.
/// Transient: lives only in the cache, never persisted between process
/// restarts.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Source {
    pub guid: String,
    pub indexer_id: i64,
    pub indexer_name: String,
    pub title: String,
    pub size_bytes: u64,
    pub publish_date: time::OffsetDateTime,
    pub info_url: Option<String>,
    pub indexer_flags: BTreeSet<String>,
    pub download_url: Option<String>,
    pub magnet_url: Option<String>,
    pub protocol: Protocol,
    pub book_metadata: BookMetadata,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Protocol {
    Torrent { seeders: u32, leechers: u32 },
    Usenet { grabs: u32 },
}

impl Protocol {
    pub fn is_torrent(&self) -> bool {
        matches!(self, Protocol::Torrent { .. })
    }

    pub fn seeders(&self) -> Option<u32> {
        match self {
            Protocol::Torrent { seeders, .. } => Some(*seeders),
            Protocol::Usenet { .. } => None,
        }
    }
}

/// Per-indexer-adapter enrichment sub-record.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BookMetadata {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub authors: Vec<String>,
    pub narrators: Vec<String>,
    pub filetype: Option<String>,
}

/// Uniqueness key for caching and dispatch: `(book_title, guid,
/// indexer_id)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct SourceKey {
    pub book_title: String,
    pub guid: String,
    pub indexer_id: i64,
}

impl Source {
    pub fn key(&self, book_title: &str) -> SourceKey {
        SourceKey {
            book_title: book_title.to_string(),
            guid: self.guid.clone(),
            indexer_id: self.indexer_id,
        }
    }

    /// The filetype hint used for quality banding: prefer the enricher's
    /// detected filetype, else heuristically sniff the title.
    pub fn detected_filetype(&self) -> Option<String> {
        if let Some(ft) = &self.book_metadata.filetype {
            return Some(ft.to_ascii_lowercase());
        }
        let lower = self.title.to_ascii_lowercase();
        for ext in ["m4b", "mp3", "flac", "m4a", "aac", "ogg", "opus", "wma"] {
            if lower.contains(ext) {
                return Some(ext.to_string());
            }
        }
        None
    }
}
