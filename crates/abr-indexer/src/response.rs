use std::collections::BTreeSet;

use abr_model::{BookMetadata, Protocol, Source};
use serde::Deserialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct RawSource {
    pub guid: String,
    #[serde(rename = "indexerId")]
    pub indexer_id: i64,
    #[serde(rename = "indexer")]
    pub indexer_name: String,
    pub title: String,
    pub size: u64,
    #[serde(rename = "publishDate")]
    pub publish_date: String,
    #[serde(rename = "infoUrl")]
    pub info_url: Option<String>,
    #[serde(rename = "indexerFlags", default)]
    pub indexer_flags: Vec<String>,
    #[serde(rename = "downloadUrl")]
    pub download_url: Option<String>,
    #[serde(rename = "magnetUrl")]
    pub magnet_url: Option<String>,
    pub protocol: String,
    pub seeders: Option<u32>,
    pub leechers: Option<u32>,
    pub grabs: Option<u32>,
}

impl RawSource {
    /// Parses one aggregator row into a `Source`. Returns `None` (logged)
    /// for rows with an unparseable publish date or an unrecognized
    /// protocol rather than failing the whole batch.
    pub fn into_source(self) -> Option<Source> {
        let publish_date = match OffsetDateTime::parse(&self.publish_date, &Rfc3339) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, guid = %self.guid, "unparseable publish date, dropping source");
                return None;
            }
        };

        let protocol = match self.protocol.to_ascii_lowercase().as_str() {
            "torrent" => Protocol::Torrent {
                seeders: self.seeders.unwrap_or(0),
                leechers: self.leechers.unwrap_or(0),
            },
            "usenet" => Protocol::Usenet {
                grabs: self.grabs.unwrap_or(0),
            },
            other => {
                warn!(protocol = other, guid = %self.guid, "unrecognized protocol, dropping source");
                return None;
            }
        };

        Some(Source {
            guid: self.guid,
            indexer_id: self.indexer_id,
            indexer_name: self.indexer_name,
            title: self.title,
            size_bytes: self.size,
            publish_date,
            info_url: self.info_url,
            indexer_flags: self
                .indexer_flags
                .into_iter()
                .map(|f| f.to_ascii_lowercase())
                .collect::<BTreeSet<_>>(),
            download_url: self.download_url,
            magnet_url: self.magnet_url,
            protocol,
            book_metadata: BookMetadata::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(protocol: &str) -> RawSource {
        RawSource {
            guid: "g1".to_string(),
            indexer_id: 1,
            indexer_name: "MyIndexer".to_string(),
            title: "Some Book".to_string(),
            size: 123,
            publish_date: "2024-01-01T00:00:00Z".to_string(),
            info_url: None,
            indexer_flags: vec!["FreeLeech".to_string()],
            download_url: Some("http://x/download".to_string()),
            magnet_url: None,
            protocol: protocol.to_string(),
            seeders: Some(5),
            leechers: Some(1),
            grabs: None,
        }
    }

    #[test]
    fn torrent_protocol_parses_with_lowercased_flags() {
        let source = sample("torrent").into_source().unwrap();
        assert!(matches!(source.protocol, Protocol::Torrent { seeders: 5, leechers: 1 }));
        assert!(source.indexer_flags.contains("freeleech"));
    }

    #[test]
    fn unknown_protocol_is_dropped() {
        assert!(sample("ftp").into_source().is_none());
    }

    #[test]
    fn bad_publish_date_is_dropped() {
        let mut raw = sample("torrent");
        raw.publish_date = "not-a-date".to_string();
        assert!(raw.into_source().is_none());
    }
}
