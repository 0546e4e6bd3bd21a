use serde::Deserialize;

use crate::types::TorrentInfo;

/// Wire shape of one `torrents/info` row. qBittorrent returns `tags` as a
/// single comma-separated string rather than a JSON array.
#[derive(Debug, Deserialize)]
pub struct RawTorrentInfo {
    pub hash: String,
    pub name: String,
    #[serde(default)]
    pub content_path: String,
    pub state: String,
    pub progress: f64,
    #[serde(default)]
    pub dlspeed: i64,
    #[serde(default)]
    pub eta: i64,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub category: String,
}

impl From<RawTorrentInfo> for TorrentInfo {
    fn from(raw: RawTorrentInfo) -> Self {
        TorrentInfo {
            hash: raw.hash,
            name: raw.name,
            content_path: raw.content_path,
            state: raw.state,
            progress: raw.progress,
            dlspeed: raw.dlspeed,
            eta: raw.eta,
            tags: raw
                .tags
                .split(',')
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(ToString::to_string)
                .collect(),
            category: raw.category,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_comma_separated_tags_and_drops_blanks() {
        let raw = RawTorrentInfo {
            hash: "abc".into(),
            name: "Book".into(),
            content_path: "/downloads/Book".into(),
            state: "downloading".into(),
            progress: 0.5,
            dlspeed: 1024,
            eta: 60,
            tags: " asin:B001, acquired ,".into(),
            category: "audiobooks".into(),
        };
        let info: TorrentInfo = raw.into();
        assert_eq!(info.tags, vec!["asin:B001".to_string(), "acquired".to_string()]);
    }

    #[test]
    fn empty_tags_string_yields_empty_vec() {
        let raw = RawTorrentInfo {
            hash: "abc".into(),
            name: "Book".into(),
            content_path: String::new(),
            state: "downloading".into(),
            progress: 0.0,
            dlspeed: 0,
            eta: -1,
            tags: String::new(),
            category: String::new(),
        };
        let info: TorrentInfo = raw.into();
        assert!(info.tags.is_empty());
    }
}
