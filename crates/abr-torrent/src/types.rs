use serde::{Deserialize, Serialize};

/// Result of a `login()` call: always returned, never an `Err`, so the
/// caller (the request state machine) can decide whether to retry or
/// surface a user-facing diagnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResult {
    pub ok: bool,
    pub status_code: u16,
    pub text: String,
}

/// Structured outcome of `test()`, meant for a diagnostics UI rather
/// than for control flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub ok: bool,
    pub message: String,
}

/// One row of `list()`. Field names follow the qBittorrent WebUI API's
/// `torrents/info` response rather than an internal naming scheme, since
/// this is a thin passthrough adapter, not a model of its own domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentInfo {
    pub hash: String,
    pub name: String,
    pub content_path: String,
    pub state: String,
    pub progress: f64,
    pub dlspeed: i64,
    pub eta: i64,
    pub tags: Vec<String>,
    pub category: String,
}

/// Everything needed to submit a new download. `payload` is either a
/// magnet URI (`is_magnet = true`) or the raw bytes of a `.torrent` /
/// `.nzb` file.
#[derive(Debug, Clone)]
pub struct AddRequest {
    pub payload: Vec<u8>,
    pub is_magnet: bool,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub save_path: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub filter: Option<String>,
    pub category: Option<String>,
}
