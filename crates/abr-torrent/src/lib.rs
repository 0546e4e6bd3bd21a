//! A thin, infallible-by-contract wrapper over a torrent daemon's HTTP
//! API, following `mlm_core::qbittorrent`'s shape: a trait decoupling
//! callers from the concrete client, and a cookie-jar-owning `reqwest`
//! client underneath rather than a crate pinned to a non-registry git
//! source (`mlm_mam`'s client shape, reused here for qBittorrent instead
//! of MaM).

mod client;
mod response;
mod types;

pub use client::{QbitClient, TorrentClient};
pub use types::{AddRequest, ListFilter, LoginResult, TestResult, TorrentInfo};
