//! The indexer gateway (keyword search against an aggregator, cached
//! per query) and the source-enricher adapter registry that runs after
//! it. Grounded on `mlm_core::qbittorrent`'s cache-fronted client shape
//! and `mlm_core::metadata::mam_meta`'s per-source enrichment pass.

mod enricher;
mod error;
mod gateway;
mod http;
mod response;

pub use enricher::{AdapterContext, EnricherRegistry, IndexerAdapter};
pub use error::IndexerError;
pub use gateway::IndexerGateway;
pub use http::{HttpClient, ReqwestClient};
pub use response::RawSource;
