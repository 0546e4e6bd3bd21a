//! Book metadata lookups: primary-with-fallback fetch by identifier,
//! plus keyword search and suggestions memoized through a TTL cache.
//! Grounded on `mlm_meta`'s provider-trait/fallback shape, narrowed to
//! the two-provider contract this system needs.

mod client;
mod error;
mod genre;
mod http;
mod provider;
mod response;

pub use client::MetadataClient;
pub use error::MetaError;
pub use genre::{GenreValue, normalize_genres};
pub use http::{HttpClient, ReqwestClient};
pub use provider::{BookProvider, PrimaryProvider, SecondaryProvider};
pub use response::{NamedEntry, PrimaryBookResponse, SecondaryBookResponse};
