//! The orchestration core: request lifecycle, torrent monitor, post-
//! download processor, and the library scan/match/import pipeline.
//! Everything here is storage- and transport-agnostic glue over
//! `abr-db`, `abr-meta`, `abr-indexer`, `abr-ranking`, and
//! `abr-torrent`; the HTTP/CLI surface that wires it up lives in the
//! `server` crate.

mod config_snapshot;
mod error;
mod importer;
mod matcher;
mod monitor;
mod naming;
mod processor;
mod request;
mod scanner;
mod torrent_hash;

pub use error::{CoreError, CoreResult};
pub use importer::Importer;
pub use matcher::{MatchCandidate, find_candidates, identifier_in_path};
pub use monitor::Monitor;
pub use processor::Processor;
pub use request::{DispatchOutcome, RequestService};
pub use scanner::{BookGuess, BookUnit, derive_guess, find_by_identifier, map_by_identifier, scan};
