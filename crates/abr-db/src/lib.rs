//! Persistence layer built on `native_db`, following `mlm_db`'s shape:
//! a static `Models` registry, a `Store` wrapping `Database` behind a
//! process-wide write mutex, and plain impl blocks per concern instead
//! of a repository trait hierarchy.

mod book_store;
mod config_backend;
mod import_store;
pub mod models;
mod request_store;
mod store;

pub use models::{
    BookRecord, ConfigEntryRecord, ImportItemRecord, ImportItemStatus, ImportSessionRecord,
    ImportSessionStatus, RequestRecord, MODELS,
};
pub use store::{DbError, Store};
