//! Generic TTL cache with an optional single-flight guard.
//!
//! Grounded on `mlm_core::qbittorrent::CategoryCache`: a `RwLock`-guarded
//! `HashMap` keyed by a hashable key, storing `(value, inserted_at)` and
//! serving stale-free reads under a TTL. The single-flight table below
//! generalizes that ad-hoc locking to a sharded-mutex shape:
//! `try_acquire` with a tiny timeout, returning a sentinel rather than
//! blocking.

mod single_flight;
mod ttl;

pub use single_flight::{SingleFlight, SingleFlightError};
pub use ttl::TtlCache;
