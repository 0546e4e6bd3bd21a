//! Pure scoring and ordering of candidate download sources. No I/O, no
//! fallible paths: a malformed `RankingConfig` is the caller's mistake
//! to catch, not something this crate recovers from at runtime.

mod config;
mod rank;
mod scoring;

pub use config::{IndexerFlagScore, QualityBand, QualityBands, RankingConfig, RankingWeights};
pub use rank::{RankedSource, rank};
pub use scoring::{
    combined_score, fails_hard_gate, implied_kbits_per_sec, indexer_flags_score, quality_score,
    seeders_score, title_affinity_score, triangular_score,
};
