use serde::{Deserialize, Serialize};

/// An inclusive bitrate range a detected filetype is expected to fall
/// within, expressed in kbit/s. Read from the `quality_<band>` config
/// keys (`"from_kbits|to_kbits"`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityBand {
    pub from_kbits: u32,
    pub to_kbits: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityBands {
    pub flac: QualityBand,
    pub m4b: QualityBand,
    pub mp3: QualityBand,
    pub unknown_audio: QualityBand,
    pub unknown: QualityBand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexerFlagScore {
    pub flag: String,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingWeights {
    pub quality: f64,
    pub seeders: f64,
    pub indexer_flags: f64,
    pub title_affinity: f64,
}

/// Everything the ranking engine needs, snapshotted from the config
/// store by the caller. Ranking itself is pure: no I/O, no fallible
/// paths — a malformed config is the caller's problem to validate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingConfig {
    pub bands: QualityBands,
    pub min_seeders: u32,
    pub indexer_flag_scores: Vec<IndexerFlagScore>,
    /// Percentage (0..=100) threshold below which the source-title
    /// affinity is discounted to zero.
    pub name_exists_ratio: f64,
    /// Percentage (0..=100) threshold below which the enriched-title
    /// affinity is discounted to zero.
    pub title_exists_ratio: f64,
    pub weights: RankingWeights,
}
