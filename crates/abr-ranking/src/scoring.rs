use abr_model::{Book, Protocol, Source};

use crate::config::{QualityBand, QualityBands, RankingConfig};

/// `size_bytes * 8 / 1000 / max(runtime_seconds, 1)`.
pub fn implied_kbits_per_sec(size_bytes: u64, book: &Book) -> f64 {
    let runtime_secs = book.runtime_seconds().max(1) as f64;
    (size_bytes as f64 * 8.0 / 1000.0) / runtime_secs
}

fn band_for<'a>(filetype: Option<&str>, bands: &'a QualityBands) -> &'a QualityBand {
    match filetype {
        Some("flac") => &bands.flac,
        Some("m4b") => &bands.m4b,
        Some("mp3") => &bands.mp3,
        Some(_) => &bands.unknown_audio,
        None => &bands.unknown,
    }
}

/// Triangular function peaking at the band midpoint, zero at and beyond
/// the endpoints, clamped to `[0, 1]`.
pub fn triangular_score(value_kbits: f64, band: &QualityBand) -> f64 {
    let from = band.from_kbits as f64;
    let to = band.to_kbits as f64;
    if to <= from || value_kbits <= from || value_kbits >= to {
        return 0.0;
    }
    let mid = (from + to) / 2.0;
    let score = if value_kbits <= mid {
        (value_kbits - from) / (mid - from)
    } else {
        (to - value_kbits) / (to - mid)
    };
    score.clamp(0.0, 1.0)
}

pub fn quality_score(source: &Source, book: &Book, bands: &QualityBands) -> f64 {
    let kbits = implied_kbits_per_sec(source.size_bytes, book);
    let band = band_for(source.detected_filetype().as_deref(), bands);
    triangular_score(kbits, band)
}

/// Monotonic saturating function of seeders; approaches 1 as seeders
/// grows, never exceeding it. `Usenet` sources have no seeders concept
/// and score 0 here (the weight still applies uniformly; a usenet-heavy
/// deployment should zero out the seeders weight).
pub fn seeders_score(protocol: &Protocol) -> f64 {
    match protocol {
        Protocol::Torrent { seeders, .. } => *seeders as f64 / (*seeders as f64 + 10.0),
        Protocol::Usenet { .. } => 0.0,
    }
}

pub fn indexer_flags_score(source: &Source, config: &[crate::config::IndexerFlagScore]) -> f64 {
    config
        .iter()
        .filter(|f| source.indexer_flags.contains(&f.flag.to_ascii_lowercase()))
        .map(|f| f.score)
        .sum()
}

fn ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&a.to_ascii_lowercase(), &b.to_ascii_lowercase())
}

/// Token-ratio similarity between the source title (and, separately,
/// the enriched `book_metadata.title` if present) and the book title,
/// discounted to zero below the configured ratio thresholds.
pub fn title_affinity_score(source: &Source, book: &Book, config: &RankingConfig) -> f64 {
    let name_ratio = ratio(&source.title, &book.title);
    let name_score = if name_ratio * 100.0 < config.name_exists_ratio {
        0.0
    } else {
        name_ratio
    };

    let title_score = match &source.book_metadata.title {
        Some(enriched) => {
            let r = ratio(enriched, &book.title);
            if r * 100.0 < config.title_exists_ratio { 0.0 } else { r }
        }
        None => name_score,
    };

    (name_score + title_score) / 2.0
}

/// `true` when the source must be dropped outright rather than merely
/// scored low: missing both URLs, zero size, or (torrent-only)
/// under the configured seeder floor.
pub fn fails_hard_gate(source: &Source, config: &RankingConfig) -> bool {
    if source.download_url.is_none() && source.magnet_url.is_none() {
        return true;
    }
    if source.size_bytes == 0 {
        return true;
    }
    if let Protocol::Torrent { seeders, .. } = &source.protocol
        && *seeders < config.min_seeders
    {
        return true;
    }
    false
}

pub fn combined_score(source: &Source, book: &Book, config: &RankingConfig) -> f64 {
    let w = &config.weights;
    w.quality * quality_score(source, book, &config.bands)
        + w.seeders * seeders_score(&source.protocol)
        + w.indexer_flags * indexer_flags_score(source, &config.indexer_flag_scores)
        + w.title_affinity * title_affinity_score(source, book, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(from: u32, to: u32) -> QualityBand {
        QualityBand { from_kbits: from, to_kbits: to }
    }

    #[test]
    fn triangular_peaks_at_midpoint() {
        let b = band(64, 320);
        let mid = triangular_score(192.0, &b);
        let near_low_edge = triangular_score(70.0, &b);
        assert!(mid > near_low_edge);
        assert!((mid - 1.0).abs() < 1e-9);
    }

    #[test]
    fn triangular_is_zero_at_and_beyond_endpoints() {
        let b = band(64, 320);
        assert_eq!(triangular_score(64.0, &b), 0.0);
        assert_eq!(triangular_score(320.0, &b), 0.0);
        assert_eq!(triangular_score(400.0, &b), 0.0);
    }

    #[test]
    fn seeders_score_is_monotonic_and_saturating() {
        let low = seeders_score(&Protocol::Torrent { seeders: 1, leechers: 0 });
        let high = seeders_score(&Protocol::Torrent { seeders: 1000, leechers: 0 });
        assert!(low < high);
        assert!(high < 1.0);
    }

    #[test]
    fn usenet_has_no_seeders_contribution() {
        assert_eq!(seeders_score(&Protocol::Usenet { grabs: 500 }), 0.0);
    }
}
