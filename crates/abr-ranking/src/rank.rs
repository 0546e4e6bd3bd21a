use abr_model::{Book, Protocol, Source};

use crate::config::RankingConfig;
use crate::scoring::{combined_score, fails_hard_gate};

#[derive(Debug, Clone)]
pub struct RankedSource {
    pub source: Source,
    pub score: f64,
}

fn protocol_rank(protocol: &Protocol) -> u8 {
    match protocol {
        Protocol::Torrent { .. } => 0,
        Protocol::Usenet { .. } => 1,
    }
}

/// Scores and orders candidate sources for a book. Sources that fail a
/// hard gate (under `min_seeders`, missing both URLs, or zero size) are
/// dropped entirely rather than ranked last. Ties break on protocol
/// preference (torrent over usenet), then higher seeders, then newer
/// `publish_date`, then smaller size — in that order.
pub fn rank(book: &Book, sources: Vec<Source>, config: &RankingConfig) -> Vec<RankedSource> {
    let mut ranked: Vec<RankedSource> = sources
        .into_iter()
        .filter(|s| !fails_hard_gate(s, config))
        .map(|source| {
            let score = combined_score(&source, book, config);
            RankedSource { source, score }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| protocol_rank(&a.source.protocol).cmp(&protocol_rank(&b.source.protocol)))
            .then_with(|| {
                b.source
                    .protocol
                    .seeders()
                    .unwrap_or(0)
                    .cmp(&a.source.protocol.seeders().unwrap_or(0))
            })
            .then_with(|| b.source.publish_date.cmp(&a.source.publish_date))
            .then_with(|| a.source.size_bytes.cmp(&b.source.size_bytes))
    });

    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IndexerFlagScore, QualityBand, QualityBands, RankingWeights};
    use abr_model::BookMetadata;
    use time::OffsetDateTime;

    fn config() -> RankingConfig {
        RankingConfig {
            bands: QualityBands {
                flac: QualityBand { from_kbits: 700, to_kbits: 1200 },
                m4b: QualityBand { from_kbits: 48, to_kbits: 320 },
                mp3: QualityBand { from_kbits: 48, to_kbits: 320 },
                unknown_audio: QualityBand { from_kbits: 32, to_kbits: 320 },
                unknown: QualityBand { from_kbits: 0, to_kbits: 0 },
            },
            min_seeders: 2,
            indexer_flag_scores: vec![IndexerFlagScore { flag: "freeleech".to_string(), score: 0.2 }],
            name_exists_ratio: 50.0,
            title_exists_ratio: 50.0,
            weights: RankingWeights { quality: 1.0, seeders: 1.0, indexer_flags: 1.0, title_affinity: 1.0 },
        }
    }

    fn book() -> Book {
        Book {
            asin: "B1".to_string(),
            title: "Great Adventure".to_string(),
            subtitle: None,
            authors: vec!["Author".to_string()],
            narrators: vec![],
            cover_url: None,
            release_date: None,
            runtime_minutes: Some(600),
            series: vec![],
            genres: vec![],
            publisher: None,
            description: None,
            language: None,
        }
    }

    fn source(title: &str, seeders: u32, size_bytes: u64, flags: &[&str]) -> Source {
        Source {
            guid: format!("g-{title}"),
            indexer_id: 1,
            indexer_name: "idx".to_string(),
            title: title.to_string(),
            size_bytes,
            publish_date: OffsetDateTime::UNIX_EPOCH,
            info_url: None,
            indexer_flags: flags.iter().map(|f| f.to_string()).collect(),
            download_url: Some("http://x/d".to_string()),
            magnet_url: None,
            protocol: Protocol::Torrent { seeders, leechers: 0 },
            book_metadata: BookMetadata::default(),
        }
    }

    #[test]
    fn drops_sources_under_min_seeders_instead_of_ranking_last() {
        let sources = vec![source("Great Adventure", 1, 100_000_000, &[])];
        let ranked = rank(&book(), sources, &config());
        assert!(ranked.is_empty());
    }

    #[test]
    fn drops_sources_missing_both_urls() {
        let mut s = source("Great Adventure", 10, 100_000_000, &[]);
        s.download_url = None;
        s.magnet_url = None;
        let ranked = rank(&book(), vec![s], &config());
        assert!(ranked.is_empty());
    }

    #[test]
    fn drops_zero_size_sources() {
        let s = source("Great Adventure", 10, 0, &[]);
        let ranked = rank(&book(), vec![s], &config());
        assert!(ranked.is_empty());
    }

    #[test]
    fn higher_seeders_and_freeleech_rank_first() {
        let weak = source("Great Adventure", 5, 30_000_000, &[]);
        let strong = source("Great Adventure", 500, 30_000_000, &["freeleech"]);
        let ranked = rank(&book(), vec![weak, strong.clone()], &config());
        assert_eq!(ranked[0].source.guid, strong.guid);
    }

    #[test]
    fn ordering_is_stable_across_equal_scores() {
        let a = source("Great Adventure", 10, 30_000_000, &[]);
        let b = source("Great Adventure", 10, 30_000_000, &[]);
        let ranked = rank(&book(), vec![a.clone(), b.clone()], &config());
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].score, ranked[1].score);
    }
}
