use std::collections::HashMap;
use std::sync::Arc;

use abr_config::{ConfigStore, keys};
use abr_db::Store;
use abr_ranking::{IndexerFlagScore, QualityBand, QualityBands, RankingConfig, RankingWeights};

fn parse_band(raw: &str, default: QualityBand) -> QualityBand {
    match raw.split_once('|') {
        Some((from, to)) => match (from.trim().parse(), to.trim().parse()) {
            (Ok(from_kbits), Ok(to_kbits)) => QualityBand { from_kbits, to_kbits },
            _ => default,
        },
        None => default,
    }
}

async fn band(config: &ConfigStore<Arc<Store>>, key: &str, default: QualityBand) -> QualityBand {
    match config.get(key).await.ok().flatten() {
        Some(raw) => parse_band(&raw, default),
        None => default,
    }
}

/// Builds the pure `RankingConfig` snapshot the ranking engine needs
/// from the durable config store. Called once per dispatch; ranking
/// itself never touches the config store.
pub async fn load_ranking_config(config: &ConfigStore<Arc<Store>>) -> RankingConfig {
    let bands = QualityBands {
        flac: band(config, keys::QUALITY_FLAC, QualityBand { from_kbits: 700, to_kbits: 1200 }).await,
        m4b: band(config, keys::QUALITY_M4B, QualityBand { from_kbits: 48, to_kbits: 320 }).await,
        mp3: band(config, keys::QUALITY_MP3, QualityBand { from_kbits: 48, to_kbits: 320 }).await,
        unknown_audio: band(
            config,
            keys::QUALITY_UNKNOWN_AUDIO,
            QualityBand { from_kbits: 32, to_kbits: 320 },
        )
        .await,
        unknown: band(config, keys::QUALITY_UNKNOWN, QualityBand { from_kbits: 0, to_kbits: 0 }).await,
    };

    let min_seeders = config.get_int(keys::MIN_SEEDERS, 5).await.unwrap_or(5).max(0) as u32;
    let name_exists_ratio = config.get_int(keys::NAME_EXISTS_RATIO, 50).await.unwrap_or(50) as f64;
    let title_exists_ratio = config.get_int(keys::TITLE_EXISTS_RATIO, 50).await.unwrap_or(50) as f64;

    let indexer_flag_scores: Vec<IndexerFlagScore> =
        config.get_json(keys::INDEXER_FLAGS).await.ok().flatten().unwrap_or_default();

    let weights = RankingWeights {
        quality: weight(config, keys::RANKING_WEIGHT_QUALITY).await,
        seeders: weight(config, keys::RANKING_WEIGHT_SEEDERS).await,
        indexer_flags: weight(config, keys::RANKING_WEIGHT_INDEXER_FLAGS).await,
        title_affinity: weight(config, keys::RANKING_WEIGHT_TITLE_AFFINITY).await,
    };

    RankingConfig { bands, min_seeders, indexer_flag_scores, name_exists_ratio, title_exists_ratio, weights }
}

async fn weight(config: &ConfigStore<Arc<Store>>, key: &str) -> f64 {
    config.get(key).await.ok().flatten().and_then(|v| v.parse().ok()).unwrap_or(1.0)
}

/// Flat snapshot of the keys indexer adapters are allowed to read,
/// since a `Box<dyn IndexerAdapter>` registry can't carry a type
/// parameter the way `ConfigStore<B>` is generic over its backend.
pub async fn snapshot_for_adapters(config: &ConfigStore<Arc<Store>>, keys: &[&str]) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for key in keys {
        if let Ok(Some(value)) = config.get(key).await {
            out.insert(key.to_string(), value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pipe_delimited_band() {
        let band = parse_band("48|320", QualityBand { from_kbits: 0, to_kbits: 0 });
        assert_eq!(band, QualityBand { from_kbits: 48, to_kbits: 320 });
    }

    #[test]
    fn falls_back_to_default_on_malformed_band() {
        let default = QualityBand { from_kbits: 1, to_kbits: 2 };
        assert_eq!(parse_band("garbage", default), default);
    }
}
