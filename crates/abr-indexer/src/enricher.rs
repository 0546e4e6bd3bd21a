use std::collections::HashMap;

use abr_model::{Book, Source};
use async_trait::async_trait;
use tracing::warn;

/// Per-book scratch state an adapter's `setup` populates and its later
/// `matches`/`edit` calls read back. Opaque to the registry; adapters
/// agree on the shape of the value they stash here.
#[derive(Debug, Default, Clone)]
pub struct AdapterContext {
    pub data: HashMap<String, serde_json::Value>,
}

impl AdapterContext {
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }
}

/// A named indexer adapter: per-book setup, a claim check, and an edit
/// applied to each source it claims. Adapters typically enrich file-type
/// hints, author/narrator lists, and freeleech-style flags.
#[async_trait]
pub trait IndexerAdapter: Send + Sync {
    fn id(&self) -> &str;

    async fn setup(
        &self,
        book: &Book,
        container: &mut AdapterContext,
        config: &HashMap<String, String>,
    ) -> anyhow::Result<()>;

    fn matches(&self, source: &Source, container: &AdapterContext) -> bool;

    fn edit(&self, source: &mut Source, container: &AdapterContext);
}

/// Runs every registered adapter, in order, over the sources the
/// gateway returned. Each adapter is isolated: a failing `setup` is
/// logged and that adapter is skipped for this book, but every other
/// adapter still runs and the sources are still handed to ranking.
pub struct EnricherRegistry {
    adapters: Vec<Box<dyn IndexerAdapter>>,
}

impl EnricherRegistry {
    pub fn new(adapters: Vec<Box<dyn IndexerAdapter>>) -> Self {
        Self { adapters }
    }

    pub async fn enrich(
        &self,
        book: &Book,
        sources: &mut [Source],
        config: &HashMap<String, String>,
    ) {
        for adapter in &self.adapters {
            let mut container = AdapterContext::default();
            if let Err(e) = adapter.setup(book, &mut container, config).await {
                warn!(adapter = adapter.id(), error = %e, "indexer adapter setup failed, skipping");
                continue;
            }
            for source in sources.iter_mut() {
                if adapter.matches(source, &container) {
                    adapter.edit(source, &container);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abr_model::Protocol;
    use time::OffsetDateTime;

    struct FlagAdapter;

    #[async_trait]
    impl IndexerAdapter for FlagAdapter {
        fn id(&self) -> &str {
            "flag"
        }

        async fn setup(
            &self,
            _book: &Book,
            _container: &mut AdapterContext,
            _config: &HashMap<String, String>,
        ) -> anyhow::Result<()> {
            Ok(())
        }

        fn matches(&self, source: &Source, _container: &AdapterContext) -> bool {
            source.indexer_name == "target"
        }

        fn edit(&self, source: &mut Source, _container: &AdapterContext) {
            source.indexer_flags.insert("enriched".to_string());
        }
    }

    struct FailingAdapter;

    #[async_trait]
    impl IndexerAdapter for FailingAdapter {
        fn id(&self) -> &str {
            "failing"
        }

        async fn setup(
            &self,
            _book: &Book,
            _container: &mut AdapterContext,
            _config: &HashMap<String, String>,
        ) -> anyhow::Result<()> {
            anyhow::bail!("boom")
        }

        fn matches(&self, _source: &Source, _container: &AdapterContext) -> bool {
            true
        }

        fn edit(&self, source: &mut Source, _container: &AdapterContext) {
            source.indexer_flags.insert("should-not-appear".to_string());
        }
    }

    fn sample_source(indexer_name: &str) -> Source {
        Source {
            guid: "g".to_string(),
            indexer_id: 1,
            indexer_name: indexer_name.to_string(),
            title: "T".to_string(),
            size_bytes: 1,
            publish_date: OffsetDateTime::UNIX_EPOCH,
            info_url: None,
            indexer_flags: Default::default(),
            download_url: None,
            magnet_url: None,
            protocol: Protocol::Torrent { seeders: 1, leechers: 0 },
            book_metadata: Default::default(),
        }
    }

    fn sample_book() -> Book {
        Book {
            asin: "B1".to_string(),
            title: "T".to_string(),
            subtitle: None,
            authors: vec![],
            narrators: vec![],
            cover_url: None,
            release_date: None,
            runtime_minutes: None,
            series: vec![],
            genres: vec![],
            publisher: None,
            description: None,
            language: None,
        }
    }

    #[tokio::test]
    async fn matching_adapter_edits_only_matched_sources() {
        let registry = EnricherRegistry::new(vec![Box::new(FlagAdapter)]);
        let mut sources = vec![sample_source("target"), sample_source("other")];
        registry.enrich(&sample_book(), &mut sources, &HashMap::new()).await;
        assert!(sources[0].indexer_flags.contains("enriched"));
        assert!(!sources[1].indexer_flags.contains("enriched"));
    }

    #[tokio::test]
    async fn a_failing_adapter_does_not_block_others() {
        let registry =
            EnricherRegistry::new(vec![Box::new(FailingAdapter), Box::new(FlagAdapter)]);
        let mut sources = vec![sample_source("target")];
        registry.enrich(&sample_book(), &mut sources, &HashMap::new()).await;
        assert!(!sources[0].indexer_flags.contains("should-not-appear"));
        assert!(sources[0].indexer_flags.contains("enriched"));
    }
}
