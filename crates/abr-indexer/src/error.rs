/// Surfaced only for adapter/config misuse; remote failures (the
/// gateway's own HTTP calls) are soft and never reach this type — they
/// are logged and resolve to an empty result set.
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    #[error("indexer adapter {adapter} setup failed: {source}")]
    AdapterSetup {
        adapter: String,
        #[source]
        source: anyhow::Error,
    },
}
