use std::time::Duration;

use abr_cache::TtlCache;
use abr_model::{Book, Source};
use tracing::{instrument, warn};

use crate::http::{HttpClient, ReqwestClient};
use crate::response::RawSource;

fn build_query(book: &Book) -> String {
    match book.authors.first() {
        Some(author) if !author.is_empty() => format!("{} {}", book.title, author),
        _ => book.title.clone(),
    }
}

fn cache_key(query: &str, categories: &[i64], indexer_ids: &[i64]) -> String {
    format!("{query}|{categories:?}|{indexer_ids:?}")
}

fn search_url(
    base_url: &str,
    query: &str,
    limit: u32,
    categories: &[i64],
    indexer_ids: &[i64],
) -> String {
    let mut url = format!(
        "{}/api/v1/search?query={}&type=search&limit={limit}&offset=0",
        base_url.trim_end_matches('/'),
        urlencoding::encode(query)
    );
    if !categories.is_empty() {
        let cats = categories.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(",");
        url.push_str(&format!("&categories={cats}"));
    }
    if !indexer_ids.is_empty() {
        let ids = indexer_ids.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(",");
        url.push_str(&format!("&indexerIds={ids}"));
    }
    url
}

/// Queries the aggregator for candidate download sources for a book,
/// caching results per distinct query (keyword + category/indexer
/// filter). Never returns an error to the caller: transport failures
/// and non-OK responses are logged and resolve to an empty list, the
/// same way a never-cached query resolves to one.
pub struct IndexerGateway {
    base_url: String,
    api_key: String,
    http: Box<dyn HttpClient>,
    cache: TtlCache<String, Vec<Source>>,
}

impl IndexerGateway {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_client(base_url, api_key, Box::new(ReqwestClient::new()))
    }

    pub fn with_client(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        http: Box<dyn HttpClient>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            http,
            cache: TtlCache::new(),
        }
    }

    #[instrument(skip(self, book), fields(asin = %book.asin))]
    #[allow(clippy::too_many_arguments)]
    pub async fn search(
        &self,
        book: &Book,
        categories: &[i64],
        indexer_ids: &[i64],
        limit: u32,
        ttl: Duration,
        force_refresh: bool,
    ) -> Vec<Source> {
        let query = build_query(book);
        let key = cache_key(&query, categories, indexer_ids);

        if !force_refresh && let Some(hit) = self.cache.lookup(&key, ttl).await {
            return hit;
        }

        let sources = self.fetch(&query, categories, indexer_ids, limit).await;
        self.cache.insert(key, sources.clone()).await;
        sources
    }

    async fn fetch(
        &self,
        query: &str,
        categories: &[i64],
        indexer_ids: &[i64],
        limit: u32,
    ) -> Vec<Source> {
        let url = search_url(&self.base_url, query, limit, categories, indexer_ids);
        let body = match self.http.get(&url, &self.api_key).await {
            Ok(Some(body)) => body,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "aggregator request failed");
                return Vec::new();
            }
        };

        let raw: Vec<RawSource> = match serde_json::from_str(&body) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "malformed aggregator response");
                return Vec::new();
            }
        };

        raw.into_iter().filter_map(RawSource::into_source).collect()
    }
}
