use std::time::Duration;

use abr_cache::TtlCache;
use abr_model::{Book, Region};
use tracing::{instrument, warn};

use crate::provider::BookProvider;

/// Primary-with-fallback metadata lookup, plus keyword search and
/// suggestions memoized through a process-wide TTL cache.
pub struct MetadataClient {
    primary: Box<dyn BookProvider>,
    secondary: Box<dyn BookProvider>,
    search_cache: TtlCache<String, Vec<String>>,
    suggestions_cache: TtlCache<String, Vec<String>>,
}

impl MetadataClient {
    pub fn new(primary: Box<dyn BookProvider>, secondary: Box<dyn BookProvider>) -> Self {
        Self {
            primary,
            secondary,
            search_cache: TtlCache::new(),
            suggestions_cache: TtlCache::new(),
        }
    }

    /// Queries the primary provider, falling back to the secondary on a
    /// miss or a soft failure. Both providers exhausted without a result
    /// yields `None`.
    #[instrument(skip(self))]
    pub async fn fetch_book(&self, identifier: &str, region: Region) -> Option<Book> {
        match self.primary.fetch(identifier, region).await {
            Ok(Some(book)) => return Some(book),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "primary provider fetch failed, falling back"),
        }

        match self.secondary.fetch(identifier, region).await {
            Ok(book) => book,
            Err(e) => {
                warn!(error = %e, "secondary provider fetch failed");
                None
            }
        }
    }

    /// Ordered list of identifiers matching `keyword`, memoized for
    /// `ttl` (config key `metadata_search_ttl`, default ~1 week).
    #[instrument(skip(self))]
    pub async fn search(&self, keyword: &str, ttl: Duration) -> Vec<String> {
        if keyword.trim().is_empty() {
            return Vec::new();
        }
        if let Some(hit) = self.search_cache.lookup(&keyword.to_string(), ttl).await {
            return hit;
        }
        let ids = self.query_identifiers(keyword, Lookup::Search).await;
        self.search_cache.insert(keyword.to_string(), ids.clone()).await;
        ids
    }

    #[instrument(skip(self))]
    pub async fn suggestions(&self, keyword: &str, ttl: Duration) -> Vec<String> {
        if keyword.trim().is_empty() {
            return Vec::new();
        }
        if let Some(hit) = self.suggestions_cache.lookup(&keyword.to_string(), ttl).await {
            return hit;
        }
        let ids = self.query_identifiers(keyword, Lookup::Suggestions).await;
        self.suggestions_cache.insert(keyword.to_string(), ids.clone()).await;
        ids
    }

    async fn query_identifiers(&self, keyword: &str, which: Lookup) -> Vec<String> {
        let primary = match which {
            Lookup::Search => self.primary.search(keyword).await,
            Lookup::Suggestions => self.primary.suggestions(keyword).await,
        };
        match primary {
            Ok(ids) if !ids.is_empty() => return ids,
            Ok(_) => {}
            Err(e) => warn!(error = %e, "primary provider keyword lookup failed, falling back"),
        }

        let secondary = match which {
            Lookup::Search => self.secondary.search(keyword).await,
            Lookup::Suggestions => self.secondary.suggestions(keyword).await,
        };
        match secondary {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "secondary provider keyword lookup failed");
                Vec::new()
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Lookup {
    Search,
    Suggestions,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MetaError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubProvider {
        name: &'static str,
        book: Option<Book>,
        ids: Vec<String>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl BookProvider for StubProvider {
        fn id(&self) -> &str {
            self.name
        }

        async fn fetch(&self, _identifier: &str, _region: Region) -> Result<Option<Book>, MetaError> {
            Ok(self.book.clone())
        }

        async fn search(&self, _keyword: &str) -> Result<Vec<String>, MetaError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.ids.clone())
        }

        async fn suggestions(&self, _keyword: &str) -> Result<Vec<String>, MetaError> {
            Ok(self.ids.clone())
        }
    }

    fn sample_book(asin: &str) -> Book {
        Book {
            asin: asin.to_string(),
            title: "Title".to_string(),
            subtitle: None,
            authors: vec!["Author".to_string()],
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
    async fn falls_back_to_secondary_when_primary_has_no_hit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let primary = StubProvider { name: "primary", book: None, ids: vec![], calls: calls.clone() };
        let secondary = StubProvider {
            name: "secondary",
            book: Some(sample_book("B1")),
            ids: vec![],
            calls,
        };
        let client = MetadataClient::new(Box::new(primary), Box::new(secondary));
        let book = client.fetch_book("B1", Region::Us).await;
        assert_eq!(book.unwrap().asin, "B1");
    }

    #[tokio::test]
    async fn search_results_are_memoized() {
        let calls = Arc::new(AtomicUsize::new(0));
        let primary = StubProvider {
            name: "primary",
            book: None,
            ids: vec!["B1".to_string()],
            calls: calls.clone(),
        };
        let secondary = StubProvider { name: "secondary", book: None, ids: vec![], calls: calls.clone() };
        let client = MetadataClient::new(Box::new(primary), Box::new(secondary));

        let first = client.search("dune", Duration::from_secs(60)).await;
        let second = client.search("dune", Duration::from_secs(60)).await;
        assert_eq!(first, vec!["B1".to_string()]);
        assert_eq!(second, first);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_keyword_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let primary = StubProvider { name: "primary", book: None, ids: vec![], calls: calls.clone() };
        let secondary = StubProvider { name: "secondary", book: None, ids: vec![], calls: calls.clone() };
        let client = MetadataClient::new(Box::new(primary), Box::new(secondary));
        assert!(client.search("", Duration::from_secs(60)).await.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
