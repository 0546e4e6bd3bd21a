use async_trait::async_trait;
use tracing::{instrument, warn};

use abr_model::{Book, Region};

use crate::error::MetaError;
use crate::http::{HttpClient, ReqwestClient};
use crate::response::{PrimaryBookResponse, SecondaryBookResponse};

/// One metadata provider: fetch-by-identifier plus the two keyword-based
/// lookups the client memoizes. Soft failures (network error, 404,
/// malformed JSON) resolve to `Ok(None)` / `Ok(vec![])` rather than
/// `Err` — only a fundamentally broken provider configuration is an
/// error here.
#[async_trait]
pub trait BookProvider: Send + Sync {
    fn id(&self) -> &str;

    async fn fetch(&self, identifier: &str, region: Region) -> Result<Option<Book>, MetaError>;

    async fn search(&self, keyword: &str) -> Result<Vec<String>, MetaError>;

    async fn suggestions(&self, keyword: &str) -> Result<Vec<String>, MetaError>;
}

fn book_url(base_url: &str, identifier: &str, region: Region) -> String {
    format!(
        "{}/book/{identifier}?region={}",
        base_url.trim_end_matches('/'),
        region.code()
    )
}

fn search_url(base_url: &str, keyword: &str) -> String {
    format!(
        "{}/search?keywords={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(keyword)
    )
}

fn suggestions_url(base_url: &str, keyword: &str) -> String {
    format!(
        "{}/search/suggestions?keywords={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(keyword)
    )
}

async fn fetch_identifiers(
    http: &dyn HttpClient,
    url: &str,
    provider: &str,
    call: &str,
) -> Result<Vec<String>, MetaError> {
    let Some(body) = http.get(url).await? else {
        return Ok(Vec::new());
    };
    match serde_json::from_str::<Vec<String>>(&body) {
        Ok(ids) => Ok(ids),
        Err(e) => {
            warn!(error = %e, provider, call, "malformed identifier list response");
            Ok(Vec::new())
        }
    }
}

/// The primary provider, queried first on every fetch.
pub struct PrimaryProvider {
    base_url: String,
    http: Box<dyn HttpClient>,
}

impl PrimaryProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Box::new(ReqwestClient::new()))
    }

    pub fn with_client(base_url: impl Into<String>, http: Box<dyn HttpClient>) -> Self {
        Self { base_url: base_url.into(), http }
    }
}

#[async_trait]
impl BookProvider for PrimaryProvider {
    fn id(&self) -> &str {
        "primary"
    }

    #[instrument(skip(self), fields(provider = "primary"))]
    async fn fetch(&self, identifier: &str, region: Region) -> Result<Option<Book>, MetaError> {
        let url = book_url(&self.base_url, identifier, region);
        let Some(body) = self.http.get(&url).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<PrimaryBookResponse>(&body) {
            Ok(resp) => Ok(Some(resp.into_book())),
            Err(e) => {
                warn!(error = %e, "malformed primary book response");
                Ok(None)
            }
        }
    }

    async fn search(&self, keyword: &str) -> Result<Vec<String>, MetaError> {
        let url = search_url(&self.base_url, keyword);
        fetch_identifiers(self.http.as_ref(), &url, "primary", "search").await
    }

    async fn suggestions(&self, keyword: &str) -> Result<Vec<String>, MetaError> {
        let url = suggestions_url(&self.base_url, keyword);
        fetch_identifiers(self.http.as_ref(), &url, "primary", "suggestions").await
    }
}

/// The fallback provider, only queried when the primary returns `None`
/// or errors.
pub struct SecondaryProvider {
    base_url: String,
    http: Box<dyn HttpClient>,
}

impl SecondaryProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Box::new(ReqwestClient::new()))
    }

    pub fn with_client(base_url: impl Into<String>, http: Box<dyn HttpClient>) -> Self {
        Self { base_url: base_url.into(), http }
    }
}

#[async_trait]
impl BookProvider for SecondaryProvider {
    fn id(&self) -> &str {
        "secondary"
    }

    #[instrument(skip(self), fields(provider = "secondary"))]
    async fn fetch(&self, identifier: &str, region: Region) -> Result<Option<Book>, MetaError> {
        let url = book_url(&self.base_url, identifier, region);
        let Some(body) = self.http.get(&url).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<SecondaryBookResponse>(&body) {
            Ok(resp) => Ok(Some(resp.into_book())),
            Err(e) => {
                warn!(error = %e, "malformed secondary book response");
                Ok(None)
            }
        }
    }

    async fn search(&self, keyword: &str) -> Result<Vec<String>, MetaError> {
        let url = search_url(&self.base_url, keyword);
        fetch_identifiers(self.http.as_ref(), &url, "secondary", "search").await
    }

    async fn suggestions(&self, keyword: &str) -> Result<Vec<String>, MetaError> {
        let url = suggestions_url(&self.base_url, keyword);
        fetch_identifiers(self.http.as_ref(), &url, "secondary", "suggestions").await
    }
}
