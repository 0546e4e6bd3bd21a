#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    #[error("title is required for search")]
    EmptyQuery,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("base url is invalid: {0}")]
    BadBaseUrl(#[from] url::ParseError),
}
