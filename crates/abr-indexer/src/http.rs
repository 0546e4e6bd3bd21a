use std::time::Duration;

use async_trait::async_trait;

/// Thin HTTP seam over the aggregator so the gateway can be exercised
/// against a hand-written fake in tests.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn get(&self, url: &str, api_key: &str) -> anyhow::Result<Option<String>>;
}

pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .expect("reqwest client builds with default TLS backend"),
        }
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str, api_key: &str) -> anyhow::Result<Option<String>> {
        let resp = self
            .client
            .get(url)
            .header("X-Api-Key", api_key)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Ok(None);
        }
        Ok(Some(resp.text().await?))
    }
}
