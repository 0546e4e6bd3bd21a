use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{StatusCode, Url, multipart};
use reqwest_cookie_store::CookieStoreRwLock;
use tracing::{debug, warn};

use crate::response::RawTorrentInfo;
use crate::types::{AddRequest, ListFilter, LoginResult, TestResult, TorrentInfo};

/// The login/add/list/tag/delete/test contract a torrent daemon adapter
/// must satisfy. Every method is infallible by signature: transport and
/// auth failures are absorbed into `ok = false` rather than an `Err`, so
/// a daemon outage never aborts a reconcile pass upstream.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    async fn login(&self) -> LoginResult;
    async fn add(&self, request: AddRequest) -> bool;
    async fn list(&self, filter: ListFilter) -> Vec<TorrentInfo>;
    async fn tag(&self, hash: &str, tags: &[String]) -> bool;
    async fn delete(&self, hash: &str, delete_files: bool) -> bool;
    async fn test(&self) -> TestResult;
}

/// A thin wrapper over a qBittorrent-style WebUI HTTP API. Cookie-based
/// session, reused across calls; a 403 on any operation triggers one
/// re-login-and-retry before giving up.
pub struct QbitClient {
    base_url: String,
    username: String,
    password: String,
    jar: Arc<CookieStoreRwLock>,
    http: reqwest::Client,
}

impl QbitClient {
    pub fn new(base_url: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        let jar: Arc<CookieStoreRwLock> = Arc::new(Default::default());
        let http = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .user_agent("abr-torrent")
            .build()
            .expect("reqwest client with cookie provider always builds");
        Self { base_url: base_url.into(), username: username.into(), password: password.into(), jar, http }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v2/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn do_login(&self) -> LoginResult {
        let url = self.url("auth/login");
        let form = [("username", self.username.as_str()), ("password", self.password.as_str())];
        let resp = match self.http.post(&url).form(&form).send().await {
            Ok(resp) => resp,
            Err(err) => {
                warn!(error = %err, "qbittorrent login request failed");
                return LoginResult { ok: false, status_code: 0, text: err.to_string() };
            }
        };
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        let ok = status.is_success() && text.trim() == "Ok.";
        if !ok {
            warn!(%status, %text, "qbittorrent login rejected");
        }
        LoginResult { ok, status_code: status.as_u16(), text }
    }

    /// Runs `op`, and on a `403` retries once after a fresh login. Any
    /// other transport failure is returned as-is.
    async fn with_relogin<F, Fut>(&self, op: F) -> Result<reqwest::Response, reqwest::Error>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<reqwest::Response, reqwest::Error>>,
    {
        let resp = op().await?;
        if resp.status() == StatusCode::FORBIDDEN {
            debug!("qbittorrent session expired, re-logging in");
            let _ = self.do_login().await;
            return op().await;
        }
        Ok(resp)
    }

    fn cookie_jar_has_session(&self) -> bool {
        let url: Url = match self.base_url.parse() {
            Ok(url) => url,
            Err(_) => return false,
        };
        let host = url.host_str().unwrap_or_default();
        self.jar.read().map(|jar| jar.get(host, "/", "SID").is_some()).unwrap_or(false)
    }
}

#[async_trait]
impl TorrentClient for QbitClient {
    async fn login(&self) -> LoginResult {
        self.do_login().await
    }

    async fn add(&self, request: AddRequest) -> bool {
        if !self.cookie_jar_has_session() {
            let _ = self.do_login().await;
        }
        let url = self.url("torrents/add");

        let result = self
            .with_relogin(|| async {
                let mut form = multipart::Form::new();
                if request.is_magnet {
                    let magnet = String::from_utf8_lossy(&request.payload).into_owned();
                    form = form.text("urls", magnet);
                } else {
                    form = form.part("torrents", multipart::Part::bytes(request.payload.clone()).file_name("upload.torrent"));
                }
                if !request.tags.is_empty() {
                    form = form.text("tags", request.tags.join(","));
                }
                if let Some(category) = &request.category {
                    form = form.text("category", category.clone());
                }
                if let Some(save_path) = &request.save_path {
                    form = form.text("savepath", save_path.clone());
                    form = form.text("autoTMM", "false");
                }
                self.http.post(&url).multipart(form).send().await
            })
            .await;

        match result {
            Ok(resp) => {
                let ok = resp.status().is_success();
                if !ok {
                    warn!(status = %resp.status(), "qbittorrent add rejected");
                }
                ok
            }
            Err(err) => {
                warn!(error = %err, "qbittorrent add request failed");
                false
            }
        }
    }

    async fn list(&self, filter: ListFilter) -> Vec<TorrentInfo> {
        let mut url = self.url("torrents/info");
        let mut params = Vec::new();
        if let Some(f) = &filter.filter {
            params.push(format!("filter={}", urlencoding::encode(f)));
        }
        if let Some(c) = &filter.category {
            params.push(format!("category={}", urlencoding::encode(c)));
        }
        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.join("&"));
        }

        let result = self.with_relogin(|| async { self.http.get(&url).send().await }).await;

        let resp = match result {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                warn!(status = %resp.status(), "qbittorrent list rejected");
                return Vec::new();
            }
            Err(err) => {
                warn!(error = %err, "qbittorrent list request failed");
                return Vec::new();
            }
        };

        match resp.json::<Vec<RawTorrentInfo>>().await {
            Ok(rows) => rows.into_iter().map(TorrentInfo::from).collect(),
            Err(err) => {
                warn!(error = %err, "qbittorrent list response did not parse");
                Vec::new()
            }
        }
    }

    async fn tag(&self, hash: &str, tags: &[String]) -> bool {
        let url = self.url("torrents/addTags");
        let joined = tags.join(",");
        let form = [("hashes", hash), ("tags", joined.as_str())];

        let result = self.with_relogin(|| async { self.http.post(&url).form(&form).send().await }).await;

        match result {
            Ok(resp) => resp.status().is_success(),
            Err(err) => {
                warn!(error = %err, hash, "qbittorrent tag request failed");
                false
            }
        }
    }

    async fn delete(&self, hash: &str, delete_files: bool) -> bool {
        let url = self.url("torrents/delete");
        let delete_files = delete_files.to_string();
        let form = [("hashes", hash), ("deleteFiles", delete_files.as_str())];

        let result = self.with_relogin(|| async { self.http.post(&url).form(&form).send().await }).await;

        match result {
            Ok(resp) => resp.status().is_success(),
            Err(err) => {
                warn!(error = %err, hash, "qbittorrent delete request failed");
                false
            }
        }
    }

    async fn test(&self) -> TestResult {
        let login = self.do_login().await;
        if !login.ok {
            return TestResult { ok: false, message: format!("login failed (status {}): {}", login.status_code, login.text) };
        }
        let version_url = self.url("app/version");
        match self.http.get(&version_url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let version = resp.text().await.unwrap_or_else(|_| "unknown".to_string());
                TestResult { ok: true, message: format!("connected, version {version}") }
            }
            Ok(resp) => TestResult { ok: false, message: format!("unexpected status {}", resp.status()) },
            Err(err) => TestResult { ok: false, message: format!("unreachable: {err}") },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_and_path_without_double_slash() {
        let client = QbitClient::new("http://localhost:8080/", "admin", "adminadmin");
        assert_eq!(client.url("auth/login"), "http://localhost:8080/api/v2/auth/login");
    }

    #[test]
    fn fresh_client_has_no_session_cookie() {
        let client = QbitClient::new("http://localhost:8080", "admin", "adminadmin");
        assert!(!client.cookie_jar_has_session());
    }
}
