use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::{Config, RetryPolicy};
use crate::error::{ReportError, Result};
use crate::retry::{parse_retry_after, Sleeper, TokioSleeper};

const JSON_API: &str = "application/vnd.api+json";
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Fully read successful response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub url: String,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ReportError::parse(format!("response from {}", self.url), e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    Token,
    Anonymous,
}

/// Vendor REST client. Every call goes through the retry wrapper.
pub struct ApiClient<S = TokioSleeper> {
    http: reqwest::Client,
    base: Url,
    token: String,
    api_version: String,
    retry: RetryPolicy,
    sleeper: S,
}

impl<S: Sleeper> ApiClient<S> {
    pub fn new(config: &Config, sleeper: S) -> Result<Self> {
        let base = Url::parse(config.api_url.trim_end_matches('/'))
            .map_err(|e| ReportError::Config(format!("invalid API URL {:?}: {e}", config.api_url)))?;
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ReportError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base,
            token: config.token.clone(),
            api_version: config.api_version.clone(),
            retry: config.retry,
            sleeper,
        })
    }

    pub fn sleeper(&self) -> &S {
        &self.sleeper
    }

    /// `<api_url>/<path>?version=<api_version>`
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let raw = format!(
            "{}/{}",
            self.base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let mut url = Url::parse(&raw).map_err(|e| ReportError::parse("endpoint URL", e))?;
        url.query_pairs_mut().append_pair("version", &self.api_version);
        Ok(url)
    }

    /// Resolve a pagination link. Absolute links are used as given; root-relative
    /// links get the API base path prefixed when they lack it.
    pub fn resolve_link(&self, link: &str) -> Result<Url> {
        if let Ok(url) = Url::parse(link) {
            return Ok(url);
        }
        let base_path = self.base.path().trim_end_matches('/');
        let joined = if link.starts_with('/') {
            if base_path.is_empty() || link.starts_with(&format!("{base_path}/")) {
                self.base.join(link)
            } else {
                self.base.join(&format!("{base_path}{link}"))
            }
        } else {
            self.base.join(&format!("{base_path}/{link}"))
        };
        joined.map_err(|e| ReportError::parse(format!("pagination link {link:?}"), e))
    }

    pub async fn get(&self, url: Url) -> Result<ApiResponse> {
        self.send_with_retry(Method::GET, url, None, Auth::Token).await
    }

    pub async fn post_json(&self, url: Url, body: &serde_json::Value) -> Result<ApiResponse> {
        let bytes = serde_json::to_vec(body).map_err(|e| ReportError::parse("request body", e))?;
        self.send_with_retry(Method::POST, url, Some(bytes), Auth::Token)
            .await
    }

    /// GET without credentials, for pre-signed download links.
    pub async fn get_anonymous(&self, url: Url) -> Result<ApiResponse> {
        self.send_with_retry(Method::GET, url, None, Auth::Anonymous)
            .await
    }

    /// Issue one request, retrying 429s and transient network failures up to the
    /// attempt cap. Any other non-2xx status fails immediately.
    async fn send_with_retry(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
        auth: Auth,
    ) -> Result<ApiResponse> {
        let policy = self.retry;
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            let mut req = self.http.request(method.clone(), url.clone());
            if auth == Auth::Token {
                req = req
                    .header(AUTHORIZATION, format!("token {}", self.token))
                    .header(ACCEPT, JSON_API);
            }
            if let Some(b) = &body {
                req = req.header(CONTENT_TYPE, JSON_API).body(b.clone());
            }

            debug!(%url, %method, attempt = attempt + 1, "sending request");

            let failure = match req.send().await {
                Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS => {
                    let wait = resp
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(parse_retry_after)
                        .unwrap_or_else(|| policy.backoff(attempt));
                    if !policy.has_attempt_after(attempt) {
                        return Err(ReportError::RateLimitExceeded {
                            url: url.to_string(),
                            attempts: max_attempts,
                        });
                    }
                    println!(
                        "    [!] Rate limited. Retrying after {}s (attempt {}/{})...",
                        wait.as_secs(),
                        attempt + 1,
                        max_attempts
                    );
                    warn!(%url, attempt = attempt + 1, wait_ms = wait.as_millis() as u64, "rate limited");
                    self.sleeper.sleep(wait).await?;
                    attempt += 1;
                    continue;
                }
                Ok(resp) => {
                    let status = resp.status();
                    debug!(%url, %status, "received response");
                    let body = resp.bytes().await.map(|b| b.to_vec());
                    match finish_response(status, &url, body) {
                        Ok(done) => return done,
                        Err(e) => e,
                    }
                }
                Err(e) if e.is_builder() => {
                    return Err(ReportError::Request {
                        url: url.to_string(),
                        source: e,
                    });
                }
                Err(e) => e,
            };

            if !policy.has_attempt_after(attempt) {
                return Err(ReportError::TransientNetwork {
                    url: url.to_string(),
                    attempts: max_attempts,
                    source: failure,
                });
            }
            let wait = policy.backoff(attempt);
            println!(
                "    [!] Request failed: {failure}. Retrying in {}s (attempt {}/{})...",
                wait.as_secs(),
                attempt + 1,
                max_attempts
            );
            warn!(%url, attempt = attempt + 1, error = %failure, "request failed");
            self.sleeper.sleep(wait).await?;
            attempt += 1;
        }
    }
}

/// Turn a received status and body into the wrapper's answer. The outer `Err`
/// is a failed read of a 2xx body, which the caller retries; a non-2xx status
/// fails whether or not its body could be read.
fn finish_response<E: std::fmt::Display>(
    status: StatusCode,
    url: &Url,
    body: std::result::Result<Vec<u8>, E>,
) -> std::result::Result<Result<ApiResponse>, E> {
    match body {
        Ok(bytes) if status.is_success() => Ok(Ok(ApiResponse {
            status,
            url: url.to_string(),
            body: bytes,
        })),
        Ok(bytes) => Ok(Err(ReportError::Http {
            status,
            url: url.to_string(),
            body: String::from_utf8_lossy(&bytes).trim().to_string(),
        })),
        Err(e) if status.is_success() => Err(e),
        Err(e) => Ok(Err(ReportError::Http {
            status,
            url: url.to_string(),
            body: format!("<unreadable body: {e}>"),
        })),
    }
}
