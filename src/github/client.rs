// GitHub API HTTP client.
// Handles optional authentication, rate limiting, and request/response processing.

use std::sync::Mutex;
use std::time::Duration;

use reqwest::{
    Client, Response, StatusCode, Url,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT},
};
use tracing::debug;

use crate::error::{GroveError, Result};
use crate::lock::mutex_lock;

use super::types::RateLimit;

pub const GITHUB_API_BASE: &str = "https://api.github.com";
const GITHUB_API_VERSION: &str = "2022-11-28";
const SOURCE: &str = "github::client";

/// GitHub API client with optional authentication and rate limit tracking.
pub struct GitHubClient {
    client: Client,
    base: Url,
    rate_limit: Mutex<RateLimit>,
}

impl GitHubClient {
    /// Create a new client. Without a token, requests are anonymous.
    pub fn new(token: Option<&str>, api_base: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();

        if let Some(token) = token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| GroveError::Other(e.to_string()))?,
            );
        }
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("grove"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(GroveError::Api)?;

        let base = Url::parse(api_base)
            .map_err(|e| GroveError::Config(format!("invalid GitHub API base `{api_base}`: {e}")))?;

        Ok(Self {
            client,
            base,
            rate_limit: Mutex::new(RateLimit::default()),
        })
    }

    /// Create a client, authenticating with GITHUB_TOKEN when it is set.
    pub fn from_env(api_base: &str, timeout: Duration) -> Result<Self> {
        let token = std::env::var("GITHUB_TOKEN")
            .ok()
            .filter(|token| !token.is_empty());
        if token.is_none() {
            debug!("GITHUB_TOKEN not set, using anonymous requests");
        }
        Self::new(token.as_deref(), api_base, timeout)
    }

    /// Get the current rate limit information.
    pub fn rate_limit(&self) -> RateLimit {
        mutex_lock(&self.rate_limit, SOURCE, "rate_limit").clone()
    }

    /// Build an endpoint URL from path segments; each segment is percent-encoded.
    pub fn endpoint<'a, I>(&self, segments: I) -> Result<Url>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| GroveError::Config(format!("GitHub API base `{}` cannot hold a path", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Make a GET request to the GitHub API.
    pub async fn get(&self, url: Url) -> Result<Response> {
        self.get_with_accept(url, None).await
    }

    /// Make a GET request with query parameters.
    pub async fn get_with_params<T: serde::Serialize + ?Sized>(
        &self,
        url: Url,
        params: &T,
    ) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(GroveError::Api)?;

        self.update_rate_limit(&response);
        self.check_response(response).await
    }

    /// Make a GET request overriding the Accept header (e.g. raw media types).
    pub async fn get_with_accept(&self, url: Url, accept: Option<&'static str>) -> Result<Response> {
        let mut request = self.client.get(url);
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }
        let response = request.send().await.map_err(GroveError::Api)?;

        self.update_rate_limit(&response);
        self.check_response(response).await
    }

    /// Update rate limit from response headers.
    fn update_rate_limit(&self, response: &Response) {
        let header = |name: &str| -> Option<u64> {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
        };

        let mut rate_limit = mutex_lock(&self.rate_limit, SOURCE, "update_rate_limit");
        if let Some(limit) = header("x-ratelimit-limit") {
            rate_limit.limit = limit;
        }
        if let Some(remaining) = header("x-ratelimit-remaining") {
            rate_limit.remaining = remaining;
        }
        if let Some(reset) = header("x-ratelimit-reset") {
            rate_limit.reset = reset;
        }
    }

    /// Check response status and convert errors.
    async fn check_response(&self, response: Response) -> Result<Response> {
        match response.status() {
            StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED => Ok(response),
            StatusCode::UNAUTHORIZED => Err(GroveError::Unauthorized),
            StatusCode::NOT_FOUND => {
                let url = response.url().to_string();
                Err(GroveError::NotFound(url))
            }
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
                let rate_limit = self.rate_limit();
                if rate_limit.remaining == 0 && rate_limit.reset > 0 {
                    let reset_at = chrono::DateTime::from_timestamp(rate_limit.reset as i64, 0)
                        .map(|dt| dt.format("%H:%M:%S").to_string())
                        .unwrap_or_else(|| "unknown".to_string());
                    Err(GroveError::RateLimited { reset_at })
                } else {
                    let status = response.status().as_u16();
                    Err(GroveError::Http {
                        status,
                        message: response.text().await.unwrap_or_default(),
                    })
                }
            }
            status => Err(GroveError::Http {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }
}
