//! Conditional GET against the configuration center.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::header::{IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use std::time::Duration;
use uuid::Uuid;

use crate::config::{HttpPoolConfig, RemoteConfig};
use crate::error::{SyncError, SyncResult};

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Render epoch millis as an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn format_http_date(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis).map(|d| d.format(HTTP_DATE_FORMAT).to_string())
}

/// Parse an HTTP-date header value into epoch millis.
pub fn parse_http_date(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|d| d.timestamp_millis())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub user: Option<String>,
    /// Already decoded.
    pub password: Option<String>,
    /// Modification time of the cached copy, 0 when unknown.
    pub known_modified: i64,
    pub known_etag: Option<String>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user: None,
            password: None,
            known_modified: 0,
            known_etag: None,
        }
    }
}

/// Classified response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Fresh,
    NotModified,
    NotFound,
    Transport,
    Unexpected(u16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status, 0 for a transport failure.
    pub code: u16,
    pub body: Option<Bytes>,
    /// Parsed `Last-Modified`, 0 when absent.
    pub last_modified: i64,
}

impl FetchResponse {
    pub fn transport_failure() -> Self {
        Self {
            code: 0,
            body: None,
            last_modified: 0,
        }
    }

    pub fn status(&self) -> FetchStatus {
        match self.code {
            0 => FetchStatus::Transport,
            200 => FetchStatus::Fresh,
            304 => FetchStatus::NotModified,
            404 => FetchStatus::NotFound,
            other => FetchStatus::Unexpected(other),
        }
    }
}

/// A client able to perform one conditional GET.
///
/// `Err(SyncError::Transport)` means no HTTP response was received.
#[async_trait]
pub trait WebClient: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> SyncResult<FetchResponse>;
}

/// reqwest backed [`WebClient`].
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    supports_etag: bool,
}

impl HttpClient {
    pub fn new(pool: &HttpPoolConfig, remote: &RemoteConfig) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(pool.user_agent.clone())
            .timeout(remote.web_request_timeout())
            .connect_timeout(remote.web_request_timeout())
            .pool_max_idle_per_host(pool.core_workers)
            .pool_idle_timeout(Duration::from_secs(pool.worker_idle_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            client,
            supports_etag: remote.supports_md5_etag,
        })
    }
}

#[async_trait]
impl WebClient for HttpClient {
    async fn fetch(&self, request: &FetchRequest) -> SyncResult<FetchResponse> {
        let request_id = Uuid::new_v4().to_string();
        let transport = |e: reqwest::Error| SyncError::Transport {
            url: request.url.clone(),
            reason: e.to_string(),
        };

        let mut builder = self
            .client
            .get(&request.url)
            .header("X-Request-Id", &request_id);
        if request.known_modified > 0 {
            if let Some(date) = format_http_date(request.known_modified) {
                builder = builder.header(IF_MODIFIED_SINCE, date);
            }
        }
        if self.supports_etag {
            if let Some(etag) = &request.known_etag {
                builder = builder.header(IF_NONE_MATCH, etag.as_str());
            }
        }
        if let Some(user) = &request.user {
            builder = builder.basic_auth(user, request.password.as_deref());
        }

        let response = builder.send().await.map_err(transport)?;
        let code = response.status().as_u16();
        let last_modified = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date)
            .unwrap_or(0);
        let body = if code == 200 {
            Some(response.bytes().await.map_err(transport)?)
        } else {
            None
        };

        tracing::debug!(
            url = %request.url,
            request_id = %request_id,
            code,
            last_modified,
            "Configuration center responded"
        );
        Ok(FetchResponse {
            code,
            body,
            last_modified,
        })
    }
}
