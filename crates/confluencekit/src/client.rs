//! HTTP client for the Confluence REST API
//!
//! [`ApiClient`] owns the connection pool and the auth strategy. It turns
//! an [`ApiRequest`] into one authenticated GET (plus at most the retries
//! the [`RetryPolicy`](crate::RetryPolicy) allows), maps every failure into
//! [`ConfluenceError`] and hands back the parsed JSON body.

use crate::auth::AuthStrategy;
use crate::config::ClientConfig;
use crate::error::ConfluenceError;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, RETRY_AFTER, USER_AGENT};
use reqwest::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// REST API v1 prefix, relative to the instance base URL
pub const API_PATH: &str = "/rest/api";

/// Retry hint used when a 429 carries no usable `Retry-After`
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Maximum characters of an error body kept in [`ConfluenceError::Api`]
const BODY_SNIPPET_CHARS: usize = 500;

/// A GET request against the REST API
///
/// `path` is relative to `{base}/rest/api`. Dynamic parts such as page ids
/// go through [`segment`](Self::segment) so they are percent-encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiRequest {
    path: String,
    segments: Vec<String>,
    query: Vec<(String, String)>,
    resource_id: Option<String>,
}

impl ApiRequest {
    /// Create a request for the given path, e.g. `/content/search`
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Append an encoded path segment
    pub fn segment(mut self, segment: impl Into<String>) -> Self {
        self.segments.push(segment.into());
        self
    }

    /// Add a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Id reported by [`ConfluenceError::NotFound`] if the API answers 404
    pub fn resource_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }

    /// Display form of the path, used in logs
    pub fn display_path(&self) -> String {
        let mut path = self.path.clone();
        for segment in &self.segments {
            path.push('/');
            path.push_str(segment);
        }
        path
    }
}

/// Authenticated Confluence REST client
///
/// Cheap to clone; clones share the connection pool and the auth strategy.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
    auth: Arc<dyn AuthStrategy>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.config.base_url())
            .field("auth", &self.auth.name())
            .finish()
    }
}

impl ApiClient {
    /// Build a client for one Confluence instance
    pub fn new(config: ClientConfig, auth: Arc<dyn AuthStrategy>) -> Result<Self, ConfluenceError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(config.user_agent_value())
                .unwrap_or_else(|_| HeaderValue::from_static(crate::DEFAULT_USER_AGENT)),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(config.request_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(ConfluenceError::ClientBuild)?;

        Ok(Self { http, config, auth })
    }

    /// Instance base URL without trailing slash
    pub fn base_url(&self) -> &str {
        self.config.base_url()
    }

    /// The auth strategy requests are signed with
    pub fn auth(&self) -> &dyn AuthStrategy {
        self.auth.as_ref()
    }

    /// Underlying HTTP client; clones share the connection pool
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Browser URL for a page, from its `_links.webui` path when present
    pub fn page_url(&self, webui: Option<&str>, id: &str) -> String {
        match webui.filter(|path| !path.is_empty()) {
            Some(path) => format!("{}{}", self.base_url(), path),
            None => format!("{}/pages/{}", self.base_url(), id),
        }
    }

    /// Issue a GET and return the parsed JSON body
    ///
    /// Transport failures are retried according to the configured
    /// [`RetryPolicy`](crate::RetryPolicy); HTTP error statuses never are.
    pub async fn get(&self, request: &ApiRequest) -> Result<Value, ConfluenceError> {
        let url = self.endpoint(request)?;
        let policy = self.config.retry_policy();
        let mut retries = 0;

        loop {
            match self.send_once(&url, request).await {
                Ok(body) => return Ok(body),
                Err(err) => match policy.next_delay(retries, &err) {
                    Some(delay) => {
                        warn!(
                            path = %request.display_path(),
                            error = %err,
                            delay_ms = delay.as_millis() as u64,
                            "Transport failure, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        retries += 1;
                    }
                    None => return Err(err),
                },
            }
        }
    }

    /// Full URL for a request
    fn endpoint(&self, request: &ApiRequest) -> Result<Url, ConfluenceError> {
        let raw = format!("{}{}{}", self.base_url(), API_PATH, request.path);
        let mut url = Url::parse(&raw)
            .map_err(|e| ConfluenceError::Configuration(format!("invalid URL {}: {}", raw, e)))?;

        if !request.segments.is_empty() {
            url.path_segments_mut()
                .map_err(|_| {
                    ConfluenceError::Configuration(format!("URL cannot take a path: {}", raw))
                })?
                .pop_if_empty()
                .extend(request.segments.iter());
        }

        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }

    async fn send_once(&self, url: &Url, request: &ApiRequest) -> Result<Value, ConfluenceError> {
        let headers = self.auth.headers().await?;

        debug!(url = %url, "GET");
        let response = self
            .http
            .get(url.clone())
            .headers(headers)
            .send()
            .await
            .map_err(ConfluenceError::from_reqwest)?;

        let status = response.status();
        let retry_after = response.headers().get(RETRY_AFTER).cloned();
        let body: Bytes = response
            .bytes()
            .await
            .map_err(ConfluenceError::from_reqwest)?;

        if !status.is_success() {
            let resource = request
                .resource_id
                .clone()
                .unwrap_or_else(|| request.display_path());
            return Err(error_for_status(
                status,
                retry_after.as_ref(),
                &body,
                Some(&resource),
            ));
        }

        serde_json::from_slice(&body).map_err(|e| ConfluenceError::Api {
            status: status.as_u16(),
            body: format!("invalid JSON response: {}", e),
        })
    }
}

/// Map a non-success response to the error taxonomy
///
/// `resource_id` is reported for 404; without one a 404 is a plain
/// [`ConfluenceError::Api`].
pub(crate) fn error_for_status(
    status: StatusCode,
    retry_after: Option<&HeaderValue>,
    body: &[u8],
    resource_id: Option<&str>,
) -> ConfluenceError {
    match (status, resource_id) {
        (StatusCode::UNAUTHORIZED, _) => ConfluenceError::Authentication {
            message: "Invalid API token or email".to_string(),
            status: Some(status.as_u16()),
        },
        (StatusCode::FORBIDDEN, _) => ConfluenceError::Authentication {
            message: "Access forbidden: valid credentials but insufficient permissions"
                .to_string(),
            status: Some(status.as_u16()),
        },
        (StatusCode::NOT_FOUND, Some(id)) => ConfluenceError::NotFound { id: id.to_string() },
        (StatusCode::TOO_MANY_REQUESTS, _) => ConfluenceError::RateLimit {
            retry_after: parse_retry_after(retry_after),
        },
        _ => ConfluenceError::Api {
            status: status.as_u16(),
            body: body_snippet(body),
        },
    }
}

/// Seconds from a `Retry-After` header, or the default
fn parse_retry_after(value: Option<&HeaderValue>) -> u64 {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

/// First [`BODY_SNIPPET_CHARS`] characters of a response body
fn body_snippet(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.chars().count() <= BODY_SNIPPET_CHARS {
        return text.to_string();
    }
    let mut snippet: String = text.chars().take(BODY_SNIPPET_CHARS).collect();
    snippet.push_str("...");
    snippet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ApiTokenAuth;
    use crate::config::Credentials;

    fn client(base: &str) -> ApiClient {
        let config = ClientConfig::new(base).unwrap();
        let auth = ApiTokenAuth::new(Credentials::new("user@example.com", "token")).unwrap();
        ApiClient::new(config, Arc::new(auth)).unwrap()
    }

    #[test]
    fn test_endpoint_composition() {
        let client = client("https://example.atlassian.net/wiki/");
        let request = ApiRequest::new("/content/search")
            .query("cql", "type=page AND space=DOCS")
            .query("limit", 10);
        let url = client.endpoint(&request).unwrap();

        assert_eq!(url.path(), "/wiki/rest/api/content/search");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("cql".to_string(), "type=page AND space=DOCS".to_string()),
                ("limit".to_string(), "10".to_string()),
            ]
        );
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let client = client("https://example.atlassian.net/wiki");
        let request = ApiRequest::new("/content")
            .segment("12/34?x")
            .segment("child")
            .segment("page");
        let url = client.endpoint(&request).unwrap();
        assert_eq!(url.path(), "/wiki/rest/api/content/12%2F34%3Fx/child/page");
    }

    #[test]
    fn test_page_url() {
        let client = client("https://example.atlassian.net/wiki");
        assert_eq!(
            client.page_url(Some("/spaces/DOCS/pages/123/Title"), "123"),
            "https://example.atlassian.net/wiki/spaces/DOCS/pages/123/Title"
        );
        assert_eq!(
            client.page_url(None, "123"),
            "https://example.atlassian.net/wiki/pages/123"
        );
        assert_eq!(
            client.page_url(Some(""), "123"),
            "https://example.atlassian.net/wiki/pages/123"
        );
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            error_for_status(StatusCode::UNAUTHORIZED, None, b"", Some("1")),
            ConfluenceError::Authentication {
                status: Some(401),
                ..
            }
        ));
        assert!(matches!(
            error_for_status(StatusCode::FORBIDDEN, None, b"", Some("1")),
            ConfluenceError::Authentication {
                status: Some(403),
                ..
            }
        ));
        match error_for_status(StatusCode::NOT_FOUND, None, b"", Some("999999")) {
            ConfluenceError::NotFound { id } => assert_eq!(id, "999999"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(
            error_for_status(StatusCode::NOT_FOUND, None, b"", None),
            ConfluenceError::Api { status: 404, .. }
        ));
        match error_for_status(StatusCode::BAD_GATEWAY, None, b"  upstream down  ", None) {
            ConfluenceError::Api { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body, "upstream down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_retry_after_parsing() {
        let thirty = HeaderValue::from_static("30");
        assert_eq!(parse_retry_after(Some(&thirty)), 30);

        let date = HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(parse_retry_after(Some(&date)), DEFAULT_RETRY_AFTER_SECS);
        assert_eq!(parse_retry_after(None), DEFAULT_RETRY_AFTER_SECS);

        assert!(matches!(
            error_for_status(StatusCode::TOO_MANY_REQUESTS, Some(&thirty), b"", None),
            ConfluenceError::RateLimit { retry_after: 30 }
        ));
    }

    #[test]
    fn test_body_snippet_truncates_on_char_boundary() {
        let long = "é".repeat(BODY_SNIPPET_CHARS + 10);
        let snippet = body_snippet(long.as_bytes());
        assert!(snippet.ends_with("..."));
        assert_eq!(snippet.chars().count(), BODY_SNIPPET_CHARS + 3);
    }

    #[test]
    fn test_request_display_path() {
        let request = ApiRequest::new("/content").segment("123").segment("child");
        assert_eq!(request.display_path(), "/content/123/child");
    }
}
