//! Client configuration
//!
//! Configuration is an explicit value built once at startup and handed to
//! [`ApiClient`](crate::ApiClient) and the auth strategies. Nothing here
//! reads the environment; loading is the caller's job.

use crate::error::ConfluenceError;
use crate::retry::RetryPolicy;
use crate::DEFAULT_USER_AGENT;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings for talking to one Confluence instance
#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: String,
    timeout: Duration,
    retry: RetryPolicy,
    user_agent: String,
}

impl ClientConfig {
    /// Create a config for the given base URL
    ///
    /// The URL must be `http://` or `https://` with a host, e.g.
    /// `https://example.atlassian.net/wiki`. Trailing slashes are removed.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, ConfluenceError> {
        Ok(Self {
            base_url: validate_base_url(base_url.as_ref())?,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        })
    }

    /// Set the per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry policy
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set a custom User-Agent
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Per-request timeout
    pub fn request_timeout(&self) -> Duration {
        self.timeout
    }

    /// Retry policy
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// User-Agent header value
    pub fn user_agent_value(&self) -> &str {
        &self.user_agent
    }
}

/// Validate and normalize a Confluence base URL
pub fn validate_base_url(raw: &str) -> Result<String, ConfluenceError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ConfluenceError::Configuration(
            "base URL cannot be empty".to_string(),
        ));
    }

    let parsed = Url::parse(raw).map_err(|e| {
        ConfluenceError::Configuration(format!(
            "base URL must include a scheme (http:// or https://): {} ({})",
            raw, e
        ))
    })?;

    match parsed.scheme() {
        "https" => {}
        "http" => warn!(url = raw, "Using non-HTTPS base URL"),
        other => {
            return Err(ConfluenceError::Configuration(format!(
                "base URL scheme must be 'http' or 'https', got '{}'",
                other
            )))
        }
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(ConfluenceError::Configuration(format!(
            "base URL must include a host: {}",
            raw
        )));
    }

    Ok(raw.trim_end_matches('/').to_string())
}

/// Email + API token pair for Basic authentication
///
/// Immutable once built. The token is held as a [`SecretString`] and the
/// email is masked in `Debug`, so neither reaches logs.
#[derive(Clone)]
pub struct Credentials {
    email: String,
    api_token: SecretString,
}

impl Credentials {
    /// Create credentials
    pub fn new(email: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            api_token: SecretString::new(api_token.into()),
        }
    }

    /// Account email
    pub fn email(&self) -> &str {
        &self.email
    }

    /// API token
    pub fn api_token(&self) -> &SecretString {
        &self.api_token
    }

    /// True if either part is blank
    pub fn is_incomplete(&self) -> bool {
        self.email.trim().is_empty() || self.api_token.expose_secret().trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &mask_email(&self.email))
            .field("api_token", &self.api_token)
            .finish()
    }
}

/// Show only the first character of the local part and the domain
pub(crate) fn mask_email(email: &str) -> String {
    match email.split_once('@') {
        Some((local, domain)) if !domain.contains('@') => match local.chars().next() {
            Some(first) => format!("{}***@{}", first, domain),
            None => format!("***@{}", domain),
        },
        _ => "***".to_string(),
    }
}
