//! API token (Basic) authentication
//!
//! Atlassian Cloud accepts `email:api_token` as HTTP Basic credentials.

use crate::auth::AuthStrategy;
use crate::client::{error_for_status, ApiClient, API_PATH};
use crate::config::{mask_email, Credentials};
use crate::error::ConfluenceError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, RETRY_AFTER};
use secrecy::ExposeSecret;
use std::fmt;
use tracing::{debug, info};

/// Lightweight endpoint used to check credentials
const CURRENT_USER_PATH: &str = "/user/current";

/// Instance `verify` checks against, sharing the API client's connection pool
#[derive(Clone)]
struct VerifyTarget {
    base_url: String,
    http: reqwest::Client,
}

/// Basic authentication with an Atlassian API token
///
/// The `Authorization` value is encoded once at construction and reused
/// for every request.
#[derive(Clone)]
pub struct ApiTokenAuth {
    credentials: Credentials,
    authorization: HeaderValue,
    target: Option<VerifyTarget>,
}

impl ApiTokenAuth {
    /// Create the strategy from an email + token pair
    ///
    /// Fails with [`ConfluenceError::Authentication`] if either is blank.
    pub fn new(credentials: Credentials) -> Result<Self, ConfluenceError> {
        if credentials.is_incomplete() {
            return Err(ConfluenceError::authentication(
                "Email and API token are required",
            ));
        }

        let encoded = B64.encode(format!(
            "{}:{}",
            credentials.email(),
            credentials.api_token().expose_secret()
        ));
        let mut authorization = HeaderValue::from_str(&format!("Basic {}", encoded))
            .map_err(|e| ConfluenceError::Configuration(format!("invalid credentials: {}", e)))?;
        authorization.set_sensitive(true);

        Ok(Self {
            credentials,
            authorization,
            target: None,
        })
    }

    /// Point `verify` at the instance `client` talks to
    ///
    /// `verify` reuses the client's connection pool, default headers and
    /// timeout. Without a client it has nothing to check and succeeds
    /// immediately.
    pub fn with_client(mut self, client: &ApiClient) -> Self {
        self.target = Some(VerifyTarget {
            base_url: client.base_url().to_string(),
            http: client.http().clone(),
        });
        self
    }
}

impl fmt::Debug for ApiTokenAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiTokenAuth")
            .field("credentials", &self.credentials)
            .field("target", &self.target.as_ref().map(|t| &t.base_url))
            .finish()
    }
}

#[async_trait]
impl AuthStrategy for ApiTokenAuth {
    fn name(&self) -> &'static str {
        "api_token"
    }

    async fn headers(&self) -> Result<HeaderMap, ConfluenceError> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, self.authorization.clone());
        Ok(headers)
    }

    async fn verify(&self) -> Result<(), ConfluenceError> {
        let Some(target) = &self.target else {
            debug!("No base URL configured, skipping credential check");
            return Ok(());
        };

        let url = format!("{}{}{}", target.base_url, API_PATH, CURRENT_USER_PATH);
        let response = target
            .http
            .get(&url)
            .headers(self.headers().await?)
            .send()
            .await
            .map_err(ConfluenceError::from_reqwest)?;

        let status = response.status();
        if status.is_success() {
            info!(
                user = %mask_email(self.credentials.email()),
                "Confluence credentials verified"
            );
            return Ok(());
        }

        let retry_after = response.headers().get(RETRY_AFTER).cloned();
        let body = response
            .bytes()
            .await
            .map_err(ConfluenceError::from_reqwest)?;
        Err(error_for_status(status, retry_after.as_ref(), &body, None))
    }
}
