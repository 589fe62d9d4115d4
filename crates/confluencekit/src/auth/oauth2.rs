//! OAuth 2.0 (3LO) authentication
//!
//! Declared so callers can select it at construction time; the token
//! exchange itself is not implemented and every call reports
//! [`ConfluenceError::NotImplemented`].

use crate::auth::AuthStrategy;
use crate::error::ConfluenceError;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use secrecy::{ExposeSecret, SecretString};

/// Scope requested when none are given
pub const DEFAULT_OAUTH_SCOPE: &str = "read:confluence-content.all";

const NOT_IMPLEMENTED: &str = "OAuth 2.0 authentication";

/// OAuth 2.0 authorization-code strategy (not implemented)
#[derive(Debug, Clone)]
pub struct OAuth2Auth {
    client_id: String,
    client_secret: SecretString,
    redirect_uri: String,
    scopes: Vec<String>,
}

impl OAuth2Auth {
    /// Create the strategy with the default scope
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
            redirect_uri: redirect_uri.into(),
            scopes: vec![DEFAULT_OAUTH_SCOPE.to_string()],
        }
    }

    /// Replace the requested scopes
    pub fn scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Requested scopes
    pub fn requested_scopes(&self) -> &[String] {
        &self.scopes
    }

    /// True if client id, secret and redirect URI are all present
    pub fn is_configured(&self) -> bool {
        !self.client_id.trim().is_empty()
            && !self.client_secret.expose_secret().trim().is_empty()
            && !self.redirect_uri.trim().is_empty()
    }
}

#[async_trait]
impl AuthStrategy for OAuth2Auth {
    fn name(&self) -> &'static str {
        "oauth2"
    }

    async fn headers(&self) -> Result<HeaderMap, ConfluenceError> {
        Err(ConfluenceError::NotImplemented(NOT_IMPLEMENTED))
    }

    async fn verify(&self) -> Result<(), ConfluenceError> {
        Err(ConfluenceError::NotImplemented(NOT_IMPLEMENTED))
    }
}
