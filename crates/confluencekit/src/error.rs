//! Error types for ConfluenceKit

use thiserror::Error;

/// Errors that can occur while talking to Confluence
///
/// Every failure of an operation surfaces as one of these variants.
/// Callers branch on the variant (or on [`ConfluenceError::kind`]),
/// never on the message text.
#[derive(Debug, Error)]
pub enum ConfluenceError {
    /// Caller input was rejected before any request was sent
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Credentials were rejected (401) or lack permission (403)
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Human-readable reason
        message: String,
        /// HTTP status, when the failure came from a response
        status: Option<u16>,
    },

    /// The requested page does not exist or is not visible to the caller
    #[error("Page not found: {id}")]
    NotFound {
        /// The id that was requested
        id: String,
    },

    /// Confluence rate limit hit
    #[error("Rate limit exceeded: retry after {retry_after} seconds")]
    RateLimit {
        /// Seconds to wait, from `Retry-After` or the default
        retry_after: u64,
    },

    /// Transport failure (connect, timeout, connection reset)
    #[error("Network error: {0}")]
    Network(String),

    /// Any other non-success response
    #[error("Confluence API error (HTTP {status}): {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Truncated response body
        body: String,
    },

    /// Storage-format HTML could not be parsed
    #[error("Failed to convert content: {0}")]
    Conversion(String),

    /// Declared but unimplemented capability
    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Failed to build HTTP client
    #[error("Failed to create HTTP client")]
    ClientBuild(#[source] reqwest::Error),
}

impl ConfluenceError {
    /// Create an error from a reqwest transport error
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ConfluenceError::Network(format!("request timed out: {}", err))
        } else if err.is_connect() {
            ConfluenceError::Network(format!("failed to connect: {}", err))
        } else {
            ConfluenceError::Network(err.to_string())
        }
    }

    /// Shorthand for an authentication failure without a response status
    pub fn authentication(message: impl Into<String>) -> Self {
        ConfluenceError::Authentication {
            message: message.into(),
            status: None,
        }
    }

    /// Stable machine-readable discriminator
    pub fn kind(&self) -> &'static str {
        match self {
            ConfluenceError::Validation(_) => "validation_error",
            ConfluenceError::Authentication { .. } => "authentication_error",
            ConfluenceError::NotFound { .. } => "not_found",
            ConfluenceError::RateLimit { .. } => "rate_limit",
            ConfluenceError::Network(_) => "network_error",
            ConfluenceError::Api { .. } => "api_error",
            ConfluenceError::Conversion(_) => "conversion_error",
            ConfluenceError::NotImplemented(_) => "not_implemented",
            ConfluenceError::Configuration(_) | ConfluenceError::ClientBuild(_) => {
                "configuration_error"
            }
        }
    }

    /// True for transport-class failures, the only ones worth an automatic retry
    pub fn is_transport(&self) -> bool {
        matches!(self, ConfluenceError::Network(_))
    }
}
