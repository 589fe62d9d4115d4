//! Authentication strategies
//!
//! Design: each mechanism is a separate [`AuthStrategy`] implementation
//! chosen once when the client is built. The client only ever asks a
//! strategy for headers; it never inspects which strategy it holds.

mod api_token;
mod oauth2;

pub use api_token::ApiTokenAuth;
pub use oauth2::OAuth2Auth;

use crate::error::ConfluenceError;
use async_trait::async_trait;
use reqwest::header::HeaderMap;

/// Trait for request authentication
///
/// Implementations must be cheap to call concurrently: the same instance is
/// shared by every in-flight request.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Identifier for logging
    fn name(&self) -> &'static str;

    /// Headers to attach to every API request
    async fn headers(&self) -> Result<HeaderMap, ConfluenceError>;

    /// Check the credentials with a lightweight authenticated call
    ///
    /// Fails with [`ConfluenceError::Authentication`] on 401/403 and
    /// [`ConfluenceError::Network`] when the server cannot be reached.
    async fn verify(&self) -> Result<(), ConfluenceError>;
}
