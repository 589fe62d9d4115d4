//! Query operations
//!
//! Each operation validates its input before touching the network, issues
//! exactly one logical request through [`ApiClient`] and shapes the JSON
//! response into the public types. Operations keep no state between calls.

mod children;
mod content;
mod search;

use crate::client::ApiClient;
use crate::error::ConfluenceError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

/// Smallest accepted result limit
pub const MIN_LIMIT: u32 = 1;

/// Largest accepted result limit
pub const MAX_LIMIT: u32 = 100;

/// Default number of search results
pub const DEFAULT_SEARCH_LIMIT: u32 = 10;

/// Default number of child pages
pub const DEFAULT_CHILDREN_LIMIT: u32 = 50;

/// Search, page retrieval and child listing over one client
///
/// Cheap to clone; safe to call concurrently from many tasks.
#[derive(Debug, Clone)]
pub struct QueryOperations {
    client: ApiClient,
}

impl QueryOperations {
    /// Create operations over a configured client
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Underlying client
    pub fn client(&self) -> &ApiClient {
        &self.client
    }
}

/// Clamp a caller-supplied limit into `[MIN_LIMIT, MAX_LIMIT]`
pub fn clamp_limit(limit: i64) -> u32 {
    limit.clamp(MIN_LIMIT as i64, MAX_LIMIT as i64) as u32
}

/// Trimmed value, or a validation error naming the field
fn require_non_empty<'a>(value: &'a str, field: &str) -> Result<&'a str, ConfluenceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfluenceError::Validation(format!(
            "{} cannot be empty",
            field
        )));
    }
    Ok(trimmed)
}

/// Decode a response body into its expected shape
fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ConfluenceError> {
    serde_json::from_value(value).map_err(|e| ConfluenceError::Api {
        status: 200,
        body: format!("unexpected response shape: {}", e),
    })
}

/// `_links` object on content responses
#[derive(Debug, Default, Deserialize)]
struct Links {
    #[serde(default)]
    webui: Option<String>,
}

/// `space` object on content responses
#[derive(Debug, Default, Deserialize)]
struct SpaceRef {
    #[serde(default)]
    key: Option<String>,
}
