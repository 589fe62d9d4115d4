//! ConfluenceKit - AI-friendly Confluence access library
//!
//! This crate provides read-only access to a Confluence instance: CQL
//! search, page retrieval with storage-format to markdown conversion, and
//! child page listing. Every failure is a typed [`ConfluenceError`].
//!
//! ```no_run
//! use confluencekit::{ApiClient, ApiTokenAuth, ClientConfig, Credentials, QueryOperations};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), confluencekit::ConfluenceError> {
//! let config = ClientConfig::new("https://example.atlassian.net/wiki")?;
//! let auth = ApiTokenAuth::new(Credentials::new("me@example.com", "api-token"))?;
//! let ops = QueryOperations::new(ApiClient::new(config, Arc::new(auth))?);
//!
//! for hit in ops.search("type=page AND space=DOCS", 10).await? {
//!     println!("{} {}", hit.id, hit.title);
//! }
//! # Ok(())
//! # }
//! ```

mod auth;
mod client;
mod config;
mod convert;
mod error;
mod operations;
mod retry;
mod tool;
mod types;

pub use auth::{ApiTokenAuth, AuthStrategy, OAuth2Auth};
pub use client::{ApiClient, ApiRequest, API_PATH, DEFAULT_RETRY_AFTER_SECS};
pub use config::{validate_base_url, ClientConfig, Credentials, DEFAULT_TIMEOUT};
pub use convert::html_to_markdown;
pub use error::ConfluenceError;
pub use operations::{
    clamp_limit, QueryOperations, DEFAULT_CHILDREN_LIMIT, DEFAULT_SEARCH_LIMIT, MAX_LIMIT,
    MIN_LIMIT,
};
pub use retry::{RetryPolicy, DEFAULT_BACKOFF, DEFAULT_MAX_RETRIES};
pub use tool::{
    ErrorPayload, ToolBuilder, ToolDefinition, Toolkit, GET_CHILD_PAGES, GET_PAGE_CONTENT,
    SEARCH_PAGES,
};
pub use types::{
    ChildPage, ContentFormat, GetChildPagesRequest, GetPageContentRequest, PageContent,
    SearchPagesRequest, SearchResult,
};

/// Default User-Agent string
pub const DEFAULT_USER_AGENT: &str = concat!("ConfluenceKit/", env!("CARGO_PKG_VERSION"));

/// Description of the `search_pages` tool
pub const SEARCH_PAGES_DESCRIPTION: &str = r#"Search Confluence pages using CQL (Confluence Query Language).

- Text content: text ~ "keyword"
- Page type: type = page
- Space: space = SPACEKEY
- Labels: label = "documentation"
- Returns id, title, url, container_key and excerpt for each hit
- Limit is clamped to 1-100 (default 10); only the first page is returned"#;

/// Description of the `get_page_content` tool
pub const GET_PAGE_CONTENT_DESCRIPTION: &str = r#"Get the full content of a Confluence page.

- Converts the storage format to markdown by default
- output_format "html" returns the original storage format
- Returns title, url, container_key, version, timestamps and author"#;

/// Description of the `get_child_pages` tool
pub const GET_CHILD_PAGES_DESCRIPTION: &str = r#"List the immediate children of a Confluence page.

- Returns id, title, url and position for each child
- Pages without children return an empty list
- Limit is clamped to 1-100 (default 50)"#;

/// Extended documentation for LLM consumption (llmtxt)
pub const TOOL_LLMTXT: &str = r#"# ConfluenceKit Tools

Read-only access to a Confluence instance.

## search_pages
- `cql_query` (required): CQL query string
- `limit` (optional): 1-100, default 10

Returns a list of `{id, title, url, container_key?, excerpt?}` in relevance order.

## get_page_content
- `page_id` (required): numeric page id, visible in the page URL
  (https://domain.atlassian.net/wiki/spaces/SPACE/pages/{page_id}/Title)
- `output_format` (optional): "markdown" (default) or "html"; other values fall back to markdown

Returns `{id, title, url, content, format, container_key, version, created_at?, updated_at?, author?}`.

## get_child_pages
- `parent_id` (required): parent page id
- `limit` (optional): 1-100, default 50

Returns a list of `{id, title, url, position}` ordered by position.

## Examples

### Search a space
```json
{"cql_query": "space = DEV AND type = page AND text ~ \"deploy\"", "limit": 5}
```

### Fetch a page as markdown
```json
{"page_id": "123456"}
```

## Error Handling
Errors carry a `kind`: validation_error, authentication_error, not_found,
rate_limit (with `retry_after` seconds), network_error, api_error (with `status`),
conversion_error, not_implemented, configuration_error.
"#;
