//! Tool builder and contract for ConfluenceKit
//!
//! Exposes the three query operations as named tools with JSON Schema
//! inputs, for agent runtimes and the MCP server.

use crate::error::ConfluenceError;
use crate::operations::{QueryOperations, DEFAULT_CHILDREN_LIMIT, DEFAULT_SEARCH_LIMIT};
use crate::types::{
    ChildPage, ContentFormat, GetChildPagesRequest, GetPageContentRequest, PageContent,
    SearchPagesRequest, SearchResult,
};
use crate::{
    GET_CHILD_PAGES_DESCRIPTION, GET_PAGE_CONTENT_DESCRIPTION, SEARCH_PAGES_DESCRIPTION,
    TOOL_LLMTXT,
};
use schemars::schema_for;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Tool name for CQL search
pub const SEARCH_PAGES: &str = "search_pages";

/// Tool name for page retrieval
pub const GET_PAGE_CONTENT: &str = "get_page_content";

/// Tool name for child listing
pub const GET_CHILD_PAGES: &str = "get_child_pages";

/// Name, description and input schema of one tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,
    /// Description for LLM consumption
    pub description: String,
    /// JSON Schema of the arguments
    pub input_schema: Value,
}

/// Structured error returned to tool callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Stable discriminator, see [`ConfluenceError::kind`]
    pub kind: String,
    /// Human-readable message
    pub message: String,
    /// Seconds to wait before retrying (rate limit only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    /// HTTP status, when the error came from a response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Requested id (not found only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl From<&ConfluenceError> for ErrorPayload {
    fn from(err: &ConfluenceError) -> Self {
        let mut payload = ErrorPayload {
            kind: err.kind().to_string(),
            message: err.to_string(),
            retry_after: None,
            status: None,
            id: None,
        };
        match err {
            ConfluenceError::RateLimit { retry_after } => payload.retry_after = Some(*retry_after),
            ConfluenceError::Authentication { status, .. } => payload.status = *status,
            ConfluenceError::Api { status, .. } => payload.status = Some(*status),
            ConfluenceError::NotFound { id } => payload.id = Some(id.clone()),
            _ => {}
        }
        payload
    }
}

/// Builder for configuring the toolkit
#[derive(Debug, Clone)]
pub struct ToolBuilder {
    enable_search: bool,
    enable_content: bool,
    enable_children: bool,
    default_format: ContentFormat,
}

impl Default for ToolBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolBuilder {
    /// Create a builder with every tool enabled
    pub fn new() -> Self {
        Self {
            enable_search: true,
            enable_content: true,
            enable_children: true,
            default_format: ContentFormat::Markdown,
        }
    }

    /// Enable the `search_pages` tool
    pub fn enable_search(mut self, enable: bool) -> Self {
        self.enable_search = enable;
        self
    }

    /// Enable the `get_page_content` tool
    pub fn enable_content(mut self, enable: bool) -> Self {
        self.enable_content = enable;
        self
    }

    /// Enable the `get_child_pages` tool
    pub fn enable_children(mut self, enable: bool) -> Self {
        self.enable_children = enable;
        self
    }

    /// Format used when `get_page_content` is called without one
    pub fn default_format(mut self, format: ContentFormat) -> Self {
        self.default_format = format;
        self
    }

    /// Build the toolkit over the given operations
    pub fn build(self, operations: QueryOperations) -> Toolkit {
        Toolkit {
            operations,
            enable_search: self.enable_search,
            enable_content: self.enable_content,
            enable_children: self.enable_children,
            default_format: self.default_format,
        }
    }
}

/// Configured set of Confluence tools
#[derive(Debug, Clone)]
pub struct Toolkit {
    operations: QueryOperations,
    enable_search: bool,
    enable_content: bool,
    enable_children: bool,
    default_format: ContentFormat,
}

impl Toolkit {
    /// Create a new tool builder
    pub fn builder() -> ToolBuilder {
        ToolBuilder::new()
    }

    /// Toolkit with every tool enabled
    pub fn new(operations: QueryOperations) -> Self {
        ToolBuilder::new().build(operations)
    }

    /// Get full documentation (llmtxt)
    pub fn llmtxt(&self) -> &'static str {
        TOOL_LLMTXT
    }

    /// Definitions of the enabled tools
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut tools = Vec::new();
        if self.enable_search {
            tools.push(definition(
                SEARCH_PAGES,
                SEARCH_PAGES_DESCRIPTION,
                serde_json::to_value(schema_for!(SearchPagesRequest)).unwrap_or_default(),
            ));
        }
        if self.enable_content {
            tools.push(definition(
                GET_PAGE_CONTENT,
                GET_PAGE_CONTENT_DESCRIPTION,
                serde_json::to_value(schema_for!(GetPageContentRequest)).unwrap_or_default(),
            ));
        }
        if self.enable_children {
            tools.push(definition(
                GET_CHILD_PAGES,
                GET_CHILD_PAGES_DESCRIPTION,
                serde_json::to_value(schema_for!(GetChildPagesRequest)).unwrap_or_default(),
            ));
        }
        tools
    }

    /// Dispatch a tool call by name and return its JSON result
    ///
    /// Unknown or disabled tools and undecodable arguments fail with
    /// [`ConfluenceError::Validation`].
    pub async fn call(&self, name: &str, arguments: Value) -> Result<Value, ConfluenceError> {
        debug!(tool = %name, "Tool call");
        match name {
            SEARCH_PAGES if self.enable_search => {
                to_json(&self.search_pages(decode_args(name, arguments)?).await?)
            }
            GET_PAGE_CONTENT if self.enable_content => {
                to_json(&self.get_page_content(decode_args(name, arguments)?).await?)
            }
            GET_CHILD_PAGES if self.enable_children => {
                to_json(&self.get_child_pages(decode_args(name, arguments)?).await?)
            }
            _ => Err(ConfluenceError::Validation(format!("Unknown tool: {}", name))),
        }
    }

    /// Execute `search_pages`
    pub async fn search_pages(
        &self,
        req: SearchPagesRequest,
    ) -> Result<Vec<SearchResult>, ConfluenceError> {
        let limit = req.limit.unwrap_or(DEFAULT_SEARCH_LIMIT as i64);
        self.operations.search(&req.cql_query, limit).await
    }

    /// Execute `get_page_content`
    pub async fn get_page_content(
        &self,
        req: GetPageContentRequest,
    ) -> Result<PageContent, ConfluenceError> {
        let format = req
            .output_format
            .as_deref()
            .unwrap_or(self.default_format.as_str());
        self.operations.get_content(&req.page_id, format).await
    }

    /// Execute `get_child_pages`
    pub async fn get_child_pages(
        &self,
        req: GetChildPagesRequest,
    ) -> Result<Vec<ChildPage>, ConfluenceError> {
        let limit = req.limit.unwrap_or(DEFAULT_CHILDREN_LIMIT as i64);
        self.operations.list_children(&req.parent_id, limit).await
    }
}

fn definition(name: &str, description: &str, input_schema: Value) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

fn decode_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, ConfluenceError> {
    // Clients may omit arguments entirely
    let arguments = if arguments.is_null() {
        Value::Object(Default::default())
    } else {
        arguments
    };
    serde_json::from_value(arguments)
        .map_err(|e| ConfluenceError::Validation(format!("Invalid arguments for {}: {}", tool, e)))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ConfluenceError> {
    serde_json::to_value(value).map_err(|e| ConfluenceError::Api {
        status: 200,
        body: format!("failed to serialize result: {}", e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ApiTokenAuth;
    use crate::client::ApiClient;
    use crate::config::{ClientConfig, Credentials};
    use std::sync::Arc;

    fn toolkit(builder: ToolBuilder) -> Toolkit {
        let config = ClientConfig::new("https://example.atlassian.net/wiki").unwrap();
        let auth = ApiTokenAuth::new(Credentials::new("user@example.com", "token")).unwrap();
        let client = ApiClient::new(config, Arc::new(auth)).unwrap();
        builder.build(QueryOperations::new(client))
    }

    #[test]
    fn test_definitions() {
        let tools = toolkit(Toolkit::builder()).definitions();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec![SEARCH_PAGES, GET_PAGE_CONTENT, GET_CHILD_PAGES]);

        let search = &tools[0];
        assert!(!search.description.is_empty());
        assert!(search.input_schema["properties"]["cql_query"].is_object());
        assert!(search.input_schema["properties"]["limit"].is_object());
    }

    #[test]
    fn test_disabled_tools_are_hidden() {
        let tools = toolkit(Toolkit::builder().enable_children(false)).definitions();
        assert!(tools.iter().all(|t| t.name != GET_CHILD_PAGES));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let err = toolkit(Toolkit::builder())
            .call("delete_page", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfluenceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_disabled_tool_is_unknown() {
        let err = toolkit(Toolkit::builder().enable_search(false))
            .call(SEARCH_PAGES, serde_json::json!({"cql_query": "type=page"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfluenceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_bad_arguments() {
        let err = toolkit(Toolkit::builder())
            .call(GET_PAGE_CONTENT, serde_json::json!({"page_id": 42}))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfluenceError::Validation(_)));

        let err = toolkit(Toolkit::builder())
            .call(GET_CHILD_PAGES, Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, ConfluenceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_blank_input_fails_validation() {
        let err = toolkit(Toolkit::builder())
            .call(SEARCH_PAGES, serde_json::json!({"cql_query": "   "}))
            .await
            .unwrap_err();
        match err {
            ConfluenceError::Validation(msg) => assert!(msg.contains("CQL query")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_error_payload() {
        let payload = ErrorPayload::from(&ConfluenceError::RateLimit { retry_after: 30 });
        assert_eq!(payload.kind, "rate_limit");
        assert_eq!(payload.retry_after, Some(30));

        let payload = ErrorPayload::from(&ConfluenceError::NotFound {
            id: "999999".to_string(),
        });
        assert_eq!(payload.kind, "not_found");
        assert_eq!(payload.id.as_deref(), Some("999999"));

        let payload = ErrorPayload::from(&ConfluenceError::Api {
            status: 500,
            body: "boom".to_string(),
        });
        assert_eq!(payload.status, Some(500));

        let json = serde_json::to_value(ErrorPayload::from(&ConfluenceError::Network(
            "reset".to_string(),
        )))
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "network_error", "message": "Network error: reset"})
        );
    }
}
