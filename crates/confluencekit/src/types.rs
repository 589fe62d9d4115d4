//! Core types for ConfluenceKit

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Output format of a page body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    /// Storage format converted to markdown
    #[default]
    Markdown,
    /// Raw storage-format XHTML
    Html,
}

impl ContentFormat {
    /// Resolve a caller-supplied format name
    ///
    /// `"html"` in any case selects [`ContentFormat::Html`]; every other
    /// value, including unknown ones, selects markdown.
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("html") {
            ContentFormat::Html
        } else {
            ContentFormat::Markdown
        }
    }

    /// Lowercase name as reported in [`PageContent::format`]
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentFormat::Markdown => "markdown",
            ContentFormat::Html => "html",
        }
    }
}

impl std::fmt::Display for ContentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One hit from a CQL search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Page id
    pub id: String,

    /// Page title
    pub title: String,

    /// Browser URL of the page
    pub url: String,

    /// Space key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_key: Option<String>,

    /// Highlighted excerpt, when the API returned a non-empty one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

/// A page body with its metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContent {
    /// Page id
    pub id: String,

    /// Page title
    pub title: String,

    /// Browser URL of the page
    pub url: String,

    /// Body in `format`
    pub content: String,

    /// Format actually returned
    pub format: ContentFormat,

    /// Space key, empty when the API omitted it
    pub container_key: String,

    /// Version number, at least 1
    pub version: u64,

    /// Creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Last modification time, never earlier than `created_at`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Display name of the last editor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

/// A direct child of a page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildPage {
    /// Page id
    pub id: String,

    /// Page title
    pub title: String,

    /// Browser URL of the page
    pub url: String,

    /// Zero-based position among its siblings
    pub position: usize,
}

/// Arguments of the `search_pages` tool
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SearchPagesRequest {
    /// CQL query, e.g. `type=page AND space=DOCS AND text~"deploy"`
    pub cql_query: String,

    /// Maximum number of results, clamped to 1-100 (default 10)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_limit"
    )]
    pub limit: Option<i64>,
}

impl SearchPagesRequest {
    /// Create a request for the given query
    pub fn new(cql_query: impl Into<String>) -> Self {
        Self {
            cql_query: cql_query.into(),
            limit: None,
        }
    }

    /// Set the result limit
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Arguments of the `get_page_content` tool
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct GetPageContentRequest {
    /// Page id
    pub page_id: String,

    /// "markdown" (default) or "html"; unknown values fall back to markdown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
}

impl GetPageContentRequest {
    /// Create a request for the given page
    pub fn new(page_id: impl Into<String>) -> Self {
        Self {
            page_id: page_id.into(),
            output_format: None,
        }
    }

    /// Request raw storage-format HTML
    pub fn as_html(mut self) -> Self {
        self.output_format = Some(ContentFormat::Html.as_str().to_string());
        self
    }

    /// Effective output format
    pub fn format(&self) -> ContentFormat {
        self.output_format
            .as_deref()
            .map(ContentFormat::from_name)
            .unwrap_or_default()
    }
}

/// Arguments of the `get_child_pages` tool
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct GetChildPagesRequest {
    /// Parent page id
    pub parent_id: String,

    /// Maximum number of children, clamped to 1-100 (default 50)
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_limit"
    )]
    pub limit: Option<i64>,
}

impl GetChildPagesRequest {
    /// Create a request for the given parent
    pub fn new(parent_id: impl Into<String>) -> Self {
        Self {
            parent_id: parent_id.into(),
            limit: None,
        }
    }

    /// Set the result limit
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Accept any JSON number or numeric string as a limit
///
/// Fractions are truncated and out-of-range values saturate; clamping to the
/// allowed range happens later.
fn lenient_limit<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| {
                    trimmed
                        .parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(|f| f as i64)
                })
                .map(Some)
                .ok_or_else(|| DeError::custom(format!("limit must be a number, got \"{}\"", s)))
        }
        Some(other) => Err(DeError::custom(format!(
            "limit must be a number, got {}",
            other
        ))),
    }
}
