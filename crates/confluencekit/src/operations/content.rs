//! Page retrieval

use super::{decode, require_non_empty, Links, QueryOperations, SpaceRef};
use crate::client::ApiRequest;
use crate::convert::html_to_markdown;
use crate::error::ConfluenceError;
use crate::types::{ContentFormat, PageContent};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Fields expanded on a page fetch
const PAGE_EXPAND: &str = "body.storage,version,space,history,history.lastUpdated";

#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    body: Option<Body>,
    #[serde(default)]
    version: Option<Version>,
    #[serde(default)]
    space: Option<SpaceRef>,
    #[serde(default)]
    history: Option<History>,
    #[serde(default, rename = "_links")]
    links: Links,
}

#[derive(Debug, Deserialize)]
struct Body {
    #[serde(default)]
    storage: Option<Storage>,
}

#[derive(Debug, Deserialize)]
struct Storage {
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct Version {
    #[serde(default)]
    number: Option<u64>,
    #[serde(default)]
    when: Option<String>,
    #[serde(default)]
    by: Option<User>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct History {
    #[serde(default)]
    created_date: Option<String>,
    #[serde(default)]
    last_updated: Option<LastUpdated>,
}

#[derive(Debug, Deserialize)]
struct LastUpdated {
    #[serde(default)]
    when: Option<String>,
    #[serde(default)]
    by: Option<User>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct User {
    #[serde(default)]
    display_name: Option<String>,
    /// Server and Data Center only
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    public_name: Option<String>,
}

impl User {
    /// Display name, then username, then public name
    fn name(&self) -> Option<String> {
        [&self.display_name, &self.username, &self.public_name]
            .into_iter()
            .filter_map(|name| name.as_deref().map(str::trim))
            .find(|name| !name.is_empty())
            .map(str::to_string)
    }
}

impl QueryOperations {
    /// Fetch a page body with its metadata
    ///
    /// `format` is resolved with [`ContentFormat::from_name`]: `"html"`
    /// returns the storage body untouched, anything else converts it to
    /// markdown. Fails with [`ConfluenceError::NotFound`] when the page is
    /// missing or not visible, and with [`ConfluenceError::Conversion`]
    /// only when the body cannot be parsed.
    pub async fn get_content(
        &self,
        page_id: &str,
        format: &str,
    ) -> Result<PageContent, ConfluenceError> {
        let page_id = require_non_empty(page_id, "Page ID")?;
        let format = ContentFormat::from_name(format);

        info!(page_id = %page_id, format = %format, "Fetching page");

        let request = ApiRequest::new("/content")
            .segment(page_id)
            .query("expand", PAGE_EXPAND)
            .resource_id(page_id);
        let page: PageResponse = decode(self.client.get(&request).await?)?;

        let html = page
            .body
            .and_then(|b| b.storage)
            .map(|s| s.value)
            .unwrap_or_default();

        let content = match format {
            ContentFormat::Html => html,
            ContentFormat::Markdown => html_to_markdown(&html)?,
        };

        let id = page
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| page_id.to_string());

        let (created_at, updated_at, author) = page_dates(page.history, page.version.as_ref());
        let version = page
            .version
            .and_then(|v| v.number)
            .unwrap_or(1)
            .max(1);

        debug!(page_id = %id, version, chars = content.len(), "Page fetched");

        Ok(PageContent {
            url: self.client.page_url(page.links.webui.as_deref(), &id),
            title: page.title.unwrap_or_default(),
            content,
            format,
            container_key: page.space.and_then(|s| s.key).unwrap_or_default(),
            version,
            created_at,
            updated_at,
            author,
            id,
        })
    }
}

/// Creation time, last update time and last editor
///
/// The update time comes from the version, falling back to history, and
/// is never earlier than the creation time.
fn page_dates(
    history: Option<History>,
    version: Option<&Version>,
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>, Option<String>) {
    let (created, last_updated) = match history {
        Some(h) => (h.created_date, h.last_updated),
        None => (None, None),
    };

    let created_at = created.as_deref().and_then(parse_timestamp);

    let version_when = version.and_then(|v| v.when.as_deref()).and_then(parse_timestamp);
    let (history_when, history_by) = match last_updated {
        Some(lu) => (lu.when.as_deref().and_then(parse_timestamp), lu.by),
        None => (None, None),
    };

    let updated_at = match (version_when.or(history_when), created_at) {
        (Some(updated), Some(created)) if updated < created => Some(created),
        (updated, _) => updated,
    };

    let author = version
        .and_then(|v| v.by.as_ref())
        .and_then(User::name)
        .or_else(|| history_by.as_ref().and_then(User::name));

    (created_at, updated_at, author)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            warn!(value = %raw, error = %e, "Ignoring unparseable timestamp");
            None
        }
    }
}
