//! Child page listing

use super::{clamp_limit, decode, require_non_empty, Links, QueryOperations};
use crate::client::ApiRequest;
use crate::error::ConfluenceError;
use crate::types::ChildPage;
use serde::Deserialize;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct ChildrenResponse {
    #[serde(default)]
    results: Vec<ChildEntry>,
}

#[derive(Debug, Deserialize)]
struct ChildEntry {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "_links")]
    links: Links,
}

impl QueryOperations {
    /// List the direct children of a page in sibling order
    ///
    /// `limit` is clamped to 1-100. A page without children yields an empty
    /// list; an unknown parent fails with [`ConfluenceError::NotFound`].
    pub async fn list_children(
        &self,
        parent_id: &str,
        limit: i64,
    ) -> Result<Vec<ChildPage>, ConfluenceError> {
        let parent_id = require_non_empty(parent_id, "Parent ID")?;
        let limit = clamp_limit(limit);

        info!(parent_id = %parent_id, limit, "Listing child pages");

        let request = ApiRequest::new("/content")
            .segment(parent_id)
            .segment("child")
            .segment("page")
            .query("limit", limit)
            .resource_id(parent_id);
        let response: ChildrenResponse = decode(self.client.get(&request).await?)?;

        // The API returns children in sibling order
        let children: Vec<ChildPage> = response
            .results
            .into_iter()
            .filter_map(|entry| {
                let id = entry.id.filter(|id| !id.trim().is_empty())?;
                Some((id, entry.title, entry.links))
            })
            .enumerate()
            .map(|(position, (id, title, links))| ChildPage {
                url: self.client.page_url(links.webui.as_deref(), &id),
                title: title.unwrap_or_default(),
                position,
                id,
            })
            .collect();

        debug!(parent_id = %parent_id, count = children.len(), "Children listed");
        Ok(children)
    }
}
