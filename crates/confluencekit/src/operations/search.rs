//! CQL search

use super::{clamp_limit, decode, require_non_empty, Links, QueryOperations, SpaceRef};
use crate::client::ApiRequest;
use crate::error::ConfluenceError;
use crate::types::SearchResult;
use serde::Deserialize;
use tracing::{debug, info};

const SEARCH_PATH: &str = "/content/search";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

/// A result item, either a bare content object or a `{content, excerpt}` wrapper
#[derive(Debug, Default, Deserialize)]
struct SearchHit {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    excerpt: Option<String>,
    #[serde(default)]
    space: Option<SpaceRef>,
    #[serde(default, rename = "_links")]
    links: Links,
    #[serde(default)]
    content: Option<Box<SearchHit>>,
}

impl QueryOperations {
    /// Run a CQL query and return the first page of hits in API order
    ///
    /// `limit` is clamped to 1-100. Fails with
    /// [`ConfluenceError::Validation`] before any request if the query is
    /// blank.
    pub async fn search(
        &self,
        cql: &str,
        limit: i64,
    ) -> Result<Vec<SearchResult>, ConfluenceError> {
        let cql = require_non_empty(cql, "CQL query")?;
        let limit = clamp_limit(limit);

        info!(cql = %cql, limit, "Searching pages");

        let request = ApiRequest::new(SEARCH_PATH)
            .query("cql", cql)
            .query("limit", limit)
            .query("expand", "space");
        let response: SearchResponse = decode(self.client.get(&request).await?)?;

        let results: Vec<SearchResult> = response
            .results
            .into_iter()
            .filter_map(|hit| self.shape_hit(hit))
            .collect();

        debug!(count = results.len(), "Search complete");
        Ok(results)
    }

    fn shape_hit(&self, hit: SearchHit) -> Option<SearchResult> {
        let SearchHit {
            id,
            title,
            excerpt,
            space,
            links,
            content,
        } = hit;

        // Wrapped form: identity lives on the inner content object
        let (id, title, space, links) = match content {
            Some(inner) => (
                inner.id,
                inner.title.or(title),
                inner.space.or(space),
                inner.links,
            ),
            None => (id, title, space, links),
        };

        let Some(id) = id.filter(|id| !id.trim().is_empty()) else {
            debug!("Skipping search hit without id");
            return None;
        };

        Some(SearchResult {
            url: self.client.page_url(links.webui.as_deref(), &id),
            title: title.unwrap_or_default(),
            container_key: space.and_then(|s| s.key).filter(|k| !k.is_empty()),
            excerpt: excerpt.filter(|e| !e.trim().is_empty()),
            id,
        })
    }
}
