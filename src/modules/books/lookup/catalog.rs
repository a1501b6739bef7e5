//! Bibliographic OpenSearch client (title lookup).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{CatalogSource, LookupError};
use crate::modules::books::models::BookInfo;

const SERVICE: &str = "bibliographic catalog";

/// RSS 1.0 namespace; un-namespaced (RSS 2.0) feeds are accepted as well.
const RSS_NS: &str = "http://purl.org/rss/1.0/";

/// Queries the bibliographic search endpoint with `?isbn=`.
#[derive(Clone)]
pub struct CatalogClient {
    client: Client,
    endpoint: String,
}

impl CatalogClient {
    pub fn new(endpoint: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl CatalogSource for CatalogClient {
    async fn find_title(&self, isbn: &str) -> Result<Option<BookInfo>, LookupError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("isbn", isbn)])
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| LookupError::from_reqwest(SERVICE, e))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| LookupError::from_reqwest(SERVICE, e))?;

        let Ok(body) = std::str::from_utf8(&body) else {
            tracing::warn!(%isbn, "catalog returned a non UTF-8 body");
            return Ok(None);
        };

        Ok(parse_feed(isbn, body))
    }
}

/// Extract the title of the first feed item.
///
/// Malformed XML, a feed without items, and blank titles all yield `None`.
pub fn parse_feed(isbn: &str, body: &str) -> Option<BookInfo> {
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let doc = match roxmltree::Document::parse_with_options(body, options) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(%isbn, error = %e, "catalog returned invalid XML");
            return None;
        }
    };

    let item = doc.descendants().find(|node| {
        node.is_element()
            && node.tag_name().name() == "item"
            && matches!(node.tag_name().namespace(), None | Some(RSS_NS))
    })?;

    let namespace = item.tag_name().namespace();
    let title = item
        .children()
        .find(|node| {
            node.is_element()
                && node.tag_name().name() == "title"
                && node.tag_name().namespace() == namespace
        })?
        .text()?
        .trim();

    if title.is_empty() {
        return None;
    }

    Some(BookInfo {
        title: title.to_string(),
        cover_image_url: None,
    })
}
