//! Volumes API client (cover image lookup).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{CoverSource, LookupError};

const SERVICE: &str = "cover image service";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumesResponse {
    #[serde(default)]
    pub total_items: u64,
    #[serde(default)]
    pub items: Option<Vec<Volume>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    #[serde(default)]
    pub volume_info: Option<VolumeInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeInfo {
    #[serde(default)]
    pub image_links: Option<ImageLinks>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageLinks {
    pub thumbnail: Option<String>,
    pub small_thumbnail: Option<String>,
}

/// Queries the volumes endpoint with `?q=isbn:<isbn>`.
#[derive(Clone)]
pub struct CoverClient {
    client: Client,
    endpoint: String,
}

impl CoverClient {
    pub fn new(endpoint: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl CoverSource for CoverClient {
    async fn find_cover(&self, isbn: &str) -> Result<Option<String>, LookupError> {
        let query = format!("isbn:{}", isbn);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query.as_str())])
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| LookupError::from_reqwest(SERVICE, e))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| LookupError::from_reqwest(SERVICE, e))?;

        let volumes: VolumesResponse =
            serde_json::from_slice(&body).map_err(|e| LookupError::Decode {
                service: SERVICE,
                reason: e.to_string(),
            })?;

        Ok(select_cover(volumes))
    }
}

/// Pick the first volume's thumbnail, falling back to the small thumbnail.
pub fn select_cover(volumes: VolumesResponse) -> Option<String> {
    if volumes.total_items == 0 {
        return None;
    }

    let links = volumes
        .items?
        .into_iter()
        .next()?
        .volume_info?
        .image_links?;

    let non_empty = |url: Option<String>| url.filter(|url| !url.is_empty());
    non_empty(links.thumbnail)
        .or_else(|| non_empty(links.small_thumbnail))
        .map(upgrade_to_https)
}

/// Rewrite a leading `http://` to `https://`; any other URL is returned as is.
pub fn upgrade_to_https(url: String) -> String {
    match url.strip_prefix("http://") {
        Some(rest) => format!("https://{}", rest),
        None => url,
    }
}
