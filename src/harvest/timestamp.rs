//! Timestamp client
//!
//! Reads the creation time of a comment from the metadata endpoint, which
//! answers a listing shaped like `{"data": {"children": [{"data": {"created_utc": ...}}]}}`.

use crate::config::EndpointConfig;
use crate::harvest::fetcher::fetch_url;
use crate::state::{CommentId, DropReason};
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct InfoResponse {
    data: Option<InfoListing>,
}

#[derive(Debug, Deserialize)]
struct InfoListing {
    #[serde(default)]
    children: Vec<InfoChild>,
}

#[derive(Debug, Deserialize)]
struct InfoChild {
    data: InfoItem,
}

#[derive(Debug, Deserialize)]
struct InfoItem {
    created_utc: Option<f64>,
}

/// Extracts the creation epoch of the first item in a metadata response
pub fn parse_created_utc(url: &str, body: &str) -> Result<i64, DropReason> {
    if body.trim().is_empty() {
        return Err(DropReason::NoTimestamp);
    }

    let response: InfoResponse =
        serde_json::from_str(body).map_err(|e| DropReason::MalformedResponse {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    response
        .data
        .and_then(|listing| listing.children.into_iter().next())
        .and_then(|child| child.data.created_utc)
        .filter(|created| created.is_finite())
        .map(|created| created.trunc() as i64)
        .ok_or(DropReason::NoTimestamp)
}

/// Client for the comment metadata endpoint
#[derive(Debug, Clone)]
pub struct TimestampClient {
    client: Client,
    endpoints: EndpointConfig,
}

impl TimestampClient {
    pub fn new(client: Client, endpoints: &EndpointConfig) -> Self {
        Self {
            client,
            endpoints: endpoints.clone(),
        }
    }

    /// Creation time of the comment, epoch seconds
    pub async fn fetch(&self, id: &CommentId) -> Result<i64, DropReason> {
        let url = self.endpoints.metadata_url(id.fullname());
        let body = fetch_url(&self.client, &url).await.into_body(&url)?;
        parse_created_utc(&url, &body)
    }
}
