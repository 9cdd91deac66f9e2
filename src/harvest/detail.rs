//! Tip detail client
//!
//! Looks up amount, sender and receiver of a tip by the bare id of its
//! confirmation comment. The endpoint answers `{"tips": [...]}`; amounts may
//! arrive as JSON numbers or as strings. A tip missing any of its fields
//! counts as no data.

use crate::config::EndpointConfig;
use crate::harvest::fetcher::fetch_url;
use crate::state::{CommentId, DropReason};
use reqwest::Client;
use serde::Deserialize;

/// Amount and parties of one tip
#[derive(Debug, Clone, PartialEq)]
pub struct TipDetail {
    pub amount_native: f64,
    pub amount_reference: f64,
    pub sender: String,
    pub receiver: String,
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    #[serde(default)]
    tips: Vec<DetailEntry>,
}

#[derive(Debug, Deserialize)]
struct DetailEntry {
    #[serde(rename = "amountBTC")]
    amount_native: Option<RawAmount>,
    #[serde(rename = "amountUSD")]
    amount_reference: Option<RawAmount>,
    sender: Option<String>,
    receiver: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Number(f64),
    Text(String),
}

impl RawAmount {
    fn value(&self) -> Result<f64, String> {
        match self {
            Self::Number(value) => Ok(*value),
            Self::Text(text) => text
                .trim()
                .trim_start_matches('$')
                .parse()
                .map_err(|e| format!("amount '{}': {}", text, e)),
        }
    }
}

/// Extracts the first tip of a detail response
///
/// An empty body or an empty `tips` list means the tip is unknown upstream.
pub fn parse_tip_detail(url: &str, body: &str) -> Result<TipDetail, DropReason> {
    if body.trim().is_empty() {
        return Err(DropReason::NoTipData);
    }

    let response: DetailResponse =
        serde_json::from_str(body).map_err(|e| DropReason::MalformedResponse {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let entry = response
        .tips
        .into_iter()
        .next()
        .ok_or(DropReason::NoTipData)?;

    let (Some(native), Some(reference), Some(sender), Some(receiver)) = (
        entry.amount_native,
        entry.amount_reference,
        entry.sender,
        entry.receiver,
    ) else {
        return Err(DropReason::NoTipData);
    };

    let amount = |raw: RawAmount| {
        raw.value().map_err(|reason| DropReason::MalformedResponse {
            url: url.to_string(),
            reason,
        })
    };

    Ok(TipDetail {
        amount_native: amount(native)?,
        amount_reference: amount(reference)?,
        sender,
        receiver,
    })
}

/// Client for the tip detail endpoint
#[derive(Debug, Clone)]
pub struct DetailClient {
    client: Client,
    endpoints: EndpointConfig,
}

impl DetailClient {
    pub fn new(client: Client, endpoints: &EndpointConfig) -> Self {
        Self {
            client,
            endpoints: endpoints.clone(),
        }
    }

    pub async fn fetch(&self, id: &CommentId) -> Result<TipDetail, DropReason> {
        let url = self.endpoints.detail_url(id.suffix());
        let body = fetch_url(&self.client, &url).await.into_body(&url)?;
        parse_tip_detail(&url, &body)
    }
}
