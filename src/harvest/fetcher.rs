//! HTTP fetcher implementation
//!
//! Every network hop of the pipeline goes through [`fetch_url`]. Transport
//! failures and non-success statuses come back as
//! [`FetchResult::Unavailable`] instead of an error so callers can drop the
//! affected row and carry on.

use crate::config::UserAgentConfig;
use crate::state::DropReason;
use reqwest::Client;
use std::time::Duration;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched the resource
    Success {
        /// HTTP status code
        status_code: u16,
        /// Body decoded as UTF-8, invalid sequences replaced
        body: String,
    },

    /// The resource could not be fetched
    Unavailable {
        /// Error description
        reason: String,
    },
}

impl FetchResult {
    /// Converts the result into the body, or a drop reason naming `url`
    pub fn into_body(self, url: &str) -> Result<String, DropReason> {
        match self {
            Self::Success { body, .. } => Ok(body),
            Self::Unavailable { reason } => Err(DropReason::Unavailable {
                url: url.to_string(),
                reason,
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Builds an HTTP client that identifies itself on every request
///
/// # Example
///
/// ```no_run
/// use tip_harvest::config::UserAgentConfig;
/// use tip_harvest::harvest::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Performs a single GET request
///
/// There is no retry: a failed request is reported once as `Unavailable`.
pub async fn fetch_url(client: &Client, url: &str) -> FetchResult {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => {
            let reason = if e.is_timeout() {
                "Request timeout".to_string()
            } else if e.is_connect() {
                "Connection refused".to_string()
            } else {
                e.to_string()
            };
            return FetchResult::Unavailable { reason };
        }
    };

    let status = response.status();
    if !status.is_success() {
        return FetchResult::Unavailable {
            reason: format!("HTTP {}", status.as_u16()),
        };
    }

    match response.bytes().await {
        Ok(bytes) => FetchResult::Success {
            status_code: status.as_u16(),
            body: String::from_utf8_lossy(&bytes).into_owned(),
        },
        Err(e) => FetchResult::Unavailable {
            reason: format!("Failed to read body: {}", e),
        },
    }
}
