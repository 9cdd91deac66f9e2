use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Main configuration structure for Tip-Harvest
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub endpoints: EndpointConfig,
    #[serde(default)]
    pub permalink: PermalinkConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Harvest behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HarvestConfig {
    /// First listing page to request
    #[serde(rename = "start-page", default = "default_start_page")]
    pub start_page: u32,

    /// Granularity used when logging the relative age of listing rows
    #[serde(default)]
    pub timespan: Timespan,

    /// Number of rows resolved concurrently within one page
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Text identifying the automated tip confirmation reply
    #[serde(default = "default_marker")]
    pub marker: String,

    /// Subreddits whose threads are never fetched
    #[serde(rename = "excluded-subreddits", default = "default_excluded_subreddits")]
    pub excluded_subreddits: Vec<String>,

    /// Stop after this many pages even if the listing continues
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<u32>,
}

impl HarvestConfig {
    /// Returns true if rows from `subreddit` must be skipped without a thread fetch
    pub fn is_excluded(&self, subreddit: &str) -> bool {
        self.excluded_subreddits
            .iter()
            .any(|excluded| excluded.eq_ignore_ascii_case(subreddit))
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            start_page: default_start_page(),
            timespan: Timespan::default(),
            workers: default_workers(),
            marker: default_marker(),
            excluded_subreddits: default_excluded_subreddits(),
            max_pages: None,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    pub name: String,
    pub version: String,
    #[serde(rename = "contact-url")]
    pub contact_url: String,
}

impl UserAgentConfig {
    /// Formats the header value sent with every request
    ///
    /// Format: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        format!("{}/{} (+{})", self.name, self.version, self.contact_url)
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            name: "tip-harvest".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://github.com/tip-harvest/tip-harvest".to_string(),
        }
    }
}

/// Upstream endpoint templates
///
/// Placeholders: `{page}` and `{window}` for the listing, `{id}` (bare comment
/// id) for the detail lookup, `{fullname}` (prefixed id) for the metadata lookup.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_listing")]
    pub listing: String,
    #[serde(default = "default_detail")]
    pub detail: String,
    #[serde(default = "default_metadata")]
    pub metadata: String,
}

impl EndpointConfig {
    /// Builds the listing URL for one page
    pub fn listing_url(&self, page: u32, timespan: Timespan) -> String {
        self.listing
            .replace("{page}", &page.to_string())
            .replace("{window}", timespan.listing_window())
    }

    /// Builds the tip detail URL for a bare comment id
    pub fn detail_url(&self, id: &str) -> String {
        self.detail.replace("{id}", id)
    }

    /// Builds the metadata URL for a prefixed comment id
    pub fn metadata_url(&self, fullname: &str) -> String {
        self.metadata.replace("{fullname}", fullname)
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            listing: default_listing(),
            detail: default_detail(),
            metadata: default_metadata(),
        }
    }
}

/// Which `/`-separated permalink segments identify the post and the comment
#[derive(Debug, Clone, Deserialize)]
pub struct PermalinkConfig {
    #[serde(rename = "post-segment", default = "default_post_segment")]
    pub post_segment: usize,
    #[serde(rename = "comment-segment", default = "default_comment_segment")]
    pub comment_segment: usize,
}

impl Default for PermalinkConfig {
    fn default() -> Self {
        Self {
            post_segment: default_post_segment(),
            comment_segment: default_comment_segment(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path", default = "default_database_path")]
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Time granularity of a harvest run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timespan {
    #[default]
    Hour,
    Day,
    Week,
}

impl Timespan {
    /// The listing's `time` window that covers this granularity
    pub fn listing_window(&self) -> &'static str {
        match self {
            Self::Hour => "day",
            Self::Day => "week",
            Self::Week => "month",
        }
    }

    /// Length of one bucket in seconds
    pub fn seconds(&self) -> i64 {
        match self {
            Self::Hour => 3_600,
            Self::Day => 86_400,
            Self::Week => 604_800,
        }
    }

    /// Number of buckets shown by default for this granularity
    pub fn default_buckets(&self) -> usize {
        match self {
            Self::Hour => 25,
            Self::Day => 8,
            Self::Week => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
        }
    }
}

impl fmt::Display for Timespan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timespan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            other => Err(format!(
                "unknown timespan '{}', expected hour, day or week",
                other
            )),
        }
    }
}

fn default_start_page() -> u32 {
    1
}

fn default_workers() -> usize {
    4
}

fn default_marker() -> String {
    "Verified".to_string()
}

fn default_excluded_subreddits() -> Vec<String> {
    vec!["gonewild".to_string(), "nsfw".to_string()]
}

fn default_listing() -> String {
    "http://bitcointip.net/tipped.php?subreddit=all&type=all&by=tipped&time={window}&sort=last&page={page}"
        .to_string()
}

fn default_detail() -> String {
    "http://bitcointip.net/api/gettips.php?tips={id}".to_string()
}

fn default_metadata() -> String {
    "http://www.reddit.com/api/info.json?id={fullname}".to_string()
}

fn default_post_segment() -> usize {
    6
}

fn default_comment_segment() -> usize {
    8
}

fn default_database_path() -> String {
    "tips.db".to_string()
}
