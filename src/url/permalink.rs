use crate::config::PermalinkConfig;
use crate::{UrlError, UrlResult};
use url::Url;

/// Which part of a comment page holds the confirmation reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadScope {
    /// The permalink names the post itself; search its top-level comments
    TopLevel,
    /// The permalink names a comment; search the replies to that comment
    Nested,
}

/// Positions of the post and comment ids in a permalink
///
/// Segments are counted over the raw URL split on `/`, so for
/// `http://www.reddit.com/r/bitcoin/comments/1abc/title/c9xyz` index 6 is
/// the post id and index 8 the comment id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermalinkLayout {
    pub post_segment: usize,
    pub comment_segment: usize,
}

impl PermalinkLayout {
    pub fn new(post_segment: usize, comment_segment: usize) -> Self {
        Self {
            post_segment,
            comment_segment,
        }
    }

    /// Returns the `index`-th `/`-separated segment, ignoring query and fragment
    pub fn segment(permalink: &str, index: usize) -> Option<&str> {
        let end = permalink.find(|c: char| c == '?' || c == '#').unwrap_or(permalink.len());
        permalink[..end].split('/').nth(index)
    }

    /// Classifies a permalink as pointing at a post or at a nested comment
    ///
    /// A missing or empty comment segment, or one equal to the post segment,
    /// means the permalink targets the post.
    pub fn classify(&self, permalink: &str) -> UrlResult<ThreadScope> {
        let post = Self::segment(permalink, self.post_segment)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| UrlError::MissingSegment {
                url: permalink.to_string(),
                index: self.post_segment,
            })?;

        match Self::segment(permalink, self.comment_segment) {
            Some(comment) if !comment.is_empty() && comment != post => Ok(ThreadScope::Nested),
            _ => Ok(ThreadScope::TopLevel),
        }
    }
}

impl Default for PermalinkLayout {
    fn default() -> Self {
        Self::from(&PermalinkConfig::default())
    }
}

impl From<&PermalinkConfig> for PermalinkLayout {
    fn from(config: &PermalinkConfig) -> Self {
        Self::new(config.post_segment, config.comment_segment)
    }
}

/// Extracts the subreddit name from a `/r/<name>/...` permalink
pub fn subreddit_from_permalink(permalink: &str) -> UrlResult<String> {
    let url = Url::parse(permalink).map_err(|e| UrlError::Parse(format!("{}: {}", permalink, e)))?;

    let mut segments = url
        .path_segments()
        .ok_or_else(|| UrlError::MissingSubreddit(permalink.to_string()))?;

    while let Some(segment) = segments.next() {
        if segment == "r" {
            return segments
                .next()
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .ok_or_else(|| UrlError::MissingSubreddit(permalink.to_string()));
        }
    }

    Err(UrlError::MissingSubreddit(permalink.to_string()))
}
