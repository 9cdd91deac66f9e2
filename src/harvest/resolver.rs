//! Comment resolver
//!
//! Finds the automated confirmation reply for a listing row. The page
//! markup is first turned into a [`CommentTree`]; choosing the reply is a
//! pure function over that tree so the ambiguous cases can be tested
//! without a network.

use crate::config::HarvestConfig;
use crate::harvest::fetcher::fetch_url;
use crate::harvest::listing::ListingRow;
use crate::state::{CommentId, DropReason};
use crate::url::{PermalinkLayout, ThreadScope};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

/// Root listing of the comment area on a thread page
const COMMENT_AREA_SELECTOR: &str = "div.commentarea > div.sitetable";

/// One comment of a thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentNode {
    pub id: CommentId,
    /// Text of the comment's own entry, replies excluded
    pub text: String,
    pub replies: Vec<CommentNode>,
}

/// Comments of a thread page in display order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentTree {
    pub roots: Vec<CommentNode>,
}

impl CommentTree {
    /// Comments to search for the given permalink scope
    ///
    /// For a post permalink these are the top-level comments. For a comment
    /// permalink the page is rooted at that comment, so its direct replies
    /// are searched.
    pub fn candidates(&self, scope: ThreadScope) -> &[CommentNode] {
        match scope {
            ThreadScope::TopLevel => &self.roots,
            ThreadScope::Nested => self
                .roots
                .first()
                .map(|root| root.replies.as_slice())
                .unwrap_or(&[]),
        }
    }
}

/// Picks the confirmation reply among candidate comments
///
/// A single candidate is taken as is. With several, the first whose text
/// contains `marker` wins; if none does the thread is ambiguous.
pub fn select_tip_comment(
    candidates: &[CommentNode],
    marker: &str,
) -> Result<CommentId, DropReason> {
    match candidates {
        [] => Err(DropReason::NoCandidates),
        [only] => Ok(only.id.clone()),
        many => many
            .iter()
            .find(|comment| comment.text.contains(marker))
            .map(|comment| comment.id.clone())
            .ok_or(DropReason::NoMarkerMatch {
                candidates: many.len(),
            }),
    }
}

/// Parses a thread page into its comment tree
///
/// Comments are `div.thing` elements carrying a `data-fullname` attribute;
/// replies live in the comment's `div.child > div.sitetable`. Things without
/// a valid identifier (e.g. "load more" stubs) are left out.
pub fn parse_comment_tree(html: &str) -> CommentTree {
    let document = Html::parse_document(html);
    let Ok(area_selector) = Selector::parse(COMMENT_AREA_SELECTOR) else {
        return CommentTree::default();
    };

    let roots = document
        .select(&area_selector)
        .next()
        .map(comment_nodes)
        .unwrap_or_default();

    CommentTree { roots }
}

fn child_elements<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.children().filter_map(ElementRef::wrap)
}

fn has_class(element: &ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

fn comment_nodes(listing: ElementRef<'_>) -> Vec<CommentNode> {
    child_elements(listing)
        .filter(|element| has_class(element, "thing"))
        .filter_map(comment_node)
        .collect()
}

fn comment_node(element: ElementRef<'_>) -> Option<CommentNode> {
    let id = CommentId::parse(element.value().attr("data-fullname")?)?;

    let text = child_elements(element)
        .find(|child| has_class(child, "entry"))
        .map(|entry| {
            let text = entry.text().collect::<String>();
            text.split_whitespace().collect::<Vec<_>>().join(" ")
        })
        .unwrap_or_default();

    let replies = child_elements(element)
        .find(|child| has_class(child, "child"))
        .and_then(|child| child_elements(child).find(|c| has_class(c, "sitetable")))
        .map(comment_nodes)
        .unwrap_or_default();

    Some(CommentNode { id, text, replies })
}

/// Resolves listing rows to the identifier of their confirmation reply
#[derive(Debug, Clone)]
pub struct CommentResolver {
    client: Client,
    layout: PermalinkLayout,
    harvest: HarvestConfig,
}

impl CommentResolver {
    pub fn new(client: Client, layout: PermalinkLayout, harvest: &HarvestConfig) -> Self {
        Self {
            client,
            layout,
            harvest: harvest.clone(),
        }
    }

    /// Finds the confirmation reply for `row`
    ///
    /// Excluded subreddits are rejected before any request is made.
    pub async fn resolve(&self, row: &ListingRow) -> Result<CommentId, DropReason> {
        if self.harvest.is_excluded(&row.subreddit) {
            return Err(DropReason::ExcludedSubreddit(row.subreddit.clone()));
        }

        let scope = self
            .layout
            .classify(&row.permalink)
            .map_err(|e| DropReason::MalformedPermalink(e.to_string()))?;

        let body = fetch_url(&self.client, &row.permalink)
            .await
            .into_body(&row.permalink)?;

        let tree = parse_comment_tree(&body);
        let id = select_tip_comment(tree.candidates(scope), &self.harvest.marker)?;

        tracing::trace!(permalink = %row.permalink, ?scope, id = %id, "Resolved comment");
        Ok(id)
    }
}
