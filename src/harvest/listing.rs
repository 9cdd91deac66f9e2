//! Listing page parser
//!
//! A listing page carries its tips as rows of the table inside
//! `div#content`. Each usable row yields a [`ListingRow`]; rows missing any
//! of the permalink, subreddit or age are skipped. A page with no usable rows
//! marks the end of the listing.

use crate::config::Timespan;
use crate::url::subreddit_from_permalink;
use scraper::{ElementRef, Html, Selector};
use std::fmt;
use url::Url;

const ROW_SELECTOR: &str = "div#content > table tr";
const PERMALINK_SELECTOR: &str = "td.left a[href]";
const AGE_SELECTOR: &str = "td.right span";

/// One candidate tip from a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRow {
    /// Absolute URL of the tipping context
    pub permalink: String,
    pub subreddit: String,
    pub age: RelativeAge,
}

/// Unit of a relative age label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AgeUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl AgeUnit {
    fn parse(word: &str) -> Option<Self> {
        let word = word.trim_end_matches(|c: char| !c.is_alphabetic());
        let singular = word.strip_suffix('s').unwrap_or(word);
        match singular.to_ascii_lowercase().as_str() {
            "second" | "sec" => Some(Self::Second),
            "minute" | "min" => Some(Self::Minute),
            "hour" => Some(Self::Hour),
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            _ => None,
        }
    }
}

impl From<Timespan> for AgeUnit {
    fn from(timespan: Timespan) -> Self {
        match timespan {
            Timespan::Hour => Self::Hour,
            Timespan::Day => Self::Day,
            Timespan::Week => Self::Week,
        }
    }
}

/// A displayed age such as "3 hours ago"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelativeAge {
    pub count: u32,
    pub unit: AgeUnit,
}

impl RelativeAge {
    /// Finds the first `<count> <unit>` pair in a label
    ///
    /// ```
    /// use tip_harvest::harvest::{AgeUnit, RelativeAge};
    ///
    /// let age = RelativeAge::parse("\n  tipped 3 hours ago\n").unwrap();
    /// assert_eq!(age, RelativeAge { count: 3, unit: AgeUnit::Hour });
    /// ```
    pub fn parse(label: &str) -> Option<Self> {
        let words: Vec<&str> = label.split_whitespace().collect();
        words.windows(2).find_map(|pair| {
            let count = pair[0].parse::<u32>().ok()?;
            let unit = AgeUnit::parse(pair[1])?;
            Some(Self { count, unit })
        })
    }

    /// Bucket index of this age at the given granularity
    ///
    /// Ages in a finer unit than the timespan fall into bucket 0; ages in a
    /// coarser unit are outside the bucketed window.
    pub fn bucket(&self, timespan: Timespan) -> Option<u32> {
        let unit = AgeUnit::from(timespan);
        match self.unit.cmp(&unit) {
            std::cmp::Ordering::Less => Some(0),
            std::cmp::Ordering::Equal => Some(self.count),
            std::cmp::Ordering::Greater => None,
        }
    }
}

impl fmt::Display for RelativeAge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}(s) ago", self.count, self.unit)
    }
}

/// Parses one listing page into its rows, in page order
///
/// # Arguments
///
/// * `html` - The listing page markup
/// * `base_url` - The listing page URL, for resolving relative permalinks
pub fn parse_listing(html: &str, base_url: &Url) -> Vec<ListingRow> {
    let document = Html::parse_document(html);

    let (Ok(row_selector), Ok(link_selector), Ok(age_selector)) = (
        Selector::parse(ROW_SELECTOR),
        Selector::parse(PERMALINK_SELECTOR),
        Selector::parse(AGE_SELECTOR),
    ) else {
        return Vec::new();
    };

    document
        .select(&row_selector)
        .filter_map(|row| {
            let parsed = parse_row(row, &link_selector, &age_selector, base_url);
            if parsed.is_none() {
                tracing::trace!("Skipping listing row without tip data");
            }
            parsed
        })
        .collect()
}

fn parse_row(
    row: ElementRef<'_>,
    link_selector: &Selector,
    age_selector: &Selector,
    base_url: &Url,
) -> Option<ListingRow> {
    let href = row.select(link_selector).next()?.value().attr("href")?;
    let permalink = base_url.join(href.trim()).ok()?;
    if permalink.scheme() != "http" && permalink.scheme() != "https" {
        return None;
    }
    let permalink = permalink.to_string();

    let subreddit = subreddit_from_permalink(&permalink).ok()?;

    let label = row.select(age_selector).next()?.text().collect::<String>();
    let age = RelativeAge::parse(&label)?;

    Some(ListingRow {
        permalink,
        subreddit,
        age,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("http://bitcointip.net/tipped.php?page=1").unwrap()
    }

    fn row(href: &str, age: &str) -> String {
        format!(
            r#"<tr><td class="left"><a href="{}">$0.25</a></td><td class="right"><span>
tipped {}
</span></td></tr>"#,
            href, age
        )
    }

    fn page(rows: &[String]) -> String {
        format!(
            r#"<html><body><div id="content"><table>
            <tr><th>Amount</th><th>When</th></tr>
            {}
            </table></div></body></html>"#,
            rows.join("\n")
        )
    }

    #[test]
    fn test_parse_rows() {
        let html = page(&[
            row(
                "http://www.reddit.com/r/bitcoin/comments/1abc/t/c9xyz",
                "3 hours ago",
            ),
            row(
                "http://www.reddit.com/r/Dogecoin/comments/1def/t/c9uvw",
                "1 day ago",
            ),
        ]);

        let rows = parse_listing(&html, &base_url());
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            ListingRow {
                permalink: "http://www.reddit.com/r/bitcoin/comments/1abc/t/c9xyz".to_string(),
                subreddit: "bitcoin".to_string(),
                age: RelativeAge {
                    count: 3,
                    unit: AgeUnit::Hour
                },
            }
        );
        assert_eq!(rows[1].subreddit, "Dogecoin");
        assert_eq!(rows[1].age.unit, AgeUnit::Day);
    }

    #[test]
    fn test_relative_permalink_is_resolved() {
        let html = page(&[row("/r/bitcoin/comments/1abc/t/c9xyz", "5 minutes ago")]);
        let rows = parse_listing(&html, &base_url());
        assert_eq!(
            rows[0].permalink,
            "http://bitcointip.net/r/bitcoin/comments/1abc/t/c9xyz"
        );
    }

    #[test]
    fn test_header_only_page_is_empty() {
        let rows = parse_listing(&page(&[]), &base_url());
        assert!(rows.is_empty());
    }

    #[test]
    fn test_missing_table_is_empty() {
        let html = "<html><body><div id=\"content\"><p>No tips</p></div></body></html>";
        assert!(parse_listing(html, &base_url()).is_empty());
    }

    #[test]
    fn test_table_outside_content_is_ignored() {
        let html = format!(
            "<html><body><table>{}</table></body></html>",
            row("http://www.reddit.com/r/bitcoin/comments/1abc/t/c9xyz", "1 hour ago")
        );
        assert!(parse_listing(&html, &base_url()).is_empty());
    }

    #[test]
    fn test_malformed_rows_are_dropped() {
        let html = page(&[
            // No subreddit in the permalink
            row("http://www.reddit.com/user/alice", "1 hour ago"),
            // Unreadable age
            row("http://www.reddit.com/r/bitcoin/comments/1abc/t/c1", "recently"),
            // No link at all
            "<tr><td class=\"left\">$1.00</td><td class=\"right\"><span>2 hours ago</span></td></tr>"
                .to_string(),
            row("javascript:void(0)", "1 hour ago"),
            row("http://www.reddit.com/r/bitcoin/comments/1abc/t/c2", "2 hours ago"),
        ]);

        let rows = parse_listing(&html, &base_url());
        assert_eq!(rows.len(), 1);
        assert!(rows[0].permalink.ends_with("/c2"));
    }

    #[test]
    fn test_relative_age_parse() {
        assert_eq!(
            RelativeAge::parse("1 hour ago"),
            Some(RelativeAge {
                count: 1,
                unit: AgeUnit::Hour
            })
        );
        assert_eq!(
            RelativeAge::parse("12 days, ago"),
            Some(RelativeAge {
                count: 12,
                unit: AgeUnit::Day
            })
        );
        assert_eq!(RelativeAge::parse("just now"), None);
        assert_eq!(RelativeAge::parse("3 fortnights ago"), None);
    }

    #[test]
    fn test_relative_age_bucket() {
        let minutes = RelativeAge {
            count: 40,
            unit: AgeUnit::Minute,
        };
        let hours = RelativeAge {
            count: 5,
            unit: AgeUnit::Hour,
        };
        let days = RelativeAge {
            count: 2,
            unit: AgeUnit::Day,
        };

        assert_eq!(minutes.bucket(Timespan::Hour), Some(0));
        assert_eq!(hours.bucket(Timespan::Hour), Some(5));
        assert_eq!(days.bucket(Timespan::Hour), None);
        assert_eq!(hours.bucket(Timespan::Day), Some(0));
        assert_eq!(days.bucket(Timespan::Day), Some(2));
    }
}
