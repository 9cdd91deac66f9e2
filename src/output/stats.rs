//! Statistics over the tip store
//!
//! This module reads aggregates back out of the store for the `--stats`
//! mode: overall totals, recent totals per time bucket, per-subreddit totals
//! and the last recorded run.

use crate::config::Timespan;
use crate::storage::{RunRecord, SubredditTotal, TipFilter, TipStore, TipSummary};
use crate::HarvestError;

/// Number of subreddits listed in the statistics report
const TOP_SUBREDDITS: usize = 10;

/// Tip statistics summary
#[derive(Debug, Clone)]
pub struct TipStatistics {
    pub filter: TipFilter,

    /// Totals over every tip matching the filter
    pub summary: TipSummary,

    /// Granularity of `buckets`
    pub timespan: Timespan,

    /// Reference-unit totals per bucket, most recent first
    pub buckets: Vec<f64>,

    /// Largest subreddits by reference amount, within the filter
    pub subreddits: Vec<SubredditTotal>,

    /// Most recent harvest run, if any
    pub latest_run: Option<RunRecord>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The store to query
/// * `filter` - Narrows the totals and buckets
/// * `timespan` - Bucket granularity; its default bucket count is used
/// * `now` - End of the most recent bucket, epoch seconds
pub fn load_statistics(
    storage: &dyn TipStore,
    filter: &TipFilter,
    timespan: Timespan,
    now: i64,
) -> Result<TipStatistics, HarvestError> {
    let summary = storage.summarize(filter)?;
    let buckets = storage.bucket_amounts(filter, timespan, timespan.default_buckets(), now)?;
    let subreddits = storage.subreddit_totals(filter, TOP_SUBREDDITS)?;
    let latest_run = storage.get_latest_run()?;

    Ok(TipStatistics {
        filter: filter.clone(),
        summary,
        timespan,
        buckets,
        subreddits,
        latest_run,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &TipStatistics) {
    println!("=== Tip Statistics ===\n");

    if let Some(subreddit) = &stats.filter.subreddit {
        println!("Subreddit: r/{}\n", subreddit);
    }

    println!("Overview:");
    println!("  Tips stored: {}", stats.summary.count);
    println!("  Total BTC: {:.8}", stats.summary.total_native);
    println!("  Total USD: {:.2}", stats.summary.total_reference);
    match stats.summary.average_reference {
        Some(average) => println!("  Average tip: ${:.2}", average),
        None => println!("  Average tip: n/a"),
    }
    println!();

    println!("USD per {} (most recent first):", stats.timespan);
    for (index, amount) in stats.buckets.iter().enumerate() {
        println!("  -{:>2} {}: {:>10.2}", index, stats.timespan, amount);
    }
    println!();

    if !stats.subreddits.is_empty() {
        println!("Top Subreddits:");
        for total in &stats.subreddits {
            println!(
                "  r/{}: {} tips, ${:.2}",
                total.subreddit, total.count, total.total_reference
            );
        }
        println!();
    }

    match &stats.latest_run {
        Some(run) => println!(
            "Latest Run: #{} {} ({} pages, {} new tips, started {})",
            run.id,
            run.status.to_db_string(),
            run.pages,
            run.inserted,
            run.started_at
        ),
        None => println!("Latest Run: none"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CommentId, TipRecord};
    use crate::storage::SqliteStorage;

    fn record(id: &str, subreddit: &str, usd: f64, created_utc: i64) -> TipRecord {
        TipRecord {
            id: CommentId::parse(id).unwrap(),
            amount_native: usd / 100.0,
            amount_reference: usd,
            created_utc,
            sender: "alice".to_string(),
            receiver: "bob".to_string(),
            subreddit: subreddit.to_string(),
        }
    }

    #[test]
    fn test_load_statistics() {
        let now = 1_400_000_000;
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("hash", 1, Timespan::Hour).unwrap();
        storage
            .insert_batch(
                &[
                    record("t1_a", "bitcoin", 2.0, now - 10),
                    record("t1_b", "bitcoin", 3.0, now - 3_700),
                    record("t1_c", "dogecoin", 5.0, now - 10),
                ],
                Some(run_id),
            )
            .unwrap();

        let stats = load_statistics(
            &storage,
            &TipFilter::subreddit("Bitcoin"),
            Timespan::Hour,
            now,
        )
        .unwrap();

        assert_eq!(stats.summary.count, 2);
        assert_eq!(stats.summary.total_reference, 5.0);
        assert_eq!(stats.buckets.len(), Timespan::Hour.default_buckets());
        assert_eq!(stats.buckets[0], 2.0);
        assert_eq!(stats.buckets[1], 3.0);
        assert_eq!(stats.subreddits.len(), 1);
        assert_eq!(stats.subreddits[0].subreddit, "bitcoin");
        assert_eq!(stats.subreddits[0].count, 2);
        assert_eq!(stats.latest_run.map(|run| run.id), Some(run_id));
    }

    #[test]
    fn test_load_statistics_empty_store() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        let stats = load_statistics(&storage, &TipFilter::default(), Timespan::Week, 0).unwrap();

        assert_eq!(stats.summary.count, 0);
        assert_eq!(stats.summary.average_reference, None);
        assert!(stats.buckets.iter().all(|amount| *amount == 0.0));
        assert!(stats.latest_run.is_none());
    }
}
