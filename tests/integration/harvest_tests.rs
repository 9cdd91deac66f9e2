//! Integration tests for the harvest pipeline
//!
//! These tests use wiremock to stand in for the listing, thread, detail and
//! metadata endpoints, and run complete harvests into a temporary database.

use std::time::Duration;
use tempfile::TempDir;
use tip_harvest::config::Config;
use tip_harvest::harvest::{harvest, shutdown, Coordinator, RunOptions, RunSummary, Shutdown};
use tip_harvest::storage::{RunStatus, SqliteStorage, TipFilter, TipStore};
use tip_harvest::{HarvestError, Timespan};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing every endpoint at the mock server
fn create_test_config(server: &MockServer, db_path: &str) -> Config {
    let mut config = Config::default();
    config.harvest.workers = 2;
    config.endpoints.listing = format!("{}/tipped.php?time={{window}}&page={{page}}", server.uri());
    config.endpoints.detail = format!("{}/api/gettips.php?tips={{id}}", server.uri());
    config.endpoints.metadata = format!("{}/api/info.json?id={{fullname}}", server.uri());
    config.output.database_path = db_path.to_string();
    config
}

fn options() -> RunOptions {
    RunOptions {
        start_page: 1,
        timespan: Timespan::Hour,
        max_pages: None,
    }
}

fn permalink(server: &MockServer, subreddit: &str, comment: &str) -> String {
    format!(
        "{}/r/{}/comments/post/title/{}",
        server.uri(),
        subreddit,
        comment
    )
}

/// Builds a listing page with one row per permalink
fn listing_page(permalinks: &[String]) -> String {
    let rows: String = permalinks
        .iter()
        .map(|link| {
            format!(
                r#"<tr><td class="left"><a href="{}">$1.00</a></td><td class="right"><span>2 hours ago</span></td></tr>"#,
                link
            )
        })
        .collect();
    format!(
        r#"<html><body><div id="content"><table>
        <tr><th>Amount</th><th>When</th></tr>{}
        </table></div></body></html>"#,
        rows
    )
}

/// Builds a thread page rooted at `root` with the given replies
fn thread_page(root: &str, replies: &[(&str, &str)]) -> String {
    let replies: String = replies
        .iter()
        .map(|(id, text)| {
            format!(
                r#"<div class="thing comment" data-fullname="t1_{}"><div class="entry"><p>{}</p></div></div>"#,
                id, text
            )
        })
        .collect();
    format!(
        r#"<html><body><div class="commentarea"><div class="sitetable nestedlisting">
        <div class="thing comment" data-fullname="t1_{}">
          <div class="entry"><p>+/u/bitcointip @bob $1</p></div>
          <div class="child"><div class="sitetable listing">{}</div></div>
        </div>
        </div></div></body></html>"#,
        root, replies
    )
}

async fn mount_listing(server: &MockServer, page: u32, body: String) {
    Mock::given(method("GET"))
        .and(path("/tipped.php"))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_thread(server: &MockServer, subreddit: &str, comment: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(format!("/r/{}/comments/post/title/{}", subreddit, comment)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_detail(server: &MockServer, id: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path("/api/gettips.php"))
        .and(query_param("tips", id))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
        .mount(server)
        .await;
}

async fn mount_metadata(server: &MockServer, fullname: &str, created_utc: f64) {
    Mock::given(method("GET"))
        .and(path("/api/info.json"))
        .and(query_param("id", fullname))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"{{"kind":"Listing","data":{{"children":[{{"kind":"t1","data":{{"created_utc":{}}}}}]}}}}"#,
            created_utc
        )))
        .mount(server)
        .await;
}

/// Mounts a thread with one confirmation reply that resolves completely
async fn mount_resolvable_tip(server: &MockServer, comment: &str, reply: &str) {
    mount_thread(
        server,
        "bitcoin",
        comment,
        thread_page(comment, &[(reply, "[✔] Verified: alice → $1.00 → bob")]),
    )
    .await;
    mount_detail(
        server,
        reply,
        r#"{"tips":[{"amountBTC":"0.01","amountUSD":"1.00","sender":"alice","receiver":"bob"}]}"#,
    )
    .await;
    mount_metadata(server, &format!("t1_{}", reply), 1_400_000_000.0).await;
}

/// Mounts the three-row page: one resolvable, one without tip data, one ambiguous
async fn mount_three_row_scenario(server: &MockServer) {
    mount_listing(
        server,
        1,
        listing_page(&[
            permalink(server, "bitcoin", "ca"),
            permalink(server, "bitcoin", "cb"),
            permalink(server, "bitcoin", "cc"),
        ]),
    )
    .await;
    mount_listing(server, 2, listing_page(&[])).await;

    mount_resolvable_tip(server, "ca", "ra").await;

    mount_thread(
        server,
        "bitcoin",
        "cb",
        thread_page("cb", &[("rb", "[✔] Verified")]),
    )
    .await;
    mount_detail(server, "rb", r#"{"tips":[]}"#).await;

    mount_thread(
        server,
        "bitcoin",
        "cc",
        thread_page("cc", &[("rc1", "thanks!"), ("rc2", "to the moon")]),
    )
    .await;
}

async fn run(config: Config, shutdown: Shutdown) -> (Coordinator, Result<RunSummary, HarvestError>) {
    let mut coordinator = Coordinator::new(config, "test-hash").expect("Failed to create coordinator");
    let result = coordinator.run(options(), shutdown).await;
    (coordinator, result)
}

#[tokio::test]
async fn test_three_rows_store_one_tip() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("tips.db");
    mount_three_row_scenario(&server).await;

    let config = create_test_config(&server, db_path.to_str().unwrap());
    let (coordinator, result) = run(config, Shutdown::never()).await;
    let summary = result.expect("Harvest failed");

    assert_eq!(summary.pages, 1);
    assert_eq!(summary.rows, 3);
    assert_eq!(summary.resolved, 1);
    assert_eq!(summary.dropped, 2);
    assert_eq!(summary.inserted, 1);
    assert!(!summary.listing_unavailable);

    let storage = coordinator.storage();
    assert_eq!(storage.count_tips(&TipFilter::default()).unwrap(), 1);

    let tip = storage.get_tip("t1_ra").unwrap().expect("tip should be stored");
    assert_eq!(tip.amount_native, 0.01);
    assert_eq!(tip.amount_reference, 1.0);
    assert_eq!(tip.created_utc, 1_400_000_000);
    assert_eq!(tip.sender, "alice");
    assert_eq!(tip.receiver, "bob");
    assert_eq!(tip.subreddit, "bitcoin");

    let run = storage.get_run(summary.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");
    assert_eq!(run.inserted, 1);
}

#[tokio::test]
async fn test_rerun_adds_nothing() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("tips.db");
    mount_three_row_scenario(&server).await;

    let config = create_test_config(&server, db_path.to_str().unwrap());
    let (_, first) = run(config.clone(), Shutdown::never()).await;
    assert_eq!(first.unwrap().inserted, 1);

    let (coordinator, second) = run(config, Shutdown::never()).await;
    let second = second.unwrap();
    assert_eq!(second.resolved, 1);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.duplicates, 1);

    let storage = coordinator.storage();
    assert_eq!(storage.count_tips(&TipFilter::default()).unwrap(), 1);
    assert_eq!(storage.get_latest_run().unwrap().unwrap().id, second.run_id);
}

#[tokio::test]
async fn test_empty_first_page_terminates() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("tips.db");

    Mock::given(method("GET"))
        .and(path("/tipped.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[])))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, db_path.to_str().unwrap());
    let summary = harvest(config, "test-hash", Shutdown::never())
        .await
        .unwrap();

    assert_eq!(summary.pages, 0);
    assert_eq!(summary.last_page, Some(1));

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_tips(&TipFilter::default()).unwrap(), 0);
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.id, summary.run_id);
    assert_eq!(run.status, RunStatus::Completed);
}

#[tokio::test]
async fn test_excluded_subreddit_is_never_fetched() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("tips.db");

    mount_listing(
        &server,
        1,
        listing_page(&[
            permalink(&server, "gonewild", "cx"),
            permalink(&server, "bitcoin", "ca"),
        ]),
    )
    .await;
    mount_listing(&server, 2, listing_page(&[])).await;
    mount_resolvable_tip(&server, "ca", "ra").await;

    Mock::given(method("GET"))
        .and(path("/r/gonewild/comments/post/title/cx"))
        .respond_with(ResponseTemplate::new(200).set_body_string(thread_page("cx", &[])))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server, db_path.to_str().unwrap());
    let (coordinator, result) = run(config, Shutdown::never()).await;
    let summary = result.unwrap();

    assert_eq!(summary.rows, 2);
    assert_eq!(summary.dropped, 1);
    assert_eq!(
        coordinator
            .storage()
            .count_tips(&TipFilter::subreddit("gonewild"))
            .unwrap(),
        0
    );
    server.verify().await;
}

#[tokio::test]
async fn test_unavailable_listing_stops_run() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("tips.db");

    mount_listing(
        &server,
        1,
        listing_page(&[permalink(&server, "bitcoin", "ca")]),
    )
    .await;
    mount_resolvable_tip(&server, "ca", "ra").await;
    Mock::given(method("GET"))
        .and(path("/tipped.php"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = create_test_config(&server, db_path.to_str().unwrap());
    let (coordinator, result) = run(config, Shutdown::never()).await;
    let summary = result.unwrap();

    assert!(summary.listing_unavailable);
    assert_eq!(summary.pages, 1);
    assert_eq!(summary.last_page, Some(2));
    assert_eq!(
        coordinator
            .storage()
            .get_run(summary.run_id)
            .unwrap()
            .status,
        RunStatus::Completed
    );
}

#[tokio::test]
async fn test_interrupt_during_second_page_keeps_first() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("tips.db");

    mount_listing(
        &server,
        1,
        listing_page(&[permalink(&server, "bitcoin", "ca")]),
    )
    .await;
    mount_resolvable_tip(&server, "ca", "ra").await;

    mount_listing(
        &server,
        2,
        listing_page(&[permalink(&server, "bitcoin", "cd")]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/r/bitcoin/comments/post/title/cd"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(thread_page("cd", &[("rd", "[✔] Verified")]))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;
    mount_detail(
        &server,
        "rd",
        r#"{"tips":[{"amountBTC":1,"amountUSD":100,"sender":"carol","receiver":"dave"}]}"#,
    )
    .await;
    mount_metadata(&server, "t1_rd", 1_400_000_100.0).await;

    let (trigger, signal) = shutdown::channel();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.trigger();
    });

    let config = create_test_config(&server, db_path.to_str().unwrap());
    let (coordinator, result) = run(config, signal).await;

    assert!(matches!(result, Err(HarvestError::Interrupted { page: 2 })));

    let storage = coordinator.storage();
    assert!(storage.get_tip("t1_ra").unwrap().is_some());
    assert!(storage.get_tip("t1_rd").unwrap().is_none());
    assert_eq!(storage.count_tips(&TipFilter::default()).unwrap(), 1);

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Interrupted);
    assert_eq!(run.pages, 1);
    assert_eq!(run.inserted, 1);
}

#[tokio::test]
async fn test_page_is_flushed_only_after_its_slowest_row() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("tips.db");

    mount_listing(
        &server,
        1,
        listing_page(&[
            permalink(&server, "bitcoin", "ca"),
            permalink(&server, "bitcoin", "cs"),
        ]),
    )
    .await;
    mount_listing(&server, 2, listing_page(&[])).await;
    mount_resolvable_tip(&server, "ca", "ra").await;

    Mock::given(method("GET"))
        .and(path("/r/bitcoin/comments/post/title/cs"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(thread_page("cs", &[("rs", "[✔] Verified")]))
                .set_delay(Duration::from_millis(1500)),
        )
        .mount(&server)
        .await;
    mount_detail(
        &server,
        "rs",
        r#"{"tips":[{"amountBTC":0.2,"amountUSD":20,"sender":"erin","receiver":"frank"}]}"#,
    )
    .await;
    mount_metadata(&server, "t1_rs", 1_400_000_200.0).await;

    let config = create_test_config(&server, db_path.to_str().unwrap());
    let reader_path = db_path.clone();
    let ((coordinator, result), stored_mid_page) = tokio::join!(
        run(config, Shutdown::never()),
        async move {
            // The fast row is resolved by now, the slow one is still in flight
            tokio::time::sleep(Duration::from_millis(500)).await;
            let reader = SqliteStorage::new(&reader_path).unwrap();
            reader.count_tips(&TipFilter::default()).unwrap()
        }
    );

    assert_eq!(stored_mid_page, 0);

    let summary = result.unwrap();
    assert_eq!(summary.inserted, 2);
    assert_eq!(
        coordinator
            .storage()
            .count_tips(&TipFilter::default())
            .unwrap(),
        2
    );
}
