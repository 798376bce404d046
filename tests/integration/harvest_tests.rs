//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the catalog site and run the
//! full harvest end-to-end. Waits go through in-memory sleepers, so no test
//! actually sleeps.

use async_trait::async_trait;
use sku_harvester::config::{Config, HttpConfig};
use sku_harvester::crawler::{AttemptFailure, Coordinator, FetchResult, Fetcher, Sleeper};
use sku_harvester::HarvestError;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Returns immediately
struct NoopSleeper;

#[async_trait]
impl Sleeper for NoopSleeper {
    async fn sleep(&self, _duration: Duration) {}
}

/// Records every requested wait without sleeping
#[derive(Default)]
struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }
}

/// Panics on one specific wait, returns immediately on every other
struct PanickingSleeper {
    trigger: Duration,
}

#[async_trait]
impl Sleeper for PanickingSleeper {
    async fn sleep(&self, duration: Duration) {
        if duration == self.trigger {
            panic!("sleeper failed on a {:?} wait", duration);
        }
    }
}

/// Creates a configuration pointing at the mock server
fn create_test_config(base_url: &str, dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.site.landing_url = format!("{}/skus/sku-groups", base_url);
    config.site.origin = base_url.to_string();
    config.http.retry_delay_ms = 10;
    config.output.mapping_path = dir.path().join("mapping.csv").display().to_string();
    config.output.checkpoint_dir = dir.path().join("temp_data").display().to_string();
    config
}

fn landing_page(groups: &[(&str, &str)]) -> String {
    let links: String = groups
        .iter()
        .map(|(slug, name)| format!(r#"<li><a href="/skus/sku-groups/{}">{}</a></li>"#, slug, name))
        .collect();
    format!(
        r#"<html><body>
        <a href="/skus/sku-groups">All SKU groups</a>
        <a href="/pricing">Pricing</a>
        <ul>{}</ul>
        </body></html>"#,
        links
    )
}

fn group_page(sku_ids: &[&str], extra: &str) -> String {
    let rows: String = sku_ids
        .iter()
        .map(|id| format!("<tr><td>Description</td><td>{}</td></tr>", id))
        .collect();
    format!(
        r#"<html><body>
        <table>
          <tr><th>Name</th><th>SKU ID</th></tr>
          {}
          <tr><td>Footer</td><td>n/a</td></tr>
        </table>
        {}
        </body></html>"#,
        rows, extra
    )
}

async fn mount_page(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn read_rows(path: &Path) -> Vec<(String, String)> {
    let mut reader = csv::Reader::from_path(path).unwrap();
    assert_eq!(reader.headers().unwrap(), vec!["SKU ID", "SKU Group"]);
    reader
        .records()
        .map(|r| {
            let r = r.unwrap();
            (r[0].to_string(), r[1].to_string())
        })
        .collect()
}

#[tokio::test]
async fn test_full_harvest_two_groups() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(
        &mock_server,
        "/skus/sku-groups",
        landing_page(&[("compute", "Compute Engine"), ("storage", "Cloud Storage")]),
    )
    .await;
    mount_page(
        &mock_server,
        "/skus/sku-groups/compute",
        group_page(&["AAAA-1111", "AAAA-2222", "AAAA-1111"], ""),
    )
    .await;
    mount_page(
        &mock_server,
        "/skus/sku-groups/storage",
        group_page(&["BBBB-1111", "BBBB-2222"], ""),
    )
    .await;

    let config = create_test_config(&mock_server.uri(), &dir);
    let mapping_path = dir.path().join("mapping.csv");
    let coordinator = Coordinator::with_sleeper(config, Arc::new(NoopSleeper)).unwrap();

    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.groups_discovered, 2);
    assert_eq!(summary.total_records, 4);
    assert_eq!(summary.empty_groups, 0);
    assert_eq!(summary.output_path, mapping_path);

    let content = std::fs::read_to_string(&mapping_path).unwrap();
    assert!(content.starts_with("SKU ID,SKU Group\n"));

    let mut rows = read_rows(&mapping_path);
    rows.sort();
    assert_eq!(
        rows,
        vec![
            ("AAAA-1111".to_string(), "Compute Engine".to_string()),
            ("AAAA-2222".to_string(), "Compute Engine".to_string()),
            ("BBBB-1111".to_string(), "Cloud Storage".to_string()),
            ("BBBB-2222".to_string(), "Cloud Storage".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_checkpoint_written_every_ten_groups() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let slugs: Vec<String> = (1..=12).map(|i| format!("group-{}", i)).collect();
    let names: Vec<String> = (1..=12).map(|i| format!("Group {}", i)).collect();
    let groups: Vec<(&str, &str)> = slugs
        .iter()
        .zip(&names)
        .map(|(s, n)| (s.as_str(), n.as_str()))
        .collect();

    mount_page(&mock_server, "/skus/sku-groups", landing_page(&groups)).await;
    for i in 1..=12 {
        let sku_id = format!("SKU-{:04}", i);
        mount_page(
            &mock_server,
            &format!("/skus/sku-groups/group-{}", i),
            group_page(&[sku_id.as_str()], ""),
        )
        .await;
    }

    let config = create_test_config(&mock_server.uri(), &dir);
    let coordinator = Coordinator::with_sleeper(config, Arc::new(NoopSleeper)).unwrap();
    let summary = coordinator.run().await.unwrap();

    let checkpoint_dir = dir.path().join("temp_data");
    let mut checkpoints: Vec<String> = std::fs::read_dir(&checkpoint_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    checkpoints.sort();

    assert_eq!(checkpoints, vec!["checkpoint_10.csv".to_string()]);
    assert_eq!(summary.checkpoints, vec![checkpoint_dir.join("checkpoint_10.csv")]);
    assert_eq!(read_rows(&checkpoint_dir.join("checkpoint_10.csv")).len(), 10);

    assert_eq!(summary.total_records, 12);
    assert_eq!(read_rows(&dir.path().join("mapping.csv")).len(), 12);
}

#[tokio::test]
async fn test_rate_limited_fetch_exhausts_with_growing_waits() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&mock_server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let fetcher = Fetcher::new(&HttpConfig::default(), sleeper.clone()).unwrap();

    let result = fetcher
        .fetch(&format!("{}/limited", mock_server.uri()))
        .await;

    match result {
        FetchResult::Exhausted {
            attempts,
            last_failure,
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(last_failure, AttemptFailure::RateLimited);
        }
        FetchResult::Success(_) => panic!("rate limited fetch should not succeed"),
    }

    // Every failed attempt is followed by a wait, the last one included
    let waits = sleeper.waits();
    assert_eq!(waits.len(), 3);
    assert!(waits[0] >= Duration::from_secs(2));
    assert!(waits[1] > waits[0]);
    assert!(waits[2] > waits[1]);
}

#[tokio::test]
async fn test_rate_limit_then_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    mount_page(&mock_server, "/flaky", "<html>ok</html>".to_string()).await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let fetcher = Fetcher::new(&HttpConfig::default(), sleeper.clone()).unwrap();

    let page = fetcher
        .fetch(&format!("{}/flaky", mock_server.uri()))
        .await
        .into_page()
        .unwrap();

    assert_eq!(page.status_code, 200);
    assert_eq!(page.body, "<html>ok</html>");

    let waits = sleeper.waits();
    assert_eq!(waits.len(), 1);
    assert!(waits[0] >= Duration::from_secs(2));
    assert!(waits[0] < Duration::from_secs(3));
}

#[tokio::test]
async fn test_landing_page_failure_writes_nothing() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/skus/sku-groups"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), &dir);
    let coordinator = Coordinator::with_sleeper(config, Arc::new(NoopSleeper)).unwrap();

    let result = coordinator.run().await;

    assert!(matches!(result, Err(HarvestError::NoGroupsFound { .. })));
    assert!(!dir.path().join("mapping.csv").exists());
}

#[tokio::test]
async fn test_failing_group_does_not_stop_others() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(
        &mock_server,
        "/skus/sku-groups",
        landing_page(&[("good", "Good Group"), ("broken", "Broken Group")]),
    )
    .await;
    mount_page(
        &mock_server,
        "/skus/sku-groups/good",
        group_page(&["GOOD-0001"], ""),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/skus/sku-groups/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), &dir);
    let coordinator = Coordinator::with_sleeper(config, Arc::new(NoopSleeper)).unwrap();
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.groups_discovered, 2);
    assert_eq!(summary.empty_groups, 1);
    assert_eq!(summary.failed_units, 0);
    assert_eq!(
        read_rows(&dir.path().join("mapping.csv")),
        vec![("GOOD-0001".to_string(), "Good Group".to_string())]
    );
}

#[tokio::test]
async fn test_pagination_followed_one_level() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(
        &mock_server,
        "/skus/sku-groups",
        landing_page(&[("big", "Big Group")]),
    )
    .await;

    // Continuation page: SKU IDs in the first column, and its own pagination
    Mock::given(method("GET"))
        .and(path("/skus/sku-groups/big"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body>
            <table>
              <tr><td>PAGE-0003</td><td>Third</td></tr>
              <tr><td>PAGE-0001</td><td>Repeated</td></tr>
            </table>
            <a aria-label="Next page" href="?page=3">Next</a>
            </body></html>"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/skus/sku-groups/big"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(0)
        .mount(&mock_server)
        .await;
    mount_page(
        &mock_server,
        "/skus/sku-groups/big",
        group_page(
            &["PAGE-0001", "PAGE-0002"],
            r#"<a aria-label="Next page" href="?page=2">Next</a>"#,
        ),
    )
    .await;

    let config = create_test_config(&mock_server.uri(), &dir);
    let sleeper = Arc::new(RecordingSleeper::default());
    let coordinator = Coordinator::with_sleeper(config, sleeper.clone()).unwrap();
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.total_records, 3);
    let sku_ids: Vec<String> = read_rows(&dir.path().join("mapping.csv"))
        .into_iter()
        .map(|(sku_id, _)| sku_id)
        .collect();
    assert_eq!(sku_ids, vec!["PAGE-0001", "PAGE-0002", "PAGE-0003"]);

    // One unit jitter plus one pagination delay
    let waits = sleeper.waits();
    assert_eq!(waits.len(), 2);
    assert!(waits[1] >= Duration::from_secs(1));
    assert!(waits[1] <= Duration::from_secs(2));
}

#[tokio::test]
async fn test_panicking_unit_is_isolated() {
    let mock_server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page(
        &mock_server,
        "/skus/sku-groups",
        landing_page(&[
            ("first", "First Group"),
            ("paged", "Paged Group"),
            ("last", "Last Group"),
        ]),
    )
    .await;
    mount_page(
        &mock_server,
        "/skus/sku-groups/first",
        group_page(&["FRST-0001", "FRST-0002"], ""),
    )
    .await;
    mount_page(
        &mock_server,
        "/skus/sku-groups/paged",
        group_page(
            &["PAGD-0001"],
            r#"<a aria-label="Next page" href="?page=2">Next</a>"#,
        ),
    )
    .await;
    mount_page(
        &mock_server,
        "/skus/sku-groups/last",
        group_page(&["LAST-0001"], ""),
    )
    .await;

    // Only the pagination delay uses this exact duration
    let mut config = create_test_config(&mock_server.uri(), &dir);
    config.harvest.unit_jitter_min_ms = 0;
    config.harvest.unit_jitter_max_ms = 0;
    config.harvest.pagination_delay_min_ms = 7000;
    config.harvest.pagination_delay_max_ms = 7000;

    let sleeper = Arc::new(PanickingSleeper {
        trigger: Duration::from_secs(7),
    });
    let coordinator = Coordinator::with_sleeper(config, sleeper).unwrap();
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.groups_discovered, 3);
    assert_eq!(summary.failed_units, 1);
    assert_eq!(summary.empty_groups, 1);
    assert_eq!(summary.total_records, 3);

    let mut rows = read_rows(&dir.path().join("mapping.csv"));
    rows.sort();
    assert_eq!(
        rows,
        vec![
            ("FRST-0001".to_string(), "First Group".to_string()),
            ("FRST-0002".to_string(), "First Group".to_string()),
            ("LAST-0001".to_string(), "Last Group".to_string()),
        ]
    );
}
