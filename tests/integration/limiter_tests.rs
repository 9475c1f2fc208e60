use crate::create_test_config;
use polite_fetch::Orchestrator;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_site(server: &MockServer, delay: Duration) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("ok")
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_same_domain_requests_are_spaced() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server, Duration::ZERO).await;

    let mut config = create_test_config();
    config.rate_limit.min_delay_seconds = 0.3;
    config.rate_limit.max_delay_seconds = 0.3;
    let orchestrator = Orchestrator::new(config).unwrap();
    let url = format!("{}/page", mock_server.uri());

    let start = Instant::now();
    assert_eq!(orchestrator.fetch(&url, None).await.status_code(), 200);
    assert_eq!(orchestrator.fetch(&url, None).await.status_code(), 200);

    assert!(
        start.elapsed() >= Duration::from_millis(300),
        "second request started after only {:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn test_per_domain_concurrency_ceiling() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server, Duration::from_millis(200)).await;

    let mut config = create_test_config();
    config.rate_limit.max_concurrent_requests_per_domain = 1;
    let orchestrator = Orchestrator::new(config).unwrap();
    let url = format!("{}/page", mock_server.uri());

    let start = Instant::now();
    let results =
        futures::future::join_all((0..3).map(|_| orchestrator.fetch(&url, None))).await;
    let elapsed = start.elapsed();

    assert!(results.iter().all(|r| r.status_code() == 200));
    // Three 200ms responses served one at a time
    assert!(elapsed >= Duration::from_millis(600), "took only {:?}", elapsed);
}

#[tokio::test]
async fn test_cancelled_fetch_frees_domain_slot() {
    let mock_server = MockServer::start().await;
    mount_site(&mock_server, Duration::ZERO).await;

    Mock::given(method("GET"))
        .and(path("/stalled"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("never read")
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&mock_server)
        .await;

    let mut config = create_test_config();
    config.rate_limit.max_concurrent_requests_per_domain = 1;
    config.fetcher.timeout_seconds = 30.0;
    let orchestrator = Orchestrator::new(config).unwrap();

    // Dropped while the only slot is held by the in-flight request
    let stalled = tokio::time::timeout(
        Duration::from_millis(300),
        orchestrator.fetch(&format!("{}/stalled", mock_server.uri()), None),
    )
    .await;
    assert!(stalled.is_err());

    let next = tokio::time::timeout(
        Duration::from_secs(2),
        orchestrator.fetch(&format!("{}/page", mock_server.uri()), None),
    )
    .await
    .expect("slot was not released by the cancelled fetch");
    assert_eq!(next.status_code(), 200);
    assert_eq!(next.body(), Some("ok"));
}
