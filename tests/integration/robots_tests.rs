use crate::create_test_config;
use polite_fetch::config::RobotsConfig;
use polite_fetch::robots::RobotsCache;
use polite_fetch::{robots_authority, Orchestrator, STATUS_ROBOTS_DISALLOWED};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn authority(server: &MockServer) -> String {
    robots_authority(&Url::parse(&server.uri()).unwrap()).unwrap()
}

#[tokio::test]
async fn test_disallowed_path_is_never_fetched() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/private/x"))
        .respond_with(ResponseTemplate::new(200).set_body_string("secret"))
        .expect(0)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/public/x"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let orchestrator = Orchestrator::new(create_test_config()).unwrap();

    let private_url = format!("{}/private/x", mock_server.uri());
    let result = orchestrator.fetch(&private_url, None).await;
    assert_eq!(result.status_code(), STATUS_ROBOTS_DISALLOWED);
    assert!(result.body().is_none());
    assert_eq!(result.resolved_url(), private_url);

    let result = orchestrator
        .fetch(&format!("{}/public/x", mock_server.uri()), None)
        .await;
    assert_eq!(result.status_code(), 200);
    assert_eq!(result.body(), Some("hello"));
}

#[tokio::test]
async fn test_robots_disallow_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config();
    config.retry.max_retries = 3;
    let orchestrator = Orchestrator::new(config).unwrap();

    let result = orchestrator
        .fetch(&format!("{}/page", mock_server.uri()), None)
        .await;
    assert_eq!(result.status_code(), STATUS_ROBOTS_DISALLOWED);
}

#[tokio::test]
async fn test_missing_robots_is_permissive() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/anything"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let orchestrator = Orchestrator::new(create_test_config()).unwrap();
    let result = orchestrator
        .fetch(&format!("{}/anything", mock_server.uri()), None)
        .await;

    assert_eq!(result.status_code(), 200);
    assert!(orchestrator.robots().contains(&authority(&mock_server)));
}

#[tokio::test]
async fn test_ignoring_robots_skips_the_fetch() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /"))
        .expect(0)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let mut config = create_test_config();
    config.robots.respect = false;
    let orchestrator = Orchestrator::new(config).unwrap();

    let result = orchestrator
        .fetch(&format!("{}/page", mock_server.uri()), None)
        .await;
    assert_eq!(result.status_code(), 200);
}

#[tokio::test]
async fn test_concurrent_lookups_fetch_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("User-agent: *\nDisallow: /private/")
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let cache = RobotsCache::new(&RobotsConfig::default(), vec!["TestBot/1.0".to_string()])
        .unwrap();
    let url = Url::parse(&format!("{}/private/page", mock_server.uri())).unwrap();

    let verdicts =
        futures::future::join_all((0..10).map(|_| cache.is_allowed(&url, "*"))).await;

    assert!(verdicts.iter().all(|allowed| !allowed));
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_cache_evicts_least_recently_used_domain() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    let third = MockServer::start().await;

    // The first domain is looked up again after eviction
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
        .expect(2)
        .mount(&first)
        .await;
    for server in [&second, &third] {
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
            .expect(1)
            .mount(server)
            .await;
    }

    let config = RobotsConfig {
        cache_size: 2,
        ..RobotsConfig::default()
    };
    let cache = RobotsCache::new(&config, vec![]).unwrap();

    for server in [&first, &second, &third] {
        let url = Url::parse(&format!("{}/page", server.uri())).unwrap();
        assert!(cache.is_allowed(&url, "*").await);
    }

    assert_eq!(cache.len(), 2);
    assert!(!cache.contains(&authority(&first)));
    assert!(cache.contains(&authority(&second)));
    assert!(cache.contains(&authority(&third)));

    let url = Url::parse(&format!("{}/again", first.uri())).unwrap();
    assert!(cache.is_allowed(&url, "*").await);
    assert!(cache.contains(&authority(&first)));
    assert!(!cache.contains(&authority(&second)));
}

#[tokio::test]
async fn test_unreachable_host_is_permissive() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let cache = RobotsCache::new(&RobotsConfig::default(), vec![]).unwrap();
    let url = Url::parse(&format!("http://127.0.0.1:{}/page", port)).unwrap();

    assert!(cache.is_allowed(&url, "*").await);
    assert_eq!(cache.len(), 1);

    cache.clear();
    assert!(cache.is_empty());
}
