use crate::create_test_config;
use polite_fetch::{
    FetchRequest, FetchStrategy, Orchestrator, STATUS_INVALID_URL, STATUS_TIMEOUT,
    STATUS_TRANSPORT,
};
use std::time::Duration;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mounts a permissive robots.txt so page fetches are not blocked
async fn allow_all_robots(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_simple_fetch_success() {
    let mock_server = MockServer::start().await;
    allow_all_robots(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header_exists("user-agent"))
        .and(header("dnt", "1"))
        .and(header("referer", "https://www.google.com/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html")
                .set_body_string("<html><body>Hello</body></html>"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let orchestrator = Orchestrator::new(create_test_config()).unwrap();
    let url = format!("{}/page", mock_server.uri());
    let result = orchestrator
        .fetch_request(&FetchRequest::new(&url).with_strategy(FetchStrategy::SimpleHttp))
        .await;

    assert!(result.is_success());
    assert_eq!(result.status_code(), 200);
    assert_eq!(result.body(), Some("<html><body>Hello</body></html>"));
    assert_eq!(result.resolved_url(), url);
}

#[tokio::test]
async fn test_user_agent_comes_from_pool() {
    let mock_server = MockServer::start().await;
    allow_all_robots(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .and(header("user-agent", "PoolAgent/9.9"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config();
    config.fetcher.user_agents = vec!["PoolAgent/9.9".to_string()];
    let orchestrator = Orchestrator::new(config).unwrap();

    let result = orchestrator
        .fetch(&format!("{}/page", mock_server.uri()), None)
        .await;
    assert_eq!(result.status_code(), 200);
}

#[tokio::test]
async fn test_redirect_is_followed() {
    let mock_server = MockServer::start().await;
    allow_all_robots(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/new"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved here"))
        .mount(&mock_server)
        .await;

    let orchestrator = Orchestrator::new(create_test_config()).unwrap();
    let result = orchestrator
        .fetch(&format!("{}/old", mock_server.uri()), None)
        .await;

    assert_eq!(result.status_code(), 200);
    assert_eq!(result.resolved_url(), format!("{}/new", mock_server.uri()));
    assert_eq!(result.body(), Some("moved here"));
}

#[tokio::test]
async fn test_http_error_reports_upstream_status() {
    let mock_server = MockServer::start().await;
    allow_all_robots(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let orchestrator = Orchestrator::new(create_test_config()).unwrap();
    let result = orchestrator
        .fetch(&format!("{}/missing", mock_server.uri()), None)
        .await;

    assert_eq!(result.status_code(), 404);
    assert!(result.body().is_none());
    assert!(!result.is_success());
}

#[tokio::test]
async fn test_retry_exhaustion_invokes_three_times() {
    let mock_server = MockServer::start().await;
    allow_all_robots(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config();
    config.retry.max_retries = 2;
    let orchestrator = Orchestrator::new(config).unwrap();

    let result = orchestrator
        .fetch(&format!("{}/flaky", mock_server.uri()), None)
        .await;
    assert_eq!(result.status_code(), 503);
    assert!(result.body().is_none());
}

#[tokio::test]
async fn test_retry_recovers_after_transient_failure() {
    let mock_server = MockServer::start().await;
    allow_all_robots(&mock_server).await;

    // Mounted first, so it answers until its budget is used up
    Mock::given(method("GET"))
        .and(path("/recovering"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/recovering"))
        .respond_with(ResponseTemplate::new(200).set_body_string("back"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config();
    config.retry.max_retries = 3;
    let orchestrator = Orchestrator::new(config).unwrap();

    let result = orchestrator
        .fetch(&format!("{}/recovering", mock_server.uri()), None)
        .await;
    assert_eq!(result.status_code(), 200);
    assert_eq!(result.body(), Some("back"));
}

#[tokio::test]
async fn test_status_errors_not_retried_when_excluded() {
    let mock_server = MockServer::start().await;
    allow_all_robots(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(410))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut config = create_test_config();
    config.retry.max_retries = 3;
    config.retry.retry_on = vec![polite_fetch::ErrorKind::Timeout];
    let orchestrator = Orchestrator::new(config).unwrap();

    let result = orchestrator
        .fetch(&format!("{}/gone", mock_server.uri()), None)
        .await;
    assert_eq!(result.status_code(), 410);
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let mock_server = MockServer::start().await;
    allow_all_robots(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("too late")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let mut config = create_test_config();
    config.fetcher.timeout_seconds = 0.5;
    let orchestrator = Orchestrator::new(config).unwrap();

    let url = format!("{}/slow", mock_server.uri());
    let result = orchestrator.fetch(&url, None).await;

    assert_eq!(result.status_code(), STATUS_TIMEOUT);
    assert!(result.body().is_none());
    assert_eq!(result.resolved_url(), url);
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let orchestrator = Orchestrator::new(create_test_config()).unwrap();
    let result = orchestrator
        .fetch(&format!("http://127.0.0.1:{}/page", port), None)
        .await;

    assert_eq!(result.status_code(), STATUS_TRANSPORT);
    assert!(result.body().is_none());
}

#[tokio::test]
async fn test_captcha_page_is_returned_unchanged() {
    let mock_server = MockServer::start().await;
    allow_all_robots(&mock_server).await;

    let body = "<html><body><h1>Are you a   ROBOT?</h1><div class=\"g-recaptcha\"></div></body></html>";
    Mock::given(method("GET"))
        .and(path("/challenge"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    let orchestrator = Orchestrator::new(create_test_config()).unwrap();
    let result = orchestrator
        .fetch(&format!("{}/challenge", mock_server.uri()), None)
        .await;

    assert_eq!(result.status_code(), 200);
    assert_eq!(result.body(), Some(body));
}

#[tokio::test]
async fn test_invalid_urls_map_to_zero() {
    let orchestrator = Orchestrator::new(create_test_config()).unwrap();

    for input in ["", "example.com/page", "mailto:someone@example.com", "http://"] {
        let result = orchestrator.fetch(input, None).await;
        assert_eq!(result.status_code(), STATUS_INVALID_URL, "{:?}", input);
        assert!(result.body().is_none());
    }
}

#[tokio::test]
async fn test_shutdown_clears_robots_cache() {
    let mock_server = MockServer::start().await;
    allow_all_robots(&mock_server).await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let orchestrator = Orchestrator::new(create_test_config()).unwrap();
    orchestrator
        .fetch(&format!("{}/page", mock_server.uri()), None)
        .await;
    assert_eq!(orchestrator.robots().len(), 1);

    orchestrator.shutdown().await;
    assert!(orchestrator.robots().is_empty());
}
