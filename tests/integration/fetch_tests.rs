//! Fetcher, robots gate and rate limiter against mock servers

use crate::common::{farm_page, fetcher, fetcher_with, test_config};
use cattle_harvest::crawler::{FetchError, HeadlessRenderer, RateLimiter};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_retries_server_error_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ranch"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ranch"))
        .respond_with(ResponseTemplate::new(200).set_body_string(farm_page("Lazy K Ranch", "lazyk@ranch-test.com")))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(&test_config(&server.uri()));
    let page = fetcher.fetch(&format!("{}/ranch", server.uri())).await.unwrap();

    assert_eq!(page.status_code, 200);
    assert!(!page.used_heavy_render);
    assert!(page.html.contains("Lazy K Ranch"));
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(&test_config(&server.uri()));
    let error = fetcher
        .fetch(&format!("{}/gone", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(error, FetchError::HttpStatus(404)));
    assert_eq!(error.to_string(), "HTTP 404");
}

#[tokio::test]
async fn test_timeout_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .expect(2)
        .mount(&server)
        .await;

    let fetcher = fetcher(&test_config(&server.uri()));
    let error = fetcher
        .fetch(&format!("{}/slow", server.uri()))
        .await
        .unwrap_err();

    assert_eq!(error.to_string(), "Request timeout");
}

#[tokio::test]
async fn test_robots_disallow_blocks_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/private/herd"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let fetcher = fetcher(&test_config(&server.uri()));
    let error = fetcher
        .fetch(&format!("{}/private/herd", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(error, FetchError::BlockedByRobots));
    assert_eq!(error.to_string(), "Blocked by robots.txt");
}

#[tokio::test]
async fn test_robots_fetched_once_per_origin() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /\n"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(farm_page("Bar S", "bars@ranch-test.com")))
        .mount(&server)
        .await;

    let fetcher = fetcher(&test_config(&server.uri()));
    let urls: Vec<String> = (0..5).map(|i| format!("{}/page{}", server.uri(), i)).collect();
    let results = fetch_all(fetcher, urls).await;

    assert!(results.iter().all(|ok| *ok));
}

async fn fetch_all(
    fetcher: Arc<cattle_harvest::crawler::PageFetcher>,
    urls: Vec<String>,
) -> Vec<bool> {
    let mut tasks = tokio::task::JoinSet::new();
    for url in urls {
        let fetcher = fetcher.clone();
        tasks.spawn(async move { fetcher.fetch(&url).await.is_ok() });
    }
    let mut results = Vec::new();
    while let Some(done) = tasks.join_next().await {
        results.push(done.unwrap());
    }
    results
}

#[tokio::test]
async fn test_heavy_render_fallback() {
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/app"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&site)
        .await;

    let engine = MockServer::start().await;
    let page_url = format!("{}/app", site.uri());
    Mock::given(method("POST"))
        .and(path("/content"))
        .and(body_partial_json(json!({
            "url": page_url,
            "gotoOptions": {"waitUntil": "networkidle2"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(farm_page("Rendered Ranch", "r@ranch-test.com")))
        .expect(1)
        .mount(&engine)
        .await;

    let config = test_config(&site.uri());
    let renderer = HeadlessRenderer::new(
        &engine.uri(),
        Vec::new(),
        Duration::from_millis(1000),
        Duration::from_millis(1000),
    )
    .unwrap();
    let fetcher = fetcher_with(&config, Arc::new(renderer));

    let page = fetcher.fetch(&page_url).await.unwrap();
    assert!(page.used_heavy_render);
    assert!(page.html.contains("Rendered Ranch"));
}

#[tokio::test]
async fn test_rate_limiter_spaces_same_domain() {
    let limiter = Arc::new(RateLimiter::new(Duration::from_millis(200), BTreeMap::new()));
    let start = Instant::now();

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..3 {
        let limiter = limiter.clone();
        tasks.spawn(async move {
            limiter.wait("https://ranch.com/a").await;
            Instant::now()
        });
    }
    let mut starts = Vec::new();
    while let Some(done) = tasks.join_next().await {
        starts.push(done.unwrap());
    }
    starts.sort();

    assert!(starts[1] - starts[0] >= Duration::from_millis(190));
    assert!(starts[2] - starts[1] >= Duration::from_millis(190));
    assert!(start.elapsed() >= Duration::from_millis(390));
    assert_eq!(limiter.request_count("ranch.com").await, 3);
}

#[tokio::test]
async fn test_rate_limiter_overlaps_different_domains() {
    let limiter = Arc::new(RateLimiter::new(Duration::from_millis(500), BTreeMap::new()));
    let start = Instant::now();

    let mut tasks = tokio::task::JoinSet::new();
    for domain in ["a.com", "b.com", "c.com"] {
        let limiter = limiter.clone();
        tasks.spawn(async move { limiter.wait_domain(domain).await });
    }
    while tasks.join_next().await.is_some() {}

    assert!(start.elapsed() < Duration::from_millis(400));
}
