//! Search relay contract tests over a real socket, with the upstream
//! search provider mocked.

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::net::TcpListener;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use luna::config::Config;
use luna::gateway::{RelayState, serve};
use luna::search::SearchClient;

async fn start_relay(brave: &MockServer, with_key: bool) -> String {
    let mut config = Config::default();
    config.gateway.brave_base_url = brave.uri();
    config.gateway.brave_api_key = with_key.then(|| "test-brave-key".to_string());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, Arc::new(RelayState::from_config(&config))));
    format!("http://{addr}")
}

async fn mock_brave_success(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/res/v1/web/search"))
        .and(header("X-Subscription-Token", "test-brave-key"))
        .and(query_param("country", "ID"))
        .and(query_param("search_lang", "en"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "web": {
                "results": [
                    {"title": "Rust", "url": "https://rust-lang.org", "description": "The Rust language"}
                ]
            }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn post_search_returns_normalized_results_with_cors() {
    let brave = MockServer::start().await;
    mock_brave_success(&brave).await;
    let relay = start_relay(&brave, true).await;

    let response = reqwest::Client::new()
        .post(format!("{relay}/api/search"))
        .json(&json!({"query": "rust", "count": 3}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response
            .headers()
            .get("Access-Control-Allow-Origin")
            .unwrap(),
        "*"
    );

    let body: Value = response.json().await.unwrap();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["title"], "Rust");
    assert_eq!(results[0]["snippet"], "The Rust language");
}

#[tokio::test]
async fn search_client_round_trips_through_the_relay() {
    let brave = MockServer::start().await;
    mock_brave_success(&brave).await;
    let relay = start_relay(&brave, true).await;

    let client = SearchClient::new(&format!("{relay}/api/search"));
    let results = client.search("rust", 3).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].url, "https://rust-lang.org");
}

#[tokio::test]
async fn non_post_method_on_search_path_is_405() {
    let brave = MockServer::start().await;
    let relay = start_relay(&brave, true).await;

    let response = reqwest::get(format!("{relay}/api/search")).await.unwrap();
    assert_eq!(response.status(), 405);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Method not allowed");
}

#[tokio::test]
async fn options_preflight_is_accepted() {
    let brave = MockServer::start().await;
    let relay = start_relay(&brave, true).await;

    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, format!("{relay}/api/search"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(
        response
            .headers()
            .get("Access-Control-Allow-Methods")
            .unwrap(),
        "GET,OPTIONS,POST"
    );
}

#[tokio::test]
async fn missing_query_is_400() {
    let brave = MockServer::start().await;
    let relay = start_relay(&brave, true).await;

    let response = reqwest::Client::new()
        .post(format!("{relay}/api/search"))
        .json(&json!({"count": 3}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Query parameter is required");
}

#[tokio::test]
async fn invalid_body_is_400() {
    let brave = MockServer::start().await;
    let relay = start_relay(&brave, true).await;

    let response = reqwest::Client::new()
        .post(format!("{relay}/api/search"))
        .header("Content-Type", "application/json")
        .body("definitely not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn missing_server_credential_is_500() {
    let brave = MockServer::start().await;
    let relay = start_relay(&brave, false).await;

    let response = reqwest::Client::new()
        .post(format!("{relay}/api/search"))
        .json(&json!({"query": "rust"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Search service not configured");
}

#[tokio::test]
async fn upstream_error_status_is_forwarded() {
    let brave = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/res/v1/web/search"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&brave)
        .await;
    let relay = start_relay(&brave, true).await;

    let response = reqwest::Client::new()
        .post(format!("{relay}/api/search"))
        .json(&json!({"query": "rust"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 429);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Search service error");
}

#[tokio::test]
async fn count_is_clamped_to_ten() {
    let brave = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/res/v1/web/search"))
        .and(query_param("count", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"web": {"results": []}})))
        .expect(1)
        .mount(&brave)
        .await;
    let relay = start_relay(&brave, true).await;

    let response = reqwest::Client::new()
        .post(format!("{relay}/api/search"))
        .json(&json!({"query": "rust", "count": 99}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn health_endpoint_answers() {
    let brave = MockServer::start().await;
    let relay = start_relay(&brave, true).await;

    let response = reqwest::get(format!("{relay}/health")).await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let brave = MockServer::start().await;
    let relay = start_relay(&brave, true).await;

    let response = reqwest::get(format!("{relay}/nope")).await.unwrap();
    assert_eq!(response.status(), 404);
}
