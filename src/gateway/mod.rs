//! Search relay gateway.
//!
//! The browser-facing endpoint that keeps the search provider credential
//! server-side: `POST /api/search {query, count?}` → `{results}`. Raw TCP +
//! tokio — a single JSON route does not need an HTTP framework. CORS is
//! permissive by design (the portfolio site may be served from anywhere);
//! the only secret involved never leaves this process.

use crate::config::Config;
use crate::search::SearchResult;
use anyhow::Result;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Upstream result cap, mirrored by the client-side clamp.
const MAX_COUNT: usize = 10;

pub struct RelayState {
    client: reqwest::Client,
    api_key: Option<String>,
    brave_base_url: String,
    region: String,
    lang: String,
    default_count: usize,
}

impl RelayState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            api_key: config.gateway.brave_api_key.clone(),
            brave_base_url: config.gateway.brave_base_url.trim_end_matches('/').to_string(),
            region: config.search.region.clone(),
            lang: config.search.lang.clone(),
            default_count: config.search.count,
        }
    }
}

/// Bind and serve until the process dies.
pub async fn run_gateway(config: &Config) -> Result<()> {
    let listener =
        TcpListener::bind(format!("{}:{}", config.gateway.host, config.gateway.port)).await?;
    let addr = listener.local_addr()?;

    println!("🌙 Luna search relay listening on http://{addr}");
    println!("  POST /api/search — {{\"query\": \"...\", \"count\": 5}}");
    println!("  GET  /health     — health check");
    if config.gateway.brave_api_key.is_none() {
        println!("  ⚠️  BRAVE_SEARCH_API_KEY not set — searches will fail with 500.");
    }
    println!("  Press Ctrl+C to stop.\n");

    serve(listener, Arc::new(RelayState::from_config(config))).await
}

/// Accept loop, split out so tests can bind port 0 themselves.
pub async fn serve(listener: TcpListener, state: Arc<RelayState>) -> Result<()> {
    loop {
        let (mut stream, peer) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            let Some(request) = read_http_request(&mut stream).await else {
                return;
            };
            let first_line = request.lines().next().unwrap_or("");
            let parts: Vec<&str> = first_line.split_whitespace().collect();

            if let [method, path, ..] = parts.as_slice() {
                tracing::info!("{peer} → {method} {path}");
                handle_request(&mut stream, method, path, &request, &state).await;
            } else {
                let _ = send_json(
                    &mut stream,
                    400,
                    &serde_json::json!({"error": "Bad request"}),
                )
                .await;
            }
        });
    }
}

async fn handle_request(
    stream: &mut TcpStream,
    method: &str,
    path: &str,
    request: &str,
    state: &RelayState,
) {
    match (method, path) {
        // Preflight — answered permissively for any path.
        ("OPTIONS", _) => {
            let _ = send_empty(stream, 200).await;
        }

        ("GET", "/health") => {
            let _ = send_json(stream, 200, &serde_json::json!({"status": "ok"})).await;
        }

        ("POST", "/api/search") => {
            handle_search(stream, request, state).await;
        }

        // The search path accepts POST only.
        (_, "/api/search") => {
            let _ = send_json(
                stream,
                405,
                &serde_json::json!({"error": "Method not allowed"}),
            )
            .await;
        }

        _ => {
            let _ = send_json(
                stream,
                404,
                &serde_json::json!({
                    "error": "Not found",
                    "routes": ["POST /api/search", "GET /health"]
                }),
            )
            .await;
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    query: Option<serde_json::Value>,
    count: Option<u64>,
}

// Brave response shapes, only the fields the relay forwards.
#[derive(Debug, Deserialize)]
struct BraveResponse {
    web: Option<BraveWebResults>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResults {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    description: Option<String>,
}

async fn handle_search(stream: &mut TcpStream, request: &str, state: &RelayState) {
    let body_str = request_body(request);
    let Ok(body) = serde_json::from_str::<SearchBody>(body_str) else {
        let _ = send_json(
            stream,
            400,
            &serde_json::json!({"error": "Invalid JSON body"}),
        )
        .await;
        return;
    };

    let Some(query) = body.query.as_ref().and_then(serde_json::Value::as_str) else {
        let _ = send_json(
            stream,
            400,
            &serde_json::json!({"error": "Query parameter is required"}),
        )
        .await;
        return;
    };

    let Some(api_key) = state.api_key.as_deref() else {
        tracing::error!("BRAVE_SEARCH_API_KEY not configured");
        let _ = send_json(
            stream,
            500,
            &serde_json::json!({"error": "Search service not configured"}),
        )
        .await;
        return;
    };

    let count = body
        .count
        .map_or(state.default_count, |c| c as usize)
        .clamp(1, MAX_COUNT);

    let upstream = state
        .client
        .get(format!("{}/res/v1/web/search", state.brave_base_url))
        .header("Accept", "application/json")
        .header("X-Subscription-Token", api_key)
        .query(&[
            ("q", query),
            ("count", &count.to_string()),
            ("country", &state.region),
            ("search_lang", &state.lang),
            ("text_decorations", "false"),
        ])
        .send()
        .await;

    let response = match upstream {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "Brave upstream unreachable");
            let _ = send_json(
                stream,
                500,
                &serde_json::json!({"error": "Internal server error", "message": e.to_string()}),
            )
            .await;
            return;
        }
    };

    let status = response.status();
    if !status.is_success() {
        let details = response.text().await.unwrap_or_default();
        tracing::error!(status = %status, "Brave API error");
        let _ = send_json(
            stream,
            status.as_u16(),
            &serde_json::json!({"error": "Search service error", "details": details}),
        )
        .await;
        return;
    }

    let results: Vec<SearchResult> = match response.json::<BraveResponse>().await {
        Ok(data) => data
            .web
            .map(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .map(|r| SearchResult {
                title: r.title,
                url: r.url,
                snippet: r.description.unwrap_or_default(),
            })
            .collect(),
        Err(e) => {
            tracing::error!(error = %e, "Brave response did not parse");
            Vec::new()
        }
    };

    let _ = send_json(stream, 200, &serde_json::json!({ "results": results })).await;
}

/// Read one request, waiting for the full body when Content-Length says
/// more is coming. 64KB cap, 30s total timeout against slow-loris.
async fn read_http_request(stream: &mut TcpStream) -> Option<String> {
    const MAX_REQUEST: usize = 65_536;
    let mut buf: Vec<u8> = Vec::with_capacity(4096);
    let mut chunk = [0u8; 8192];

    let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
    loop {
        let n = match tokio::time::timeout_at(deadline, stream.read(&mut chunk)).await {
            Ok(Ok(0)) | Err(_) => break,
            Ok(Ok(n)) => n,
            Ok(Err(_)) => return None,
        };
        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > MAX_REQUEST {
            break;
        }

        let text = String::from_utf8_lossy(&buf);
        if let Some(header_end) = text.find("\r\n\r\n").or_else(|| text.find("\n\n")) {
            let headers = &text[..header_end];
            let body_len = headers
                .lines()
                .find_map(|l| l.split_once(':').filter(|(k, _)| k.trim().eq_ignore_ascii_case("content-length")))
                .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            let sep = if text[header_end..].starts_with("\r\n\r\n") { 4 } else { 2 };
            if text.len() >= header_end + sep + body_len {
                break;
            }
        }
    }

    if buf.is_empty() {
        None
    } else {
        Some(String::from_utf8_lossy(&buf).to_string())
    }
}

/// Extract the body of a raw HTTP request.
fn request_body(request: &str) -> &str {
    request
        .split("\r\n\r\n")
        .nth(1)
        .or_else(|| request.split("\n\n").nth(1))
        .unwrap_or("")
}

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

const CORS_HEADERS: &str = "Access-Control-Allow-Origin: *\r\n\
    Access-Control-Allow-Methods: GET,OPTIONS,POST\r\n\
    Access-Control-Allow-Headers: Content-Type, Accept, X-Requested-With\r\n\
    Access-Control-Allow-Credentials: true\r\n";

async fn send_json(
    stream: &mut TcpStream,
    status: u16,
    body: &serde_json::Value,
) -> std::io::Result<()> {
    let json = serde_json::to_string(body).unwrap_or_default();
    let response = format!(
        "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\n{CORS_HEADERS}Content-Length: {}\r\nConnection: close\r\n\r\n{json}",
        status_reason(status),
        json.len()
    );
    stream.write_all(response.as_bytes()).await
}

async fn send_empty(stream: &mut TcpStream, status: u16) -> std::io::Result<()> {
    let response = format!(
        "HTTP/1.1 {status} {}\r\n{CORS_HEADERS}Content-Length: 0\r\nConnection: close\r\n\r\n",
        status_reason(status)
    );
    stream.write_all(response.as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_handles_crlf_and_lf() {
        assert_eq!(
            request_body("POST / HTTP/1.1\r\nHost: x\r\n\r\n{\"a\":1}"),
            "{\"a\":1}"
        );
        assert_eq!(request_body("POST / HTTP/1.1\nHost: x\n\n{}"), "{}");
        assert_eq!(request_body("GET / HTTP/1.1\r\n"), "");
    }

    #[test]
    fn brave_response_maps_to_relay_results() {
        let raw = r#"{"web": {"results": [{"title": "T", "url": "https://u.example", "description": "D"}]}}"#;
        let parsed: BraveResponse = serde_json::from_str(raw).unwrap();
        let results = parsed.web.unwrap().results;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "T");
        assert_eq!(results[0].description.as_deref(), Some("D"));
    }

    #[test]
    fn brave_response_without_web_is_empty() {
        let parsed: BraveResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.web.is_none());
    }

    #[test]
    fn status_reasons_cover_relay_codes() {
        assert_eq!(status_reason(405), "Method Not Allowed");
        assert_eq!(status_reason(429), "Too Many Requests");
        assert_eq!(status_reason(418), "Unknown");
    }
}
