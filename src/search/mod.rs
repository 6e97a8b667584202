//! Web search client.
//!
//! Talks to the server-side relay (`gateway`), never to the search provider
//! directly — the provider credential stays server-held. The contract is
//! deliberately forgiving: a failed search is an empty result list plus a
//! log line, never an error the orchestrator has to unwind.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

/// Maximum search request time before timeout.
const SEARCH_TIMEOUT_SECS: u64 = 15;
/// Hard cap on requested results, matching the relay's own clamp.
pub const MAX_RESULTS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

pub struct SearchClient {
    relay_url: String,
    client: Client,
}

impl SearchClient {
    pub fn new(relay_url: &str) -> Self {
        Self {
            relay_url: relay_url.to_string(),
            client: Client::builder()
                .timeout(Duration::from_secs(SEARCH_TIMEOUT_SECS))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Issue one search. `count` is clamped to 1..=10. Provider failures,
    /// bad payloads, and transport errors all collapse to an empty list.
    pub async fn search(&self, query: &str, count: usize) -> Vec<SearchResult> {
        let count = count.clamp(1, MAX_RESULTS);
        let body = json!({ "query": query, "count": count });

        let response = match self.client.post(&self.relay_url).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "search relay unreachable");
                return Vec::new();
            }
        };

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "search relay returned an error");
            return Vec::new();
        }

        match response.json::<RelayResponse>().await {
            Ok(data) => data.results,
            Err(e) => {
                tracing::warn!(error = %e, "search relay returned malformed JSON");
                Vec::new()
            }
        }
    }
}

/// Render results for prompt injection.
pub fn format_search_results(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "Tidak ada hasil pencarian web yang ditemukan.".to_string();
    }

    let mut formatted = String::from("**HASIL PENCARIAN WEB:**\n\n");
    for (i, result) in results.iter().enumerate() {
        formatted.push_str(&format!(
            "{}. **{}**\n   URL: {}\n   Snippet: {}\n\n",
            i + 1,
            result.title,
            result.url,
            result.snippet
        ));
    }
    formatted.push_str(
        "\n**INSTRUKSI:** Gunakan informasi di atas untuk menjawab pertanyaan user \
         dengan konteks yang akurat. Sebutkan sumber jika relevan.\n",
    );
    formatted
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn result(title: &str) -> SearchResult {
        SearchResult {
            title: title.into(),
            url: "https://example.com".into(),
            snippet: "snippet".into(),
        }
    }

    #[test]
    fn format_empty_results() {
        assert_eq!(
            format_search_results(&[]),
            "Tidak ada hasil pencarian web yang ditemukan."
        );
    }

    #[test]
    fn format_numbers_results_and_adds_instruction() {
        let formatted = format_search_results(&[result("A"), result("B")]);
        assert!(formatted.starts_with("**HASIL PENCARIAN WEB:**"));
        assert!(formatted.contains("1. **A**"));
        assert!(formatted.contains("2. **B**"));
        assert!(formatted.contains("**INSTRUKSI:**"));
    }

    #[tokio::test]
    async fn search_returns_relay_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/search"))
            .and(body_partial_json(json!({"query": "bigquery"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {"title": "BigQuery", "url": "https://b.example", "snippet": "s"}
                ]
            })))
            .mount(&server)
            .await;

        let client = SearchClient::new(&format!("{}/api/search", server.uri()));
        let results = client.search("bigquery", 5).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "BigQuery");
    }

    #[tokio::test]
    async fn search_clamps_count_to_relay_maximum() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"count": 10})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = SearchClient::new(&server.uri());
        let _ = client.search("q", 50).await;
    }

    #[tokio::test]
    async fn relay_error_status_yields_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "boom"})))
            .mount(&server)
            .await;

        let client = SearchClient::new(&server.uri());
        assert!(client.search("q", 5).await.is_empty());
    }

    #[tokio::test]
    async fn malformed_relay_payload_yields_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = SearchClient::new(&server.uri());
        assert!(client.search("q", 5).await.is_empty());
    }

    #[tokio::test]
    async fn unreachable_relay_yields_empty_list() {
        // Nothing listens on this port.
        let client = SearchClient::new("http://127.0.0.1:1/api/search");
        assert!(client.search("q", 5).await.is_empty());
    }
}
