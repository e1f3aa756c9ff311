//! Integration tests for `SearchClient` using wiremock HTTP mocks.

use brandlens_search::{SearchClient, SEARCH_FAILED_EVIDENCE};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str) -> SearchClient {
    SearchClient::with_base_url("test-key", "gpt-4o-mini", 5, base_url)
        .expect("client construction should not fail")
        .with_retries(2, 0)
}

fn answer_envelope(text: &str) -> serde_json::Value {
    json!({
        "id": "resp_123",
        "object": "response",
        "output": [
            {
                "type": "web_search_call",
                "id": "ws_1",
                "status": "completed",
                "action": {
                    "type": "search",
                    "query": "best anvils",
                    "sources": [
                        {"type": "url", "url": "https://reviews.example.net/anvils"},
                        {"type": "url", "url": "https://blog.example.org/forge"}
                    ]
                }
            },
            {
                "type": "message",
                "role": "assistant",
                "content": [{
                    "type": "output_text",
                    "text": text,
                    "annotations": [
                        {"type": "url_citation", "url": "https://blog.example.org/forge", "title": "Forge"}
                    ]
                }]
            }
        ]
    })
}

#[tokio::test]
async fn check_classifies_answer_and_collects_citations() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "input": "best anvils",
            "tools": [{"type": "web_search_preview"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(answer_envelope(
            "Top anvils:\n1. Globex Forge\n2. Acme Heavy Duty\n3. Initech",
        )))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = test_client(&server.uri()).check("Acme", "best anvils").await;

    assert!(outcome.mentioned);
    assert!(!outcome.search_failed);
    assert_eq!(outcome.evidence, "2. Acme Heavy Duty");
    assert_eq!(outcome.position, Some(2));
    assert_eq!(
        outcome.source_urls,
        vec![
            "https://blog.example.org/forge".to_string(),
            "https://reviews.example.net/anvils".to_string(),
        ]
    );
    assert_eq!(outcome.raw_output["id"], "resp_123");
}

#[tokio::test]
async fn check_degrades_on_upstream_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = test_client(&server.uri()).check("Acme", "best anvils").await;

    assert!(!outcome.mentioned);
    assert!(outcome.search_failed);
    assert_eq!(outcome.evidence, SEARCH_FAILED_EVIDENCE);
    assert!(outcome.source_urls.is_empty());
    let error = outcome.raw_output["error"].as_str().unwrap_or_default();
    assert!(error.contains("401"), "error payload should carry status: {error}");
}

#[tokio::test]
async fn check_retries_rate_limits() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(answer_envelope("- Acme")))
        .mount(&server)
        .await;

    let outcome = test_client(&server.uri()).check("Acme", "best anvils").await;

    assert!(outcome.mentioned);
    assert_eq!(outcome.position, Some(1));
}

#[tokio::test]
async fn check_without_api_key_never_calls_upstream() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = SearchClient::with_base_url("", "gpt-4o-mini", 5, &server.uri())
        .expect("client construction should not fail");
    let outcome = client.check("Acme", "best anvils").await;

    assert!(outcome.search_failed);
    assert_eq!(outcome.evidence, SEARCH_FAILED_EVIDENCE);
}

#[tokio::test]
async fn suggest_queries_parses_model_lines() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output": [{
                "type": "message",
                "content": [{"type": "output_text", "text": "1. best anvils for blacksmiths\n2. \"cheap anvil\"\n3. anvil brands\n4. extra"}]
            }]
        })))
        .mount(&server)
        .await;

    let queries = test_client(&server.uri())
        .suggest_queries("Acme", "anvils", 3)
        .await;

    assert_eq!(
        queries,
        vec![
            "best anvils for blacksmiths".to_string(),
            "cheap anvil".to_string(),
            "anvil brands".to_string(),
        ]
    );
}

#[tokio::test]
async fn suggest_queries_falls_back_to_templates() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/responses"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad request"))
        .mount(&server)
        .await;

    let queries = test_client(&server.uri())
        .suggest_queries("Acme", "anvil", 2)
        .await;

    assert_eq!(
        queries,
        vec!["best anvil brands".to_string(), "Acme alternatives".to_string()]
    );
}
