//! # Completion Client Tests
//!
//! The OpenAI-compatible client against a mock HTTP server.

use std::time::Duration;

use docprompt::completion::{CompletionClient, CompletionError, OpenAiClient};
use docprompt::config::CompletionSettings;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings(server: &MockServer, max_tokens: Option<u32>) -> CompletionSettings {
    CompletionSettings {
        api_key: "sk-test".to_string(),
        base_url: server.uri(),
        model: "gpt-4o-mini".to_string(),
        max_tokens,
        timeout: Duration::from_secs(5),
    }
}

fn reply_body(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

#[tokio::test]
async fn test_prompt_is_system_and_document_is_user() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "messages": [
                { "role": "system", "content": "Summarize" },
                { "role": "user", "content": "Document text" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("  The summary.\n")))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiClient::new(settings(&server, None)).unwrap();
    let reply = client.complete("Summarize", "Document text").await.unwrap();

    assert_eq!(reply, "The summary.");
}

#[tokio::test]
async fn test_max_tokens_is_sent_when_configured() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "max_tokens": 1000 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(reply_body("capped")))
        .expect(1)
        .mount(&server)
        .await;

    let client = OpenAiClient::new(settings(&server, Some(1000))).unwrap();
    assert_eq!(client.complete("p", "d").await.unwrap(), "capped");
}

#[tokio::test]
async fn test_api_error_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" }
        })))
        .mount(&server)
        .await;

    let client = OpenAiClient::new(settings(&server, None)).unwrap();
    let err = client.complete("p", "d").await.unwrap_err();

    match err {
        CompletionError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Incorrect API key provided");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_non_json_error_body_is_kept_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let client = OpenAiClient::new(settings(&server, None)).unwrap();
    let err = client.complete("p", "d").await.unwrap_err();

    assert_eq!(err.to_string(), "API returned 502: Bad Gateway");
}

#[tokio::test]
async fn test_empty_choices_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let client = OpenAiClient::new(settings(&server, None)).unwrap();
    let err = client.complete("p", "d").await.unwrap_err();

    assert!(matches!(err, CompletionError::EmptyResponse));
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(reply_body("late"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let mut settings = settings(&server, None);
    settings.timeout = Duration::from_millis(200);
    let client = OpenAiClient::new(settings).unwrap();
    let err = client.complete("p", "d").await.unwrap_err();

    assert!(matches!(err, CompletionError::Timeout(_)));
}
