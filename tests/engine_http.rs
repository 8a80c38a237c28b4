//! OpenAI-compatible engine against a mock server.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use truthgate::category::{ContentCategory, MediaKind};
use truthgate::engine::{AnalysisEngine, EngineError, EngineRequest, OpenAiEngine};
use truthgate::normalize::{normalize, ResultOrigin};

fn completion(content: &str) -> serde_json::Value {
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

fn engine(server: &MockServer, key: Option<&str>) -> OpenAiEngine {
    // Trailing slash is trimmed before the path is joined.
    OpenAiEngine::new(format!("{}/v1/", server.uri()), "test-model", key.map(str::to_string)).unwrap()
}

#[tokio::test]
async fn test_successful_completion() {
    let server = MockServer::start().await;
    let reply = r#"{"verdict":"False","credibilityScore":"4%","summary":"No evidence."}"#;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "response_format": { "type": "json_object" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(reply)))
        .expect(1)
        .mount(&server)
        .await;

    let request = EngineRequest::new(ContentCategory::News, "Vaccines cause magnetism");
    let raw = engine(&server, Some("sk-test")).analyze(&request).await.unwrap();
    assert_eq!(raw, reply);

    let result = normalize(&request, Ok(raw));
    assert_eq!(result.result_origin, ResultOrigin::Engine);
    assert_eq!(result.score(), Some(4));
}

#[tokio::test]
async fn test_media_prompt_carries_kind() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{}")))
        .mount(&server)
        .await;

    let mut request = EngineRequest::new(ContentCategory::Media, "https://example.org/clip.mp4");
    request.media_kind = Some(MediaKind::Video);
    engine(&server, None).analyze(&request).await.unwrap();

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    assert!(received[0].headers.get("authorization").is_none());

    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    let system = body["messages"][0]["content"].as_str().unwrap();
    assert!(system.contains("video"));
    assert_eq!(body["messages"][1]["role"], "user");
}

#[tokio::test]
async fn test_server_error_maps_to_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let request = EngineRequest::new(ContentCategory::Tool, "https://example.org/tool");
    let err = engine(&server, None).analyze(&request).await.unwrap_err();
    match err {
        EngineError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "upstream exploded");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rate_limit() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let request = EngineRequest::new(ContentCategory::News, "claim");
    let err = engine(&server, None).analyze(&request).await.unwrap_err();
    assert!(matches!(err, EngineError::RateLimited));

    let result = normalize(&request, Err(err));
    assert!(result.is_fallback());
}

#[tokio::test]
async fn test_empty_completion() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let request = EngineRequest::new(ContentCategory::Audio, "https://youtu.be/abc");
    let err = engine(&server, None).analyze(&request).await.unwrap_err();
    assert!(matches!(err, EngineError::EmptyCompletion));
}
