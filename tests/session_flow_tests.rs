// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! End-to-end submit flow against a mock HTTP provider: streaming, history
//! persistence, rollback, and rate limiting working together.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use quill::client::SamplingParams;
use quill::error::{ApiError, QuillError};
use quill::limiter::RateLimiter;
use quill::message::Message;
use quill::provider::{FrameFormat, ProviderConfig};
use quill::session::ChatSession;
use quill::store::SessionStore;

fn provider_for(server: &MockServer, format: FrameFormat) -> ProviderConfig {
    ProviderConfig {
        name: "mock".to_string(),
        base_url: format!("{}/v1", server.uri()),
        model: "mock-model".to_string(),
        frame_format: format,
        extra_headers: vec![],
    }
}

fn delta_json(text: &str) -> String {
    serde_json::json!({"choices": [{"delta": {"content": text}}]}).to_string()
}

fn sse_body(deltas: &[&str]) -> String {
    let mut body = String::new();
    for delta in deltas {
        body.push_str(&format!("data: {}\n\n", delta_json(delta)));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

fn json_lines_body(deltas: &[&str]) -> String {
    let mut body = String::new();
    for delta in deltas {
        body.push_str(&delta_json(delta));
        body.push('\n');
    }
    body.push_str("[DONE]\n");
    body
}

fn session_for(provider: ProviderConfig, dir: &TempDir, limiter: RateLimiter) -> ChatSession {
    ChatSession::builder()
        .with_provider(provider)
        .with_credential("test-key")
        .with_store(Arc::new(SessionStore::open(dir.path()).unwrap()))
        .with_limiter(Arc::new(limiter))
        .with_params(SamplingParams::default())
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_sse_round_trip_persists_both_turns() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer test-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["Hi", " there"]), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let session = session_for(
        provider_for(&server, FrameFormat::Sse),
        &dir,
        RateLimiter::default(),
    );

    let assistant = session.submit("Hello", None).await.unwrap();
    assert_eq!(assistant.content, "Hi there");

    let history = session.history().unwrap();
    assert_eq!(
        history,
        vec![Message::user("Hello"), Message::assistant("Hi there")]
    );
}

#[tokio::test]
async fn test_json_lines_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(json_lines_body(&["One", " two"]), "application/json"),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let session = session_for(
        provider_for(&server, FrameFormat::JsonLines),
        &dir,
        RateLimiter::default(),
    );

    let assistant = session.submit("Count", None).await.unwrap();
    assert_eq!(assistant.content, "One two");
}

#[tokio::test]
async fn test_attachment_prepended_to_persisted_turn() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["Summary."]), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let session = session_for(
        provider_for(&server, FrameFormat::Sse),
        &dir,
        RateLimiter::default(),
    );

    session
        .submit("Summarize.", Some("Context."))
        .await
        .unwrap();

    let history = session.history().unwrap();
    assert_eq!(history[0], Message::user("Context.\nSummarize."));
}

#[tokio::test]
async fn test_server_error_rolls_back_user_turn() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_raw(
            r#"{"error": {"message": "rate limit exceeded"}}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let session = session_for(
        provider_for(&server, FrameFormat::Sse),
        &dir,
        RateLimiter::default(),
    );

    let err = session.submit("Hello", None).await.unwrap_err();
    match err {
        QuillError::Api(ApiError::Server {
            status, message, ..
        }) => {
            assert_eq!(status, 429);
            assert_eq!(message, "rate limit exceeded");
        }
        other => panic!("expected Server error, got {other:?}"),
    }

    // Unanswered user turn must not survive
    assert!(session.history().unwrap().is_empty());
}

#[tokio::test]
async fn test_rate_limited_submit_never_reaches_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(&["Hi"]), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let session = session_for(
        provider_for(&server, FrameFormat::Sse),
        &dir,
        RateLimiter::new(1, Duration::from_secs(60)),
    );

    session.submit("Hello", None).await.unwrap();

    let err = session.submit("Again", None).await.unwrap_err();
    assert!(matches!(err, QuillError::RateLimited { max: 1, .. }));

    // Only the first exchange is in the log
    assert_eq!(session.history().unwrap().len(), 2);
}

#[tokio::test]
async fn test_malformed_frames_tolerated_mid_stream() {
    let server = MockServer::start().await;
    let body = format!(
        "data: {}\n\n: keep-alive\n\nnot a frame\n\ndata: {}\n\ndata: [DONE]\n\n",
        delta_json("Hi"),
        delta_json(" there"),
    );
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let session = session_for(
        provider_for(&server, FrameFormat::Sse),
        &dir,
        RateLimiter::default(),
    );

    let assistant = session.submit("Hello", None).await.unwrap();
    assert_eq!(assistant.content, "Hi there");
}

#[tokio::test]
async fn test_second_turn_sends_full_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(&["ok"]), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let session = session_for(
        provider_for(&server, FrameFormat::Sse),
        &dir,
        RateLimiter::default(),
    );

    session.submit("First", None).await.unwrap();
    session.submit("Second", None).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);

    let body: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    let messages = body["messages"].as_array().unwrap();
    // preamble + first user + first assistant + second user
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[1]["content"], "First");
    assert_eq!(messages[2]["content"], "ok");
    assert_eq!(messages[3]["content"], "Second");
    assert_eq!(body["stream"], true);
}

#[tokio::test]
async fn test_extra_headers_forwarded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("HTTP-Referer", "http://localhost:8501"))
        .and(header("X-Title", "Quill Chat"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(&["Hi"]), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut provider = provider_for(&server, FrameFormat::Sse);
    provider.extra_headers = vec![
        ("HTTP-Referer".to_string(), "http://localhost:8501".to_string()),
        ("X-Title".to_string(), "Quill Chat".to_string()),
    ];

    let dir = TempDir::new().unwrap();
    let session = session_for(provider, &dir, RateLimiter::default());

    session.submit("Hello", None).await.unwrap();
}

#[tokio::test]
async fn test_resume_continues_existing_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse_body(&["ok"]), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = Arc::new(SessionStore::open(dir.path()).unwrap());

    let first = ChatSession::builder()
        .with_provider(provider_for(&server, FrameFormat::Sse))
        .with_credential("test-key")
        .with_store(Arc::clone(&store))
        .build()
        .unwrap();
    first.submit("Hello", None).await.unwrap();
    let id = first.id();
    drop(first);

    let resumed = ChatSession::builder()
        .with_provider(provider_for(&server, FrameFormat::Sse))
        .with_credential("test-key")
        .with_store(store)
        .resume(id)
        .build()
        .unwrap();

    assert_eq!(resumed.history().unwrap().len(), 2);
    resumed.submit("More", None).await.unwrap();
    assert_eq!(resumed.history().unwrap().len(), 4);
}
