#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for the webhook ingest surface and the relay pipeline.
//!
//! One mockito server stands in for both downstream backends: the generation
//! endpoint (`/v1/messages`) and the application backend (`/api/response`).

use std::{net::SocketAddr, time::Duration};

use secrecy::Secret;

use tokio::net::TcpListener;

use {
    herald_config::HeraldConfig,
    herald_delivery::{BILLING_NOTICE, FAILURE_NOTICE},
    herald_gateway::{AppState, RelayState, build_app},
};

const SECRET: &str = "hook-secret";

/// Config pointing both downstream clients at the given base URL.
fn bridge_config(downstream_url: &str) -> HeraldConfig {
    let mut config = HeraldConfig::default();
    config.webhook.secret = Some(Secret::new(SECRET.to_string()));
    config.completion.base_url = downstream_url.to_string();
    config.completion.api_key = Some(Secret::new("gen-key".to_string()));
    config.completion.model = "test-model".to_string();
    config.delivery.base_url = Some(downstream_url.to_string());
    config
}

/// Start a bridge server on an ephemeral port.
async fn start_bridge(config: &HeraldConfig) -> SocketAddr {
    let state = AppState::new(RelayState::from_config(config).unwrap());
    let app = build_app(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn post_message(
    addr: SocketAddr,
    token: Option<&str>,
    body: &str,
) -> reqwest::Response {
    let client = reqwest::Client::new();
    let mut request = client
        .post(format!("http://{addr}/api/message"))
        .header("content-type", "application/json")
        .body(body.to_string());
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    request.send().await.unwrap()
}

/// Poll until the background pipeline has hit the given mock.
async fn wait_until_matched(mock: &mockito::Mock) {
    for _ in 0..100 {
        if mock.matched_async().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("mock was not called within 2s");
}

fn valid_trigger() -> String {
    r#"{"messageId":"m-1","text":"hello"}"#.to_string()
}

// ── Synchronous surface ──────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_public() {
    let server = mockito::Server::new_async().await;
    let addr = start_bridge(&bridge_config(&server.url())).await;

    let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn missing_bearer_is_401() {
    let server = mockito::Server::new_async().await;
    let addr = start_bridge(&bridge_config(&server.url())).await;

    let resp = post_message(addr, None, &valid_trigger()).await;
    assert_eq!(resp.status(), 401);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn wrong_bearer_is_401_before_any_body_parsing() {
    let server = mockito::Server::new_async().await;
    let addr = start_bridge(&bridge_config(&server.url())).await;

    // The body is not even JSON; a 401 (not 400) proves it was never parsed.
    let resp = post_message(addr, Some("wrong-secret"), "not json at all").await;
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn unset_secret_is_500_before_body_read() {
    let server = mockito::Server::new_async().await;
    let mut config = bridge_config(&server.url());
    config.webhook.secret = None;
    let addr = start_bridge(&config).await;

    let resp = post_message(addr, Some(SECRET), "garbage body").await;
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Server misconfigured");
}

#[tokio::test]
async fn missing_fields_are_400_and_start_no_generation() {
    let mut server = mockito::Server::new_async().await;
    let generation = server
        .mock("POST", "/v1/messages")
        .expect(0)
        .create_async()
        .await;
    let addr = start_bridge(&bridge_config(&server.url())).await;

    let resp = post_message(addr, Some(SECRET), r#"{"text":"hi"}"#).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("messageId"));

    let resp = post_message(addr, Some(SECRET), r#"{"messageId":"m-1","text":""}"#).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("text"));

    generation.assert_async().await;
}

#[tokio::test]
async fn empty_body_is_400() {
    let server = mockito::Server::new_async().await;
    let addr = start_bridge(&bridge_config(&server.url())).await;

    let resp = post_message(addr, Some(SECRET), "").await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "empty payload");
}

#[tokio::test]
async fn malformed_json_is_400_with_parser_text() {
    let server = mockito::Server::new_async().await;
    let addr = start_bridge(&bridge_config(&server.url())).await;

    let resp = post_message(addr, Some(SECRET), "{oops").await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(!body["error"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn oversized_body_is_400_and_never_reaches_generation() {
    let mut server = mockito::Server::new_async().await;
    let generation = server
        .mock("POST", "/v1/messages")
        .expect(0)
        .create_async()
        .await;
    let mut config = bridge_config(&server.url());
    config.webhook.max_body_bytes = 64;
    let addr = start_bridge(&config).await;

    let oversized = format!(
        r#"{{"messageId":"m-1","text":"{}"}}"#,
        "x".repeat(200)
    );
    let resp = post_message(addr, Some(SECRET), &oversized).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "payload too large");

    generation.assert_async().await;
}

// ── Relay pipeline ───────────────────────────────────────────────────────────

#[tokio::test]
async fn valid_trigger_acks_then_delivers_the_reply() {
    let mut server = mockito::Server::new_async().await;
    let generation = server
        .mock("POST", "/v1/messages")
        .match_header("authorization", "Bearer gen-key")
        .with_status(200)
        .with_body(concat!(
            "data: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":10}}}\n\n",
            "data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"Hello\"}}\n\n",
            "data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\" world\"}}\n\n",
            "data: {\"type\":\"message_delta\",\"usage\":{\"output_tokens\":25}}\n\n",
            "data: [DONE]\n\n",
        ))
        .create_async()
        .await;
    let delivery = server
        .mock("POST", "/api/response")
        .match_header("authorization", "Bearer hook-secret")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "messageId": "m-1",
            "content": "Hello world",
            "metadata": {"model": "test-model", "tokens": 25}
        })))
        .with_status(200)
        .with_body(r#"{"status":"saved"}"#)
        .create_async()
        .await;
    let addr = start_bridge(&bridge_config(&server.url())).await;

    let resp = post_message(addr, Some(SECRET), &valid_trigger()).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "processing");

    wait_until_matched(&generation).await;
    wait_until_matched(&delivery).await;
}

#[tokio::test]
async fn ack_returns_while_generation_is_still_running() {
    let mut server = mockito::Server::new_async().await;
    let _generation = server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_chunked_body(|writer| {
            std::thread::sleep(Duration::from_millis(400));
            writer.write_all(b"data: [DONE]\n\n")
        })
        .create_async()
        .await;
    let addr = start_bridge(&bridge_config(&server.url())).await;

    let started = std::time::Instant::now();
    let resp = post_message(addr, Some(SECRET), &valid_trigger()).await;
    assert_eq!(resp.status(), 200);
    assert!(
        started.elapsed() < Duration::from_millis(400),
        "ack waited on the generation call"
    );
}

#[tokio::test]
async fn conversation_history_is_forwarded_with_new_text_last() {
    let mut server = mockito::Server::new_async().await;
    let generation = server
        .mock("POST", "/v1/messages")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "model": "test-model",
            "stream": true,
            "messages": [
                {"role": "user", "content": "earlier"},
                {"role": "assistant", "content": "before"},
                {"role": "user", "content": "now"},
            ]
        })))
        .with_status(200)
        .with_body("data: [DONE]\n\n")
        .create_async()
        .await;
    let addr = start_bridge(&bridge_config(&server.url())).await;

    let body = serde_json::json!({
        "messageId": "m-1",
        "text": "now",
        "conversationHistory": [
            {"role": "user", "content": "earlier"},
            {"role": "assistant", "content": "before"},
        ]
    });
    let resp = post_message(addr, Some(SECRET), &body.to_string()).await;
    assert_eq!(resp.status(), 200);

    wait_until_matched(&generation).await;
}

#[tokio::test]
async fn billing_status_delivers_the_purchase_prompt() {
    let mut server = mockito::Server::new_async().await;
    let _generation = server
        .mock("POST", "/v1/messages")
        .with_status(402)
        .with_body(r#"{"error":{"message":"anything at all"}}"#)
        .create_async()
        .await;
    let delivery = server
        .mock("POST", "/api/response")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "messageId": "m-1",
            "content": BILLING_NOTICE,
            "metadata": {"errorType": "billing", "action": "purchase_credits"}
        })))
        .with_status(200)
        .with_body(r#"{"status":"saved"}"#)
        .create_async()
        .await;
    let addr = start_bridge(&bridge_config(&server.url())).await;

    let resp = post_message(addr, Some(SECRET), &valid_trigger()).await;
    assert_eq!(resp.status(), 200);

    wait_until_matched(&delivery).await;
}

#[tokio::test]
async fn server_error_delivers_the_generic_apology() {
    let mut server = mockito::Server::new_async().await;
    let _generation = server
        .mock("POST", "/v1/messages")
        .with_status(500)
        .with_body("upstream exploded")
        .create_async()
        .await;
    let delivery = server
        .mock("POST", "/api/response")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "messageId": "m-1",
            "content": FAILURE_NOTICE,
            "metadata": {"errorType": "error"}
        })))
        .with_status(200)
        .with_body(r#"{"status":"saved"}"#)
        .create_async()
        .await;
    let addr = start_bridge(&bridge_config(&server.url())).await;

    let resp = post_message(addr, Some(SECRET), &valid_trigger()).await;
    assert_eq!(resp.status(), 200);

    wait_until_matched(&delivery).await;
}

#[tokio::test]
async fn empty_completion_is_a_silent_turn() {
    let mut server = mockito::Server::new_async().await;
    let generation = server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_body("data: [DONE]\n\n")
        .create_async()
        .await;
    let delivery = server
        .mock("POST", "/api/response")
        .expect(0)
        .create_async()
        .await;
    let addr = start_bridge(&bridge_config(&server.url())).await;

    let resp = post_message(addr, Some(SECRET), &valid_trigger()).await;
    assert_eq!(resp.status(), 200);

    wait_until_matched(&generation).await;
    // Give the pipeline time to (wrongly) deliver before asserting it didn't.
    tokio::time::sleep(Duration::from_millis(150)).await;
    delivery.assert_async().await;
}

#[tokio::test]
async fn delivery_failure_leaves_the_bridge_alive() {
    let mut server = mockito::Server::new_async().await;
    let _generation = server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_body(concat!(
            "data: {\"delta\":{\"text\":\"hi\"}}\n\n",
            "data: [DONE]\n\n",
        ))
        .create_async()
        .await;
    let delivery = server
        .mock("POST", "/api/response")
        .with_status(503)
        .with_body("backend down")
        .create_async()
        .await;
    let addr = start_bridge(&bridge_config(&server.url())).await;

    let resp = post_message(addr, Some(SECRET), &valid_trigger()).await;
    assert_eq!(resp.status(), 200);
    wait_until_matched(&delivery).await;

    // The failed delivery was only logged; the bridge still answers.
    let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let resp = post_message(addr, Some(SECRET), &valid_trigger()).await;
    assert_eq!(resp.status(), 200);
}
