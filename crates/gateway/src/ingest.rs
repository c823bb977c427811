//! Inbound webhook handling: authenticate, read, validate, ack, dispatch.
//!
//! Order is load-bearing: the secret check happens before the body is read,
//! authentication before parsing, validation after both. The 200 ack goes
//! out as soon as the trigger is accepted; everything after it runs on a
//! detached task.

use std::sync::Arc;

use {
    axum::{
        body::Body,
        extract::{Request, State},
        http::{StatusCode, header},
        response::{IntoResponse, Json, Response},
    },
    futures::StreamExt,
    tracing::info,
};

use herald_common::{HeraldError, Turn};

use crate::{
    auth::{bearer_token, secret_matches},
    relay::run_pipeline,
    state::AppState,
};

/// One validated inbound "user said X" notification. Immutable; lives for
/// exactly one processing attempt.
#[derive(Debug, Clone)]
pub struct InboundTrigger {
    pub message_id: String,
    pub text: String,
    pub uid: Option<String>,
    pub conversation_history: Vec<Turn>,
}

/// `POST /api/message`
pub async fn ingest_handler(State(state): State<AppState>, request: Request) -> Response {
    let relay = &state.relay;

    let Some(secret) = &relay.webhook_secret else {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Server misconfigured");
    };

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let authorized =
        bearer_token(auth_header).is_some_and(|token| secret_matches(token, secret));
    if !authorized {
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    let bytes = match read_body_capped(request.into_body(), relay.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };
    if bytes.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "empty payload");
    }

    let payload: serde_json::Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };
    let trigger = match validate_trigger(&payload) {
        Ok(trigger) => trigger,
        Err(message) => return error_response(StatusCode::BAD_REQUEST, message),
    };

    info!(
        message_id = %trigger.message_id,
        uid = ?trigger.uid,
        history_turns = trigger.conversation_history.len(),
        "trigger accepted"
    );

    let key = trigger.message_id.clone();
    let task_state = Arc::clone(relay);
    relay.dispatcher.dispatch(&key, run_pipeline(task_state, trigger));

    (
        StatusCode::OK,
        Json(serde_json::json!({"status": "processing"})),
    )
        .into_response()
}

/// Accumulate the request body up to `cap` bytes. Exceeding the cap aborts
/// the read; end-of-stream and transport errors both resolve it exactly once.
async fn read_body_capped(body: Body, cap: usize) -> Result<Vec<u8>, HeraldError> {
    let mut stream = body.into_data_stream();
    let mut buf: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| HeraldError::message(format!("body read failed: {e}")))?;
        if buf.len() + chunk.len() > cap {
            return Err(HeraldError::message("payload too large"));
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(buf)
}

/// Field validation, strictly after authentication and body parsing.
/// Error strings name the offending field.
fn validate_trigger(payload: &serde_json::Value) -> Result<InboundTrigger, &'static str> {
    let message_id = match payload["messageId"].as_str() {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => return Err("messageId must be a non-empty string"),
    };
    let text = match payload["text"].as_str() {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => return Err("text must be a non-empty string"),
    };
    let uid = payload["uid"].as_str().map(str::to_string);

    // History entries that don't look like turns are dropped, not fatal.
    let conversation_history = payload["conversationHistory"]
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| serde_json::from_value::<Turn>(entry.clone()).ok())
                .collect()
        })
        .unwrap_or_default();

    Ok(InboundTrigger {
        message_id,
        text,
        uid,
        conversation_history,
    })
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({"error": message}))).into_response()
}
