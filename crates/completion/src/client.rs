use {
    futures::StreamExt,
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, info},
};

use {herald_common::Turn, herald_config::CompletionConfig};

use crate::{
    classify::{FailureKind, classify_message, is_billing_message},
    sse::StreamAssembler,
};

/// One generation request: the configured model and token budget plus the
/// full turn sequence, with the new inbound text appended last.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub max_tokens: u32,
    pub turns: Vec<Turn>,
}

/// The single result of one generation attempt.
///
/// `Failure` is a value, not an error: the client never returns `Err`, so
/// callers match on the outcome instead of unwrapping.
#[derive(Debug, Clone)]
pub enum CompletionOutcome {
    Success {
        text: String,
        input_tokens: Option<u64>,
        output_tokens: Option<u64>,
    },
    Failure {
        message: String,
        kind: FailureKind,
        http_status: Option<u16>,
    },
}

/// Client for the streaming text-generation backend.
pub struct CompletionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<Secret<String>>,
    model: String,
    max_tokens: u32,
}

impl CompletionClient {
    #[must_use]
    pub fn new(config: &CompletionConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    /// Build the request for one trigger: prior turns in order, then the new
    /// inbound text as the final user turn.
    #[must_use]
    pub fn build_request(&self, prior_turns: &[Turn], text: &str) -> CompletionRequest {
        let mut turns = prior_turns.to_vec();
        turns.push(Turn::user(text));
        CompletionRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            turns,
        }
    }

    /// Issue one streaming generation call and reassemble the reply.
    ///
    /// Failures of any kind land in [`CompletionOutcome::Failure`] with a
    /// billing/generic classification; nothing is returned as `Err`.
    pub async fn complete(&self, request: &CompletionRequest) -> CompletionOutcome {
        let body = serde_json::json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "messages": request.turns,
            "stream": true,
        });

        debug!(
            model = %request.model,
            turns = request.turns.len(),
            "issuing completion request"
        );

        let mut outbound = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            outbound = outbound.bearer_auth(key.expose_secret());
        }

        let response = match outbound.send().await {
            Ok(r) => r,
            Err(e) => return failure(format!("completion request failed: {e}"), None),
        };

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body_text = response.text().await.unwrap_or_default();
            let message = error_message_from_body(&body_text, status);
            let kind = if status == 402 || is_billing_message(&message) {
                FailureKind::Billing
            } else {
                FailureKind::Generic
            };
            return CompletionOutcome::Failure {
                message,
                kind,
                http_status: Some(status),
            };
        }

        let mut assembler = StreamAssembler::new();
        let mut byte_stream = response.bytes_stream();
        while let Some(chunk) = byte_stream.next().await {
            match chunk {
                Ok(c) => assembler.push_chunk(&c),
                Err(e) => return failure(format!("stream read failed: {e}"), None),
            }
            if assembler.is_done() {
                break;
            }
        }

        let assembled = assembler.finish();
        info!(
            chars = assembled.text.len(),
            input_tokens = ?assembled.input_tokens,
            output_tokens = ?assembled.output_tokens,
            "completion stream finished"
        );
        CompletionOutcome::Success {
            text: assembled.text,
            input_tokens: assembled.input_tokens,
            output_tokens: assembled.output_tokens,
        }
    }
}

fn failure(message: String, http_status: Option<u16>) -> CompletionOutcome {
    let kind = classify_message(&message);
    CompletionOutcome::Failure {
        message,
        kind,
        http_status,
    }
}

/// Pull a human-readable message out of a JSON error body, falling back to
/// the status code when the body is opaque.
fn error_message_from_body(body: &str, status: u16) -> String {
    if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(body) {
        for probe in [&parsed["error"]["message"], &parsed["message"]] {
            if let Some(msg) = probe.as_str()
                && !msg.is_empty()
            {
                return msg.to_string();
            }
        }
    }
    format!("completion request failed: {status}")
}
