//! Background relay pipeline, one detached task per validated trigger.
//!
//! Flow: trigger → completion request (history + new text) → streamed
//! outcome → delivery of the reply or a classified error notice. Generation
//! failures are recovered into user-facing deliveries; delivery failures are
//! logged and terminal. Nothing here can reach the already-sent webhook ack.

use std::sync::Arc;

use tracing::{error, info, warn};

use {
    herald_completion::{CompletionOutcome, FailureKind},
    herald_delivery::Metadata,
};

use crate::{ingest::InboundTrigger, state::RelayState};

pub async fn run_pipeline(state: Arc<RelayState>, trigger: InboundTrigger) {
    let message_id = trigger.message_id.as_str();
    let request = state
        .completion
        .build_request(&trigger.conversation_history, &trigger.text);
    let outcome = state.completion.complete(&request).await;

    let delivered = match outcome {
        CompletionOutcome::Success {
            text,
            output_tokens,
            ..
        } => {
            if text.is_empty() {
                // An empty reply is an intentional silent turn, not an error.
                info!(message_id, "empty completion, nothing to deliver");
                return;
            }
            let metadata = Metadata {
                model: Some(request.model.clone()),
                tokens: output_tokens,
                ..Metadata::default()
            };
            state
                .delivery
                .deliver(message_id, &text, Some(&metadata))
                .await
        },
        CompletionOutcome::Failure {
            message,
            kind,
            http_status,
        } => {
            warn!(message_id, ?http_status, %message, "generation failed");
            match kind {
                FailureKind::Billing => state.delivery.deliver_billing_notice(message_id).await,
                FailureKind::Generic => state.delivery.deliver_failure_notice(message_id).await,
            }
        },
    };

    match delivered {
        Ok(()) => info!(message_id, "trigger relayed"),
        Err(e) => error!(message_id, error = %e, "delivery failed"),
    }
}
