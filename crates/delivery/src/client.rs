use {
    secrecy::{ExposeSecret, Secret},
    serde::Serialize,
    tracing::{debug, info},
};

use crate::error::{Context, Error, Result};

/// Sent in place of a reply when generation failed on a billing/quota
/// condition.
pub const BILLING_NOTICE: &str =
    "I'm out of credits right now. Please purchase more credits so I can keep replying.";

/// Sent in place of a reply when generation failed for any other reason.
pub const FAILURE_NOTICE: &str =
    "Sorry, I couldn't come up with a reply just now. Please try again in a moment.";

/// Optional structured metadata attached to a delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeliveryPayload<'a> {
    message_id: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a Metadata>,
}

/// Client for the application backend that persists finished replies.
pub struct DeliveryClient {
    client: reqwest::Client,
    base_url: String,
    secret: Option<Secret<String>>,
}

impl DeliveryClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>, secret: Option<Secret<String>>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret,
        }
    }

    /// POST one finished result and validate the backend's acknowledgment.
    ///
    /// A non-2xx status is a failure carrying the status and best-effort
    /// body text; an unreadable body, a non-JSON body, or an ack whose
    /// `status` is not `"saved"` are failures too. There is no retry; this
    /// is a single attempt.
    pub async fn deliver(
        &self,
        message_id: &str,
        content: &str,
        metadata: Option<&Metadata>,
    ) -> Result<()> {
        let payload = DeliveryPayload {
            message_id,
            content,
            metadata,
        };
        info!(message_id, chars = content.len(), "delivering response");

        let mut request = self
            .client
            .post(format!("{}/api/response", self.base_url))
            .json(&payload);
        if let Some(secret) = &self.secret {
            request = request.bearer_auth(secret.expose_secret());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::http(status.as_u16(), body));
        }

        let body = response
            .text()
            .await
            .context("reading delivery response body")?;
        let ack: serde_json::Value = serde_json::from_str(&body)?;
        if ack["status"].as_str() != Some("saved") {
            return Err(Error::unexpected_ack(
                ack["status"].as_str().unwrap_or("<missing>"),
            ));
        }

        debug!(message_id, "delivery acknowledged");
        Ok(())
    }

    /// Deliver the canned billing notice for a failed trigger.
    pub async fn deliver_billing_notice(&self, message_id: &str) -> Result<()> {
        let metadata = Metadata {
            error_type: Some("billing".into()),
            action: Some("purchase_credits".into()),
            ..Metadata::default()
        };
        self.deliver(message_id, BILLING_NOTICE, Some(&metadata))
            .await
    }

    /// Deliver the canned generic-failure notice for a failed trigger.
    pub async fn deliver_failure_notice(&self, message_id: &str) -> Result<()> {
        let metadata = Metadata {
            error_type: Some("error".into()),
            ..Metadata::default()
        };
        self.deliver(message_id, FAILURE_NOTICE, Some(&metadata))
            .await
    }
}
