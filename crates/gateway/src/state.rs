use std::sync::Arc;

use {anyhow::Context, secrecy::Secret};

use {
    herald_completion::CompletionClient, herald_config::HeraldConfig,
    herald_delivery::DeliveryClient,
};

use crate::dispatch::RelayDispatcher;

// ── Shared app state ─────────────────────────────────────────────────────────

/// Everything a request needs, built once at startup and read-only after.
/// There is no other state shared across requests.
pub struct RelayState {
    /// Shared secret the application backend must present as a bearer token.
    /// `None` means the server is misconfigured and every trigger is refused
    /// with a 500 before its body is read.
    pub webhook_secret: Option<Secret<String>>,
    /// Cap on the inbound request body, in bytes.
    pub max_body_bytes: usize,
    pub completion: CompletionClient,
    pub delivery: DeliveryClient,
    pub dispatcher: RelayDispatcher,
}

impl RelayState {
    /// Wire up clients and the dispatcher from loaded configuration.
    ///
    /// A missing delivery URL is a startup error. A missing webhook secret is
    /// not: that case answers each trigger with a 500 at request time.
    pub fn from_config(config: &HeraldConfig) -> anyhow::Result<Self> {
        let delivery_url = config
            .delivery
            .base_url
            .as_deref()
            .context("delivery.base_url is not configured (herald.toml or HERALD_DELIVERY_URL)")?;

        Ok(Self {
            webhook_secret: config.webhook.secret.clone(),
            max_body_bytes: config.webhook.max_body_bytes,
            completion: CompletionClient::new(&config.completion),
            delivery: DeliveryClient::new(delivery_url, config.webhook.secret.clone()),
            dispatcher: RelayDispatcher::new(&config.pipeline),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<RelayState>,
}

impl AppState {
    #[must_use]
    pub fn new(relay: RelayState) -> Self {
        Self {
            relay: Arc::new(relay),
        }
    }
}
