//! Webhook ingest gateway and background relay pipeline.
//!
//! Flow: application backend POSTs a trigger → handler authenticates, reads
//! the body under a cap, validates, acks `{"status":"processing"}` → the
//! dispatcher launches a detached task that streams a completion and
//! delivers the result (or a classified error notice) back to the
//! application backend. Nothing downstream of the ack ever reaches the
//! original connection.

pub mod auth;
pub mod dispatch;
pub mod ingest;
pub mod relay;
pub mod server;
pub mod state;

pub use {
    dispatch::RelayDispatcher,
    ingest::InboundTrigger,
    server::{build_app, start_server},
    state::{AppState, RelayState},
};
