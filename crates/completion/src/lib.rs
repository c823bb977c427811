//! Streaming completion client for the relay bridge.
//!
//! Issues one generation request per trigger and reassembles the chunked
//! streaming response into a single text result plus usage counters. Every
//! failure is captured into [`CompletionOutcome::Failure`] and classified;
//! nothing escapes as an error.

pub mod classify;
pub mod client;
pub mod frame;
pub mod sse;

pub use {
    classify::{FailureKind, classify_message, is_billing_message},
    client::{CompletionClient, CompletionOutcome, CompletionRequest},
    frame::FrameUpdate,
    sse::{AssembledCompletion, StreamAssembler},
};
