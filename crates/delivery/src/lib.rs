//! Delivery of finished replies to the application backend.
//!
//! The one pipeline stage allowed to fail loudly: the background task that
//! calls it only logs, so a typed error here is the end of the line for a
//! trigger.

pub mod client;
pub mod error;

pub use {
    client::{BILLING_NOTICE, DeliveryClient, FAILURE_NOTICE, Metadata},
    error::{Error, Result},
};
