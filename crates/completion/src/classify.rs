//! Failure taxonomy for generation errors.
//!
//! A billing/quota condition gets a purchase-prompt delivery instead of the
//! generic apology; everything else is generic. Classification is a pure
//! substring match so the taxonomy is extended by adding table entries, not
//! control flow.

/// How a generation failure should be surfaced to the end user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Quota or payment condition; the user is told to top up credits.
    Billing,
    /// Anything else; the user gets a generic apology.
    Generic,
}

/// Error patterns that mark a billing/quota condition, matched
/// case-insensitively against the failure message.
const BILLING_PATTERNS: &[&str] = &[
    "402",
    "insufficient credits",
    "insufficient_credits",
    "billing",
    "payment required",
];

/// Classify a failure message into a [`FailureKind`].
#[must_use]
pub fn classify_message(message: &str) -> FailureKind {
    if is_billing_message(message) {
        FailureKind::Billing
    } else {
        FailureKind::Generic
    }
}

/// Whether a failure message describes a billing/quota condition.
#[must_use]
pub fn is_billing_message(message: &str) -> bool {
    let msg = message.to_lowercase();
    BILLING_PATTERNS.iter().any(|p| msg.contains(p))
}
