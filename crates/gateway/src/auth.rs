//! Bearer-secret check for the inbound webhook.

use {
    secrecy::{ExposeSecret, Secret},
    sha2::{Digest, Sha256},
};

/// Extract the bearer token from an `Authorization` header value.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    header?.strip_prefix("Bearer ")
}

/// Compare a presented token against the configured shared secret.
///
/// Comparison happens over SHA-256 digests rather than the raw strings.
#[must_use]
pub fn secret_matches(presented: &str, expected: &Secret<String>) -> bool {
    sha256_hex(presented) == sha256_hex(expected.expose_secret())
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(bearer_token(Some("Bearer abc123")), Some("abc123"));
        assert_eq!(bearer_token(Some("Basic abc123")), None);
        assert_eq!(bearer_token(Some("bearer abc123")), None);
        assert_eq!(bearer_token(None), None);
    }

    #[test]
    fn matches_only_the_exact_secret() {
        let secret = Secret::new("hook-secret".to_string());
        assert!(secret_matches("hook-secret", &secret));
        assert!(!secret_matches("hook-secre", &secret));
        assert!(!secret_matches("hook-secret ", &secret));
        assert!(!secret_matches("", &secret));
    }
}
