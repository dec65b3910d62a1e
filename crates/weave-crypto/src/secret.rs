//! Raw API-key secret generation and constant-time verification.

use base64::Engine as _;
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// The brand prefix used on every raw secret this system issues, within the
/// `<prefix>_<scope>_<base64url(24 bytes)>` shape.
pub const SECRET_PREFIX: &str = "wv";

/// Generate a raw API key secret of the form `wv_<scope>_<base64url(24 bytes)>`.
#[must_use]
pub fn generate_raw_secret(scope: &str) -> String {
    let mut entropy = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut entropy);
    let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(entropy);
    format!("{SECRET_PREFIX}_{scope}_{encoded}")
}

/// Hash a raw secret with sha-256, hex-encoded, for storage.
///
/// The raw secret itself is never persisted; only this hash and a short,
/// non-secret prefix are kept.
#[must_use]
pub fn hash_secret(raw: &str) -> String {
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// Constant-time comparison of a raw secret against a stored sha-256 hash,
/// to avoid leaking timing information about how many leading hex
/// characters matched.
#[must_use]
pub fn verify_secret(raw: &str, stored_hash_hex: &str) -> bool {
    let computed = hash_secret(raw);
    if computed.len() != stored_hash_hex.len() {
        return false;
    }
    computed.as_bytes().ct_eq(stored_hash_hex.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secrets_carry_prefix_and_scope() {
        let secret = generate_raw_secret("user");
        assert!(secret.starts_with("wv_user_"));
        assert!(secret.len() >= 40 && secret.len() <= 48);
    }

    #[test]
    fn generated_secrets_are_unique() {
        assert_ne!(generate_raw_secret("user"), generate_raw_secret("user"));
    }

    #[test]
    fn verify_accepts_matching_secret_and_rejects_others() {
        let raw = generate_raw_secret("service");
        let stored = hash_secret(&raw);
        assert!(verify_secret(&raw, &stored));
        assert!(!verify_secret("wv_service_bogus", &stored));
    }
}
