//! Short-lived signed bearer tokens minted from a valid API key.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use weave_core::{KeyId, PolicyId, TokenId};

use crate::error::{AuthError, AuthResult};

/// Default lifetime of a minted bearer token, in seconds.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

/// A signed, self-expiring session token minted from an [`crate::key::ApiKey`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    /// Unique identifier for this token (the JWT `jti`).
    pub token_id: TokenId,
    /// The backing key this token was minted from.
    pub key_id: KeyId,
    /// The owning principal.
    pub owner_id: String,
    /// The policy to evaluate requests bearing this token against.
    pub policy_id: PolicyId,
    /// Issued-at, seconds since epoch (JWT `iat`).
    #[serde(rename = "iat")]
    pub issued_at: i64,
    /// Expiry, seconds since epoch (JWT `exp`).
    #[serde(rename = "exp")]
    pub expires_at: i64,
    /// The scope string the backing key carried at mint time.
    pub scope: String,
}

impl AuthToken {
    /// Mint a token for `key_id`/`owner_id`/`policy_id`, expiring after `ttl`.
    #[must_use]
    pub fn new(key_id: KeyId, owner_id: impl Into<String>, policy_id: PolicyId, scope: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            token_id: TokenId::new(),
            key_id,
            owner_id: owner_id.into(),
            policy_id,
            issued_at: now.timestamp(),
            expires_at: (now + ttl).timestamp(),
            scope: scope.into(),
        }
    }

    /// Has this token passed its embedded expiry?
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.expires_at
    }

    /// Sign this token into a compact JWT string.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] if signing fails.
    pub fn encode(&self, secret: &[u8]) -> AuthResult<String> {
        encode(&Header::new(Algorithm::HS256), self, &EncodingKey::from_secret(secret))
            .map_err(|err| AuthError::InvalidToken(err.to_string()))
    }

    /// Verify and decode a compact JWT string minted by [`Self::encode`].
    ///
    /// Returns `Ok(None)` for an expired-but-otherwise-valid token, matching
    /// the "decode returns `None` once expired" round-trip contract; any
    /// other validation failure is an error.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] if the signature is invalid or the
    /// payload does not match the expected shape.
    pub fn decode(token_str: &str, secret: &[u8]) -> AuthResult<Option<Self>> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is interpreted as a domain-level flag, not a hard decode
        // failure, so callers can distinguish "expired" from "malformed".
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        match decode::<Self>(token_str, &DecodingKey::from_secret(secret), &validation) {
            Ok(data) => {
                if data.claims.is_expired() {
                    Ok(None)
                } else {
                    Ok(Some(data.claims))
                }
            },
            Err(err) => Err(AuthError::InvalidToken(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weave_core::PolicyId as _PolicyId;

    fn secret() -> &'static [u8] {
        b"test-secret-key-at-least-32-bytes-long!"
    }

    #[test]
    fn encode_decode_round_trips_when_not_expired() {
        let token = AuthToken::new(
            KeyId::new(),
            "alice",
            _PolicyId::from_raw("pol_user"),
            "user",
            Duration::seconds(3600),
        );
        let encoded = token.encode(secret()).unwrap();
        let decoded = AuthToken::decode(&encoded, secret()).unwrap();
        assert_eq!(decoded.unwrap().token_id, token.token_id);
    }

    #[test]
    fn expired_token_decodes_to_none() {
        let token = AuthToken::new(
            KeyId::new(),
            "alice",
            _PolicyId::from_raw("pol_user"),
            "user",
            Duration::seconds(-1),
        );
        let encoded = token.encode(secret()).unwrap();
        assert!(AuthToken::decode(&encoded, secret()).unwrap().is_none());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = AuthToken::new(
            KeyId::new(),
            "alice",
            _PolicyId::from_raw("pol_user"),
            "user",
            Duration::seconds(3600),
        );
        let encoded = token.encode(secret()).unwrap();
        assert!(AuthToken::decode(&encoded, b"a-completely-different-secret!!").is_err());
    }
}
