//! Purpose-bound signed tokens for confirmation and unsubscribe links.
//!
//! Tokens are HS256 JWTs. The HMAC key is derived from the application secret
//! *and* the purpose, so a token minted for one use case never verifies for
//! another even when the payloads look alike. Timestamped tokens carry an
//! `iat` claim and are checked against a caller-supplied maximum age.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use thiserror::Error;
use time::OffsetDateTime;

/// Purpose of the politician double opt-in link.
pub const SUBSCRIBE_PURPOSE: &str = "alerts_pol_subscribe";
/// Purpose of the one-click unsubscribe link.
pub const UNSUBSCRIBE_PURPOSE: &str = "alerts_unsubscribe";
/// How long a confirmation link stays valid.
pub const SUBSCRIBE_MAX_AGE: time::Duration = time::Duration::days(14);

const KEY_NAMESPACE: &[u8] = b"parliament_alerts.signing.";

/// Returned for every token that does not verify: tampered, foreign purpose,
/// malformed or expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Signature does not match")]
pub struct BadSignature;

#[derive(Serialize, Deserialize)]
struct SignedClaims {
    payload: String,
    purpose: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<i64>,
}

#[derive(Clone)]
pub struct Signer {
    secret: String,
}

impl Signer {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    fn key_for(&self, purpose: &str) -> Vec<u8> {
        Sha256::new()
            .chain_update(KEY_NAMESPACE)
            .chain_update(purpose.as_bytes())
            .chain_update(b":")
            .chain_update(self.secret.as_bytes())
            .finalize()
            .to_vec()
    }

    fn encode_claims(&self, claims: &SignedClaims) -> Result<String, jsonwebtoken::errors::Error> {
        let key = self.key_for(&claims.purpose);
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(&key),
        )
    }

    fn decode_claims(&self, token: &str, purpose: &str) -> Result<SignedClaims, BadSignature> {
        let key = self.key_for(purpose);
        let mut validation = Validation::new(Algorithm::HS256);
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = false;
        validation.validate_aud = false;

        let data = decode::<SignedClaims>(token, &DecodingKey::from_secret(&key), &validation)
            .map_err(|e| {
                tracing::debug!(
                    name = "signing.decode.rejected",
                    target = concat!(env!("CARGO_PKG_NAME"), "::", module_path!()),
                    error = %e,
                    purpose = purpose,
                    message = "Rejected signed token"
                );
                BadSignature
            })?;
        if data.claims.purpose != purpose {
            return Err(BadSignature);
        }
        Ok(data.claims)
    }

    /// Signs `payload` without any lifetime; the token stays valid forever.
    pub fn sign(&self, payload: &str, purpose: &str) -> Result<String, jsonwebtoken::errors::Error> {
        self.encode_claims(&SignedClaims {
            payload: payload.to_string(),
            purpose: purpose.to_string(),
            iat: None,
        })
    }

    pub fn unsign(&self, token: &str, purpose: &str) -> Result<String, BadSignature> {
        self.decode_claims(token, purpose).map(|c| c.payload)
    }

    pub fn sign_timestamped(
        &self,
        payload: &str,
        purpose: &str,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        self.sign_timestamped_at(payload, purpose, OffsetDateTime::now_utc())
    }

    pub fn sign_timestamped_at(
        &self,
        payload: &str,
        purpose: &str,
        now: OffsetDateTime,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        self.encode_claims(&SignedClaims {
            payload: payload.to_string(),
            purpose: purpose.to_string(),
            iat: Some(now.unix_timestamp()),
        })
    }

    pub fn unsign_timestamped(
        &self,
        token: &str,
        purpose: &str,
        max_age: time::Duration,
    ) -> Result<String, BadSignature> {
        self.unsign_timestamped_at(token, purpose, max_age, OffsetDateTime::now_utc())
    }

    /// A token signed at `t` verifies for every `now <= t + max_age`.
    pub fn unsign_timestamped_at(
        &self,
        token: &str,
        purpose: &str,
        max_age: time::Duration,
        now: OffsetDateTime,
    ) -> Result<String, BadSignature> {
        let claims = self.decode_claims(token, purpose)?;
        let issued_at = claims.iat.ok_or(BadSignature)?;
        let age = now.unix_timestamp() - issued_at;
        if age > max_age.whole_seconds() {
            return Err(BadSignature);
        }
        Ok(claims.payload)
    }
}

/// Builds the opt-in payload `"<politician_id>,<email>"` with the email
/// stripped and lowercased.
pub fn politician_subscribe_payload(politician_id: i32, email: &str) -> String {
    format!("{},{}", politician_id, email.trim().to_lowercase())
}

/// Splits an opt-in payload at its first comma.
pub fn split_politician_subscribe_payload(payload: &str) -> (&str, &str) {
    payload.split_once(',').unwrap_or((payload, ""))
}
