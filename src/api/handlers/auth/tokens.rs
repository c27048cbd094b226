//! Signing and verification of access and refresh tokens.
//!
//! Both token kinds are compact HS256 JWTs. Access tokens carry the account id
//! as subject; refresh tokens carry the session id and the session's current
//! sequence number. Verification here is purely cryptographic/structural: no
//! database or cache is consulted.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject, the owning account id.
    pub sub: Uuid,
    /// Issued-at (UTC Unix timestamp).
    pub iat: i64,
    /// Expiration (UTC Unix timestamp).
    pub exp: i64,
    /// Unique token id, useful for audit trails.
    pub jti: String,
}

/// Claims embedded in every refresh token.
///
/// The sequence number mirrors the session row's ordinal; a lagging value on
/// presentation is how stale-token reuse is detected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// The session row this token belongs to.
    pub sid: Uuid,
    /// Sequence number at issuance time.
    pub seq: i64,
    /// Issued-at (UTC Unix timestamp).
    pub iat: i64,
    /// Expiration (UTC Unix timestamp).
    pub exp: i64,
}

/// Stateless signer/verifier shared by the issuer and the filters.
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        // No leeway: an expired token is expired, the cookie filter relies on
        // the exact boundary to decide when to fall back to the refresh token.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            validation,
        }
    }

    /// Sign a short-lived access token for `account_id`.
    ///
    /// # Errors
    /// Returns an error if JWT encoding fails.
    pub fn sign_access(&self, account_id: Uuid, ttl_seconds: i64) -> anyhow::Result<String> {
        self.sign_access_at(account_id, ttl_seconds, Utc::now().timestamp())
    }

    /// Sign an access token with an explicit issue time.
    pub(crate) fn sign_access_at(
        &self,
        account_id: Uuid,
        ttl_seconds: i64,
        now: i64,
    ) -> anyhow::Result<String> {
        let claims = AccessClaims {
            sub: account_id,
            iat: now,
            exp: now + ttl_seconds,
            jti: Uuid::new_v4().to_string(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Sign a refresh token bound to a session and its current sequence number.
    ///
    /// # Errors
    /// Returns an error if JWT encoding fails.
    pub fn sign_refresh(
        &self,
        session_id: Uuid,
        issued_at: i64,
        ttl_seconds: i64,
        sequence: i64,
    ) -> anyhow::Result<String> {
        let claims = RefreshClaims {
            sid: session_id,
            seq: sequence,
            iat: issued_at,
            exp: issued_at + ttl_seconds,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Verify an access token. Any malformed, expired, or badly signed input
    /// yields `None`.
    #[must_use]
    pub fn verify_access(&self, token: &str) -> Option<AccessClaims> {
        decode::<AccessClaims>(token, &self.decoding, &self.validation)
            .ok()
            .map(|data| data.claims)
    }

    /// Verify a refresh token. Same failure semantics as [`Self::verify_access`].
    #[must_use]
    pub fn verify_refresh(&self, token: &str) -> Option<RefreshClaims> {
        decode::<RefreshClaims>(token, &self.decoding, &self.validation)
            .ok()
            .map(|data| data.claims)
    }
}
