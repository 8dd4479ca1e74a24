//! JWT client assertion validation.
//!
//! Implements the claim checks of RFC 7523 Section 3 for the
//! `client_secret_jwt` and `private_key_jwt` methods:
//!
//! - `iss` and `sub` must both equal the client_id
//! - `aud` must contain the token endpoint URL or the issuer
//! - `exp` must be in the future, but no further than the configured
//!   maximum lifetime
//! - `nbf`, when present, must not be in the future
//! - `jti` is required and may be used only once
//!
//! Signatures are checked separately by
//! [`SignatureVerifier`](crate::oauth::signature::SignatureVerifier). The
//! authenticator verifies the signature first, so a forged assertion cannot
//! burn a legitimate `jti`.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::config::AuthConfig;
use crate::storage::JtiStorage;

/// The only accepted `client_assertion_type` value.
pub const JWT_BEARER_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// JWT claims for client assertions per RFC 7523.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientAssertionClaims {
    /// Issuer - must be the client_id.
    pub iss: String,

    /// Subject - must be the client_id.
    pub sub: String,

    /// Audience - must contain the token endpoint URL.
    pub aud: StringOrArray,

    /// Expiration time as Unix timestamp.
    pub exp: i64,

    /// JWT ID, required for replay prevention.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,

    /// Issued at time as Unix timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Not-before time as Unix timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
}

/// Audience claim can be a single string or an array of strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrArray {
    /// Single string audience.
    String(String),
    /// Array of audience strings.
    Array(Vec<String>),
}

impl StringOrArray {
    /// Checks if the audience contains the specified value.
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::String(s) => s == value,
            Self::Array(arr) => arr.iter().any(|s| s == value),
        }
    }
}

/// Reasons a client assertion is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssertionError {
    /// The assertion payload is not a JSON claims set.
    #[error("Malformed assertion: {0}")]
    Malformed(String),

    /// `iss` is not the client_id.
    #[error("Assertion issuer must equal client_id")]
    IssuerMismatch,

    /// `sub` is not the client_id.
    #[error("Assertion subject must equal client_id")]
    SubjectMismatch,

    /// `aud` names neither the token endpoint nor the issuer.
    #[error("Assertion audience must contain the token endpoint URL")]
    AudienceMismatch,

    /// `exp` has passed.
    #[error("Assertion has expired")]
    Expired,

    /// `exp` is too far in the future.
    #[error("Assertion exp must be within {0} seconds")]
    LifetimeTooLong(u64),

    /// `nbf` is in the future.
    #[error("Assertion is not yet valid")]
    NotYetValid,

    /// `jti` is missing or empty.
    #[error("Assertion jti is required")]
    MissingJti,

    /// `jti` was seen before.
    #[error("Assertion jti already used")]
    Replayed,

    /// The replay check could not be performed.
    #[error("Replay check failed: {0}")]
    ReplayCheckUnavailable(String),
}

/// Validates the claims of JWT client assertions.
#[derive(Clone)]
pub struct ClientAssertionValidator {
    audiences: Vec<String>,
    max_lifetime: Duration,
    leeway: Duration,
    jti_storage: Arc<dyn JtiStorage>,
}

impl ClientAssertionValidator {
    /// Creates a validator accepting the given audiences.
    pub fn new(
        audiences: Vec<String>,
        max_lifetime: Duration,
        leeway: Duration,
        jti_storage: Arc<dyn JtiStorage>,
    ) -> Self {
        Self {
            audiences,
            max_lifetime,
            leeway,
            jti_storage,
        }
    }

    /// Creates a validator accepting the configured token endpoint and issuer.
    pub fn from_config(config: &AuthConfig, jti_storage: Arc<dyn JtiStorage>) -> Self {
        let mut audiences = vec![config.token_endpoint_url()];
        if !audiences.contains(&config.issuer) {
            audiences.push(config.issuer.clone());
        }
        Self::new(
            audiences,
            config.assertion.max_lifetime,
            config.assertion.leeway,
            jti_storage,
        )
    }

    /// Validates the claims of an assertion whose signature is already verified,
    /// and records its `jti`.
    ///
    /// # Errors
    ///
    /// Returns the first failed check.
    pub async fn validate(
        &self,
        assertion: &str,
        client_id: &str,
    ) -> Result<ClientAssertionClaims, AssertionError> {
        let claims = decode_claims_unverified(assertion)?;
        self.check_claims(&claims, client_id, OffsetDateTime::now_utc())?;
        self.consume_jti(&claims).await?;
        Ok(claims)
    }

    /// Checks the time-independent and time-dependent claims at `now`.
    ///
    /// # Errors
    ///
    /// Returns the first failed check.
    pub fn check_claims(
        &self,
        claims: &ClientAssertionClaims,
        client_id: &str,
        now: OffsetDateTime,
    ) -> Result<(), AssertionError> {
        if claims.iss != client_id {
            return Err(AssertionError::IssuerMismatch);
        }
        if claims.sub != client_id {
            return Err(AssertionError::SubjectMismatch);
        }

        if !self.audiences.iter().any(|aud| claims.aud.contains(aud)) {
            return Err(AssertionError::AudienceMismatch);
        }

        // Claim timestamps may be any i64.
        let now = now.unix_timestamp();
        let leeway = i64::try_from(self.leeway.as_secs()).unwrap_or(i64::MAX);
        let max_lifetime = i64::try_from(self.max_lifetime.as_secs()).unwrap_or(i64::MAX);

        if claims.exp.saturating_add(leeway) <= now {
            return Err(AssertionError::Expired);
        }
        if claims.exp > now.saturating_add(max_lifetime).saturating_add(leeway) {
            return Err(AssertionError::LifetimeTooLong(self.max_lifetime.as_secs()));
        }
        if let Some(nbf) = claims.nbf
            && nbf > now.saturating_add(leeway)
        {
            return Err(AssertionError::NotYetValid);
        }

        if claims.jti.as_deref().is_none_or(str::is_empty) {
            return Err(AssertionError::MissingJti);
        }

        Ok(())
    }

    /// Records the assertion's `jti`, failing if it was already used.
    ///
    /// # Errors
    ///
    /// Returns `Replayed` on reuse and `ReplayCheckUnavailable` if the
    /// JTI store fails.
    pub async fn consume_jti(&self, claims: &ClientAssertionClaims) -> Result<(), AssertionError> {
        let jti = claims
            .jti
            .as_deref()
            .filter(|jti| !jti.is_empty())
            .ok_or(AssertionError::MissingJti)?;

        let expires_at = OffsetDateTime::from_unix_timestamp(claims.exp)
            .map_err(|_| AssertionError::Malformed("exp out of range".to_string()))?;

        let first_use = self
            .jti_storage
            .mark_used(jti, expires_at)
            .await
            .map_err(|e| AssertionError::ReplayCheckUnavailable(e.to_string()))?;

        if first_use {
            Ok(())
        } else {
            Err(AssertionError::Replayed)
        }
    }
}

/// Decodes the claims of an assertion without verifying its signature.
///
/// # Errors
///
/// Returns `AssertionError::Malformed` if the payload is not a claims set.
pub fn decode_claims_unverified(assertion: &str) -> Result<ClientAssertionClaims, AssertionError> {
    let payload = payload_json(assertion)?;
    serde_json::from_value(payload).map_err(|e| AssertionError::Malformed(e.to_string()))
}

/// Extracts the client ID from an unverified assertion.
///
/// Uses `sub`, falling back to `iss`. Only use the result to look up the
/// client whose keys will verify the assertion.
#[must_use]
pub fn extract_client_id_unverified(assertion: &str) -> Option<String> {
    let payload = payload_json(assertion).ok()?;
    ["sub", "iss"]
        .into_iter()
        .find_map(|claim| payload.get(claim).and_then(|v| v.as_str()))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn payload_json(assertion: &str) -> Result<serde_json::Value, AssertionError> {
    let parts: Vec<&str> = assertion.split('.').collect();
    if parts.len() != 3 {
        return Err(AssertionError::Malformed("Invalid JWT format".to_string()));
    }

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(parts[1])
        .map_err(|_| AssertionError::Malformed("Invalid JWT payload encoding".to_string()))?;

    serde_json::from_slice(&payload_bytes)
        .map_err(|_| AssertionError::Malformed("Invalid JWT payload JSON".to_string()))
}
