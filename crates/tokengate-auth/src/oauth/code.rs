//! Authorization code records.
//!
//! A record is created when the resource owner grants authorization and is
//! redeemed at most once at the token endpoint.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::oauth::pkce::CodeChallengeMethod;

/// An issued authorization code and the request context it is bound to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCodeRecord {
    /// Opaque single-use code.
    pub code: String,

    /// Client the code was issued to.
    pub client_id: String,

    /// Redirect URI sent in the authorization request, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// PKCE challenge sent in the authorization request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// PKCE method; `plain` when a challenge was sent without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<CodeChallengeMethod>,

    /// Granted scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// When the code was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the code stops being redeemable.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl AuthorizationCodeRecord {
    /// Creates a record that expires after `lifetime`.
    #[must_use]
    pub fn new(code: impl Into<String>, client_id: impl Into<String>, lifetime: Duration) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            code: code.into(),
            client_id: client_id.into(),
            redirect_uri: None,
            code_challenge: None,
            code_challenge_method: None,
            scope: None,
            created_at: now,
            expires_at: now + lifetime,
        }
    }

    /// Binds the code to a redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    /// Binds the code to a PKCE challenge.
    #[must_use]
    pub fn with_pkce(
        mut self,
        challenge: impl Into<String>,
        method: Option<CodeChallengeMethod>,
    ) -> Self {
        self.code_challenge = Some(challenge.into());
        self.code_challenge_method = method;
        self
    }

    /// Sets the granted scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Returns `true` if the code has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() >= self.expires_at
    }

    /// Returns `true` if the code was issued with a PKCE challenge.
    #[must_use]
    pub fn uses_pkce(&self) -> bool {
        self.code_challenge.is_some()
    }

    /// Returns the effective challenge method.
    #[must_use]
    pub fn challenge_method(&self) -> CodeChallengeMethod {
        self.code_challenge_method.unwrap_or_default()
    }
}

/// Generates a random authorization code (32 bytes, base64url).
#[must_use]
pub fn generate_code() -> String {
    use rand::Rng;
    let bytes: [u8; 32] = rand::thread_rng().r#gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record() {
        let record = AuthorizationCodeRecord::new("abc", "client", Duration::from_secs(600))
            .with_redirect_uri("https://app.example.com/cb")
            .with_scope("openid");
        assert!(!record.is_expired());
        assert!(!record.uses_pkce());
        assert_eq!(record.redirect_uri.as_deref(), Some("https://app.example.com/cb"));
        assert_eq!(record.expires_at - record.created_at, time::Duration::seconds(600));
    }

    #[test]
    fn test_zero_lifetime_is_expired() {
        let record = AuthorizationCodeRecord::new("abc", "client", Duration::ZERO);
        assert!(record.is_expired());
    }

    #[test]
    fn test_challenge_method_defaults_to_plain() {
        let record = AuthorizationCodeRecord::new("abc", "client", Duration::from_secs(60))
            .with_pkce("challenge", None);
        assert!(record.uses_pkce());
        assert_eq!(record.challenge_method(), CodeChallengeMethod::Plain);

        let record = record.with_pkce("challenge", Some(CodeChallengeMethod::S256));
        assert_eq!(record.challenge_method(), CodeChallengeMethod::S256);
    }

    #[test]
    fn test_serde_round_trip() {
        let record = AuthorizationCodeRecord::new("abc", "client", Duration::from_secs(60))
            .with_pkce("challenge", Some(CodeChallengeMethod::S256));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["code_challenge_method"], "S256");

        let parsed: AuthorizationCodeRecord = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.code, "abc");
        assert_eq!(parsed.code_challenge_method, Some(CodeChallengeMethod::S256));
    }

    #[test]
    fn test_generate_code() {
        let a = generate_code();
        let b = generate_code();
        assert_eq!(a.len(), 43);
        assert_ne!(a, b);
    }
}
