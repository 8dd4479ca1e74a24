//! PKCE (Proof Key for Code Exchange) implementation
//!
//! Implements RFC 7636 with both the `plain` and `S256` methods. A challenge
//! stored without a method is a `plain` challenge.
//!
//! # Example
//!
//! ```
//! use tokengate_auth::oauth::{CodeChallengeMethod, PkceChallenge, PkceVerifier};
//!
//! // Client generates a verifier and challenge
//! let verifier = PkceVerifier::generate();
//! let challenge = PkceChallenge::derive(&verifier, CodeChallengeMethod::S256);
//!
//! // Server stores the challenge, later verifies the verifier from the token request
//! assert!(challenge.matches(CodeChallengeMethod::S256, verifier.as_str()));
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::config::PkceConfig;
use crate::oauth::code::AuthorizationCodeRecord;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during PKCE operations.
#[derive(Debug, thiserror::Error)]
pub enum PkceError {
    /// Verifier length is outside the valid range (43-128 characters).
    #[error("Invalid verifier length: must be 43-128 characters, got {0}")]
    InvalidVerifierLength(usize),

    /// Verifier contains invalid characters.
    #[error("Invalid verifier characters: must be unreserved ([A-Za-z0-9-._~])")]
    InvalidVerifierCharacters,

    /// Unsupported challenge method.
    #[error("Unsupported challenge method: {0}. Must be plain or S256.")]
    UnsupportedMethod(String),

    /// The code was issued with a challenge but no verifier was sent.
    #[error("code_verifier is required")]
    MissingVerifier,

    /// PKCE verification failed (verifier doesn't match challenge).
    #[error("PKCE verification failed: verifier does not match challenge")]
    VerificationFailed,
}

impl PkceError {
    /// Returns `true` if this is a verifier format error.
    #[must_use]
    pub fn is_verifier_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidVerifierLength(_) | Self::InvalidVerifierCharacters
        )
    }

    /// Returns `true` if the verifier was missing or did not match.
    #[must_use]
    pub fn is_verification_error(&self) -> bool {
        matches!(self, Self::MissingVerifier | Self::VerificationFailed)
    }

    /// Get the OAuth 2.0 error code for this error.
    ///
    /// Everything that can go wrong while redeeming a code is `invalid_grant`;
    /// an unknown method can only come from the authorization request.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedMethod(_) => "invalid_request",
            _ => "invalid_grant",
        }
    }
}

// =============================================================================
// Code Challenge Method
// =============================================================================

/// PKCE code challenge method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CodeChallengeMethod {
    /// The challenge is the verifier itself.
    #[default]
    #[serde(rename = "plain")]
    Plain,
    /// The challenge is `BASE64URL(SHA256(ASCII(code_verifier)))`.
    #[serde(rename = "S256")]
    S256,
}

impl CodeChallengeMethod {
    /// Parse challenge method from string. Matching is case-sensitive.
    ///
    /// # Errors
    ///
    /// Returns `PkceError::UnsupportedMethod` for anything but `plain` or `S256`.
    pub fn parse(method: &str) -> Result<Self, PkceError> {
        match method {
            "plain" => Ok(Self::Plain),
            "S256" => Ok(Self::S256),
            other => Err(PkceError::UnsupportedMethod(other.to_string())),
        }
    }

    /// Get the method as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::S256 => "S256",
        }
    }

    /// Applies the method's transform to a verifier.
    #[must_use]
    pub fn transform(&self, verifier: &str) -> String {
        match self {
            Self::Plain => verifier.to_string(),
            Self::S256 => {
                let hash = Sha256::digest(verifier.as_bytes());
                URL_SAFE_NO_PAD.encode(hash)
            }
        }
    }
}

impl std::fmt::Display for CodeChallengeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// PKCE Verifier
// =============================================================================

/// PKCE code verifier.
///
/// A high-entropy random string of 43-128 unreserved characters
/// (`[A-Z] / [a-z] / [0-9] / "-" / "." / "_" / "~"`), RFC 7636 Section 4.1.
#[derive(Debug, Clone)]
pub struct PkceVerifier(String);

impl PkceVerifier {
    /// Create a new verifier from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Length is not between 43 and 128 characters
    /// - Contains characters other than `[A-Za-z0-9-._~]`
    pub fn new(verifier: String) -> Result<Self, PkceError> {
        check_verifier_format(&verifier)?;
        Ok(Self(verifier))
    }

    /// Generate a cryptographically random verifier.
    ///
    /// Generates 32 random bytes and encodes them as base64url (43 characters).
    #[must_use]
    pub fn generate() -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let bytes: [u8; 32] = rng.r#gen();
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Get the verifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the verifier and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for PkceVerifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn check_verifier_format(verifier: &str) -> Result<(), PkceError> {
    let len = verifier.len();
    if !(43..=128).contains(&len) {
        return Err(PkceError::InvalidVerifierLength(len));
    }

    if !verifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '~')
    {
        return Err(PkceError::InvalidVerifierCharacters);
    }

    Ok(())
}

// =============================================================================
// PKCE Challenge
// =============================================================================

/// PKCE code challenge as stored with an authorization code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge(String);

impl PkceChallenge {
    /// Derives the challenge for a verifier.
    #[must_use]
    pub fn derive(verifier: &PkceVerifier, method: CodeChallengeMethod) -> Self {
        Self(method.transform(verifier.as_str()))
    }

    /// Wraps a challenge received from a client.
    #[must_use]
    pub fn new(challenge: impl Into<String>) -> Self {
        Self(challenge.into())
    }

    /// Returns `true` if `verifier` matches this challenge under `method`.
    ///
    /// The comparison runs in constant time.
    #[must_use]
    pub fn matches(&self, method: CodeChallengeMethod, verifier: &str) -> bool {
        let computed = method.transform(verifier);
        computed.as_bytes().ct_eq(self.0.as_bytes()).into()
    }

    /// Get the challenge as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the challenge and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for PkceChallenge {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Validator
// =============================================================================

/// Decides whether a `code_verifier` redeems an authorization code.
#[derive(Debug, Clone, Default)]
pub struct PkceValidator {
    enforce_verifier_format: bool,
}

impl PkceValidator {
    /// Creates a validator from configuration.
    #[must_use]
    pub fn new(config: &PkceConfig) -> Self {
        Self {
            enforce_verifier_format: config.enforce_verifier_format,
        }
    }

    /// Returns `true` if the verifier redeems the code.
    #[must_use]
    pub fn validate(&self, record: &AuthorizationCodeRecord, code_verifier: Option<&str>) -> bool {
        self.verify(record, code_verifier).is_ok()
    }

    /// Checks the verifier against the code's stored challenge.
    ///
    /// A code issued without a challenge accepts any verifier, including none.
    ///
    /// # Errors
    ///
    /// Returns `MissingVerifier` if a challenge is stored but no verifier was
    /// sent, and `VerificationFailed` if the verifier does not match.
    pub fn verify(
        &self,
        record: &AuthorizationCodeRecord,
        code_verifier: Option<&str>,
    ) -> Result<(), PkceError> {
        let Some(challenge) = record.code_challenge.as_deref() else {
            tracing::debug!(client_id = %record.client_id, "Code issued without PKCE challenge");
            return Ok(());
        };

        let verifier = match code_verifier {
            Some(v) if !v.is_empty() => v,
            _ => return Err(PkceError::MissingVerifier),
        };

        if self.enforce_verifier_format {
            check_verifier_format(verifier)?;
        }

        let method = record.challenge_method();
        if PkceChallenge::new(challenge).matches(method, verifier) {
            Ok(())
        } else {
            Err(PkceError::VerificationFailed)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
