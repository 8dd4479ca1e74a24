//! Client authentication for the token endpoint.
//!
//! A client is authenticated with exactly the method it registered. Valid
//! credentials of another method are a failure, never a fallback.
//!
//! # Authentication Methods
//!
//! - `none` - Public clients, identified by `client_id` only
//! - `client_secret_basic` - HTTP Basic Auth with client_id:client_secret
//! - `client_secret_post` - client_id and client_secret in request body
//! - `client_secret_jwt` - Assertion MACed with the client secret (HS*)
//! - `private_key_jwt` - Assertion signed with a key from the client's JWKS
//!
//! # Algorithm Constraints
//!
//! For the assertion methods the header `alg` must belong to the method's
//! family. If the client registered `token_endpoint_auth_signing_alg`, only
//! that exact algorithm is accepted.
//!
//! # Failure Reporting
//!
//! Every failure is reported to the caller as `invalid_client` with the same
//! description. The precise [`AuthFailureReason`] is kept in the
//! [`AuthenticationOutcome`] and logged.

use std::sync::Arc;

use subtle::ConstantTimeEq;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::error::AuthError;
use crate::jwks::KeyResolver;
use crate::oauth::algorithm::SigningAlgorithm;
use crate::oauth::client_assertion::{AssertionError, ClientAssertionValidator};
use crate::oauth::credentials::ClientCredentials;
use crate::oauth::signature::{SignatureVerifier, VerificationKey, decode_header};
use crate::types::Client;

pub use crate::types::TokenEndpointAuthMethod;

/// Result of successful client authentication.
#[derive(Debug, Clone)]
pub struct AuthenticatedClient {
    /// The authenticated client.
    pub client: Client,

    /// The authentication method used.
    pub auth_method: TokenEndpointAuthMethod,
}

/// Why a client failed to authenticate.
///
/// Only used for logging and auditing; responses carry the generic
/// `invalid_client` error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailureReason {
    /// No credentials were presented.
    #[error("no client credentials presented")]
    MissingCredentials,

    /// The Basic header could not be decoded.
    #[error("malformed Basic credentials")]
    MalformedBasicCredentials,

    /// Credentials for more than one method were presented.
    #[error("multiple client authentication methods presented")]
    MultipleMethods,

    /// `client_secret` was sent without `client_id`.
    #[error("client_secret presented without client_id")]
    MissingClientId,

    /// The presented client IDs disagree.
    #[error("client_id does not match the authenticated client")]
    ClientIdMismatch,

    /// `client_assertion_type` is absent or not the JWT bearer type.
    #[error("unsupported client_assertion_type")]
    UnsupportedAssertionType,

    /// `client_assertion_type` was sent without an assertion.
    #[error("client_assertion is missing")]
    MissingAssertion,

    /// No client is registered under the presented ID.
    #[error("unknown client")]
    UnknownClient,

    /// The client is deactivated.
    #[error("client is inactive")]
    InactiveClient,

    /// The presented credentials belong to a different method.
    #[error("client registered for {registered} presented {presented} credentials")]
    MethodMismatch {
        /// Registered method.
        registered: TokenEndpointAuthMethod,
        /// Shape of the presented credentials.
        presented: &'static str,
    },

    /// The secret does not match.
    #[error("client secret mismatch")]
    SecretMismatch,

    /// The client secret has expired.
    #[error("client secret has expired")]
    SecretExpired,

    /// The client has no secret to compare against.
    #[error("client has no secret registered")]
    MissingClientSecret,

    /// The assertion algorithm is not permitted for this client.
    #[error("assertion algorithm '{alg}' is not allowed for this client")]
    AlgorithmNotAllowed {
        /// Declared algorithm.
        alg: String,
    },

    /// The assertion is not a compact JWS.
    #[error("malformed client assertion")]
    MalformedAssertion,

    /// No verification key could be resolved.
    #[error("verification key unavailable: {0}")]
    KeyUnavailable(String),

    /// The assertion signature does not verify.
    #[error("assertion signature invalid: {0}")]
    SignatureInvalid(String),

    /// The assertion claims are invalid.
    #[error("assertion claims invalid: {0}")]
    AssertionClaims(AssertionError),
}

/// Outcome of a client authentication attempt.
#[derive(Debug, Clone)]
pub struct AuthenticationOutcome {
    /// Whether the client proved control of its registration.
    pub authenticated: bool,

    /// The client the attempt was made for, if known.
    pub client_id: Option<String>,

    /// Method used, on success.
    pub method: Option<TokenEndpointAuthMethod>,

    /// Why authentication failed, on failure.
    pub failure_reason: Option<AuthFailureReason>,
}

impl AuthenticationOutcome {
    /// Creates a successful outcome.
    #[must_use]
    pub fn success(client_id: impl Into<String>, method: TokenEndpointAuthMethod) -> Self {
        Self {
            authenticated: true,
            client_id: Some(client_id.into()),
            method: Some(method),
            failure_reason: None,
        }
    }

    /// Creates a failed outcome.
    #[must_use]
    pub fn failure(client_id: Option<String>, reason: AuthFailureReason) -> Self {
        Self {
            authenticated: false,
            client_id,
            method: None,
            failure_reason: Some(reason),
        }
    }

    /// Converts the outcome into the method used or the opaque
    /// `invalid_client` error.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidClient` if authentication failed.
    pub fn into_result(self) -> AuthResult<TokenEndpointAuthMethod> {
        match (self.authenticated, self.method) {
            (true, Some(method)) => Ok(method),
            _ => Err(AuthError::client_authentication_failed()),
        }
    }
}

/// Authenticates clients against their registered method.
#[derive(Clone)]
pub struct ClientAuthenticator {
    verifier: SignatureVerifier,
    assertions: ClientAssertionValidator,
    key_resolver: Arc<dyn KeyResolver>,
}

impl ClientAuthenticator {
    /// Creates an authenticator.
    ///
    /// `key_resolver` provides the public keys for `private_key_jwt`.
    pub fn new(assertions: ClientAssertionValidator, key_resolver: Arc<dyn KeyResolver>) -> Self {
        Self {
            verifier: SignatureVerifier::new(),
            assertions,
            key_resolver,
        }
    }

    /// Decides whether `credentials` authenticate `client`.
    ///
    /// Assertion claims, including the single-use `jti`, are only checked
    /// after the signature verifies.
    pub async fn authenticate(
        &self,
        client: &Client,
        credentials: &ClientCredentials,
    ) -> AuthenticationOutcome {
        match self.check(client, credentials).await {
            Ok(method) => {
                tracing::debug!(
                    client_id = %client.client_id,
                    method = %method,
                    "Client authenticated"
                );
                AuthenticationOutcome::success(&client.client_id, method)
            }
            Err(reason) => {
                tracing::warn!(
                    client_id = %client.client_id,
                    registered_method = %client.token_endpoint_auth_method,
                    presented = credentials.kind(),
                    reason = %reason,
                    "Client authentication failed"
                );
                AuthenticationOutcome::failure(Some(client.client_id.clone()), reason)
            }
        }
    }

    async fn check(
        &self,
        client: &Client,
        credentials: &ClientCredentials,
    ) -> Result<TokenEndpointAuthMethod, AuthFailureReason> {
        if !client.active {
            return Err(AuthFailureReason::InactiveClient);
        }

        if let Some(presented_id) = credentials.client_id()
            && presented_id != client.client_id
        {
            return Err(AuthFailureReason::ClientIdMismatch);
        }

        let registered = client.token_endpoint_auth_method;
        match (registered, credentials) {
            (
                TokenEndpointAuthMethod::ClientSecretBasic,
                ClientCredentials::Basic { client_secret, .. },
            )
            | (
                TokenEndpointAuthMethod::ClientSecretPost,
                ClientCredentials::Post { client_secret, .. },
            ) => check_secret(client, client_secret)?,
            (
                TokenEndpointAuthMethod::ClientSecretJwt | TokenEndpointAuthMethod::PrivateKeyJwt,
                ClientCredentials::Assertion { assertion, .. },
            ) => self.check_assertion(client, assertion).await?,
            (TokenEndpointAuthMethod::None, ClientCredentials::ClientIdOnly { .. }) => {}
            (_, ClientCredentials::Absent) => return Err(AuthFailureReason::MissingCredentials),
            (registered, presented) => {
                return Err(AuthFailureReason::MethodMismatch {
                    registered,
                    presented: presented.kind(),
                });
            }
        }

        Ok(registered)
    }

    async fn check_assertion(&self, client: &Client, assertion: &str) -> Result<(), AuthFailureReason> {
        let header = decode_header(assertion).map_err(|_| AuthFailureReason::MalformedAssertion)?;
        let alg = allowed_algorithm(client, &header.alg)?;

        let key = match client.token_endpoint_auth_method {
            TokenEndpointAuthMethod::ClientSecretJwt => {
                let secret = registered_secret(client)?;
                VerificationKey::secret(secret)
            }
            _ => {
                let source = client.jwks_source().ok_or_else(|| {
                    AuthFailureReason::KeyUnavailable("no JWKS registered".to_string())
                })?;
                let jwk = self
                    .key_resolver
                    .resolve_key(&source, header.kid.as_deref(), alg)
                    .await
                    .map_err(|e| AuthFailureReason::KeyUnavailable(e.to_string()))?;
                VerificationKey::jwk(jwk)
            }
        };

        self.verifier
            .verify_detailed(alg, assertion, &key)
            .map_err(|e| AuthFailureReason::SignatureInvalid(e.to_string()))?;

        self.assertions
            .validate(assertion, &client.client_id)
            .await
            .map_err(AuthFailureReason::AssertionClaims)?;

        Ok(())
    }
}

/// Returns the algorithm to verify with if `declared` is permitted for the
/// client's method and registered signing algorithm.
fn allowed_algorithm(client: &Client, declared: &str) -> Result<SigningAlgorithm, AuthFailureReason> {
    let not_allowed = || AuthFailureReason::AlgorithmNotAllowed {
        alg: declared.to_string(),
    };

    let alg = SigningAlgorithm::parse(declared).ok_or_else(not_allowed)?;

    if client.token_endpoint_auth_method.algorithm_family() != Some(alg.family()) {
        return Err(not_allowed());
    }

    if let Some(registered) = client.token_endpoint_auth_signing_alg
        && registered != alg
    {
        return Err(not_allowed());
    }

    Ok(alg)
}

/// Returns the client's secret if it can still be used.
fn registered_secret(client: &Client) -> Result<&str, AuthFailureReason> {
    let secret = client
        .client_secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(AuthFailureReason::MissingClientSecret)?;

    if client.is_secret_expired(OffsetDateTime::now_utc()) {
        return Err(AuthFailureReason::SecretExpired);
    }

    Ok(secret)
}

/// Compares the presented secret with the registered one in constant time.
fn check_secret(client: &Client, presented: &str) -> Result<(), AuthFailureReason> {
    let secret = registered_secret(client)?;
    if bool::from(secret.as_bytes().ct_eq(presented.as_bytes())) {
        Ok(())
    } else {
        Err(AuthFailureReason::SecretMismatch)
    }
}
