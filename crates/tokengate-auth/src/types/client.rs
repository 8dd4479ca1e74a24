//! OAuth 2.0 client registration types.
//!
//! Field names follow the client metadata of RFC 7591 / OpenID Connect
//! Dynamic Client Registration, so registrations can be loaded straight from
//! their JSON or TOML representation.

use jsonwebtoken::jwk::JwkSet;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::jwks::JwksSource;
use crate::oauth::algorithm::{AlgorithmFamily, SigningAlgorithm};

// =============================================================================
// Grant Type
// =============================================================================

/// OAuth 2.0 grant types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Authorization Code flow.
    AuthorizationCode,
    /// Client Credentials flow.
    ClientCredentials,
    /// Refresh Token flow.
    RefreshToken,
}

impl GrantType {
    /// Returns the OAuth 2.0 grant_type parameter value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::ClientCredentials => "client_credentials",
            Self::RefreshToken => "refresh_token",
        }
    }

    /// Parses a grant_type parameter value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "authorization_code" => Some(Self::AuthorizationCode),
            "client_credentials" => Some(Self::ClientCredentials),
            "refresh_token" => Some(Self::RefreshToken),
            _ => None,
        }
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Token Endpoint Auth Method
// =============================================================================

/// Client authentication methods at the token endpoint.
///
/// Exactly one method is registered per client. Registrations that omit
/// `token_endpoint_auth_method` get `client_secret_basic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    /// Public client, identified by `client_id` only.
    None,
    /// HTTP Basic authentication with client_id:client_secret.
    #[default]
    ClientSecretBasic,
    /// client_id and client_secret in the request body.
    ClientSecretPost,
    /// JWT assertion MACed with the client secret (HS256/384/512).
    ClientSecretJwt,
    /// JWT assertion signed with the client's private key.
    PrivateKeyJwt,
}

impl TokenEndpointAuthMethod {
    /// Returns the method name as registered in client metadata.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ClientSecretBasic => "client_secret_basic",
            Self::ClientSecretPost => "client_secret_post",
            Self::ClientSecretJwt => "client_secret_jwt",
            Self::PrivateKeyJwt => "private_key_jwt",
        }
    }

    /// Returns `true` if the method authenticates with the shared secret.
    #[must_use]
    pub fn uses_secret(&self) -> bool {
        matches!(
            self,
            Self::ClientSecretBasic | Self::ClientSecretPost | Self::ClientSecretJwt
        )
    }

    /// Returns `true` if the method authenticates with a JWT assertion.
    #[must_use]
    pub fn uses_assertion(&self) -> bool {
        matches!(self, Self::ClientSecretJwt | Self::PrivateKeyJwt)
    }

    /// Returns the algorithm family allowed for assertion-based methods.
    #[must_use]
    pub fn algorithm_family(&self) -> Option<AlgorithmFamily> {
        match self {
            Self::ClientSecretJwt => Some(AlgorithmFamily::Symmetric),
            Self::PrivateKeyJwt => Some(AlgorithmFamily::Asymmetric),
            _ => None,
        }
    }
}

impl std::fmt::Display for TokenEndpointAuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Client
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_grant_types() -> Vec<GrantType> {
    vec![GrantType::AuthorizationCode]
}

/// A registered OAuth 2.0 client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    /// Unique client identifier.
    pub client_id: String,

    /// Shared client secret.
    ///
    /// Stored in the clear because `client_secret_jwt` uses it as the HMAC key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Secret expiry as a Unix timestamp; `0` or absent means it never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret_expires_at: Option<i64>,

    /// Human-readable display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,

    /// Registered redirect URIs.
    #[serde(default)]
    pub redirect_uris: Vec<String>,

    /// Grant types the client may use.
    #[serde(default = "default_grant_types")]
    pub grant_types: Vec<GrantType>,

    /// Registered token endpoint authentication method.
    #[serde(default)]
    pub token_endpoint_auth_method: TokenEndpointAuthMethod,

    /// The only algorithm accepted for assertion-based authentication, if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_signing_alg: Option<SigningAlgorithm>,

    /// Inline public keys for `private_key_jwt`.
    #[serde(
        default,
        deserialize_with = "crate::jwks::deserialize_jwk_set",
        skip_serializing_if = "Option::is_none"
    )]
    pub jwks: Option<JwkSet>,

    /// URL of the client's public key set for `private_key_jwt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks_uri: Option<String>,

    /// Whether the client may currently authenticate.
    #[serde(default = "default_true")]
    pub active: bool,
}

impl Client {
    /// Creates an active client with the given method and no credentials.
    #[must_use]
    pub fn new(client_id: impl Into<String>, method: TokenEndpointAuthMethod) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            client_secret_expires_at: None,
            client_name: None,
            redirect_uris: Vec::new(),
            grant_types: default_grant_types(),
            token_endpoint_auth_method: method,
            token_endpoint_auth_signing_alg: None,
            jwks: None,
            jwks_uri: None,
            active: true,
        }
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Sets the assertion signing algorithm constraint.
    #[must_use]
    pub fn with_signing_alg(mut self, alg: SigningAlgorithm) -> Self {
        self.token_endpoint_auth_signing_alg = Some(alg);
        self
    }

    /// Sets the inline JWKS.
    #[must_use]
    pub fn with_jwks(mut self, jwks: JwkSet) -> Self {
        self.jwks = Some(jwks);
        self
    }

    /// Sets the JWKS URI.
    #[must_use]
    pub fn with_jwks_uri(mut self, uri: impl Into<String>) -> Self {
        self.jwks_uri = Some(uri.into());
        self
    }

    /// Adds a redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uris.push(uri.into());
        self
    }

    /// Validates the registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the registration is inconsistent with its
    /// authentication method.
    pub fn validate(&self) -> Result<(), ClientValidationError> {
        if self.client_id.is_empty() {
            return Err(ClientValidationError::EmptyClientId);
        }

        let method = self.token_endpoint_auth_method;

        if method.uses_secret() && self.client_secret.as_deref().is_none_or(str::is_empty) {
            return Err(ClientValidationError::MissingSecret(method));
        }

        if method == TokenEndpointAuthMethod::PrivateKeyJwt
            && self.jwks.is_none()
            && self.jwks_uri.is_none()
        {
            return Err(ClientValidationError::MissingJwks);
        }

        if let Some(uri) = &self.jwks_uri
            && url::Url::parse(uri).is_err()
        {
            return Err(ClientValidationError::InvalidJwksUri(uri.clone()));
        }

        if let Some(alg) = self.token_endpoint_auth_signing_alg {
            match method.algorithm_family() {
                Some(family) if family == alg.family() => {}
                Some(_) => {
                    return Err(ClientValidationError::SigningAlgFamilyMismatch { method, alg });
                }
                None => {
                    return Err(ClientValidationError::SigningAlgWithoutAssertion(method));
                }
            }
        }

        if self.grant_types.contains(&GrantType::AuthorizationCode) && self.redirect_uris.is_empty()
        {
            return Err(ClientValidationError::NoRedirectUris);
        }

        Ok(())
    }

    /// Returns `true` if the client is a public client.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.token_endpoint_auth_method == TokenEndpointAuthMethod::None
    }

    /// Checks if the given redirect URI is registered for this client.
    #[must_use]
    pub fn is_redirect_uri_allowed(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|allowed| allowed == uri)
    }

    /// Checks if the given grant type is allowed for this client.
    #[must_use]
    pub fn is_grant_type_allowed(&self, grant_type: GrantType) -> bool {
        self.grant_types.contains(&grant_type)
    }

    /// Returns `true` if the client secret has expired at `now`.
    #[must_use]
    pub fn is_secret_expired(&self, now: OffsetDateTime) -> bool {
        match self.client_secret_expires_at {
            Some(expires_at) if expires_at > 0 => now.unix_timestamp() >= expires_at,
            _ => false,
        }
    }

    /// Returns where the client's public keys come from.
    ///
    /// Inline keys win over a JWKS URI when both are registered.
    #[must_use]
    pub fn jwks_source(&self) -> Option<JwksSource> {
        if let Some(jwks) = &self.jwks {
            return Some(JwksSource::Inline(jwks.clone()));
        }
        self.jwks_uri.clone().map(JwksSource::Uri)
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Errors that can occur during client validation.
#[derive(Debug, thiserror::Error)]
pub enum ClientValidationError {
    /// Client ID cannot be empty.
    #[error("Client ID cannot be empty")]
    EmptyClientId,

    /// The method needs a client secret.
    #[error("Authentication method {0} requires a client secret")]
    MissingSecret(TokenEndpointAuthMethod),

    /// private_key_jwt needs public keys.
    #[error("private_key_jwt requires jwks or jwks_uri")]
    MissingJwks,

    /// jwks_uri is not an absolute URL.
    #[error("Invalid jwks_uri: {0}")]
    InvalidJwksUri(String),

    /// The signing algorithm does not belong to the method's family.
    #[error("Signing algorithm {alg} cannot be used with {method}")]
    SigningAlgFamilyMismatch {
        /// Registered method.
        method: TokenEndpointAuthMethod,
        /// Registered algorithm.
        alg: SigningAlgorithm,
    },

    /// A signing algorithm was registered for a method without assertions.
    #[error("token_endpoint_auth_signing_alg is only valid for JWT methods, not {0}")]
    SigningAlgWithoutAssertion(TokenEndpointAuthMethod),

    /// Authorization code flow requires redirect URIs.
    #[error("Authorization code flow requires redirect URIs")]
    NoRedirectUris,
}

// =============================================================================
// Tests
// =============================================================================
