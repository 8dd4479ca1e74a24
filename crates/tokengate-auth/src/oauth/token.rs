//! Token endpoint request, response and error types.
//!
//! # Supported Grant Types
//!
//! - `authorization_code` - Exchange an authorization code for tokens
//!
//! Token issuance itself is delegated to the embedding server; this module
//! only describes the wire shapes of RFC 6749 Section 4.1.3 and 5.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AuthError;

/// Token request parameters (`application/x-www-form-urlencoded` body).
///
/// # Client Authentication
///
/// Clients authenticate using one of:
/// - HTTP Basic Auth header (not in this struct)
/// - `client_id` + `client_secret` in body
/// - `client_assertion_type` + `client_assertion` (JWT)
/// - `client_id` only (public clients)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    /// OAuth 2.0 grant type. An absent value is reported as `invalid_request`.
    #[serde(default)]
    pub grant_type: String,

    /// Authorization code (for authorization_code grant).
    #[serde(default)]
    pub code: Option<String>,

    /// Redirect URI (must match authorization request).
    #[serde(default)]
    pub redirect_uri: Option<String>,

    /// PKCE code verifier (for authorization_code grant).
    #[serde(default)]
    pub code_verifier: Option<String>,

    /// Client ID (for public clients or client_secret_post).
    #[serde(default)]
    pub client_id: Option<String>,

    /// Client secret (for client_secret_post).
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Client assertion type (for JWT-based authentication).
    #[serde(default)]
    pub client_assertion_type: Option<String>,

    /// Client assertion JWT.
    #[serde(default)]
    pub client_assertion: Option<String>,

    /// Requested scope.
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenRequest {
    /// Creates an authorization_code request for `code`.
    #[must_use]
    pub fn authorization_code(code: impl Into<String>) -> Self {
        Self {
            grant_type: "authorization_code".to_string(),
            code: Some(code.into()),
            ..Self::default()
        }
    }

    /// Sets the redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    /// Sets the PKCE code verifier.
    #[must_use]
    pub fn with_code_verifier(mut self, verifier: impl Into<String>) -> Self {
        self.code_verifier = Some(verifier.into());
        self
    }

    /// Sets the body `client_id`.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets body credentials for `client_secret_post`.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Sets a JWT bearer client assertion.
    #[must_use]
    pub fn with_client_assertion(mut self, assertion: impl Into<String>) -> Self {
        self.client_assertion_type =
            Some(crate::oauth::client_assertion::JWT_BEARER_ASSERTION_TYPE.to_string());
        self.client_assertion = Some(assertion.into());
        self
    }
}

/// Successful token response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The access token.
    pub access_token: String,

    /// Token type, always "Bearer".
    pub token_type: String,

    /// Access token lifetime in seconds.
    pub expires_in: u64,

    /// Granted scope.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Refresh token, if issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// OpenID Connect ID token, if issued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl TokenResponse {
    /// Creates a bearer token response.
    #[must_use]
    pub fn new(access_token: String, expires_in: u64, scope: Option<String>) -> Self {
        Self {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in,
            scope,
            refresh_token: None,
            id_token: None,
        }
    }

    /// Adds a refresh token.
    #[must_use]
    pub fn with_refresh_token(mut self, token: String) -> Self {
        self.refresh_token = Some(token);
        self
    }

    /// Adds an ID token.
    #[must_use]
    pub fn with_id_token(mut self, token: String) -> Self {
        self.id_token = Some(token);
        self
    }
}

/// Token error response.
///
/// # Example Response
///
/// ```json
/// {
///   "error": "invalid_client",
///   "error_description": "Client authentication failed"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenError {
    /// OAuth 2.0 error code.
    pub error: TokenErrorCode,

    /// Human-readable error description.
    pub error_description: String,
}

impl TokenError {
    /// Creates a new token error with description.
    #[must_use]
    pub fn new(error: TokenErrorCode, description: impl Into<String>) -> Self {
        Self {
            error,
            error_description: description.into(),
        }
    }

    /// Creates an invalid_client error.
    #[must_use]
    pub fn invalid_client(description: impl Into<String>) -> Self {
        Self::new(TokenErrorCode::InvalidClient, description)
    }

    /// Creates an invalid_grant error.
    #[must_use]
    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::new(TokenErrorCode::InvalidGrant, description)
    }

    /// Returns the HTTP status for this error.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.error.http_status()
    }
}

impl From<&AuthError> for TokenError {
    fn from(err: &AuthError) -> Self {
        let code = match err {
            AuthError::InvalidClient { .. } => TokenErrorCode::InvalidClient,
            AuthError::InvalidGrant { .. } | AuthError::PkceVerificationFailed => {
                TokenErrorCode::InvalidGrant
            }
            AuthError::InvalidRequest { .. } => TokenErrorCode::InvalidRequest,
            AuthError::UnauthorizedClient { .. } => TokenErrorCode::UnauthorizedClient,
            AuthError::UnsupportedGrantType { .. } => TokenErrorCode::UnsupportedGrantType,
            AuthError::Storage { .. } => TokenErrorCode::ServerError,
        };
        Self::new(code, err.description())
    }
}

/// OAuth 2.0 token error codes.
///
/// Defined in RFC 6749 Section 5.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenErrorCode {
    /// The request is missing a required parameter or is otherwise malformed.
    InvalidRequest,

    /// Client authentication failed (unknown client, no client authentication
    /// included, or unsupported authentication method).
    InvalidClient,

    /// The authorization code is invalid, expired, consumed, or was issued to
    /// another client, or the PKCE verifier does not match.
    InvalidGrant,

    /// The authenticated client is not authorized to use this grant type.
    UnauthorizedClient,

    /// The grant type is not supported by the authorization server.
    UnsupportedGrantType,

    /// The server failed unexpectedly.
    ServerError,
}

impl TokenErrorCode {
    /// Returns the string representation of the error code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::ServerError => "server_error",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidClient => 401,
            Self::ServerError => 500,
            Self::InvalidRequest
            | Self::InvalidGrant
            | Self::UnauthorizedClient
            | Self::UnsupportedGrantType => 400,
        }
    }
}

impl fmt::Display for TokenErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
