//! Authentication error types.
//!
//! This module defines the error taxonomy of the token endpoint. Every error
//! maps to an OAuth 2.0 error code and an HTTP status so the HTTP layer can
//! render `{error, error_description}` bodies without inspecting messages.

use std::fmt;

/// Description used for every client authentication failure.
///
/// The precise reason is only logged; the response never reveals which
/// check failed.
pub const CLIENT_AUTHENTICATION_FAILED: &str = "Client authentication failed";

/// Errors that can occur while processing a token request.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The client credentials are invalid or the client is not registered.
    #[error("Invalid client: {message}")]
    InvalidClient {
        /// Description of why the client is invalid.
        message: String,
    },

    /// The authorization code is invalid, expired, consumed, or was issued
    /// to another client.
    #[error("Invalid grant: {message}")]
    InvalidGrant {
        /// Description of why the grant is invalid.
        message: String,
    },

    /// PKCE code verifier does not match the code challenge.
    #[error("PKCE verification failed")]
    PkceVerificationFailed,

    /// The request is missing a parameter or is otherwise malformed.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of why the request is invalid.
        message: String,
    },

    /// The authenticated client may not use the requested grant type.
    #[error("Unauthorized client: {message}")]
    UnauthorizedClient {
        /// Description of why the client is not authorized.
        message: String,
    },

    /// The authorization server does not support the requested grant type.
    #[error("Unsupported grant type: {grant_type}")]
    UnsupportedGrantType {
        /// The unsupported grant type.
        grant_type: String,
    },

    /// An error occurred while storing or retrieving auth data.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidClient` error.
    #[must_use]
    pub fn invalid_client(message: impl Into<String>) -> Self {
        Self::InvalidClient {
            message: message.into(),
        }
    }

    /// Creates the opaque `InvalidClient` error returned for every failed
    /// client authentication.
    #[must_use]
    pub fn client_authentication_failed() -> Self {
        Self::invalid_client(CLIENT_AUTHENTICATION_FAILED)
    }

    /// Creates a new `InvalidGrant` error.
    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `UnauthorizedClient` error.
    #[must_use]
    pub fn unauthorized_client(message: impl Into<String>) -> Self {
        Self::UnauthorizedClient {
            message: message.into(),
        }
    }

    /// Creates a new `UnsupportedGrantType` error.
    #[must_use]
    pub fn unsupported_grant_type(grant_type: impl Into<String>) -> Self {
        Self::UnsupportedGrantType {
            grant_type: grant_type.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidClient { .. } => ErrorCategory::Authentication,
            Self::InvalidGrant { .. } => ErrorCategory::Grant,
            Self::PkceVerificationFailed => ErrorCategory::Grant,
            Self::InvalidRequest { .. } => ErrorCategory::Validation,
            Self::UnauthorizedClient { .. } => ErrorCategory::Validation,
            Self::UnsupportedGrantType { .. } => ErrorCategory::Validation,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
        }
    }

    /// Returns the OAuth 2.0 error code for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::InvalidClient { .. } => "invalid_client",
            Self::InvalidGrant { .. } => "invalid_grant",
            Self::PkceVerificationFailed => "invalid_grant",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::UnauthorizedClient { .. } => "unauthorized_client",
            Self::UnsupportedGrantType { .. } => "unsupported_grant_type",
            Self::Storage { .. } => "server_error",
        }
    }

    /// Returns the human-readable `error_description` for this error.
    #[must_use]
    pub fn description(&self) -> String {
        match self {
            Self::InvalidClient { message }
            | Self::InvalidGrant { message }
            | Self::InvalidRequest { message }
            | Self::UnauthorizedClient { message } => message.clone(),
            Self::PkceVerificationFailed => "PKCE verification failed".to_string(),
            Self::UnsupportedGrantType { grant_type } => {
                format!("Grant type '{}' is not supported", grant_type)
            }
            // Infrastructure details stay in the logs.
            Self::Storage { .. } => "The server encountered an internal error".to_string(),
        }
    }

    /// Returns the HTTP status code the token endpoint responds with.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidClient { .. } => 401,
            Self::Storage { .. } => 500,
            _ => 400,
        }
    }
}

/// Categories of token endpoint errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Client authentication errors.
    Authentication,
    /// Authorization grant errors (code, PKCE).
    Grant,
    /// Request validation errors.
    Validation,
    /// Infrastructure/storage errors.
    Infrastructure,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Grant => write!(f, "grant"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
        }
    }
}
