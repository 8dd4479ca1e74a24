//! # tokengate-auth
//!
//! Client authentication and proof-of-possession checks for an OAuth 2.0 /
//! OpenID Connect token endpoint.
//!
//! This crate provides:
//! - Client authentication for `none`, `client_secret_basic`,
//!   `client_secret_post`, `client_secret_jwt` and `private_key_jwt`
//! - Signature/MAC verification of client assertions (HS*, RS*, PS*, ES*)
//! - PKCE verification of authorization code redemptions (RFC 7636)
//! - Single-use authorization codes and assertion IDs
//!
//! ## Overview
//!
//! A token request flows through [`oauth::ClientAuthenticator`] first. Only
//! an authenticated client may redeem a code, and the redemption is checked
//! by [`oauth::PkceValidator`]. Issuing the tokens themselves is left to the
//! embedding server through [`http::TokenIssuer`].
//!
//! ## Modules
//!
//! - [`config`] - Token endpoint configuration
//! - [`error`] - Error taxonomy mapped to OAuth 2.0 error codes
//! - [`oauth`] - Client authentication, signatures, PKCE and the token service
//! - [`jwks`] - Client public key resolution and caching
//! - [`storage`] - Storage traits and in-memory implementations
//! - [`types`] - Client registration types
//! - [`http`] - Axum handler for the token endpoint

pub mod config;
pub mod error;
pub mod http;
pub mod jwks;
pub mod oauth;
pub mod storage;
pub mod types;

#[cfg(test)]
mod test_support;

pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, ErrorCategory};
pub use http::{TokenIssuer, TokenState, token_handler};
pub use jwks::{ClientJwksCache, JwksError, JwksSource, KeyResolver};
pub use oauth::{
    AuthenticationOutcome, ClientAuthenticator, ClientCredentials, PkceValidator,
    SignatureVerifier, SigningAlgorithm, TokenEndpointService, TokenRequest, TokenResponse,
};
pub use storage::{AuthorizationCodeStorage, ClientStorage, JtiStorage};
pub use types::{Client, ClientValidationError, GrantType, TokenEndpointAuthMethod};

/// Type alias for token endpoint results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use tokengate_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::config::{AuthConfig, ConfigError};
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::http::{TokenIssuer, TokenState, token_handler};
    pub use crate::jwks::{ClientJwksCache, JwksSource, KeyResolver};
    pub use crate::oauth::{
        AuthorizationCodeRecord, ClientAuthenticator, ClientCredentials, CodeChallengeMethod,
        PkceValidator, SignatureVerifier, SigningAlgorithm, TokenEndpointService, TokenRequest,
        TokenResponse, ValidatedGrant,
    };
    pub use crate::storage::{
        AuthorizationCodeStorage, ClientStorage, InMemoryAuthorizationCodeStorage,
        InMemoryClientStorage, InMemoryJtiStorage, JtiStorage,
    };
    pub use crate::types::{Client, GrantType, TokenEndpointAuthMethod};
}
