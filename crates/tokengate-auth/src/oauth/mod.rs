//! OAuth 2.0 token endpoint verification.
//!
//! This module provides the decisions a token endpoint makes before it may
//! issue tokens:
//!
//! - Client authentication for all registered methods
//! - Signature and MAC verification of client assertions
//! - PKCE verification of authorization code redemptions
//!
//! # Token Request Flow
//!
//! - [`credentials`] - Classifies the presented client credentials
//! - [`client_auth`] - Authenticates the client with its registered method
//! - [`signature`] - Verifies assertion signatures under an expected algorithm
//! - [`client_assertion`] - Validates assertion claims and `jti` replay
//! - [`pkce`] - PKCE challenge/verifier implementation
//! - [`service`] - Runs authentication and code redemption in order
//!
//! # Example
//!
//! ```ignore
//! use tokengate_auth::oauth::{TokenEndpointService, TokenRequest};
//!
//! let service = TokenEndpointService::new(&config, clients, codes, jti, key_resolver);
//! let request = TokenRequest::authorization_code(code).with_code_verifier(verifier);
//! let grant = service.exchange(&request, Some(authorization_header)).await?;
//! ```

pub mod algorithm;
pub mod client_assertion;
pub mod client_auth;
pub mod code;
pub mod credentials;
pub mod pkce;
pub mod service;
pub mod signature;
pub mod token;

// Signing algorithms
pub use algorithm::{AlgorithmFamily, SigningAlgorithm, UnsupportedAlgorithm};

// Client assertion types
pub use client_assertion::{
    AssertionError, ClientAssertionClaims, ClientAssertionValidator, JWT_BEARER_ASSERTION_TYPE,
    StringOrArray,
};

// Client authentication
pub use client_auth::{
    AuthFailureReason, AuthenticatedClient, AuthenticationOutcome, ClientAuthenticator,
    TokenEndpointAuthMethod,
};
pub use credentials::{ClientCredentials, parse_basic_auth};

// Authorization codes
pub use code::{AuthorizationCodeRecord, generate_code};

// PKCE types
pub use pkce::{CodeChallengeMethod, PkceChallenge, PkceError, PkceValidator, PkceVerifier};

// Service types
pub use service::{TokenEndpointService, ValidatedGrant};

// Signature verification
pub use signature::{SignatureVerifier, VerificationError, VerificationKey};

// Token endpoint types
pub use token::{TokenError, TokenErrorCode, TokenRequest, TokenResponse};
