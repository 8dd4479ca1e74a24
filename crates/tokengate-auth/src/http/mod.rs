//! HTTP handlers for OAuth 2.0 endpoints.
//!
//! This module provides Axum handlers for OAuth endpoints.
//!
//! # Available Handlers
//!
//! - [`token`] - Token endpoint (RFC 6749 Section 3.2)

pub mod token;

pub use token::{TokenIssuer, TokenState, token_handler};
