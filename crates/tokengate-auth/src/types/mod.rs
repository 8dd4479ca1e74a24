//! Domain types shared across the token endpoint.

pub mod client;

pub use client::{Client, ClientValidationError, GrantType, TokenEndpointAuthMethod};
