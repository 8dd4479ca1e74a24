//! Storage traits for token endpoint data.
//!
//! This module defines storage interfaces for:
//!
//! - OAuth client registrations
//! - Authorization codes
//! - Used client assertion IDs (JTI)
//!
//! # Implementations
//!
//! In-memory implementations live in [`memory`]. Persistent backends
//! implement the same traits.

pub mod client;
pub mod code;
pub mod jti;
pub mod memory;

pub use client::ClientStorage;
pub use code::{AuthorizationCodeStorage, CodeFetch};
pub use jti::JtiStorage;
pub use memory::{InMemoryAuthorizationCodeStorage, InMemoryClientStorage, InMemoryJtiStorage};
