pub mod cleanup;
pub mod config;
pub mod issuer;
pub mod observability;
pub mod server;

pub use server::{ServerBuilder, TokengateServer, build_app};
