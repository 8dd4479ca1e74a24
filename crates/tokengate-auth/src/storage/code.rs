//! Authorization code storage trait.
//!
//! # Single Redemption
//!
//! `fetch_and_invalidate` is the only way to read a code for redemption. It
//! must check and invalidate the code in one atomic step so that two
//! concurrent token requests can never both observe the same code as valid.

use async_trait::async_trait;

use crate::AuthResult;
use crate::oauth::code::AuthorizationCodeRecord;

/// Result of an atomic code fetch.
#[derive(Debug, Clone)]
pub enum CodeFetch {
    /// The code existed and was unused; it is now invalidated.
    Found(AuthorizationCodeRecord),
    /// The code was already redeemed or invalidated.
    AlreadyConsumed,
    /// No such code.
    NotFound,
}

/// Storage operations for authorization codes.
#[async_trait]
pub trait AuthorizationCodeStorage: Send + Sync {
    /// Stores a newly issued code.
    ///
    /// # Errors
    ///
    /// Returns an error if a code with the same value exists or the storage
    /// operation fails.
    async fn store(&self, record: &AuthorizationCodeRecord) -> AuthResult<()>;

    /// Atomically fetches a code and marks it consumed.
    ///
    /// Implementations typically use a conditional update:
    ///
    /// ```sql
    /// UPDATE authorization_codes SET consumed_at = now()
    /// WHERE code = $1 AND consumed_at IS NULL
    /// RETURNING *
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn fetch_and_invalidate(&self, code: &str) -> AuthResult<CodeFetch>;

    /// Deletes expired codes, consumed or not.
    ///
    /// Returns the number of entries deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}
