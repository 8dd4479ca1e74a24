//! JWT ID (JTI) storage trait for replay prevention.
//!
//! Client assertions carry a `jti` that may be used once. The `mark_used`
//! method checks and records a JTI atomically, so the same assertion
//! submitted concurrently is accepted at most once.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::AuthResult;

/// Storage trait for JWT ID (JTI) tracking.
#[async_trait]
pub trait JtiStorage: Send + Sync {
    /// Atomically marks a JTI as used if not already used.
    ///
    /// # Arguments
    ///
    /// * `jti` - The JWT ID to mark as used
    /// * `expires_at` - When this JTI entry can be cleaned up (matches JWT exp)
    ///
    /// # Returns
    ///
    /// Returns `true` if the JTI was marked (first use), or `false` if it was
    /// already used.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn mark_used(&self, jti: &str, expires_at: OffsetDateTime) -> AuthResult<bool>;

    /// Checks if a JTI has already been used.
    ///
    /// Prefer `mark_used`, which checks and marks in one step.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn is_used(&self, jti: &str) -> AuthResult<bool>;

    /// Deletes expired JTI entries.
    ///
    /// Returns the number of entries deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}
