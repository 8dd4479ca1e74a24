//! Client storage trait.
//!
//! Defines the interface for looking up and registering OAuth clients.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::Client;

/// Storage operations for OAuth 2.0 clients.
///
/// # Example
///
/// ```ignore
/// use tokengate_auth::storage::ClientStorage;
///
/// async fn example(storage: &impl ClientStorage) {
///     if let Some(client) = storage.find_by_client_id("my-app").await? {
///         println!("Found client: {}", client.client_id);
///     }
/// }
/// ```
#[async_trait]
pub trait ClientStorage: Send + Sync {
    /// Find a client by its OAuth client_id.
    ///
    /// Returns `None` if the client doesn't exist. Inactive clients are
    /// returned as stored; callers decide what inactivity means.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>>;

    /// Register a new client.
    ///
    /// The client is validated before it is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The client validation fails
    /// - A client with the same client_id already exists
    /// - The storage operation fails
    async fn create(&self, client: &Client) -> AuthResult<Client>;

    /// List all registered clients.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn list(&self) -> AuthResult<Vec<Client>>;
}
