//! In-memory storage backends.
//!
//! Each store keeps its state behind a single `tokio::sync::RwLock`, so the
//! check-and-update operations (`fetch_and_invalidate`, `mark_used`) run
//! under one write guard and are atomic with respect to each other.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::AuthResult;
use crate::error::AuthError;
use crate::oauth::code::AuthorizationCodeRecord;
use crate::storage::client::ClientStorage;
use crate::storage::code::{AuthorizationCodeStorage, CodeFetch};
use crate::storage::jti::JtiStorage;
use crate::types::Client;

// =============================================================================
// Clients
// =============================================================================

/// Client registrations held in memory.
#[derive(Debug, Default)]
pub struct InMemoryClientStorage {
    clients: RwLock<HashMap<String, Client>>,
}

impl InMemoryClientStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientStorage for InMemoryClientStorage {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
        Ok(self.clients.read().await.get(client_id).cloned())
    }

    async fn create(&self, client: &Client) -> AuthResult<Client> {
        client
            .validate()
            .map_err(|e| AuthError::invalid_request(e.to_string()))?;

        let mut clients = self.clients.write().await;
        if clients.contains_key(&client.client_id) {
            return Err(AuthError::invalid_request(format!(
                "Client '{}' already exists",
                client.client_id
            )));
        }
        clients.insert(client.client_id.clone(), client.clone());
        Ok(client.clone())
    }

    async fn list(&self) -> AuthResult<Vec<Client>> {
        let mut clients: Vec<Client> = self.clients.read().await.values().cloned().collect();
        clients.sort_by(|a, b| a.client_id.cmp(&b.client_id));
        Ok(clients)
    }
}

// =============================================================================
// Authorization Codes
// =============================================================================

#[derive(Debug)]
struct CodeEntry {
    record: AuthorizationCodeRecord,
    consumed: bool,
}

/// Authorization codes held in memory.
///
/// Consumed codes are kept until they expire so that a second redemption is
/// reported as `AlreadyConsumed` rather than `NotFound`.
#[derive(Debug, Default)]
pub struct InMemoryAuthorizationCodeStorage {
    codes: RwLock<HashMap<String, CodeEntry>>,
}

impl InMemoryAuthorizationCodeStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored codes, consumed ones included.
    pub async fn len(&self) -> usize {
        self.codes.read().await.len()
    }

    /// Returns `true` if no codes are stored.
    pub async fn is_empty(&self) -> bool {
        self.codes.read().await.is_empty()
    }
}

#[async_trait]
impl AuthorizationCodeStorage for InMemoryAuthorizationCodeStorage {
    async fn store(&self, record: &AuthorizationCodeRecord) -> AuthResult<()> {
        let mut codes = self.codes.write().await;
        if codes.contains_key(&record.code) {
            return Err(AuthError::storage("Authorization code already exists"));
        }
        codes.insert(
            record.code.clone(),
            CodeEntry {
                record: record.clone(),
                consumed: false,
            },
        );
        Ok(())
    }

    async fn fetch_and_invalidate(&self, code: &str) -> AuthResult<CodeFetch> {
        let mut codes = self.codes.write().await;
        let Some(entry) = codes.get_mut(code) else {
            return Ok(CodeFetch::NotFound);
        };

        if entry.consumed {
            return Ok(CodeFetch::AlreadyConsumed);
        }

        entry.consumed = true;
        Ok(CodeFetch::Found(entry.record.clone()))
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let now = OffsetDateTime::now_utc();
        let mut codes = self.codes.write().await;
        let before = codes.len();
        codes.retain(|_, entry| entry.record.expires_at > now);
        Ok((before - codes.len()) as u64)
    }
}

// =============================================================================
// JTI
// =============================================================================

/// Used assertion IDs held in memory.
#[derive(Debug, Default)]
pub struct InMemoryJtiStorage {
    used: RwLock<HashMap<String, OffsetDateTime>>,
}

impl InMemoryJtiStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JtiStorage for InMemoryJtiStorage {
    async fn mark_used(&self, jti: &str, expires_at: OffsetDateTime) -> AuthResult<bool> {
        let mut used = self.used.write().await;
        let now = OffsetDateTime::now_utc();
        match used.get(jti) {
            // An expired entry no longer blocks reuse; the assertion's own
            // exp check rejects stale tokens.
            Some(existing) if *existing > now => Ok(false),
            _ => {
                used.insert(jti.to_string(), expires_at);
                Ok(true)
            }
        }
    }

    async fn is_used(&self, jti: &str) -> AuthResult<bool> {
        let now = OffsetDateTime::now_utc();
        Ok(self
            .used
            .read()
            .await
            .get(jti)
            .is_some_and(|expires_at| *expires_at > now))
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let now = OffsetDateTime::now_utc();
        let mut used = self.used.write().await;
        let before = used.len();
        used.retain(|_, expires_at| *expires_at > now);
        Ok((before - used.len()) as u64)
    }
}
