//! Client JWKS fetching and caching.
//!
//! # Caching Strategy
//!
//! - Remote key sets are cached per URI for the configured TTL
//! - A `kid` that is missing from a fresh entry triggers one refetch, at most
//!   once per `min_refresh_interval`, so clients can rotate keys
//! - A failed refetch falls back to the stale entry when it holds the key, and
//!   the next attempt waits `min_refresh_interval`
//!
//! # Security Considerations
//!
//! - Only HTTPS URIs are fetched unless `allow_http` is set
//! - Requests time out and responses are size-limited

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use tokio::sync::RwLock;

use super::{JwksError, JwksSource, KeyResolver, parse_jwk_set, select_key};
use crate::config::JwksCacheConfig;
use crate::oauth::algorithm::SigningAlgorithm;

/// Cached JWKS entry with metadata.
struct CachedJwks {
    jwks: JwkSet,
    fetched_at: Instant,
    /// Last refetch that failed since `fetched_at`.
    failed_at: Option<Instant>,
}

/// In-memory cache for client JWKS.
///
/// # Example
///
/// ```ignore
/// use tokengate_auth::jwks::{ClientJwksCache, JwksSource, KeyResolver};
///
/// let cache = ClientJwksCache::new(JwksCacheConfig::default())?;
/// let key = cache
///     .resolve_key(
///         &JwksSource::Uri("https://client.example.com/jwks.json".into()),
///         Some("key-1"),
///         SigningAlgorithm::RS256,
///     )
///     .await?;
/// ```
pub struct ClientJwksCache {
    cache: Arc<RwLock<HashMap<String, CachedJwks>>>,
    http: reqwest::Client,
    config: JwksCacheConfig,
}

impl ClientJwksCache {
    /// Creates a new JWKS cache with the specified configuration.
    ///
    /// # Errors
    ///
    /// Returns `JwksError::Client` if the HTTP client cannot be built.
    pub fn new(config: JwksCacheConfig) -> Result<Self, JwksError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| JwksError::Client(e.to_string()))?;

        Ok(Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            http,
            config,
        })
    }

    /// Resolves a key from a remote key set, using the cache when possible.
    async fn resolve_remote(
        &self,
        uri: &str,
        kid: Option<&str>,
        alg: SigningAlgorithm,
    ) -> Result<Jwk, JwksError> {
        let mut has_stale_entry = false;
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(uri) {
                let cached_key = select_key(&cached.jwks, kid, alg);
                let fresh = cached.fetched_at.elapsed() < self.config.ttl;
                if fresh && let Some(key) = cached_key {
                    return Ok(key.clone());
                }
                let last_attempt = cached.failed_at.or(fresh.then_some(cached.fetched_at));
                if last_attempt.is_some_and(|at| at.elapsed() < self.config.min_refresh_interval) {
                    tracing::debug!(jwks_uri = %uri, kid = ?kid, "JWKS refresh throttled");
                    return cached_key.cloned().ok_or_else(|| JwksError::KeyNotFound {
                        kid: kid.map(str::to_string),
                    });
                }
                has_stale_entry = true;
            }
        }

        let jwks = match self.fetch_jwks(uri).await {
            Ok(jwks) => jwks,
            Err(e) if has_stale_entry => {
                tracing::warn!(jwks_uri = %uri, error = %e, "JWKS refresh failed, using cached keys");
                let mut cache = self.cache.write().await;
                return match cache.get_mut(uri) {
                    Some(cached) => {
                        cached.failed_at = Some(Instant::now());
                        select_key(&cached.jwks, kid, alg).cloned().ok_or(e)
                    }
                    None => Err(e),
                };
            }
            Err(e) => return Err(e),
        };

        let key = select_key(&jwks, kid, alg).cloned();

        self.cache.write().await.insert(
            uri.to_string(),
            CachedJwks {
                jwks,
                fetched_at: Instant::now(),
                failed_at: None,
            },
        );

        key.ok_or_else(|| JwksError::KeyNotFound {
            kid: kid.map(str::to_string),
        })
    }

    /// Fetches a JWKS from a URI.
    async fn fetch_jwks(&self, uri: &str) -> Result<JwkSet, JwksError> {
        let allowed = uri.starts_with("https://")
            || (self.config.allow_http && uri.starts_with("http://"));
        if !allowed {
            return Err(JwksError::InsecureUri(uri.to_string()));
        }

        tracing::debug!(jwks_uri = %uri, "Fetching client JWKS");

        let mut response = self
            .http
            .get(uri)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(jwks_uri = %uri, error = %e, "Failed to fetch JWKS");
                JwksError::Fetch(e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(JwksError::Status(response.status().as_u16()));
        }

        let limit = self.config.max_response_size;
        if let Some(len) = response.content_length()
            && len as usize > limit
        {
            return Err(JwksError::TooLarge { limit });
        }

        // Chunked bodies carry no length up front.
        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| JwksError::Fetch(e.to_string()))?
        {
            if body.len() + chunk.len() > limit {
                return Err(JwksError::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        parse_jwk_set(&body)
    }

    /// Invalidates a cached JWKS entry.
    pub async fn invalidate(&self, jwks_uri: &str) {
        self.cache.write().await.remove(jwks_uri);
    }

    /// Clears all cached entries.
    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }
}

#[async_trait]
impl KeyResolver for ClientJwksCache {
    async fn resolve_key(
        &self,
        source: &JwksSource,
        kid: Option<&str>,
        alg: SigningAlgorithm,
    ) -> Result<Jwk, JwksError> {
        match source {
            JwksSource::Inline(jwks) => {
                select_key(jwks, kid, alg)
                    .cloned()
                    .ok_or_else(|| JwksError::KeyNotFound {
                        kid: kid.map(str::to_string),
                    })
            }
            JwksSource::Uri(uri) => self.resolve_remote(uri, kid, alg).await,
        }
    }
}
