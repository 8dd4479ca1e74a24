//! Token endpoint configuration.
//!
//! This module provides the configuration types consumed by the client
//! authenticator, the assertion validator, the JWKS cache and the token
//! endpoint service.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration of the token endpoint.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// issuer = "https://as.example.com"
/// token_endpoint = "https://as.example.com/token"
///
/// [auth.assertion]
/// max_lifetime = "5m"
/// leeway = "30s"
///
/// [auth.jwks]
/// ttl = "1h"
/// allow_http = false
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Authorization server issuer identifier.
    pub issuer: String,

    /// Absolute URL of the token endpoint.
    /// Defaults to `{issuer}/token` when not set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_endpoint: Option<String>,

    /// Lifetime of authorization codes handed out by the code issuer.
    #[serde(with = "humantime_serde")]
    pub authorization_code_lifetime: Duration,

    /// Client assertion (RFC 7523) validation settings.
    pub assertion: AssertionConfig,

    /// Client JWKS retrieval and caching settings.
    pub jwks: JwksCacheConfig,

    /// PKCE settings.
    pub pkce: PkceConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080".to_string(),
            token_endpoint: None,
            authorization_code_lifetime: Duration::from_secs(600), // 10 minutes
            assertion: AssertionConfig::default(),
            jwks: JwksCacheConfig::default(),
            pkce: PkceConfig::default(),
        }
    }
}

impl AuthConfig {
    /// Returns the token endpoint URL, derived from the issuer if unset.
    #[must_use]
    pub fn token_endpoint_url(&self) -> String {
        match &self.token_endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("{}/token", self.issuer.trim_end_matches('/')),
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The issuer is empty or not an absolute URL
    /// - The token endpoint is not an absolute URL
    /// - The assertion lifetime or JWKS timeouts are zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::InvalidValue(
                "issuer cannot be empty".to_string(),
            ));
        }

        if url::Url::parse(&self.issuer).is_err() {
            return Err(ConfigError::InvalidValue(format!(
                "issuer must be an absolute URL, got '{}'",
                self.issuer
            )));
        }

        if let Some(endpoint) = &self.token_endpoint
            && url::Url::parse(endpoint).is_err()
        {
            return Err(ConfigError::InvalidValue(format!(
                "token_endpoint must be an absolute URL, got '{}'",
                endpoint
            )));
        }

        if self.authorization_code_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "authorization_code_lifetime must be > 0".to_string(),
            ));
        }

        if self.assertion.max_lifetime.is_zero() {
            return Err(ConfigError::InvalidValue(
                "assertion max_lifetime must be > 0".to_string(),
            ));
        }

        if self.jwks.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "jwks request_timeout must be > 0".to_string(),
            ));
        }

        if self.jwks.max_response_size == 0 {
            return Err(ConfigError::InvalidValue(
                "jwks max_response_size must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Client assertion validation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssertionConfig {
    /// Maximum distance between now and the assertion `exp`.
    #[serde(with = "humantime_serde")]
    pub max_lifetime: Duration,

    /// Clock skew tolerated on `exp`, `nbf` and `iat`.
    #[serde(with = "humantime_serde")]
    pub leeway: Duration,
}

impl Default for AssertionConfig {
    fn default() -> Self {
        Self {
            max_lifetime: Duration::from_secs(300),
            leeway: Duration::from_secs(30),
        }
    }
}

/// Client JWKS cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct JwksCacheConfig {
    /// How long a fetched key set stays fresh.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,

    /// Timeout for a single JWKS request.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Maximum accepted JWKS document size in bytes.
    pub max_response_size: usize,

    /// Minimum time between forced refreshes of one URI after a `kid` miss.
    #[serde(with = "humantime_serde")]
    pub min_refresh_interval: Duration,

    /// Allow plain `http://` JWKS URIs. Only meant for local development.
    pub allow_http: bool,
}

impl Default for JwksCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            request_timeout: Duration::from_secs(10),
            max_response_size: 1024 * 1024,
            min_refresh_interval: Duration::from_secs(60),
            allow_http: false,
        }
    }
}

impl JwksCacheConfig {
    /// Sets the cache TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the maximum response size.
    #[must_use]
    pub fn with_max_response_size(mut self, size: usize) -> Self {
        self.max_response_size = size;
        self
    }

    /// Sets the minimum interval between forced refreshes.
    #[must_use]
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Allows `http://` JWKS URIs.
    #[must_use]
    pub fn with_allow_http(mut self, allow: bool) -> Self {
        self.allow_http = allow;
        self
    }
}

/// PKCE settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PkceConfig {
    /// Reject verifiers that are not 43-128 unreserved characters before
    /// comparing them with the stored challenge.
    pub enforce_verifier_format: bool,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}
