use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;
use tokengate_auth::config::AuthConfig;
use tokengate_auth::types::Client;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Token endpoint configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// Lifetimes of the tokens issued by the server
    #[serde(default)]
    pub tokens: TokensConfig,
    /// Housekeeping of the in-memory code and assertion-ID stores
    #[serde(default)]
    pub storage: StorageConfig,
    /// Client registrations seeded into the in-memory store at startup
    #[serde(default)]
    pub clients: Vec<Client>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Auth validation
        self.auth.validate().map_err(|e| format!("auth: {e}"))?;
        if self.tokens.access_token_lifetime.is_zero() {
            return Err("tokens.access_token_lifetime must be > 0".into());
        }
        if self.storage.cleanup_interval.is_zero() {
            return Err("storage.cleanup_interval must be > 0".into());
        }
        // Client registrations
        let mut seen = HashSet::new();
        for client in &self.clients {
            client
                .validate()
                .map_err(|e| format!("clients[{}]: {e}", client.client_id))?;
            if !seen.insert(client.client_id.as_str()) {
                return Err(format!("clients: duplicate client_id '{}'", client.client_id));
            }
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        let ip: std::net::IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(std::net::IpAddr::from([0, 0, 0, 0]));
        SocketAddr::from((ip, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokensConfig {
    #[serde(default = "default_access_token_lifetime", with = "humantime_serde")]
    pub access_token_lifetime: Duration,
    /// Issue a refresh token to clients registered for the refresh_token grant
    #[serde(default = "default_true")]
    pub refresh_tokens: bool,
}
fn default_access_token_lifetime() -> Duration {
    Duration::from_secs(3600)
}
fn default_true() -> bool {
    true
}
impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            access_token_lifetime: default_access_token_lifetime(),
            refresh_tokens: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Period of the sweep that drops expired codes and assertion IDs
    #[serde(default = "default_cleanup_interval", with = "humantime_serde")]
    pub cleanup_interval: Duration,
}
fn default_cleanup_interval() -> Duration {
    Duration::from_secs(60)
}
impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: default_cleanup_interval(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_PATH: &str = "tokengate.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        } else if path.is_some() {
            return Err(format!("config file not found: {}", pathbuf.display()));
        }
        // Environment variable overrides, e.g., TOKENGATE__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("TOKENGATE")
                .prefix_separator("__")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
