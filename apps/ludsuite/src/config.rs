//! # Configuration
//!
//! Settings come from three layers, later layers winning:
//! 1. Built-in defaults
//! 2. An optional TOML file (`--config ludsuite.toml`)
//! 3. Environment variables for the security table
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//!
//! [storage]
//! database = "ludsuite.redb"
//! backend = "redb"        # or "memory"
//!
//! [security]
//! api_key = "change-me"
//! rate_limit = 100        # requests per second, 0 disables
//! cors_origins = "http://localhost:3000"
//! ```
//!
//! ## Environment Variables
//!
//! - `LUDSUITE_API_KEY`: If set, requires Bearer token authentication
//! - `LUDSUITE_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `LUDSUITE_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all

use clap::ValueEnum;
use ludsuite_core::LudError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const API_KEY_ENV: &str = "LUDSUITE_API_KEY";
pub const RATE_LIMIT_ENV: &str = "LUDSUITE_RATE_LIMIT";
pub const CORS_ORIGINS_ENV: &str = "LUDSUITE_CORS_ORIGINS";

/// Default rate limit: 100 requests per second.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

/// Maximum config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// TABLES
// =============================================================================

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-memory maps, lost on exit.
    Memory,
    /// redb database file (ACID, persistent).
    #[default]
    Redb,
}

impl Backend {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Backend::Memory => "memory",
            Backend::Redb => "redb",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default = "default_database")]
    pub database: PathBuf,
    #[serde(default)]
    pub backend: Backend,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            backend: Backend::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityConfig {
    /// `None` disables authentication.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Requests per second; 0 disables rate limiting.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
    /// `None` allows localhost only; `"*"` allows any origin.
    #[serde(default)]
    pub cors_origins: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            rate_limit: DEFAULT_RATE_LIMIT,
            cors_origins: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    8080
}

fn default_database() -> PathBuf {
    PathBuf::from("ludsuite.redb")
}

const fn default_rate_limit() -> u32 {
    DEFAULT_RATE_LIMIT
}

// =============================================================================
// LOADING
// =============================================================================

impl Config {
    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, LudError> {
        toml::from_str(content)
            .map_err(|e| LudError::Validation(format!("Invalid config: {}", e)))
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, LudError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            LudError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(LudError::Validation(format!(
                "Config file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| LudError::IoError(format!("Read config: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Defaults, then the file (if any), then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, LudError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.security.apply_env();
        Ok(config)
    }
}

impl SecurityConfig {
    /// Defaults overridden by the environment.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields whose environment variable is set.
    ///
    /// An empty `LUDSUITE_API_KEY` disables authentication. An unparseable
    /// `LUDSUITE_RATE_LIMIT` is ignored with a warning.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            self.api_key = Some(key);
        }
        self.api_key = self.api_key.take().filter(|k| !k.is_empty());

        if let Ok(raw) = std::env::var(RATE_LIMIT_ENV) {
            match raw.trim().parse() {
                Ok(limit) => self.rate_limit = limit,
                Err(_) => {
                    tracing::warn!("Ignoring invalid {}='{}'", RATE_LIMIT_ENV, raw);
                }
            }
        }

        if let Ok(origins) = std::env::var(CORS_ORIGINS_ENV) {
            self.cors_origins = Some(origins);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = Config::from_toml("").expect("parse");
        assert_eq!(config, Config::default());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, Backend::Redb);
        assert_eq!(config.security.rate_limit, DEFAULT_RATE_LIMIT);
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 9000

            [storage]
            backend = "memory"

            [security]
            rate_limit = 0
            "#,
        )
        .expect("parse");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.backend, Backend::Memory);
        assert_eq!(config.storage.database, PathBuf::from("ludsuite.redb"));
        assert_eq!(config.security.rate_limit, 0);
        assert_eq!(config.security.api_key, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Config::from_toml("[server]\nhots = \"0.0.0.0\"").is_err());
        assert!(Config::from_toml("[storage]\nbackend = \"file\"").is_err());
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("ludsuite.toml");
        std::fs::write(&path, "[storage]\ndatabase = \"data/lud.redb\"\n").expect("write");
        let config = Config::from_file(&path).expect("load");
        assert_eq!(config.storage.database, PathBuf::from("data/lud.redb"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = Config::from_file(Path::new("/definitely/not/here.toml")).expect_err("missing");
        assert!(matches!(err, LudError::IoError(_)));
    }
}
