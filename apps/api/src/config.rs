//! # API Configuration
//!
//! ## Configuration Sources (Priority Order)
//! 1. Environment variables (`TALLY_*`)
//! 2. Config file (`--config <path>`, `TALLY_CONFIG`, else `tally.toml` in
//!    the platform config directory)
//! 3. Defaults (this file)
//!
//! Every section of the TOML file is optional:
//! ```toml
//! [server]
//! port = 8080
//!
//! [auth]
//! jwt_secret = "..."
//!
//! [audit]
//! mode = "inline"
//! ```

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tally_db::AuditMode;

/// Signing secret used when none is configured. Startup warns about it.
pub const DEV_JWT_SECRET: &str = "tally-dev-secret-change-in-production";

/// Minimum length of a configured signing secret, in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Seven days.
pub const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 7 * 24 * 60 * 60;

const CONFIG_FILE_NAME: &str = "tally.toml";

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub audit: AuditConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: default_database_path(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_lifetime_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_lifetime_secs: DEFAULT_TOKEN_LIFETIME_SECS,
        }
    }
}

impl AuthConfig {
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub mode: AuditMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, for terminals
    #[default]
    Pretty,

    /// One JSON object per line, for log shippers
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Pretty => f.write_str("pretty"),
            LogFormat::Json => f.write_str("json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!(
                "unknown log format '{}', expected 'pretty' or 'json'",
                other
            )),
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

impl ApiConfig {
    /// Loads defaults, then the config file, then the environment.
    ///
    /// An explicit `path` (or `TALLY_CONFIG`) must exist; the platform
    /// default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| env::var_os("TALLY_CONFIG").map(PathBuf::from));

        let mut config = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => ApiConfig::default(),
            },
        };

        config.apply_env(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Overrides fields from `TALLY_*` variables, read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("TALLY_BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Some(v) = lookup("TALLY_PORT") {
            self.server.port = parse_var("TALLY_PORT", &v)?;
        }
        if let Some(v) = lookup("TALLY_DATABASE_PATH") {
            self.database.path = PathBuf::from(v);
        }
        if let Some(v) = lookup("TALLY_DB_MAX_CONNECTIONS") {
            self.database.max_connections = parse_var("TALLY_DB_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = lookup("TALLY_JWT_SECRET") {
            self.auth.jwt_secret = v;
        }
        if let Some(v) = lookup("TALLY_TOKEN_LIFETIME_SECS") {
            self.auth.token_lifetime_secs = parse_var("TALLY_TOKEN_LIFETIME_SECS", &v)?;
        }
        if let Some(v) = lookup("TALLY_AUDIT_MODE") {
            self.audit.mode = parse_var("TALLY_AUDIT_MODE", &v)?;
        }
        if let Some(v) = lookup("TALLY_LOG_FORMAT") {
            self.logging.format = parse_var("TALLY_LOG_FORMAT", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue("server.port".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "database.max_connections".to_string(),
            ));
        }
        if self.auth.token_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue(
                "auth.token_lifetime_secs".to_string(),
            ));
        }
        if !self.auth.uses_dev_secret() && self.auth.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::WeakSecret);
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind_addr, self.server.port)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "tally", "back-office")
}

fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}

fn default_database_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("tally.db"))
        .unwrap_or_else(|| PathBuf::from("./tally.db"))
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(String),

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("auth.jwt_secret must be at least {MIN_JWT_SECRET_LEN} bytes")]
    WeakSecret,
}
