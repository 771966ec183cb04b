use crate::core::db::{ConnectionOptions, DEFAULT_BACKUP_DIR, DEFAULT_DB_NAME};
use crate::core::{GatewayError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration structure parsed from a TOML file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins; empty means any origin
    pub cors_origins: Vec<String>,
    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 5003,
            cors_origins: Vec::new(),
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// SQLite-related configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database opened at startup and by `connect` without a name
    pub default_name: String,
    /// Directory database names are resolved against
    pub data_dir: PathBuf,
    /// Default directory for `backup` without an explicit one
    pub backup_dir: PathBuf,
    pub journal_mode: String,
    pub foreign_keys: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            default_name: DEFAULT_DB_NAME.to_string(),
            data_dir: PathBuf::from("."),
            backup_dir: PathBuf::from(DEFAULT_BACKUP_DIR),
            journal_mode: "WAL".to_string(),
            foreign_keys: true,
        }
    }
}

impl DatabaseConfig {
    /// Options handed to the connection registry
    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            data_dir: self.data_dir.clone(),
            default_name: self.default_name.clone(),
            journal_mode: self.journal_mode.clone(),
            foreign_keys: self.foreign_keys,
        }
    }
}

/// Loads configuration from a TOML file at the given path.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path.as_ref()).map_err(|e| {
        GatewayError::Config(format!("{}: {}", path.as_ref().display(), e))
    })?;
    toml::from_str(&content).map_err(|e| GatewayError::Config(e.to_string()))
}

/// Location of the per-user config file, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sqlgate").join("config.toml"))
}

/// Resolves the effective configuration.
///
/// An explicit `path` must exist. Without one, the per-user config file is
/// used when present and built-in defaults otherwise. Environment overrides
/// are applied last.
pub fn resolve(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(p) => load_config(p)?,
        None => match default_config_path().filter(|p| p.exists()) {
            Some(p) => load_config(p)?,
            None => Config::default(),
        },
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    Ok(config)
}

impl Config {
    /// Applies `DB_NAME`, `DATA_DIR`, `BACKUP_DIR`, `HOST` and `PORT`
    /// overrides read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(name) = lookup("DB_NAME") {
            self.database.default_name = name;
        }
        if let Some(dir) = lookup("DATA_DIR") {
            self.database.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("BACKUP_DIR") {
            self.database.backup_dir = PathBuf::from(dir);
        }
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| GatewayError::Config(format!("Invalid PORT value: {}", port)))?;
        }
        Ok(())
    }
}
