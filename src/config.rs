//! Configuration management for chq.
//!
//! Handles loading configuration from TOML files and environment variables,
//! with support for named ClickHouse connections, the pinned base image, and
//! container runtime settings.

use crate::error::{ChqError, Result};
use crate::image::{ImageRef, DEFAULT_REPOSITORY};
use crate::secrets::SecretRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the configured image pin.
pub const IMAGE_ENV_VAR: &str = "CHQ_BASE_IMAGE";

/// Environment variable consulted when no password reference is configured.
pub const PASSWORD_ENV_VAR: &str = "CLICKHOUSE_PASSWORD";

/// Main configuration structure for chq.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Base image settings.
    #[serde(default)]
    pub image: ImageConfig,

    /// Container runtime settings.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Named ClickHouse connections.
    #[serde(default)]
    pub connections: HashMap<String, ConnectionProfile>,
}

/// Base image configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Repository (and optional tag) that `chq pin` resolves.
    #[serde(default = "default_repository")]
    pub repository: String,

    /// Digest-pinned reference used for every run.
    #[serde(default)]
    pub pin: ImageRef,
}

fn default_repository() -> String {
    DEFAULT_REPOSITORY.to_string()
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            repository: default_repository(),
            pin: ImageRef::default(),
        }
    }
}

/// Container runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Container CLI to invoke (`docker`, `podman`, ...).
    #[serde(default = "default_program")]
    pub program: String,

    /// Directory that relative output paths resolve against.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Extra arguments passed to `run` before the image (e.g. `--network=host`).
    #[serde(default)]
    pub run_args: Vec<String>,
}

fn default_program() -> String {
    "docker".to_string()
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            work_dir: default_work_dir(),
            run_args: Vec::new(),
        }
    }
}

/// A possibly incomplete connection, as written in the config file or on the CLI.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionProfile {
    /// ClickHouse host.
    pub host: Option<String>,

    /// ClickHouse native protocol port. Unset means 9000.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// ClickHouse user.
    pub user: Option<String>,

    /// Where the password lives.
    pub password: Option<SecretRef>,
}

/// Default ClickHouse native protocol port.
pub fn default_port() -> u16 {
    9000
}

impl ConnectionProfile {
    /// Merges another profile into this one, with the other taking precedence.
    pub fn merge(&mut self, other: &ConnectionProfile) {
        if other.host.is_some() {
            self.host = other.host.clone();
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.user.is_some() {
            self.user = other.user.clone();
        }
        if other.password.is_some() {
            self.password = other.password.clone();
        }
    }

    /// Applies `CLICKHOUSE_HOST`, `CLICKHOUSE_PORT`, `CLICKHOUSE_USER` as defaults.
    ///
    /// A missing password falls back to a reference to `CLICKHOUSE_PASSWORD`; the
    /// variable itself is only read when the secret is resolved.
    pub fn apply_env_defaults(&mut self) {
        if self.host.is_none() {
            self.host = std::env::var("CLICKHOUSE_HOST").ok();
        }
        if self.port.is_none() {
            self.port = std::env::var("CLICKHOUSE_PORT")
                .ok()
                .and_then(|port| port.parse().ok());
        }
        if self.user.is_none() {
            self.user = std::env::var("CLICKHOUSE_USER").ok();
        }
        if self.password.is_none() && std::env::var_os(PASSWORD_ENV_VAR).is_some() {
            self.password = Some(SecretRef::Env(PASSWORD_ENV_VAR.to_string()));
        }
    }

    /// Turns the profile into a validated connection config.
    pub fn into_config(self) -> Result<ConnectionConfig> {
        let host = self
            .host
            .ok_or_else(|| ChqError::config("ClickHouse host is required"))?;
        let user = self
            .user
            .ok_or_else(|| ChqError::config("ClickHouse user is required"))?;
        let password = self.password.ok_or_else(|| {
            ChqError::config(format!(
                "ClickHouse password is required (use --password or set {PASSWORD_ENV_VAR})"
            ))
        })?;
        ConnectionConfig::new(host, self.port.unwrap_or_else(default_port), user, password)
    }
}

/// A complete, validated ClickHouse connection.
///
/// Fields are private so the invariants checked in [`ConnectionConfig::new`]
/// hold for the value's whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) user: String,
    pub(crate) password: SecretRef,
}

impl ConnectionConfig {
    /// Creates a connection config, rejecting empty host/user and port 0.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        user: impl Into<String>,
        password: SecretRef,
    ) -> Result<Self> {
        let host = host.into();
        let user = user.into();

        if host.is_empty() {
            return Err(ChqError::config("ClickHouse host must not be empty"));
        }
        if user.is_empty() {
            return Err(ChqError::config("ClickHouse user must not be empty"));
        }
        if port == 0 {
            return Err(ChqError::config("ClickHouse port must be a positive integer"));
        }

        Ok(Self {
            host,
            port,
            user,
            password,
        })
    }

    /// ClickHouse host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// ClickHouse port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// ClickHouse user.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Reference to the password.
    pub fn password(&self) -> &SecretRef {
        &self.password
    }

    /// Returns a display-safe string (no password) for logs.
    pub fn display_string(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chq")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ChqError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            ChqError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Writes the configuration back to `path`, creating parent directories.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ChqError::config(format!("Failed to serialize config: {e}")))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ChqError::config(format!("Failed to create {}: {e}", parent.display()))
                })?;
            }
        }

        std::fs::write(path, content)
            .map_err(|e| ChqError::config(format!("Failed to write config file: {e}")))
    }

    /// Gets a named connection, or the default connection if name is None.
    pub fn get_connection(&self, name: Option<&str>) -> Option<&ConnectionProfile> {
        let key = name.unwrap_or("default");
        self.connections.get(key)
    }

    /// Returns the image pin, honoring the `CHQ_BASE_IMAGE` override.
    pub fn effective_image(&self) -> Result<ImageRef> {
        match std::env::var(IMAGE_ENV_VAR) {
            Ok(value) if !value.trim().is_empty() => {
                ImageRef::parse(&value).map_err(|e| match e {
                    ChqError::Config(msg) => ChqError::config(format!("{IMAGE_ENV_VAR}: {msg}")),
                    other => other,
                })
            }
            _ => Ok(self.image.pin.clone()),
        }
    }
}
