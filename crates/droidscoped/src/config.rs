//! Daemon configuration.
//!
//! Configuration lives in /etc/droidscope/config.toml, or wherever
//! `DROIDSCOPE_CONFIG` points. A missing file means defaults; every field
//! may be omitted.
//!
//! ```toml
//! [adb]
//! path = "/opt/platform-tools/adb"
//! serial = "emulator-5554"
//!
//! [server]
//! listen = "0.0.0.0:8000"
//! cors = false
//!
//! [cache]
//! static_secs = 300
//! volatile_secs = 30
//!
//! [logging]
//! level = "debug"
//! ```

use anyhow::{Context, Result};
use droidscope_common::{TtlPolicy, DEFAULT_ADB_PATH};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// System configuration directory
pub const SYSTEM_CONFIG_DIR: &str = "/etc/droidscope";
const CONFIG_FILE: &str = "config.toml";

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "DROIDSCOPE_CONFIG";

/// How to reach the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdbConfig {
    /// adb binary, absolute or resolved through PATH
    #[serde(default = "default_adb_path")]
    pub path: String,

    /// Device serial for `adb -s`; unset means the only attached device
    #[serde(default)]
    pub serial: Option<String>,
}

fn default_adb_path() -> String {
    DEFAULT_ADB_PATH.to_string()
}

impl Default for AdbConfig {
    fn default() -> Self {
        Self {
            path: default_adb_path(),
            serial: None,
        }
    }
}

/// HTTP listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Answer cross-origin requests from any origin (browser dashboards)
    #[serde(default = "default_cors")]
    pub cors: bool,
}

fn default_listen() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_cors() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            cors: default_cors(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins when set
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub adb: AdbConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub cache: TtlPolicy,

    #[serde(default)]
    pub logging: LogConfig,
}

impl DaemonConfig {
    /// Load from `DROIDSCOPE_CONFIG` or the system config file.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load from `path`. A missing file yields defaults; a malformed one is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from(SYSTEM_CONFIG_DIR).join(CONFIG_FILE),
    }
}
