//! Connection settings
//!
//! Read once at startup and handed to whoever needs them. `.json` files are
//! parsed as JSON, everything else as TOML.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::SetupError;
use crate::transfer::DEFAULT_WORKERS;

fn default_port() -> u16 {
    22
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SshConfig {
    #[serde(default)]
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default, alias = "ssh_key_path")]
    pub private_key_path: PathBuf,
    #[serde(default)]
    pub passphrase: Option<String>,
    /// Seconds a blocking SSH call may stall before it counts as timed out; 0 disables
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl SshConfig {
    /// Load and validate `path`
    pub fn load(path: &Path) -> Result<Self, SetupError> {
        let data = std::fs::read_to_string(path).map_err(|source| SetupError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json_str(&data)
        } else {
            Self::from_toml_str(&data)
        }
        .map_err(|message| SetupError::ConfigParse {
            path: path.to_path_buf(),
            message,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(data: &str) -> Result<Self, String> {
        toml::from_str(data).map_err(|e| e.to_string())
    }

    pub fn from_json_str(data: &str) -> Result<Self, String> {
        serde_json::from_str(data).map_err(|e| e.to_string())
    }

    /// Required fields present, key file on disk, at least one worker
    pub fn validate(&self) -> Result<(), SetupError> {
        if self.hostname.trim().is_empty() {
            return Err(SetupError::MissingField("hostname"));
        }
        if self.username.trim().is_empty() {
            return Err(SetupError::MissingField("username"));
        }
        if self.private_key_path.as_os_str().is_empty() {
            return Err(SetupError::MissingField("private_key_path"));
        }
        if !self.private_key_path.is_file() {
            return Err(SetupError::KeyNotFound(self.private_key_path.clone()));
        }
        if self.workers == 0 {
            return Err(SetupError::NoWorkers);
        }
        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}

pub fn config_dir() -> PathBuf {
    #[cfg(windows)]
    {
        if let Ok(appdata) = std::env::var("APPDATA") { return PathBuf::from(appdata).join("sizesync"); }
    }
    // Unix-like default
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".config").join("sizesync");
    }
    PathBuf::from(".sizesync")
}

pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}
