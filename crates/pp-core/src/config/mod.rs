//! Configuration management for PeerPrint nodes

mod node;
pub mod serde_utils;

pub use node::{DirRemovalPolicy, MissingRootPolicy, NodeConfig, OnlineCheck, ReclaimConfig};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Directory (under the data dir) holding print files managed by the node
pub const PRINT_FILE_DIR: &str = "PeerPrint";

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("peerprint")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Get the default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("peerprint")
}

/// Read a TOML config file.
///
/// A missing file is reported as [`ConfigError::NotFound`] so callers can fall
/// back to defaults.
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => ConfigError::NotFound(path.to_path_buf()),
        _ => io_error(path, source),
    })?;
    Ok(toml::from_str(&content)?)
}

/// Write `config` as TOML, creating parent directories as needed
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
    }
    std::fs::write(path, content).map_err(|source| io_error(path, source))
}

fn io_error(path: &Path, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.to_path_buf(),
        source,
    }
}
