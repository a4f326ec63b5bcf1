//! Node configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::serde_utils::duration_secs;

/// Configuration for a PeerPrint node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Address the P2P server binds to.
    ///
    /// Empty means "discover a local address and start the server process".
    pub server_addr: String,

    /// Endpoint used by the connectivity check to pick a local interface
    pub online_check: OnlineCheck,

    /// I/O timeout applied to the connectivity check
    #[serde(with = "duration_secs")]
    pub resolve_timeout: Duration,

    /// Content-addressed store shared with the file distribution layer
    pub fileshare_dir: PathBuf,

    /// How many times to ping the P2P server after starting it
    pub connect_attempts: u32,

    /// Delay between readiness pings
    #[serde(with = "duration_secs")]
    pub connect_delay: Duration,

    /// Fileshare reclamation settings
    pub reclaim: ReclaimConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            server_addr: String::new(),
            online_check: OnlineCheck::default(),
            resolve_timeout: Duration::from_secs(3),
            fileshare_dir: super::default_data_dir()
                .join(super::PRINT_FILE_DIR)
                .join("fileshare"),
            connect_attempts: 3,
            connect_delay: Duration::from_secs(1),
            reclaim: ReclaimConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Whether the server address must be discovered at startup
    pub fn needs_address_resolution(&self) -> bool {
        self.server_addr.trim().is_empty()
    }
}

/// Well-known endpoint used only to make the OS choose a routed local address.
///
/// No data is ever sent to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnlineCheck {
    /// Host name or IP literal
    pub host: String,
    /// Port
    pub port: u16,
}

impl Default for OnlineCheck {
    fn default() -> Self {
        Self {
            host: "1.1.1.1".to_string(),
            port: 53,
        }
    }
}

impl fmt::Display for OnlineCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Fileshare reclamation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReclaimConfig {
    /// Interval between periodic reclamation passes
    #[serde(with = "duration_secs")]
    pub interval: Duration,

    /// What to do when a stale directory cannot be fully removed
    pub directory_removal: DirRemovalPolicy,

    /// What to do when the fileshare directory does not exist
    pub missing_root: MissingRootPolicy,
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            directory_removal: DirRemovalPolicy::BestEffort,
            missing_root: MissingRootPolicy::NoOp,
        }
    }
}

/// Handling of errors while removing a stale directory entry.
///
/// Regular files are always removed strictly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirRemovalPolicy {
    /// Ignore removal errors; a later pass retries whatever is left
    #[default]
    BestEffort,
    /// Propagate the first removal error
    Strict,
}

/// Handling of a fileshare directory that does not exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingRootPolicy {
    /// Nothing to reclaim
    #[default]
    NoOp,
    /// Report `ReclaimError::StorageUnavailable`
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NodeConfig::default();
        assert!(config.needs_address_resolution());
        assert_eq!(config.online_check.to_string(), "1.1.1.1:53");
        assert_eq!(config.resolve_timeout, Duration::from_secs(3));
        assert_eq!(config.connect_attempts, 3);
        assert!(config.fileshare_dir.ends_with("PeerPrint/fileshare"));
        assert_eq!(config.reclaim.directory_removal, DirRemovalPolicy::BestEffort);
        assert_eq!(config.reclaim.missing_root, MissingRootPolicy::NoOp);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: NodeConfig = toml::from_str(
            r#"
server_addr = "10.0.0.4:4000"

[online_check]
host = "example.org"
port = 443

[reclaim]
interval = 60
directory_removal = "strict"
"#,
        )
        .unwrap();

        assert!(!config.needs_address_resolution());
        assert_eq!(config.online_check.host, "example.org");
        assert_eq!(config.reclaim.interval, Duration::from_secs(60));
        assert_eq!(config.reclaim.directory_removal, DirRemovalPolicy::Strict);
        assert_eq!(config.reclaim.missing_root, MissingRootPolicy::NoOp);
        assert_eq!(config.connect_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_whitespace_server_addr_needs_resolution() {
        let config = NodeConfig {
            server_addr: "  ".to_string(),
            ..NodeConfig::default()
        };
        assert!(config.needs_address_resolution());
    }
}
