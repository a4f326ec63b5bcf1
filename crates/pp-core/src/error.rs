//! Core error types for PeerPrint nodes

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for a PeerPrint node
#[derive(Error, Debug)]
pub enum PpError {
    /// Local address resolution failed
    #[error("Address resolution error: {0}")]
    Address(#[from] AddressResolutionError),

    /// Fileshare reclamation failed
    #[error("Reclaim error: {0}")]
    Reclaim(#[from] ReclaimError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Every local address strategy was tried and none produced a usable address
#[derive(Error, Debug)]
#[error("no usable local address ({})", AttemptList(.attempts))]
pub struct AddressResolutionError {
    /// Failures in the order the strategies were tried
    pub attempts: Vec<StrategyFailure>,
}

impl AddressResolutionError {
    /// Create an error from the recorded strategy failures
    pub fn new(attempts: Vec<StrategyFailure>) -> Self {
        Self { attempts }
    }
}

/// A single strategy's failure, recorded while falling through the pipeline
#[derive(Debug)]
pub struct StrategyFailure {
    /// Name of the strategy that failed
    pub strategy: &'static str,
    /// Why it failed
    pub error: StrategyError,
}

impl fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy, self.error)
    }
}

struct AttemptList<'a>(&'a [StrategyFailure]);

impl fmt::Display for AttemptList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "no strategies configured");
        }
        for (i, attempt) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", attempt)?;
        }
        Ok(())
    }
}

/// Failure of one address resolution strategy.
///
/// These are expected, transient conditions: the resolver falls through to
/// the next strategy instead of surfacing them directly.
#[derive(Error, Debug)]
pub enum StrategyError {
    /// The connectivity check could not select a local endpoint
    #[error("connectivity check to {target} failed: {source}")]
    Connectivity {
        target: String,
        #[source]
        source: std::io::Error,
    },

    /// The selected address could not be bound again
    #[error("address {addr} is not bindable: {source}")]
    BindUnavailable {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Hostname lookup failed
    #[error("failed to resolve {host}: {source}")]
    NameResolution {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// Hostname lookup succeeded but returned no addresses
    #[error("no addresses found for {host}")]
    NoAddress { host: String },

    /// Binding a listener for an ephemeral port failed
    #[error("failed to listen on {addr}: {source}")]
    Listen {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Fileshare reclamation errors
#[derive(Error, Debug)]
pub enum ReclaimError {
    /// Store root does not exist (strict missing-root policy only)
    #[error("Fileshare directory unavailable: {0}")]
    StorageUnavailable(PathBuf),

    /// Store root could not be enumerated
    #[error("Failed to read fileshare directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A regular file could not be unlinked
    #[error("Failed to remove {path}: {source}")]
    EntryRemoval {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A directory could not be removed (strict directory policy only)
    #[error("Failed to remove directory {path}: {source}")]
    DirectoryRemoval {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// The config file or its directory could not be read or written
    #[error("Config I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
