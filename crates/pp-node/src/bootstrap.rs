//! Node bootstrap helpers
//!
//! Decides which address the P2P server should use and waits for it to come
//! up. The server process itself is external.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use pp_core::config::{NodeConfig, OnlineCheck};
use pp_core::error::AddressResolutionError;
use pp_core::types::HealthStatus;

use crate::address::LocalAddr;

/// Where the P2P server address came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerAddr {
    /// Set explicitly in configuration
    Configured(String),
    /// Discovered at startup
    Resolved(LocalAddr),
}

impl fmt::Display for ServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerAddr::Configured(addr) => write!(f, "{}", addr),
            ServerAddr::Resolved(addr) => write!(f, "{}", addr),
        }
    }
}

/// How the node should bring up its P2P server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerPlan {
    /// Address to serve on; `None` when resolution failed
    pub addr: Option<ServerAddr>,
    /// Whether this node must start the server process itself
    pub start_process: bool,
    /// Server health to report
    pub status: HealthStatus,
}

/// Choose the server address.
///
/// A configured address is used as-is and the server is assumed to be
/// managed elsewhere. Otherwise the address is resolved with `resolve` and the
/// node starts the server itself. Resolution failure does not abort startup:
/// the node runs address-less and reports the error as its server status.
pub fn plan_server<F>(config: &NodeConfig, resolve: F) -> ServerPlan
where
    F: FnOnce(&OnlineCheck, Duration) -> Result<LocalAddr, AddressResolutionError>,
{
    if !config.needs_address_resolution() {
        let addr = config.server_addr.trim().to_string();
        tracing::debug!("Using configured P2P server address {}", addr);
        return ServerPlan {
            addr: Some(ServerAddr::Configured(addr)),
            start_process: false,
            status: HealthStatus::Unknown,
        };
    }

    match resolve(&config.online_check, config.resolve_timeout) {
        Ok(addr) => {
            tracing::debug!("Init P2P server (addr={}, start_proc=true)", addr);
            ServerPlan {
                addr: Some(ServerAddr::Resolved(addr)),
                start_process: true,
                status: HealthStatus::Unknown,
            }
        }
        Err(e) => {
            tracing::error!("Failed to resolve a local address for the P2P server: {}", e);
            ServerPlan {
                addr: None,
                start_process: true,
                status: HealthStatus::Error(e.to_string()),
            }
        }
    }
}

/// Readiness check for the external P2P server
#[async_trait]
pub trait Ping: Send + Sync {
    /// Whether the server currently responds
    async fn ping(&self) -> bool;
}

/// Treats the server as ready once its address accepts TCP connections
#[derive(Debug, Clone)]
pub struct TcpPing {
    addr: String,
    timeout: Duration,
}

impl TcpPing {
    /// Ping `addr` with a per-attempt connect timeout
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Ping for TcpPing {
    async fn ping(&self) -> bool {
        matches!(
            tokio::time::timeout(self.timeout, tokio::net::TcpStream::connect(self.addr.as_str())).await,
            Ok(Ok(_))
        )
    }
}

/// Poll `server` up to `attempts` times, sleeping `delay` after each failure.
///
/// Returns whether the server became ready.
pub async fn wait_for_server(server: &dyn Ping, attempts: u32, delay: Duration) -> bool {
    for attempt in 1..=attempts {
        tracing::debug!("Waiting for P2P server (attempt {}/{})...", attempt, attempts);
        if server.ping().await {
            tracing::debug!("P2P server ready");
            return true;
        }
        tokio::time::sleep(delay).await;
    }
    false
}
