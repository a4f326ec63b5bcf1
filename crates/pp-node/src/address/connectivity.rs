//! Connectivity-check address resolution

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use pp_core::config::OnlineCheck;
use pp_core::error::StrategyError;

use super::{prefer_ipv4, AddressStrategy};

/// Picks the local endpoint the OS would use to reach `target`.
///
/// Connecting a UDP socket sends nothing; it only makes the kernel select a
/// source address and port, which are then read back and re-bound to confirm
/// they are usable.
#[derive(Debug, Clone)]
pub struct ConnectivityCheck {
    target: OnlineCheck,
    timeout: Duration,
}

impl ConnectivityCheck {
    /// Create a check against `target` with the given socket I/O timeout
    pub fn new(target: OnlineCheck, timeout: Duration) -> Self {
        Self { target, timeout }
    }

    /// Ask the OS for the local endpoint routed towards the target
    pub fn local_endpoint(&self) -> Result<SocketAddr, StrategyError> {
        let target = self.target_addr().map_err(|source| self.connect_error(source))?;

        // Dropped before returning, so the port is free for the bind check.
        let socket = UdpSocket::bind(unspecified_for(&target))
            .map_err(|source| self.connect_error(source))?;

        // A zero timeout is rejected by the OS; treat it as "no timeout".
        let timeout = (!self.timeout.is_zero()).then_some(self.timeout);
        socket
            .set_read_timeout(timeout)
            .and_then(|_| socket.set_write_timeout(timeout))
            .and_then(|_| socket.connect(target))
            .and_then(|_| socket.local_addr())
            .map_err(|source| self.connect_error(source))
    }

    fn target_addr(&self) -> io::Result<SocketAddr> {
        let addrs: Vec<SocketAddr> = (self.target.host.as_str(), self.target.port)
            .to_socket_addrs()?
            .collect();
        let ip = prefer_ipv4(addrs.iter().map(SocketAddr::ip)).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no addresses for {}", self.target.host),
            )
        })?;
        Ok(SocketAddr::new(ip, self.target.port))
    }

    fn connect_error(&self, source: io::Error) -> StrategyError {
        StrategyError::Connectivity {
            target: self.target.to_string(),
            source,
        }
    }
}

impl AddressStrategy for ConnectivityCheck {
    fn name(&self) -> &'static str {
        "connectivity check"
    }

    fn resolve(&self) -> Result<SocketAddr, StrategyError> {
        let addr = self.local_endpoint()?;
        check_bindable(addr)?;
        Ok(addr)
    }
}

/// Whether a datagram socket can currently be bound to exactly `addr`
pub fn can_bind(addr: SocketAddr) -> bool {
    check_bindable(addr).is_ok()
}

fn check_bindable(addr: SocketAddr) -> Result<(), StrategyError> {
    UdpSocket::bind(addr)
        .map(drop)
        .map_err(|source| StrategyError::BindUnavailable { addr, source })
}

fn unspecified_for(target: &SocketAddr) -> SocketAddr {
    let ip = match target {
        SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };
    SocketAddr::new(ip, 0)
}
