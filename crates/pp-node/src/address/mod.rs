//! Local address discovery
//!
//! Finds an `ip:port` pair the node can advertise and bind its P2P server to.
//! Strategies are tried in order until one yields a usable address:
//!
//! 1. [`ConnectivityCheck`]: "connect" a datagram socket to a well-known
//!    endpoint so the OS picks the routed interface, then check that the
//!    chosen endpoint can actually be bound.
//! 2. [`HostnameFallback`]: resolve `<hostname>.local` (falling back to the
//!    bare hostname) and let the OS assign a free port on that address.
//!
//! Discovery is inherently racy: a port that was bindable when checked may be
//! taken before the caller binds it. Callers own retry policy.

mod hostname;
mod connectivity;

pub use hostname::{HostnameFallback, NameResolver, SystemResolver};
pub use connectivity::{can_bind, ConnectivityCheck};

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use pp_core::config::OnlineCheck;
use pp_core::error::{AddressResolutionError, StrategyError, StrategyFailure};

/// A resolved local endpoint, rendered as `host:port`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalAddr(SocketAddr);

impl LocalAddr {
    /// Wrap a socket address
    pub fn new(addr: SocketAddr) -> Self {
        Self(addr)
    }

    /// IP address
    pub fn ip(&self) -> IpAddr {
        self.0.ip()
    }

    /// Port
    pub fn port(&self) -> u16 {
        self.0.port()
    }

    /// The underlying socket address
    pub fn socket_addr(&self) -> SocketAddr {
        self.0
    }
}

impl fmt::Display for LocalAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<SocketAddr> for LocalAddr {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

/// One way of finding a usable local address
pub trait AddressStrategy: Send + Sync {
    /// Short name used in logs and error reports
    fn name(&self) -> &'static str;

    /// Produce an address that was bindable at the time of the call
    fn resolve(&self) -> Result<SocketAddr, StrategyError>;
}

/// Ordered pipeline of address strategies; the first success wins
#[derive(Default)]
pub struct AddressResolver {
    strategies: Vec<Box<dyn AddressStrategy>>,
}

impl AddressResolver {
    /// Create an empty resolver
    pub fn new() -> Self {
        Self::default()
    }

    /// The default pipeline: connectivity check, then hostname fallback
    pub fn system(online_check: &OnlineCheck, timeout: Duration) -> Self {
        Self::new()
            .with_strategy(ConnectivityCheck::new(online_check.clone(), timeout))
            .with_strategy(HostnameFallback::new(SystemResolver))
    }

    /// Append a strategy to the end of the pipeline
    pub fn with_strategy(mut self, strategy: impl AddressStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    /// Whether no strategies are configured
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Try each strategy in order.
    ///
    /// Returns the first usable address, or every strategy's failure if none
    /// produced one.
    pub fn resolve(&self) -> Result<LocalAddr, AddressResolutionError> {
        let mut attempts = Vec::with_capacity(self.strategies.len());

        for (i, strategy) in self.strategies.iter().enumerate() {
            match strategy.resolve() {
                Ok(addr) => {
                    tracing::debug!("Resolved local address {} via {}", addr, strategy.name());
                    return Ok(LocalAddr(addr));
                }
                Err(error) => {
                    match self.strategies.get(i + 1) {
                        Some(next) => tracing::warn!(
                            "Local address resolution via {} failed ({}); attempting {}",
                            strategy.name(),
                            error,
                            next.name()
                        ),
                        None => tracing::debug!(
                            "Local address resolution via {} failed: {}",
                            strategy.name(),
                            error
                        ),
                    }
                    attempts.push(StrategyFailure {
                        strategy: strategy.name(),
                        error,
                    });
                }
            }
        }

        Err(AddressResolutionError::new(attempts))
    }
}

/// Resolve a local `host:port` suitable for binding the P2P server.
///
/// `timeout` bounds the connectivity check only; binds and hostname lookups
/// use OS defaults.
pub fn resolve_local_address(
    online_check: &OnlineCheck,
    timeout: Duration,
) -> Result<LocalAddr, AddressResolutionError> {
    AddressResolver::system(online_check, timeout).resolve()
}

/// Pick an IPv4 address if there is one, otherwise the first address
fn prefer_ipv4(addrs: impl IntoIterator<Item = IpAddr>) -> Option<IpAddr> {
    let mut first = None;
    for addr in addrs {
        if addr.is_ipv4() {
            return Some(addr);
        }
        first.get_or_insert(addr);
    }
    first
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Fixed(SocketAddr);

    impl AddressStrategy for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn resolve(&self) -> Result<SocketAddr, StrategyError> {
            Ok(self.0)
        }
    }

    struct Failing(Arc<AtomicUsize>);

    impl AddressStrategy for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn resolve(&self) -> Result<SocketAddr, StrategyError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(StrategyError::BindUnavailable {
                addr: "10.1.2.3:4567".parse().unwrap(),
                source: io::Error::new(io::ErrorKind::AddrNotAvailable, "not here"),
            })
        }
    }

    #[test]
    fn test_first_success_wins() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = AddressResolver::new()
            .with_strategy(Fixed("192.168.0.9:4100".parse().unwrap()))
            .with_strategy(Failing(calls.clone()));

        let addr = resolver.resolve().unwrap();
        assert_eq!(addr.to_string(), "192.168.0.9:4100");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_falls_through_to_next_strategy() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = AddressResolver::new()
            .with_strategy(Failing(calls.clone()))
            .with_strategy(Fixed("10.0.0.7:0".parse().unwrap()));

        let addr = resolver.resolve().unwrap();
        assert_eq!(addr.ip(), "10.0.0.7".parse::<IpAddr>().unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_exhaustion_reports_every_attempt() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = AddressResolver::new()
            .with_strategy(Failing(calls.clone()))
            .with_strategy(Failing(calls.clone()));

        let err = resolver.resolve().unwrap_err();
        assert_eq!(err.attempts.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_empty_resolver_fails() {
        let resolver = AddressResolver::new();
        assert!(resolver.is_empty());
        assert!(resolver.resolve().unwrap_err().attempts.is_empty());
    }

    #[test]
    fn test_system_pipeline_order() {
        let resolver = AddressResolver::system(&OnlineCheck::default(), Duration::from_secs(1));
        let names: Vec<_> = resolver.strategies.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["connectivity check", "hostname"]);
    }

    #[test]
    fn test_prefer_ipv4() {
        let v6: IpAddr = "fe80::1".parse().unwrap();
        let v4: IpAddr = "192.168.1.4".parse().unwrap();
        assert_eq!(prefer_ipv4([v6, v4]), Some(v4));
        assert_eq!(prefer_ipv4([v6]), Some(v6));
        assert_eq!(prefer_ipv4(Vec::<IpAddr>::new()), None);
    }

    #[test]
    fn test_local_addr_display() {
        let addr = LocalAddr::new("1.2.3.4:1234".parse().unwrap());
        assert_eq!(addr.to_string(), "1.2.3.4:1234");
        assert_eq!(addr.port(), 1234);
    }
}
