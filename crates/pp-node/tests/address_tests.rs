//! Local address resolution tests
//!
//! These use loopback targets and fake name resolvers so they run offline.

use std::collections::HashMap;
use std::io;
use std::net::{IpAddr, SocketAddr, TcpListener};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pp_core::config::OnlineCheck;
use pp_core::error::StrategyError;
use pp_node::address::{
    AddressResolver, AddressStrategy, ConnectivityCheck, HostnameFallback, NameResolver,
};

/// Resolver with a fixed hostname table that counts lookups
#[derive(Clone)]
struct StaticResolver {
    hostname: String,
    table: HashMap<String, IpAddr>,
    lookups: Arc<AtomicUsize>,
}

impl StaticResolver {
    fn new(hostname: &str, entries: &[(&str, &str)]) -> Self {
        Self {
            hostname: hostname.to_string(),
            table: entries
                .iter()
                .map(|(host, ip)| (host.to_string(), ip.parse().unwrap()))
                .collect(),
            lookups: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl NameResolver for StaticResolver {
    fn local_hostname(&self) -> io::Result<String> {
        Ok(self.hostname.clone())
    }

    fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.table
            .get(host)
            .map(|ip| vec![*ip])
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "unknown host"))
    }
}

/// Stands in for a connectivity check whose result failed the re-bind check
struct UnbindableRoute;

impl AddressStrategy for UnbindableRoute {
    fn name(&self) -> &'static str {
        "connectivity check"
    }

    fn resolve(&self) -> Result<SocketAddr, StrategyError> {
        Err(StrategyError::BindUnavailable {
            addr: "10.20.30.40:5555".parse().unwrap(),
            source: io::Error::new(io::ErrorKind::AddrNotAvailable, "cannot bind"),
        })
    }
}

fn loopback_check() -> OnlineCheck {
    OnlineCheck {
        host: "127.0.0.1".to_string(),
        port: 9,
    }
}

#[test]
fn test_connectivity_result_is_returned_without_fallback() {
    let resolver = StaticResolver::new("octopi", &[("octopi.local", "127.0.0.1")]);
    let lookups = resolver.lookups.clone();

    let addr = AddressResolver::new()
        .with_strategy(ConnectivityCheck::new(loopback_check(), Duration::from_secs(3)))
        .with_strategy(HostnameFallback::new(resolver))
        .resolve()
        .unwrap();

    assert!(addr.ip().is_loopback());
    assert_ne!(addr.port(), 0);
    assert_eq!(addr.to_string(), format!("127.0.0.1:{}", addr.port()));
    assert_eq!(lookups.load(Ordering::SeqCst), 0);
}

#[test]
fn test_failed_rebind_falls_back_to_hostname() {
    let resolver = StaticResolver::new("octopi", &[("octopi.local", "127.0.0.1")]);

    let addr = AddressResolver::new()
        .with_strategy(UnbindableRoute)
        .with_strategy(HostnameFallback::new(resolver))
        .resolve()
        .unwrap();

    assert_eq!(addr.ip(), "127.0.0.1".parse::<IpAddr>().unwrap());
    assert!(addr.port() > 0);

    // The listener used to pick the port is closed again.
    let rebound = TcpListener::bind(addr.socket_addr()).unwrap();
    assert_eq!(rebound.local_addr().unwrap(), addr.socket_addr());
}

#[test]
fn test_fallback_uses_bare_hostname_without_mdns() {
    let resolver = StaticResolver::new("octopi", &[("octopi", "127.0.0.1")]);
    let lookups = resolver.lookups.clone();

    let addr = AddressResolver::new()
        .with_strategy(UnbindableRoute)
        .with_strategy(HostnameFallback::new(resolver))
        .resolve()
        .unwrap();

    assert!(addr.ip().is_loopback());
    assert_eq!(lookups.load(Ordering::SeqCst), 2);
}

#[test]
fn test_total_failure_is_resolution_error() {
    // TEST-NET-1 is never a local address, so the fallback bind fails.
    let resolver = StaticResolver::new("octopi", &[("octopi.local", "192.0.2.1")]);

    let err = AddressResolver::new()
        .with_strategy(UnbindableRoute)
        .with_strategy(HostnameFallback::new(resolver))
        .resolve()
        .unwrap_err();

    assert_eq!(err.attempts.len(), 2);
    assert_eq!(err.attempts[0].strategy, "connectivity check");
    assert!(matches!(
        err.attempts[0].error,
        StrategyError::BindUnavailable { .. }
    ));
    // The fallback failed at bind time, before the OS assigned a port, so
    // there was never a listener to leak.
    assert!(matches!(
        err.attempts[1].error,
        StrategyError::Listen { addr, .. } if addr.port() == 0 && !addr.ip().is_loopback()
    ));
}

#[test]
fn test_unreachable_check_target_falls_back() {
    let resolver = StaticResolver::new("octopi", &[("octopi.local", "127.0.0.1")]);
    let unresolvable = OnlineCheck {
        host: "online-check.invalid".to_string(),
        port: 53,
    };

    let addr = AddressResolver::new()
        .with_strategy(ConnectivityCheck::new(unresolvable, Duration::from_secs(1)))
        .with_strategy(HostnameFallback::new(resolver))
        .resolve()
        .unwrap();

    assert!(addr.ip().is_loopback());
}
