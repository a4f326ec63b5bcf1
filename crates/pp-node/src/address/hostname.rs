//! Hostname-based (mDNS first) address resolution

use std::io;
use std::net::{IpAddr, SocketAddr, TcpListener, ToSocketAddrs};

use pp_core::error::StrategyError;

use super::{prefer_ipv4, AddressStrategy};

/// Name lookups used by [`HostnameFallback`]
pub trait NameResolver: Send + Sync {
    /// This machine's hostname
    fn local_hostname(&self) -> io::Result<String>;

    /// Resolve `host` to its addresses
    fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolves through the operating system.
///
/// `.local` names are answered by the system resolver where multicast DNS is
/// configured (nss-mdns, mDNSResponder).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl NameResolver for SystemResolver {
    fn local_hostname(&self) -> io::Result<String> {
        gethostname::gethostname().into_string().map_err(|raw| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("hostname {:?} is not valid UTF-8", raw),
            )
        })
    }

    fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        Ok((host, 0).to_socket_addrs()?.map(|addr| addr.ip()).collect())
    }
}

/// Resolves `<hostname>.local`, falling back to the bare hostname, then binds
/// an ephemeral TCP port on the result to obtain a free port.
#[derive(Debug, Clone, Default)]
pub struct HostnameFallback<R = SystemResolver> {
    resolver: R,
}

impl<R: NameResolver> HostnameFallback<R> {
    /// Create a fallback strategy using `resolver`
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    /// The address this machine's hostname resolves to
    pub fn candidate_host(&self) -> Result<IpAddr, StrategyError> {
        let hostname =
            self.resolver
                .local_hostname()
                .map_err(|source| StrategyError::NameResolution {
                    host: "local hostname".to_string(),
                    source,
                })?;

        let mdns_name = if hostname.ends_with(".local") {
            hostname.clone()
        } else {
            format!("{}.local", hostname)
        };

        let addrs = match self.resolver.lookup(&mdns_name) {
            Ok(addrs) if !addrs.is_empty() => addrs,
            Ok(_) => {
                tracing::debug!("{} resolved to no addresses, trying {}", mdns_name, hostname);
                self.lookup_bare(&hostname)?
            }
            Err(e) => {
                tracing::debug!("Failed to resolve {} ({}), trying {}", mdns_name, e, hostname);
                self.lookup_bare(&hostname)?
            }
        };

        prefer_ipv4(addrs).ok_or(StrategyError::NoAddress { host: hostname })
    }

    fn lookup_bare(&self, hostname: &str) -> Result<Vec<IpAddr>, StrategyError> {
        self.resolver
            .lookup(hostname)
            .map_err(|source| StrategyError::NameResolution {
                host: hostname.to_string(),
                source,
            })
    }
}

impl<R: NameResolver> AddressStrategy for HostnameFallback<R> {
    fn name(&self) -> &'static str {
        "hostname"
    }

    fn resolve(&self) -> Result<SocketAddr, StrategyError> {
        let wanted = SocketAddr::new(self.candidate_host()?, 0);
        let listen_error = |source| StrategyError::Listen {
            addr: wanted,
            source,
        };

        // std binds and listens in one step. A failed bind creates no socket,
        // and on every later path the listener is dropped before returning.
        let listener = TcpListener::bind(wanted).map_err(listen_error)?;
        listener.local_addr().map_err(listen_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeResolver {
        hostname: String,
        table: HashMap<String, Vec<IpAddr>>,
        lookups: Mutex<Vec<String>>,
    }

    impl FakeResolver {
        fn new(hostname: &str) -> Self {
            Self {
                hostname: hostname.to_string(),
                ..Self::default()
            }
        }

        fn with(mut self, host: &str, ip: &str) -> Self {
            self.table
                .entry(host.to_string())
                .or_default()
                .push(ip.parse().unwrap());
            self
        }

        fn lookups(&self) -> Vec<String> {
            self.lookups.lock().unwrap().clone()
        }
    }

    impl NameResolver for FakeResolver {
        fn local_hostname(&self) -> io::Result<String> {
            Ok(self.hostname.clone())
        }

        fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
            self.lookups.lock().unwrap().push(host.to_string());
            self.table
                .get(host)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "unknown host"))
        }
    }

    #[test]
    fn test_prefers_mdns_name() {
        let fallback = HostnameFallback::new(
            FakeResolver::new("octopi")
                .with("octopi.local", "127.0.0.1")
                .with("octopi", "10.9.9.9"),
        );
        assert_eq!(fallback.candidate_host().unwrap().to_string(), "127.0.0.1");
        assert_eq!(fallback.resolver.lookups(), vec!["octopi.local"]);
    }

    #[test]
    fn test_falls_back_to_bare_hostname() {
        let fallback = HostnameFallback::new(FakeResolver::new("octopi").with("octopi", "127.0.0.1"));
        assert_eq!(fallback.candidate_host().unwrap().to_string(), "127.0.0.1");
        assert_eq!(fallback.resolver.lookups(), vec!["octopi.local", "octopi"]);
    }

    #[test]
    fn test_hostname_already_local() {
        let fallback =
            HostnameFallback::new(FakeResolver::new("printer.local").with("printer.local", "127.0.0.1"));
        fallback.candidate_host().unwrap();
        assert_eq!(fallback.resolver.lookups(), vec!["printer.local"]);
    }

    #[test]
    fn test_unresolvable_hostname() {
        let fallback = HostnameFallback::new(FakeResolver::new("ghost"));
        let err = fallback.candidate_host().unwrap_err();
        assert!(matches!(err, StrategyError::NameResolution { ref host, .. } if host == "ghost"));
    }

    #[test]
    fn test_resolve_binds_ephemeral_port() {
        let fallback = HostnameFallback::new(FakeResolver::new("octopi").with("octopi.local", "127.0.0.1"));
        let addr = fallback.resolve().unwrap();
        assert!(addr.ip().is_loopback());
        assert_ne!(addr.port(), 0);
    }

    #[test]
    fn test_resolve_unbindable_host_is_listen_error() {
        let fallback = HostnameFallback::new(FakeResolver::new("octopi").with("octopi.local", "192.0.2.1"));
        let err = fallback.resolve().unwrap_err();
        assert!(matches!(err, StrategyError::Listen { .. }));
    }

    #[test]
    fn test_system_resolver_reports_hostname() {
        let hostname = SystemResolver.local_hostname().unwrap();
        assert!(!hostname.is_empty());
    }
}
