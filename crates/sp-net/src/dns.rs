//! Host name resolution.

use sp_core::SpliceError;
use sp_core::SpliceResult;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::net::SocketAddr;
use std::net::ToSocketAddrs;

pub trait DnsResolver {
    /// Candidate addresses for `host`, in connection order.
    fn resolve(&self, host: &str, port: u16) -> SpliceResult<Vec<SocketAddr>>;
}

/// IP literals as written in URLs: `127.0.0.1` or bracketed `[::1]`.
fn ip_literal(host: &str) -> Option<IpAddr> {
    let bare = host
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(host);
    bare.parse().ok()
}

/// Operating system resolver; IP literals skip the lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDnsResolver;

impl DnsResolver for SystemDnsResolver {
    fn resolve(&self, host: &str, port: u16) -> SpliceResult<Vec<SocketAddr>> {
        if let Some(ip) = ip_literal(host) {
            return Ok(vec![SocketAddr::new(ip, port)]);
        }

        let mut addresses = Vec::new();
        let found = (host, port).to_socket_addrs().map_err(|error| {
            SpliceError::new(
                "net.dns.resolve_failed",
                format!("failed to resolve `{host}`: {error}"),
            )
        })?;
        for address in found {
            if !addresses.contains(&address) {
                addresses.push(address);
            }
        }

        if addresses.is_empty() {
            return Err(SpliceError::new(
                "net.dns.no_results",
                format!("resolver returned no addresses for `{host}`"),
            ));
        }
        Ok(addresses)
    }
}

/// Fixed host table, for tests and pinned deployments.
#[derive(Debug, Clone, Default)]
pub struct StaticDnsResolver {
    hosts: BTreeMap<String, Vec<IpAddr>>,
}

impl StaticDnsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: &str, ip: IpAddr) -> Self {
        self.hosts.entry(host.to_ascii_lowercase()).or_default().push(ip);
        self
    }
}

impl DnsResolver for StaticDnsResolver {
    fn resolve(&self, host: &str, port: u16) -> SpliceResult<Vec<SocketAddr>> {
        if let Some(ip) = ip_literal(host) {
            return Ok(vec![SocketAddr::new(ip, port)]);
        }

        self.hosts
            .get(&host.to_ascii_lowercase())
            .filter(|ips| !ips.is_empty())
            .map(|ips| ips.iter().map(|ip| SocketAddr::new(*ip, port)).collect())
            .ok_or_else(|| {
                SpliceError::new(
                    "net.dns.no_results",
                    format!("`{host}` is not in the host table"),
                )
            })
    }
}
