//! Best-effort discovery of the local host's network identity
//!
//! Candidates are gathered from the routing table and from resolving
//! `localhost`, then narrowed with [`select_address`]. Discovery never fails;
//! when nothing is found every field is an empty string.

use std::net::{IpAddr, SocketAddr, ToSocketAddrs, UdpSocket};

/// Addresses used to ask the OS which local interface routes outward.
/// Connecting a UDP socket sends no packets.
const IPV4_PROBE: &str = "192.0.2.1:9";
const IPV6_PROBE: &str = "[2001:db8::1]:9";

/// Identity values computed once per client
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostIdentity {
    /// Default for both hostname and device name
    pub network_name: String,
    /// Dotted quad, or empty when no IPv4 address was found
    pub ipv4_address: String,
    pub operating_system: String,
}

impl HostIdentity {
    /// Query the OS for the current host identity
    pub fn discover() -> Self {
        let candidates = candidate_addresses();
        let selected = select_address(&candidates);

        if selected.is_none() {
            tracing::warn!("Could not determine a network address for this host");
        }

        Self {
            network_name: selected.map(|ip| ip.to_string()).unwrap_or_default(),
            ipv4_address: selected
                .filter(IpAddr::is_ipv4)
                .map(|ip| ip.to_string())
                .unwrap_or_default(),
            operating_system: std::env::consts::OS.to_string(),
        }
    }
}

/// Pick the most specific address from `candidates`
///
/// Preference, falling through when nothing matches:
/// 1. the last IPv4 address that is neither loopback nor link-local
/// 2. the first IPv4 address
/// 3. the first address of any kind
pub fn select_address(candidates: &[IpAddr]) -> Option<IpAddr> {
    candidates
        .iter()
        .filter(|ip| match ip {
            IpAddr::V4(v4) => !v4.is_loopback() && !v4.is_link_local() && !v4.is_unspecified(),
            IpAddr::V6(_) => false,
        })
        .last()
        .or_else(|| candidates.iter().find(|ip| ip.is_ipv4()))
        .or_else(|| candidates.first())
        .copied()
}

fn candidate_addresses() -> Vec<IpAddr> {
    let mut candidates = Vec::new();

    candidates.extend(route_probe("0.0.0.0:0", IPV4_PROBE));
    candidates.extend(route_probe("[::]:0", IPV6_PROBE));

    match ("localhost", 0).to_socket_addrs() {
        Ok(addrs) => candidates.extend(addrs.map(|addr| addr.ip())),
        Err(e) => tracing::debug!(error = %e, "Could not resolve localhost"),
    }

    candidates
}

fn route_probe(bind: &str, target: &str) -> Option<IpAddr> {
    let socket = UdpSocket::bind(bind).ok()?;
    socket.connect(target).ok()?;
    socket
        .local_addr()
        .ok()
        .map(|addr: SocketAddr| addr.ip())
        .filter(|ip| !ip.is_unspecified())
}
