//! Node identity.
//!
//! Definitions are owned by a node address. The address is resolved once at
//! startup and stays fixed for the life of the process.

use std::net::{IpAddr, UdpSocket};

use tracing::debug;

/// Source of this process's node address.
pub trait NodeIdentity: Send + Sync {
    fn current_node_address(&self) -> &str;
}

/// A node address fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticNode {
    address: String,
}

impl StaticNode {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

impl NodeIdentity for StaticNode {
    fn current_node_address(&self) -> &str {
        &self.address
    }
}

/// Resolve the node address.
///
/// Order: a non-blank `configured` value, the primary local IP address, the
/// host name, then `localhost`.
pub fn resolve_node_address(configured: Option<&str>) -> String {
    if let Some(address) = configured.map(str::trim).filter(|a| !a.is_empty()) {
        debug!("Using configured node address {}", address);
        return address.to_string();
    }

    if let Some(ip) = local_ip() {
        debug!("Resolved node address from local IP: {}", ip);
        return ip.to_string();
    }

    match hostname::get() {
        Ok(name) => {
            let name = name.to_string_lossy().to_string();
            debug!("Resolved node address from host name: {}", name);
            name
        }
        Err(_) => "localhost".to_string(),
    }
}

/// IP address of the interface used for outbound traffic. Connecting a UDP
/// socket sends no packets; it only selects a route.
fn local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let ip = socket.local_addr().ok()?.ip();
    if ip.is_unspecified() { None } else { Some(ip) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_address_wins() {
        assert_eq!(resolve_node_address(Some("10.1.2.3")), "10.1.2.3");
        assert_eq!(resolve_node_address(Some("  worker-7 ")), "worker-7");
    }

    #[test]
    fn test_blank_configured_address_falls_back() {
        let resolved = resolve_node_address(Some("   "));
        assert!(!resolved.trim().is_empty());
    }

    #[test]
    fn test_static_node() {
        let node = StaticNode::new("10.0.0.1");
        assert_eq!(node.current_node_address(), "10.0.0.1");
    }
}
