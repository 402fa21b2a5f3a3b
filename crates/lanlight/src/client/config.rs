use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::protocol::DEFAULT_PORT;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub bind: SocketAddr,
    pub device_port: u16,
    /// Every discovery probe is sent to each of these.
    pub broadcast: Vec<IpAddr>,
    pub request_timeout: Duration,
    pub discovery_timeout: Duration,
    pub ping_timeout: Duration,
    pub watch_interval: Duration,
    pub rate_limit: Duration,
    pub poll_interval: Duration,
    /// Fixed source id; a random non-zero one is picked when unset.
    pub source: Option<u32>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            device_port: DEFAULT_PORT,
            broadcast: vec![IpAddr::V4(Ipv4Addr::BROADCAST)],
            request_timeout: Duration::from_millis(3000),
            discovery_timeout: Duration::from_millis(5000),
            ping_timeout: Duration::from_millis(5000),
            watch_interval: Duration::from_millis(10000),
            rate_limit: Duration::from_millis(10),
            poll_interval: Duration::from_millis(1),
            source: None,
        }
    }
}

/// Subnet broadcast address for `address/prefix`.
pub fn directed_broadcast(address: Ipv4Addr, prefix: u8) -> Ipv4Addr {
    let host_mask = u32::MAX.checked_shr(u32::from(prefix)).unwrap_or(0);
    Ipv4Addr::from(u32::from(address) | host_mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directed_broadcast() {
        let address = Ipv4Addr::new(192, 168, 1, 42);
        assert_eq!(directed_broadcast(address, 24), Ipv4Addr::new(192, 168, 1, 255));
        assert_eq!(directed_broadcast(address, 16), Ipv4Addr::new(192, 168, 255, 255));
        assert_eq!(directed_broadcast(address, 32), address);
        assert_eq!(directed_broadcast(address, 0), Ipv4Addr::BROADCAST);
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.device_port, 56700);
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.broadcast, vec![IpAddr::V4(Ipv4Addr::BROADCAST)]);
        assert!(config.source.is_none());
    }
}
