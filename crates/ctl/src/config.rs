use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use lanlight::{ClientConfig, directed_broadcast};

#[derive(Debug, Clone)]
pub struct CtlConfig {
    pub client: ClientConfig,
    /// Rediscover and ping on this interval; `None` discovers once.
    pub monitor_interval: Option<Duration>,
    pub load_on_connect: bool,
}

impl Default for CtlConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            monitor_interval: Some(Duration::from_millis(10000)),
            load_on_connect: true,
        }
    }
}

/// A plain address, or `address/prefix` for that subnet's broadcast
/// address.
pub fn parse_broadcast(value: &str) -> Result<IpAddr, String> {
    let Some((address, prefix)) = value.split_once('/') else {
        return value
            .parse()
            .map_err(|e| format!("invalid address {}: {}", value, e));
    };

    let address: Ipv4Addr = address
        .parse()
        .map_err(|e| format!("invalid address {}: {}", address, e))?;
    let prefix: u8 = prefix
        .parse()
        .ok()
        .filter(|prefix| *prefix <= 32)
        .ok_or_else(|| format!("invalid prefix in {}", value))?;

    Ok(IpAddr::V4(directed_broadcast(address, prefix)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_broadcast() {
        assert_eq!(
            parse_broadcast("10.0.0.255"),
            Ok("10.0.0.255".parse().unwrap())
        );
        assert_eq!(
            parse_broadcast("192.168.4.17/22"),
            Ok("192.168.7.255".parse().unwrap())
        );
        assert!(parse_broadcast("192.168.4.17/33").is_err());
        assert!(parse_broadcast("lamp").is_err());
    }
}
