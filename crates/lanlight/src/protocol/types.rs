use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::net::rand_u64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseIdError {
    #[error("invalid MAC address: {0}")]
    Mac(String),
    #[error("invalid group id: {0}")]
    Group(String),
}

/// Six byte device address carried in the first bytes of the frame target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub const BROADCAST: MacAddress = MacAddress([0; 6]);

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_broadcast(&self) -> bool {
        self.0 == [0; 6]
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a, b, c, d, e, g
        )
    }
}

impl FromStr for MacAddress {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');

        for octet in &mut octets {
            let part = parts
                .next()
                .filter(|p| p.len() == 2)
                .ok_or_else(|| ParseIdError::Mac(s.to_string()))?;
            *octet = u8::from_str_radix(part, 16).map_err(|_| ParseIdError::Mac(s.to_string()))?;
        }

        if parts.next().is_some() {
            return Err(ParseIdError::Mac(s.to_string()));
        }

        Ok(Self(octets))
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 16 byte identifier shared by every member of a group or location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct GroupId(pub [u8; 16]);

impl GroupId {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&rand_u64().to_le_bytes());
        bytes[8..].copy_from_slice(&rand_u64().rotate_left(17).to_le_bytes());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl FromStr for GroupId {
    type Err = ParseIdError;

    /// Accepts 32 hex digits, optionally in dashed UUID form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: Vec<u8> = s.bytes().filter(|b| *b != b'-').collect();
        if digits.len() != 32 {
            return Err(ParseIdError::Group(s.to_string()));
        }

        let mut bytes = [0u8; 16];
        for (byte, pair) in bytes.iter_mut().zip(digits.chunks(2)) {
            let pair = std::str::from_utf8(pair).map_err(|_| ParseIdError::Group(s.to_string()))?;
            *byte = u8::from_str_radix(pair, 16).map_err(|_| ParseIdError::Group(s.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

impl Serialize for GroupId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Hue, saturation and brightness, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Hsb {
    pub hue: f64,
    pub saturation: f64,
    pub brightness: f64,
}

impl Hsb {
    pub fn with_kelvin(self, kelvin: u16) -> Hsbk {
        Hsbk {
            hue: self.hue,
            saturation: self.saturation,
            brightness: self.brightness,
            kelvin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Hsbk {
    pub hue: f64,
    pub saturation: f64,
    pub brightness: f64,
    pub kelvin: u16,
}

impl Hsbk {
    pub fn new(hue: f64, saturation: f64, brightness: f64, kelvin: u16) -> Self {
        Self {
            hue,
            saturation,
            brightness,
            kelvin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Service {
    pub service: u8,
    pub port: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Firmware {
    /// Build time in milliseconds since the epoch.
    pub build: u64,
    pub version_minor: u16,
    pub version_major: u16,
}

impl Firmware {
    pub fn at_least(&self, major: u16, minor: u16) -> bool {
        (self.version_major, self.version_minor) >= (major, minor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Version {
    pub vendor: u32,
    pub product: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Info {
    pub time: u64,
    pub uptime: u64,
    pub downtime: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Power {
    pub on: bool,
}

/// Group or location membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub id: GroupId,
    pub label: String,
    pub updated: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LightPower {
    pub level: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LightState {
    #[serde(flatten)]
    pub color: Hsbk,
    pub power: u16,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Infrared {
    pub brightness: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Echo {
    pub text: String,
}

/// Decoded response to a request that carries no state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ack;
