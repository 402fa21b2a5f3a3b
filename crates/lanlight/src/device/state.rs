use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use serde::Serialize;

use crate::product::{Features, Product};
use crate::protocol::{
    Firmware, Group, Infrared, Info, Label, LightPower, LightState, MacAddress, Power, Version,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKey {
    Firmware,
    Version,
    Info,
    Label,
    Group,
    Location,
    Power,
    Light,
    Color,
    Infrared,
}

impl StateKey {
    pub const ALL: [StateKey; 10] = [
        StateKey::Firmware,
        StateKey::Version,
        StateKey::Info,
        StateKey::Label,
        StateKey::Group,
        StateKey::Location,
        StateKey::Power,
        StateKey::Light,
        StateKey::Color,
        StateKey::Infrared,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StateKey::Firmware => "firmware",
            StateKey::Version => "version",
            StateKey::Info => "info",
            StateKey::Label => "label",
            StateKey::Group => "group",
            StateKey::Location => "location",
            StateKey::Power => "power",
            StateKey::Light => "light",
            StateKey::Color => "color",
            StateKey::Infrared => "infrared",
        }
    }

    /// Keys a periodic poll can refresh.
    pub fn is_watchable(&self) -> bool {
        !matches!(self, StateKey::Firmware | StateKey::Version)
    }

    /// Capability a device must have before this key is queried.
    pub fn feature(&self) -> Option<Features> {
        match self {
            StateKey::Color => Some(Features::COLOR),
            StateKey::Infrared => Some(Features::INFRARED),
            _ => None,
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StateKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| format!("unknown state key {:?}", s))
    }
}

/// A new value for one cached field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "key", content = "value", rename_all = "lowercase")]
pub enum StateChange {
    Firmware(Firmware),
    Version(Version),
    Info(Info),
    Label(Label),
    Group(Group),
    Location(Group),
    Power(Power),
    Light(LightPower),
    Color(LightState),
    Infrared(Infrared),
}

impl StateChange {
    pub fn key(&self) -> StateKey {
        match self {
            StateChange::Firmware(_) => StateKey::Firmware,
            StateChange::Version(_) => StateKey::Version,
            StateChange::Info(_) => StateKey::Info,
            StateChange::Label(_) => StateKey::Label,
            StateChange::Group(_) => StateKey::Group,
            StateChange::Location(_) => StateKey::Location,
            StateChange::Power(_) => StateKey::Power,
            StateChange::Light(_) => StateKey::Light,
            StateChange::Color(_) => StateKey::Color,
            StateChange::Infrared(_) => StateKey::Infrared,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    #[default]
    Discovered,
    Loading,
    Ready,
    /// The last query failed and cached values were served instead.
    Stale,
    Removed,
}

impl Lifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Lifecycle::Discovered => "discovered",
            Lifecycle::Loading => "loading",
            Lifecycle::Ready => "ready",
            Lifecycle::Stale => "stale",
            Lifecycle::Removed => "removed",
        }
    }
}

/// Serializable snapshot of everything known about one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceState {
    pub mac: MacAddress,
    pub ip: IpAddr,
    pub port: u16,
    pub alive: bool,
    pub lifecycle: Lifecycle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware: Option<Firmware>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<Info>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<Label>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<Group>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Group>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<Power>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light: Option<LightPower>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<LightState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infrared: Option<Infrared>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
}

impl DeviceState {
    pub fn new(mac: MacAddress, addr: SocketAddr) -> Self {
        Self {
            mac,
            ip: addr.ip(),
            port: addr.port(),
            alive: true,
            lifecycle: Lifecycle::Discovered,
            firmware: None,
            version: None,
            info: None,
            label: None,
            group: None,
            location: None,
            power: None,
            light: None,
            color: None,
            infrared: None,
            product: None,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}
