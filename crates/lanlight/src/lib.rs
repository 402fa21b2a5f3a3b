pub mod client;
pub mod color;
pub mod device;
pub mod event;
pub mod net;
pub mod product;
pub mod protocol;

pub use client::{
    Client, ClientConfig, ClientError, ClientState, DeviceHandle, Fetched, Freshness, GroupResult,
    Reply, directed_broadcast,
};
pub use color::{ColorError, css_to_hsb, rgb_to_hsb};
pub use device::{Device, DeviceRegistry, DeviceState, Lifecycle, StateChange, StateKey};
pub use event::{ClientEvent, EventBus, EventFilter, EventKind, ListenerId};
pub use net::{NetworkStats, RequestError};
pub use product::{Features, Product, ProductCatalog, TemperatureRange};
pub use protocol::{
    DEFAULT_PORT, Firmware, Group, GroupId, Hsb, Hsbk, Info, Infrared, Label, LightPower,
    LightState, MacAddress, Power, Request, Version,
};
