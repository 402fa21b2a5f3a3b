pub mod device;
mod header;
pub mod light;
mod packet;
mod payload;
mod response;
mod types;

pub use header::{
    DEFAULT_PORT, Flags, HEADER_SIZE, PROTOCOL, Transmission, UDP_SERVICE, encode_frame,
};
pub use packet::{Packet, Request, ResponseHandler};
pub use payload::{KELVIN_MAX, KELVIN_MIN, Payload, PayloadError, RATIO_SCALE};
pub use response::{Response, ResponseError};
pub use types::{
    Ack, Echo, Firmware, Group, GroupId, Hsb, Hsbk, Info, Infrared, Label, LightPower,
    LightState, MacAddress, ParseIdError, Power, Service, Version,
};
