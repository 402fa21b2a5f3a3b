//! Messages every device answers regardless of its product.

use std::time::{SystemTime, UNIX_EPOCH};

use super::header::Flags;
use super::packet::Packet;
use super::payload::{Payload, PayloadError};
use super::types::{
    Ack, Echo, Firmware, Group, GroupId, Info, Label, Power, Service, Version,
};

pub const STATE_SERVICE: u16 = 3;
pub const ACKNOWLEDGEMENT: u16 = 45;

pub const LABEL_WIDTH: usize = 32;
pub const ECHO_WIDTH: usize = 64;
pub const GROUP_SIZE: usize = 56;
pub const FIRMWARE_SIZE: usize = 20;

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

fn decode_firmware(payload: &mut Payload) -> Result<Firmware, PayloadError> {
    let build = payload.get_timestamp()?;
    payload.skip(8)?;
    let version_minor = payload.get_u16()?;
    let version_major = payload.get_u16()?;
    Ok(Firmware {
        build,
        version_minor,
        version_major,
    })
}

fn decode_power(payload: &mut Payload) -> Result<Power, PayloadError> {
    Ok(Power {
        on: payload.get_u16()? != 0,
    })
}

fn decode_label(payload: &mut Payload) -> Result<Label, PayloadError> {
    Ok(Label {
        label: payload.get_str(LABEL_WIDTH)?,
    })
}

fn decode_group(payload: &mut Payload) -> Result<Group, PayloadError> {
    let id = payload.get_id()?;
    let label = payload.get_str(LABEL_WIDTH)?;
    let updated = payload.get_timestamp()?;
    Ok(Group { id, label, updated })
}

fn encode_group(
    payload: &mut Payload,
    id: &GroupId,
    label: &str,
    updated: u64,
) -> Result<(), PayloadError> {
    payload
        .put_id(id)?
        .put_str(label, LABEL_WIDTH)?
        .put_timestamp(updated)?;
    Ok(())
}

/// Discovery probe, broadcast with the tagged bit set.
#[derive(Debug, Clone, Copy, Default)]
pub struct GetService;

impl Packet for GetService {
    type Response = Service;

    const TYPE: u16 = 2;
    const NAME: &'static str = "GetService";
    const PAYLOAD_SIZE: usize = 0;
    const RESPONSE_TYPE: u16 = STATE_SERVICE;
    const RESPONSE_SIZE: usize = 5;

    fn flags(&self) -> Flags {
        Flags::TAGGED | Flags::RESPOND
    }

    fn decode(payload: &mut Payload) -> Result<Service, PayloadError> {
        let service = payload.get_u8()?;
        let port = payload.get_u32()?;
        Ok(Service { service, port })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GetHostFirmware;

impl Packet for GetHostFirmware {
    type Response = Firmware;

    const TYPE: u16 = 14;
    const NAME: &'static str = "GetHostFirmware";
    const PAYLOAD_SIZE: usize = 0;
    const RESPONSE_TYPE: u16 = 15;
    const RESPONSE_SIZE: usize = FIRMWARE_SIZE;

    fn decode(payload: &mut Payload) -> Result<Firmware, PayloadError> {
        decode_firmware(payload)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GetWifiFirmware;

impl Packet for GetWifiFirmware {
    type Response = Firmware;

    const TYPE: u16 = 18;
    const NAME: &'static str = "GetWifiFirmware";
    const PAYLOAD_SIZE: usize = 0;
    const RESPONSE_TYPE: u16 = 19;
    const RESPONSE_SIZE: usize = FIRMWARE_SIZE;

    fn decode(payload: &mut Payload) -> Result<Firmware, PayloadError> {
        decode_firmware(payload)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GetPower;

impl Packet for GetPower {
    type Response = Power;

    const TYPE: u16 = 20;
    const NAME: &'static str = "GetPower";
    const PAYLOAD_SIZE: usize = 0;
    const RESPONSE_TYPE: u16 = 22;
    const RESPONSE_SIZE: usize = 2;

    fn decode(payload: &mut Payload) -> Result<Power, PayloadError> {
        decode_power(payload)
    }
}

/// Device power is all-or-nothing on the wire: 0 or 65535.
#[derive(Debug, Clone, Copy)]
pub struct SetPower {
    pub on: bool,
}

impl Packet for SetPower {
    type Response = Power;

    const TYPE: u16 = 21;
    const NAME: &'static str = "SetPower";
    const PAYLOAD_SIZE: usize = 2;
    const RESPONSE_TYPE: u16 = 22;
    const RESPONSE_SIZE: usize = 2;

    fn encode(&self, payload: &mut Payload) -> Result<(), PayloadError> {
        payload.put_u16(if self.on { u16::MAX } else { 0 })?;
        Ok(())
    }

    fn decode(payload: &mut Payload) -> Result<Power, PayloadError> {
        decode_power(payload)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GetLabel;

impl Packet for GetLabel {
    type Response = Label;

    const TYPE: u16 = 23;
    const NAME: &'static str = "GetLabel";
    const PAYLOAD_SIZE: usize = 0;
    const RESPONSE_TYPE: u16 = 25;
    const RESPONSE_SIZE: usize = LABEL_WIDTH;

    fn decode(payload: &mut Payload) -> Result<Label, PayloadError> {
        decode_label(payload)
    }
}

#[derive(Debug, Clone)]
pub struct SetLabel {
    pub label: String,
}

impl Packet for SetLabel {
    type Response = Label;

    const TYPE: u16 = 24;
    const NAME: &'static str = "SetLabel";
    const PAYLOAD_SIZE: usize = LABEL_WIDTH;
    const RESPONSE_TYPE: u16 = 25;
    const RESPONSE_SIZE: usize = LABEL_WIDTH;

    fn encode(&self, payload: &mut Payload) -> Result<(), PayloadError> {
        payload.put_str(&self.label, LABEL_WIDTH)?;
        Ok(())
    }

    fn decode(payload: &mut Payload) -> Result<Label, PayloadError> {
        decode_label(payload)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GetVersion;

impl Packet for GetVersion {
    type Response = Version;

    const TYPE: u16 = 32;
    const NAME: &'static str = "GetVersion";
    const PAYLOAD_SIZE: usize = 0;
    const RESPONSE_TYPE: u16 = 33;
    const RESPONSE_SIZE: usize = 12;

    fn decode(payload: &mut Payload) -> Result<Version, PayloadError> {
        let vendor = payload.get_u32()?;
        let product = payload.get_u32()?;
        Ok(Version { vendor, product })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GetInfo;

impl Packet for GetInfo {
    type Response = Info;

    const TYPE: u16 = 34;
    const NAME: &'static str = "GetInfo";
    const PAYLOAD_SIZE: usize = 0;
    const RESPONSE_TYPE: u16 = 35;
    const RESPONSE_SIZE: usize = 24;

    fn decode(payload: &mut Payload) -> Result<Info, PayloadError> {
        let time = payload.get_timestamp()?;
        let uptime = payload.get_timestamp()?;
        let downtime = payload.get_timestamp()?;
        Ok(Info {
            time,
            uptime,
            downtime,
        })
    }
}

/// Sent without asking for a reply; the device drops off the network while
/// it restarts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetReboot;

impl Packet for SetReboot {
    type Response = Ack;

    const TYPE: u16 = 38;
    const NAME: &'static str = "SetReboot";
    const PAYLOAD_SIZE: usize = 0;
    const RESPONSE_TYPE: u16 = ACKNOWLEDGEMENT;
    const RESPONSE_SIZE: usize = 0;

    fn flags(&self) -> Flags {
        Flags::empty()
    }

    fn decode(_payload: &mut Payload) -> Result<Ack, PayloadError> {
        Ok(Ack)
    }
}

#[derive(Debug, Clone)]
pub struct EchoRequest {
    pub text: String,
}

impl Packet for EchoRequest {
    type Response = Echo;

    const TYPE: u16 = 58;
    const NAME: &'static str = "EchoRequest";
    const PAYLOAD_SIZE: usize = ECHO_WIDTH;
    const RESPONSE_TYPE: u16 = 59;
    const RESPONSE_SIZE: usize = ECHO_WIDTH;

    fn encode(&self, payload: &mut Payload) -> Result<(), PayloadError> {
        payload.put_str(&self.text, ECHO_WIDTH)?;
        Ok(())
    }

    fn decode(payload: &mut Payload) -> Result<Echo, PayloadError> {
        Ok(Echo {
            text: payload.get_str(ECHO_WIDTH)?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GetLocation;

impl Packet for GetLocation {
    type Response = Group;

    const TYPE: u16 = 48;
    const NAME: &'static str = "GetLocation";
    const PAYLOAD_SIZE: usize = 0;
    const RESPONSE_TYPE: u16 = 50;
    const RESPONSE_SIZE: usize = GROUP_SIZE;

    fn decode(payload: &mut Payload) -> Result<Group, PayloadError> {
        decode_group(payload)
    }
}

#[derive(Debug, Clone)]
pub struct SetLocation {
    pub id: GroupId,
    pub label: String,
    pub updated: u64,
}

impl SetLocation {
    pub fn new(id: GroupId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            updated: now_millis(),
        }
    }
}

impl Packet for SetLocation {
    type Response = Group;

    const TYPE: u16 = 49;
    const NAME: &'static str = "SetLocation";
    const PAYLOAD_SIZE: usize = GROUP_SIZE;
    const RESPONSE_TYPE: u16 = 50;
    const RESPONSE_SIZE: usize = GROUP_SIZE;

    fn encode(&self, payload: &mut Payload) -> Result<(), PayloadError> {
        encode_group(payload, &self.id, &self.label, self.updated)
    }

    fn decode(payload: &mut Payload) -> Result<Group, PayloadError> {
        decode_group(payload)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GetGroup;

impl Packet for GetGroup {
    type Response = Group;

    const TYPE: u16 = 51;
    const NAME: &'static str = "GetGroup";
    const PAYLOAD_SIZE: usize = 0;
    const RESPONSE_TYPE: u16 = 53;
    const RESPONSE_SIZE: usize = GROUP_SIZE;

    fn decode(payload: &mut Payload) -> Result<Group, PayloadError> {
        decode_group(payload)
    }
}

#[derive(Debug, Clone)]
pub struct SetGroup {
    pub id: GroupId,
    pub label: String,
    pub updated: u64,
}

impl SetGroup {
    pub fn new(id: GroupId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            updated: now_millis(),
        }
    }
}

impl Packet for SetGroup {
    type Response = Group;

    const TYPE: u16 = 52;
    const NAME: &'static str = "SetGroup";
    const PAYLOAD_SIZE: usize = GROUP_SIZE;
    const RESPONSE_TYPE: u16 = 53;
    const RESPONSE_SIZE: usize = GROUP_SIZE;

    fn encode(&self, payload: &mut Payload) -> Result<(), PayloadError> {
        encode_group(payload, &self.id, &self.label, self.updated)
    }

    fn decode(payload: &mut Payload) -> Result<Group, PayloadError> {
        decode_group(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_power_payload() {
        let mut payload = Payload::new(SetPower::PAYLOAD_SIZE);
        SetPower { on: true }.encode(&mut payload).unwrap();
        assert_eq!(payload.as_bytes(), &[0xFF, 0xFF]);

        let mut payload = Payload::new(SetPower::PAYLOAD_SIZE);
        SetPower { on: false }.encode(&mut payload).unwrap();
        assert_eq!(payload.as_bytes(), &[0x00, 0x00]);
    }

    #[test]
    fn test_state_service_decoded() {
        let mut payload = Payload::from_bytes(&[1, 0x7C, 0xDD, 0, 0]);
        let service = GetService::decode(&mut payload).unwrap();
        assert_eq!(service.service, 1);
        assert_eq!(service.port, 56700);
    }

    #[test]
    fn test_firmware_skips_reserved() {
        let mut bytes = vec![0u8; FIRMWARE_SIZE];
        bytes[16..18].copy_from_slice(&77u16.to_le_bytes());
        bytes[18..20].copy_from_slice(&2u16.to_le_bytes());
        let firmware = GetHostFirmware::decode(&mut Payload::from_bytes(&bytes)).unwrap();
        assert_eq!(firmware.version_minor, 77);
        assert_eq!(firmware.version_major, 2);
        assert_eq!(firmware.build, 0);
    }

    #[test]
    fn test_group_layout() {
        let id: GroupId = "00112233445566778899aabbccddeeff".parse().unwrap();
        let set = SetGroup {
            id,
            label: "Kitchen".to_string(),
            updated: 0,
        };
        let mut payload = Payload::new(SetGroup::PAYLOAD_SIZE);
        set.encode(&mut payload).unwrap();
        payload.validate_filled().unwrap();

        let bytes = payload.into_bytes();
        assert_eq!(&bytes[..16], id.as_bytes());
        assert_eq!(&bytes[16..23], b"Kitchen");
        assert!(bytes[23..48].iter().all(|b| *b == 0));

        let group = GetGroup::decode(&mut Payload::from_bytes(&bytes)).unwrap();
        assert_eq!(group.id, id);
        assert_eq!(group.label, "Kitchen");
    }

    #[test]
    fn test_reboot_asks_for_nothing() {
        assert!(SetReboot.flags().is_empty());
        assert!(GetService.flags().contains(Flags::TAGGED));
    }
}
