//! Light specific messages: color, dimmable power and infrared.

use super::device::LABEL_WIDTH;
use super::packet::Packet;
use super::payload::{Payload, PayloadError};
use super::types::{Hsbk, Infrared, LightPower, LightState};

pub const LIGHT_STATE: u16 = 107;
pub const LIGHT_STATE_SIZE: usize = 52;

fn decode_level(payload: &mut Payload) -> Result<LightPower, PayloadError> {
    Ok(LightPower {
        level: payload.get_ratio()?,
    })
}

fn decode_infrared(payload: &mut Payload) -> Result<Infrared, PayloadError> {
    Ok(Infrared {
        brightness: payload.get_ratio()?,
    })
}

fn decode_state(payload: &mut Payload) -> Result<LightState, PayloadError> {
    let color = payload.get_color()?;
    payload.skip(2)?;
    let power = payload.get_u16()?;
    let label = payload.get_str(LABEL_WIDTH)?;
    payload.skip(8)?;
    Ok(LightState {
        color,
        power,
        label,
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GetColor;

impl Packet for GetColor {
    type Response = LightState;

    const TYPE: u16 = 101;
    const NAME: &'static str = "GetColor";
    const PAYLOAD_SIZE: usize = 0;
    const RESPONSE_TYPE: u16 = LIGHT_STATE;
    const RESPONSE_SIZE: usize = LIGHT_STATE_SIZE;

    fn decode(payload: &mut Payload) -> Result<LightState, PayloadError> {
        decode_state(payload)
    }
}

/// Transition to `color` over `duration` milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct SetColor {
    pub color: Hsbk,
    pub duration: u32,
}

impl Packet for SetColor {
    type Response = LightState;

    const TYPE: u16 = 102;
    const NAME: &'static str = "SetColor";
    const PAYLOAD_SIZE: usize = 13;
    const RESPONSE_TYPE: u16 = LIGHT_STATE;
    const RESPONSE_SIZE: usize = LIGHT_STATE_SIZE;

    fn encode(&self, payload: &mut Payload) -> Result<(), PayloadError> {
        payload
            .skip(1)?
            .put_color(&self.color)?
            .put_u32(self.duration)?;
        Ok(())
    }

    fn decode(payload: &mut Payload) -> Result<LightState, PayloadError> {
        decode_state(payload)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LightGetPower;

impl Packet for LightGetPower {
    type Response = LightPower;

    const TYPE: u16 = 116;
    const NAME: &'static str = "LightGetPower";
    const PAYLOAD_SIZE: usize = 0;
    const RESPONSE_TYPE: u16 = 118;
    const RESPONSE_SIZE: usize = 2;

    fn decode(payload: &mut Payload) -> Result<LightPower, PayloadError> {
        decode_level(payload)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LightSetPower {
    pub level: f64,
    pub duration: u32,
}

impl LightSetPower {
    pub fn on(duration: u32) -> Self {
        Self {
            level: 1.0,
            duration,
        }
    }

    pub fn off(duration: u32) -> Self {
        Self {
            level: 0.0,
            duration,
        }
    }
}

impl Packet for LightSetPower {
    type Response = LightPower;

    const TYPE: u16 = 117;
    const NAME: &'static str = "LightSetPower";
    const PAYLOAD_SIZE: usize = 6;
    const RESPONSE_TYPE: u16 = 118;
    const RESPONSE_SIZE: usize = 2;

    fn encode(&self, payload: &mut Payload) -> Result<(), PayloadError> {
        payload.put_ratio(self.level)?.put_u32(self.duration)?;
        Ok(())
    }

    fn decode(payload: &mut Payload) -> Result<LightPower, PayloadError> {
        decode_level(payload)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GetInfrared;

impl Packet for GetInfrared {
    type Response = Infrared;

    const TYPE: u16 = 120;
    const NAME: &'static str = "GetInfrared";
    const PAYLOAD_SIZE: usize = 0;
    const RESPONSE_TYPE: u16 = 121;
    const RESPONSE_SIZE: usize = 2;

    fn decode(payload: &mut Payload) -> Result<Infrared, PayloadError> {
        decode_infrared(payload)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SetInfrared {
    pub brightness: f64,
}

impl Packet for SetInfrared {
    type Response = Infrared;

    const TYPE: u16 = 122;
    const NAME: &'static str = "SetInfrared";
    const PAYLOAD_SIZE: usize = 2;
    const RESPONSE_TYPE: u16 = 121;
    const RESPONSE_SIZE: usize = 2;

    fn encode(&self, payload: &mut Payload) -> Result<(), PayloadError> {
        payload.put_ratio(self.brightness)?;
        Ok(())
    }

    fn decode(payload: &mut Payload) -> Result<Infrared, PayloadError> {
        decode_infrared(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_color_layout() {
        let packet = SetColor {
            color: Hsbk::new(0.0, 0.5, 1.0, 3500),
            duration: 1000,
        };
        let mut payload = Payload::new(SetColor::PAYLOAD_SIZE);
        packet.encode(&mut payload).unwrap();
        payload.validate_filled().unwrap();

        assert_eq!(
            payload.as_bytes(),
            &[
                0x00, 0x00, 0x00, 0x00, 0x80, 0xFF, 0xFF, 0xAC, 0x0D, 0xE8, 0x03, 0x00, 0x00
            ]
        );
    }

    #[test]
    fn test_set_color_rejects_bad_color() {
        let packet = SetColor {
            color: Hsbk::new(1.2, 0.0, 0.0, 3500),
            duration: 0,
        };
        let mut payload = Payload::new(SetColor::PAYLOAD_SIZE);
        assert!(matches!(
            packet.encode(&mut payload),
            Err(PayloadError::Hsb { field: "hue", .. })
        ));
    }

    #[test]
    fn test_light_state_skips_reserved() {
        let mut bytes = vec![0u8; LIGHT_STATE_SIZE];
        bytes[0..8].copy_from_slice(&[0xFF, 0xFF, 0x00, 0x00, 0xFF, 0xFF, 0xAC, 0x0D]);
        bytes[8..10].copy_from_slice(&[0x12, 0x34]);
        bytes[10..12].copy_from_slice(&u16::MAX.to_le_bytes());
        bytes[12..17].copy_from_slice(b"Porch");

        let state = GetColor::decode(&mut Payload::from_bytes(&bytes)).unwrap();
        assert_eq!(state.color.hue, 1.0);
        assert_eq!(state.color.saturation, 0.0);
        assert_eq!(state.color.brightness, 1.0);
        assert_eq!(state.color.kelvin, 3500);
        assert_eq!(state.power, u16::MAX);
        assert_eq!(state.label, "Porch");
    }

    #[test]
    fn test_light_power_level() {
        let mut payload = Payload::new(LightSetPower::PAYLOAD_SIZE);
        LightSetPower::on(250).encode(&mut payload).unwrap();
        assert_eq!(payload.as_bytes(), &[0xFF, 0xFF, 0xFA, 0x00, 0x00, 0x00]);

        let level = LightGetPower::decode(&mut Payload::from_bytes(&[0x00, 0x80])).unwrap();
        assert!((level.level - 0.5).abs() < 1e-4);
    }
}
