use thiserror::Error;

use super::types::{GroupId, Hsbk};

pub const RATIO_SCALE: f64 = 65535.0;
pub const KELVIN_MIN: u16 = 1500;
pub const KELVIN_MAX: u16 = 9000;

/// Inverse of the nanosecond encoding: the stored value is the nanosecond
/// counter shifted right by 16 bits.
const TIMESTAMP_SCALE: f64 = 65536.0 / 1_000_000.0;
const NANOS_PER_MILLI: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PayloadError {
    #[error("payload overrun: {needed} bytes at offset {offset} exceeds size {size}")]
    Overrun {
        offset: usize,
        needed: usize,
        size: usize,
    },
    #[error("payload malformed: {written} of {size} bytes written")]
    Unfilled { written: usize, size: usize },
    #[error("payload is {actual} bytes, expected {expected}")]
    Size { expected: usize, actual: usize },
    #[error("HSB value {value} for {field} must be between 0 and 1")]
    Hsb { field: &'static str, value: f64 },
    #[error("ratio {0} must be between 0 and 1")]
    Ratio(f64),
    #[error("kelvin value {0} must be between 1500 and 9000")]
    Kelvin(u16),
}

/// Fixed size little-endian field buffer with a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    buffer: Vec<u8>,
    offset: usize,
}

impl Payload {
    pub fn new(size: usize) -> Self {
        Self {
            buffer: vec![0; size],
            offset: 0,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            buffer: bytes.to_vec(),
            offset: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn skip(&mut self, bytes: usize) -> Result<&mut Self, PayloadError> {
        self.claim(bytes)?;
        Ok(self)
    }

    pub fn put_u8(&mut self, value: u8) -> Result<&mut Self, PayloadError> {
        let at = self.claim(1)?;
        self.buffer[at] = value;
        Ok(self)
    }

    pub fn get_u8(&mut self) -> Result<u8, PayloadError> {
        let at = self.claim(1)?;
        Ok(self.buffer[at])
    }

    pub fn put_u16(&mut self, value: u16) -> Result<&mut Self, PayloadError> {
        self.put_bytes(&value.to_le_bytes())
    }

    pub fn get_u16(&mut self) -> Result<u16, PayloadError> {
        Ok(u16::from_le_bytes(self.get_array()?))
    }

    pub fn put_u32(&mut self, value: u32) -> Result<&mut Self, PayloadError> {
        self.put_bytes(&value.to_le_bytes())
    }

    pub fn get_u32(&mut self) -> Result<u32, PayloadError> {
        Ok(u32::from_le_bytes(self.get_array()?))
    }

    pub fn put_ratio(&mut self, ratio: f64) -> Result<&mut Self, PayloadError> {
        if !(0.0..=1.0).contains(&ratio) {
            return Err(PayloadError::Ratio(ratio));
        }
        self.put_u16((ratio * RATIO_SCALE).round() as u16)
    }

    pub fn get_ratio(&mut self) -> Result<f64, PayloadError> {
        Ok(self.get_u16()? as f64 / RATIO_SCALE)
    }

    /// Writes UTF-8 text NUL padded to `width`, truncated on a character
    /// boundary if it does not fit.
    pub fn put_str(&mut self, text: &str, width: usize) -> Result<&mut Self, PayloadError> {
        let at = self.claim(width)?;
        let text = truncate_utf8(text, width);
        self.buffer[at..at + text.len()].copy_from_slice(text.as_bytes());
        self.buffer[at + text.len()..at + width].fill(0);
        Ok(self)
    }

    pub fn get_str(&mut self, width: usize) -> Result<String, PayloadError> {
        let at = self.claim(width)?;
        let field = &self.buffer[at..at + width];
        let end = field.iter().position(|b| *b == 0).unwrap_or(width);
        Ok(String::from_utf8_lossy(&field[..end]).into_owned())
    }

    pub fn put_color(&mut self, color: &Hsbk) -> Result<&mut Self, PayloadError> {
        self.ensure(8)?;
        for (field, value) in [
            ("hue", color.hue),
            ("saturation", color.saturation),
            ("brightness", color.brightness),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PayloadError::Hsb { field, value });
            }
        }
        if !(KELVIN_MIN..=KELVIN_MAX).contains(&color.kelvin) {
            return Err(PayloadError::Kelvin(color.kelvin));
        }

        self.put_ratio(color.hue)?
            .put_ratio(color.saturation)?
            .put_ratio(color.brightness)?
            .put_u16(color.kelvin)
    }

    pub fn get_color(&mut self) -> Result<Hsbk, PayloadError> {
        self.ensure(8)?;
        Ok(Hsbk {
            hue: self.get_ratio()?,
            saturation: self.get_ratio()?,
            brightness: self.get_ratio()?,
            kelvin: self.get_u16()?,
        })
    }

    pub fn put_id(&mut self, id: &GroupId) -> Result<&mut Self, PayloadError> {
        self.put_bytes(id.as_bytes())
    }

    pub fn get_id(&mut self) -> Result<GroupId, PayloadError> {
        Ok(GroupId(self.get_array()?))
    }

    /// Writes a millisecond epoch time as the upper 48 bits of a nanosecond
    /// counter; the low two bytes of the field stay zero.
    pub fn put_timestamp(&mut self, millis: u64) -> Result<&mut Self, PayloadError> {
        let at = self.claim(8)?;
        let shifted = (millis.saturating_mul(NANOS_PER_MILLI) >> 16).to_le_bytes();
        self.buffer[at..at + 2].fill(0);
        self.buffer[at + 2..at + 8].copy_from_slice(&shifted[..6]);
        Ok(self)
    }

    pub fn get_timestamp(&mut self) -> Result<u64, PayloadError> {
        let at = self.claim(8)?;
        let mut raw = [0u8; 8];
        raw[..6].copy_from_slice(&self.buffer[at + 2..at + 8]);
        Ok((u64::from_le_bytes(raw) as f64 * TIMESTAMP_SCALE).round() as u64)
    }

    pub fn validate_filled(&self) -> Result<(), PayloadError> {
        if self.offset != self.buffer.len() {
            return Err(PayloadError::Unfilled {
                written: self.offset,
                size: self.buffer.len(),
            });
        }
        Ok(())
    }

    pub fn validate_size(&self, expected: usize) -> Result<(), PayloadError> {
        if self.buffer.len() != expected {
            return Err(PayloadError::Size {
                expected,
                actual: self.buffer.len(),
            });
        }
        Ok(())
    }

    fn put_bytes(&mut self, bytes: &[u8]) -> Result<&mut Self, PayloadError> {
        let at = self.claim(bytes.len())?;
        self.buffer[at..at + bytes.len()].copy_from_slice(bytes);
        Ok(self)
    }

    fn get_array<const N: usize>(&mut self) -> Result<[u8; N], PayloadError> {
        let at = self.claim(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buffer[at..at + N]);
        Ok(out)
    }

    fn ensure(&self, bytes: usize) -> Result<(), PayloadError> {
        if self.offset + bytes > self.buffer.len() {
            return Err(PayloadError::Overrun {
                offset: self.offset,
                needed: bytes,
                size: self.buffer.len(),
            });
        }
        Ok(())
    }

    /// Reserves `bytes` at the cursor and returns where they start.
    fn claim(&mut self, bytes: usize) -> Result<usize, PayloadError> {
        self.ensure(bytes)?;
        let at = self.offset;
        self.offset += bytes;
        Ok(at)
    }
}

fn truncate_utf8(text: &str, width: usize) -> &str {
    if text.len() <= width {
        return text;
    }
    let mut end = width;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
