use bitflags::bitflags;

use super::types::MacAddress;

pub const DEFAULT_PORT: u16 = 56700;
pub const PROTOCOL: u16 = 1024;
pub const UDP_SERVICE: u8 = 1;

pub const FRAME_HEADER_SIZE: usize = 8;
pub const FRAME_ADDRESS_SIZE: usize = 16;
pub const PROTOCOL_HEADER_SIZE: usize = 12;
pub const HEADER_SIZE: usize = FRAME_HEADER_SIZE + FRAME_ADDRESS_SIZE + PROTOCOL_HEADER_SIZE;

const PROTOCOL_MASK: u16 = 0x0FFF;
const ADDRESSABLE_BIT: u16 = 1 << 12;
const TAGGED_BIT: u16 = 1 << 13;
const ORIGIN_SHIFT: u16 = 14;
const ORIGIN: u16 = 0;

const ACK_BIT: u8 = 0b10;
const RES_BIT: u8 = 0b01;

bitflags! {
    /// Request metadata carried in the header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u8 {
        /// Broadcast frame answered by every device.
        const TAGGED = 1 << 0;
        const ACKNOWLEDGE = 1 << 1;
        const RESPOND = 1 << 2;
    }
}

/// One encoded outbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transmission {
    pub source: u32,
    pub sequence: u8,
    pub buffer: Vec<u8>,
    pub target: MacAddress,
}

impl Transmission {
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn is_broadcast(&self) -> bool {
        self.target.is_broadcast()
    }
}

/// Lays out header, address block, type block and payload, then patches the
/// total length into the first two bytes.
pub fn encode_frame(
    source: u32,
    sequence: u8,
    target: MacAddress,
    flags: Flags,
    message_type: u16,
    payload: &[u8],
) -> Vec<u8> {
    let mut buffer = vec![0u8; HEADER_SIZE + payload.len()];

    let mut bits = PROTOCOL | ADDRESSABLE_BIT | (ORIGIN << ORIGIN_SHIFT);
    if flags.contains(Flags::TAGGED) {
        bits |= TAGGED_BIT;
    }
    buffer[2..4].copy_from_slice(&bits.to_le_bytes());
    buffer[4..8].copy_from_slice(&source.to_le_bytes());

    let address = FRAME_HEADER_SIZE;
    buffer[address..address + 6].copy_from_slice(&target.octets());
    let mut response_bits = 0;
    if flags.contains(Flags::ACKNOWLEDGE) {
        response_bits |= ACK_BIT;
    }
    if flags.contains(Flags::RESPOND) {
        response_bits |= RES_BIT;
    }
    buffer[address + 14] = response_bits;
    buffer[address + 15] = sequence;

    let kind = FRAME_HEADER_SIZE + FRAME_ADDRESS_SIZE;
    buffer[kind + 8..kind + 10].copy_from_slice(&message_type.to_le_bytes());

    buffer[HEADER_SIZE..].copy_from_slice(payload);

    let size = buffer.len() as u16;
    buffer[0..2].copy_from_slice(&size.to_le_bytes());
    buffer
}

pub(crate) fn protocol_of(bits: u16) -> u16 {
    bits & PROTOCOL_MASK
}

pub(crate) fn is_tagged(bits: u16) -> bool {
    bits & TAGGED_BIT != 0
}

pub(crate) fn response_flags(byte: u8) -> (bool, bool) {
    (byte & ACK_BIT != 0, byte & RES_BIT != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let target = MacAddress([1, 2, 3, 4, 5, 6]);
        let frame = encode_frame(
            0xAABBCCDD,
            9,
            target,
            Flags::RESPOND | Flags::ACKNOWLEDGE,
            117,
            &[0xFF, 0xFF],
        );

        assert_eq!(frame.len(), 38);
        assert_eq!(u16::from_le_bytes([frame[0], frame[1]]), 38);
        assert_eq!(u16::from_le_bytes([frame[2], frame[3]]), 1024 | (1 << 12));
        assert_eq!(&frame[4..8], &0xAABBCCDDu32.to_le_bytes());
        assert_eq!(&frame[8..14], &[1, 2, 3, 4, 5, 6]);
        assert_eq!(frame[22], 0b11);
        assert_eq!(frame[23], 9);
        assert_eq!(u16::from_le_bytes([frame[32], frame[33]]), 117);
        assert_eq!(&frame[36..], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_tagged_bit() {
        let frame = encode_frame(1, 0, MacAddress::BROADCAST, Flags::TAGGED, 2, &[]);
        let bits = u16::from_le_bytes([frame[2], frame[3]]);
        assert!(is_tagged(bits));
        assert_eq!(protocol_of(bits), PROTOCOL);
        assert_eq!(frame[22], 0);
    }
}
