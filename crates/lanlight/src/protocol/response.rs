use std::net::{IpAddr, SocketAddr};

use thiserror::Error;

use super::header::{self, HEADER_SIZE, PROTOCOL};
use super::payload::Payload;
use super::types::MacAddress;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResponseError {
    #[error("datagram of {0} bytes is shorter than the header")]
    Truncated(usize),
    #[error("declared length {declared} does not match datagram length {actual}")]
    Length { declared: usize, actual: usize },
    #[error("unexpected protocol {0}")]
    Protocol(u16),
}

/// One validated inbound datagram.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub addr: SocketAddr,
    pub mac: MacAddress,
    pub protocol: u16,
    pub tagged: bool,
    pub source: u32,
    pub sequence: u8,
    pub message_type: u16,
    pub ack: bool,
    pub res: bool,
    pub payload: Vec<u8>,
}

impl Response {
    pub fn parse(datagram: &[u8], addr: SocketAddr) -> Result<Self, ResponseError> {
        if datagram.len() < HEADER_SIZE {
            return Err(ResponseError::Truncated(datagram.len()));
        }

        let declared = u16::from_le_bytes([datagram[0], datagram[1]]) as usize;
        if declared != datagram.len() {
            return Err(ResponseError::Length {
                declared,
                actual: datagram.len(),
            });
        }

        let bits = u16::from_le_bytes([datagram[2], datagram[3]]);
        let protocol = header::protocol_of(bits);
        if protocol != PROTOCOL {
            return Err(ResponseError::Protocol(protocol));
        }

        let mut mac = [0u8; 6];
        mac.copy_from_slice(&datagram[8..14]);
        let (ack, res) = header::response_flags(datagram[22]);

        Ok(Self {
            addr,
            mac: MacAddress(mac),
            protocol,
            tagged: header::is_tagged(bits),
            source: u32::from_le_bytes([datagram[4], datagram[5], datagram[6], datagram[7]]),
            sequence: datagram[23],
            message_type: u16::from_le_bytes([datagram[32], datagram[33]]),
            ack,
            res,
            payload: datagram[HEADER_SIZE..].to_vec(),
        })
    }

    pub fn ip(&self) -> IpAddr {
        self.addr.ip()
    }

    pub fn payload(&self) -> Payload {
        Payload::from_bytes(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::header::{Flags, encode_frame};

    fn addr() -> SocketAddr {
        "192.168.1.20:56700".parse().unwrap()
    }

    #[test]
    fn test_header_fields_recovered() {
        let mac = MacAddress([0xd0, 0x73, 0xd5, 0x10, 0x20, 0x30]);
        let frame = encode_frame(0x1234_5678, 200, mac, Flags::RESPOND, 22, &[1, 0]);
        let response = Response::parse(&frame, addr()).unwrap();

        assert_eq!(response.source, 0x1234_5678);
        assert_eq!(response.sequence, 200);
        assert_eq!(response.mac.to_string(), "d0:73:d5:10:20:30");
        assert_eq!(response.message_type, 22);
        assert!(response.res);
        assert!(!response.ack);
        assert!(!response.tagged);
        assert_eq!(response.payload, vec![1, 0]);
        assert_eq!(response.ip(), addr().ip());
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let mut frame = encode_frame(1, 1, MacAddress::BROADCAST, Flags::empty(), 3, &[0; 5]);
        frame.push(0);
        assert_eq!(
            Response::parse(&frame, addr()),
            Err(ResponseError::Length {
                declared: 41,
                actual: 42
            })
        );
    }

    #[test]
    fn test_protocol_mismatch_rejected() {
        let mut frame = encode_frame(1, 1, MacAddress::BROADCAST, Flags::empty(), 3, &[]);
        frame[2] = 0x01;
        frame[3] = 0x14;
        assert!(matches!(
            Response::parse(&frame, addr()),
            Err(ResponseError::Protocol(_))
        ));
    }

    #[test]
    fn test_truncated_rejected() {
        assert_eq!(
            Response::parse(&[0u8; 10], addr()),
            Err(ResponseError::Truncated(10))
        );
    }
}
