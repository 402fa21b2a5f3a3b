use super::header::{Flags, Transmission, encode_frame};
use super::payload::{Payload, PayloadError};
use super::response::Response;
use super::types::MacAddress;

pub type ResponseHandler<R> = Box<dyn FnMut(&Response, &R) + Send>;

/// A message type: its numeric code, payload layout and the state reply it
/// expects.
pub trait Packet {
    type Response;

    const TYPE: u16;
    const NAME: &'static str;
    const PAYLOAD_SIZE: usize;
    const RESPONSE_TYPE: u16;
    const RESPONSE_SIZE: usize;

    fn flags(&self) -> Flags {
        Flags::RESPOND
    }

    fn encode(&self, _payload: &mut Payload) -> Result<(), PayloadError> {
        Ok(())
    }

    fn decode(payload: &mut Payload) -> Result<Self::Response, PayloadError>;
}

/// A packet plus per-request metadata and response handlers. One request may
/// be built into any number of transmissions.
pub struct Request<P: Packet> {
    packet: P,
    flags: Flags,
    handlers: Vec<ResponseHandler<P::Response>>,
}

impl<P: Packet> Request<P> {
    pub fn new(packet: P) -> Self {
        let flags = packet.flags();
        Self {
            packet,
            flags,
            handlers: Vec::new(),
        }
    }

    pub fn packet(&self) -> &P {
        &self.packet
    }

    pub fn name(&self) -> &'static str {
        P::NAME
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn tagged(mut self) -> Self {
        self.flags |= Flags::TAGGED;
        self
    }

    pub fn with_acknowledgement(mut self) -> Self {
        self.flags |= Flags::ACKNOWLEDGE;
        self
    }

    pub fn with_response(mut self) -> Self {
        self.flags |= Flags::RESPOND;
        self
    }

    pub fn on_response<F>(&mut self, handler: F) -> &mut Self
    where
        F: FnMut(&Response, &P::Response) + Send + 'static,
    {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Detaches every handler. Transmissions already sent are unaffected.
    pub fn drop_handlers(&mut self) {
        self.handlers.clear();
    }

    pub fn build(
        &self,
        source: u32,
        sequence: u8,
        target: MacAddress,
    ) -> Result<Transmission, PayloadError> {
        let mut payload = Payload::new(P::PAYLOAD_SIZE);
        self.packet.encode(&mut payload)?;
        payload.validate_filled()?;

        let buffer = encode_frame(
            source,
            sequence,
            target,
            self.flags,
            P::TYPE,
            payload.as_bytes(),
        );

        Ok(Transmission {
            source,
            sequence,
            buffer,
            target,
        })
    }

    /// Decodes a reply of the expected type and size; anything else yields
    /// `None`.
    pub fn decode(&self, response: &Response) -> Option<P::Response> {
        if response.message_type != P::RESPONSE_TYPE {
            return None;
        }

        let mut payload = response.payload();
        let decoded = payload
            .validate_size(P::RESPONSE_SIZE)
            .and_then(|_| P::decode(&mut payload));

        match decoded {
            Ok(value) => Some(value),
            Err(e) => {
                log::debug!("{} reply from {} not decoded: {}", P::NAME, response.mac, e);
                None
            }
        }
    }

    pub fn emit_response(&mut self, response: &Response) -> Option<P::Response> {
        let value = self.decode(response)?;
        for handler in &mut self.handlers {
            handler(response, &value);
        }
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::protocol::device::{GetPower, SetPower};

    fn reply(message_type: u16, payload: &[u8]) -> Response {
        let frame = encode_frame(
            7,
            3,
            MacAddress([1, 2, 3, 4, 5, 6]),
            Flags::empty(),
            message_type,
            payload,
        );
        Response::parse(&frame, "10.0.0.2:56700".parse().unwrap()).unwrap()
    }

    #[test]
    fn test_build_records_transmission_fields() {
        let target = MacAddress([1, 2, 3, 4, 5, 6]);
        let request = Request::new(SetPower { on: true });
        let tx = request.build(42, 17, target).unwrap();

        assert_eq!(tx.source, 42);
        assert_eq!(tx.sequence, 17);
        assert_eq!(tx.target, target);
        assert_eq!(
            u16::from_le_bytes([tx.buffer[0], tx.buffer[1]]) as usize,
            tx.len()
        );
        assert_eq!(&tx.buffer[36..], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_handlers_run_on_decoded_reply() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        let mut request = Request::new(GetPower);
        request.on_response(move |_, power| {
            assert!(power.on);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(request.emit_response(&reply(22, &[0xFF, 0xFF])).is_some());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Wrong type and wrong size are soft failures.
        assert!(request.emit_response(&reply(45, &[])).is_none());
        assert!(request.emit_response(&reply(22, &[0xFF])).is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        request.drop_handlers();
        assert_eq!(request.handler_count(), 0);
        assert!(request.emit_response(&reply(22, &[0, 0])).is_some());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_flag_builders() {
        let request = Request::new(GetPower).tagged().with_acknowledgement();
        assert!(request.flags().contains(Flags::TAGGED));
        assert!(request.flags().contains(Flags::ACKNOWLEDGE));
        assert!(request.flags().contains(Flags::RESPOND));
    }
}
