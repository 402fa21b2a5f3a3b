use std::marker::PhantomData;
use std::sync::mpsc::{Receiver, Sender, TryRecvError};

use serde::Serialize;

use crate::device::Slot;
use crate::net::{Delivered, RequestError, ResponseSink};
use crate::protocol::{MacAddress, Packet, Request, Response, UDP_SERVICE};
use crate::protocol::device::GetService;

/// Handle to an in-flight request. Resolved by `Client::wait`.
#[derive(Debug)]
pub struct Reply<T> {
    receiver: Receiver<Result<T, RequestError>>,
    sequence: u8,
    mac: Option<MacAddress>,
}

impl<T> Reply<T> {
    pub(crate) fn new(
        receiver: Receiver<Result<T, RequestError>>,
        sequence: u8,
        mac: Option<MacAddress>,
    ) -> Self {
        Self {
            receiver,
            sequence,
            mac,
        }
    }

    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    pub fn mac(&self) -> Option<MacAddress> {
        self.mac
    }

    /// Non-blocking check. A reply whose request vanished without an answer
    /// resolves to `Dropped`.
    pub fn try_take(&self) -> Option<Result<T, RequestError>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(RequestError::Dropped)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    /// The device answered with this value.
    Confirmed,
    /// The device did not answer; this is the last known value.
    Stale,
    /// The device did not answer; this is the value that was sent.
    Unconfirmed,
}

/// Result of a reactive accessor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fetched<T> {
    pub value: T,
    pub freshness: Freshness,
}

impl<T> Fetched<T> {
    pub fn confirmed(value: T) -> Self {
        Self {
            value,
            freshness: Freshness::Confirmed,
        }
    }

    pub fn stale(value: T) -> Self {
        Self {
            value,
            freshness: Freshness::Stale,
        }
    }

    pub fn unconfirmed(value: T) -> Self {
        Self {
            value,
            freshness: Freshness::Unconfirmed,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.freshness == Freshness::Confirmed
    }

    pub fn is_stale(&self) -> bool {
        self.freshness == Freshness::Stale
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        Fetched {
            value: f(self.value),
            freshness: self.freshness,
        }
    }
}

/// Forwards the decoded reply to a caller's `Reply`.
pub(crate) struct TypedSink<P: Packet> {
    request: Request<P>,
    sender: Sender<Result<P::Response, RequestError>>,
}

impl<P: Packet> TypedSink<P> {
    pub(crate) fn new(request: Request<P>, sender: Sender<Result<P::Response, RequestError>>) -> Self {
        Self { request, sender }
    }
}

impl<P> ResponseSink for TypedSink<P>
where
    P: Packet + Send,
    P::Response: Send,
{
    fn deliver(&mut self, response: &Response) -> Option<Delivered> {
        let value = self.request.emit_response(response)?;
        // The caller may have stopped waiting.
        let _ = self.sender.send(Ok(value));
        Some(Delivered::Matched)
    }

    fn expire(self: Box<Self>, error: RequestError) {
        let _ = self.sender.send(Err(error));
    }
}

/// Feeds a polled value back into the device cache.
pub(crate) struct StateSink<S, P: Packet> {
    request: Request<P>,
    slot: PhantomData<fn() -> S>,
}

impl<S, P: Packet> StateSink<S, P> {
    pub(crate) fn new(request: Request<P>) -> Self {
        Self {
            request,
            slot: PhantomData,
        }
    }
}

impl<S, P> ResponseSink for StateSink<S, P>
where
    S: Slot,
    P: Packet<Response = S::Value> + Send,
{
    fn deliver(&mut self, response: &Response) -> Option<Delivered> {
        let value = self.request.emit_response(response)?;
        Some(Delivered::State(S::wrap(value)))
    }

    fn expire(self: Box<Self>, _error: RequestError) {}
}

/// Background liveness probe; only the arrival of a reply matters.
pub(crate) struct PingSink<P: Packet> {
    request: Request<P>,
}

impl<P: Packet> PingSink<P> {
    pub(crate) fn new(request: Request<P>) -> Self {
        Self { request }
    }
}

impl<P> ResponseSink for PingSink<P>
where
    P: Packet + Send,
{
    fn deliver(&mut self, response: &Response) -> Option<Delivered> {
        self.request.decode(response)?;
        Some(Delivered::Matched)
    }

    fn expire(self: Box<Self>, _error: RequestError) {}
}

/// Accumulates every MAC that answers a discovery broadcast until the
/// window closes.
pub(crate) struct DiscoverySink {
    request: Request<GetService>,
    found: Vec<MacAddress>,
    sender: Sender<Result<Vec<MacAddress>, RequestError>>,
}

impl DiscoverySink {
    pub(crate) fn new(
        request: Request<GetService>,
        sender: Sender<Result<Vec<MacAddress>, RequestError>>,
    ) -> Self {
        Self {
            request,
            found: Vec::new(),
            sender,
        }
    }
}

impl ResponseSink for DiscoverySink {
    fn deliver(&mut self, response: &Response) -> Option<Delivered> {
        let service = self.request.emit_response(response)?;
        if service.service != UDP_SERVICE {
            return None;
        }
        if !self.found.contains(&response.mac) {
            self.found.push(response.mac);
        }
        Some(Delivered::Matched)
    }

    fn expire(self: Box<Self>, error: RequestError) {
        let result = match error {
            RequestError::Timeout { .. } => Ok(self.found),
            other => Err(other),
        };
        let _ = self.sender.send(result);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::device::slot;
    use crate::device::StateChange;
    use crate::protocol::device::GetPower;
    use crate::protocol::{Flags, Power, encode_frame};

    fn reply(message_type: u16, payload: &[u8]) -> Response {
        let frame = encode_frame(
            5,
            1,
            MacAddress([1, 2, 3, 4, 5, 6]),
            Flags::empty(),
            message_type,
            payload,
        );
        Response::parse(&frame, "10.0.0.3:56700".parse().unwrap()).unwrap()
    }

    #[test]
    fn test_typed_sink_resolves_once() {
        let (sender, receiver) = mpsc::channel();
        let reply_handle = Reply::new(receiver, 1, None);
        let mut sink: Box<dyn ResponseSink> =
            Box::new(TypedSink::new(Request::new(GetPower), sender));

        assert!(reply_handle.try_take().is_none());
        assert_eq!(sink.deliver(&reply(45, &[])), None);
        assert_eq!(sink.deliver(&reply(22, &[0xFF, 0xFF])), Some(Delivered::Matched));
        assert_eq!(reply_handle.try_take(), Some(Ok(Power { on: true })));

        drop(sink);
        assert_eq!(reply_handle.try_take(), Some(Err(RequestError::Dropped)));
    }

    #[test]
    fn test_state_sink_wraps_value() {
        let mut sink = StateSink::<slot::Power, _>::new(Request::new(GetPower));
        assert_eq!(
            sink.deliver(&reply(22, &[0, 0])),
            Some(Delivered::State(StateChange::Power(Power { on: false })))
        );
    }

    #[test]
    fn test_discovery_sink_collects_until_expiry() {
        let (sender, receiver) = mpsc::channel();
        let mut sink = Box::new(DiscoverySink::new(Request::new(GetService), sender));

        let service = [1, 0x7C, 0xDD, 0, 0];
        assert!(sink.deliver(&reply(3, &service)).is_some());
        assert!(sink.deliver(&reply(3, &service)).is_some());
        assert!(sink.deliver(&reply(3, &[5, 0x7C, 0xDD, 0, 0])).is_none());

        sink.expire(RequestError::Timeout {
            mac: MacAddress::BROADCAST,
            sequence: 1,
        });
        assert_eq!(
            receiver.try_recv().unwrap(),
            Ok(vec![MacAddress([1, 2, 3, 4, 5, 6])])
        );
    }

    #[test]
    fn test_fetched_flags() {
        assert!(Fetched::confirmed(1).is_confirmed());
        assert!(Fetched::stale(1).is_stale());
        let mapped = Fetched::unconfirmed(2).map(|v| v * 2);
        assert_eq!(mapped.value, 4);
        assert_eq!(mapped.freshness, Freshness::Unconfirmed);
    }
}
