use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::device::StateChange;
use crate::protocol::{MacAddress, Response};

/// Responses are matched on the pair the client stamped into the header.
pub type CorrelationKey = (u32, u8);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("device {mac} did not answer request {sequence}")]
    Timeout { mac: MacAddress, sequence: u8 },
    #[error("sequence {0} is still awaiting a reply")]
    SequenceInUse(u8),
    #[error("request dropped before a reply arrived")]
    Dropped,
    #[error("transport failure: {0}")]
    Io(String),
}

#[derive(Debug, Default)]
pub struct SequenceCounter {
    next: u8,
}

impl SequenceCounter {
    pub fn next(&mut self) -> u8 {
        let sequence = self.next;
        self.next = self.next.wrapping_add(1);
        sequence
    }

    pub fn peek(&self) -> u8 {
        self.next
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Delivered {
    Matched,
    /// A background poll produced a fresh value for the device cache.
    State(StateChange),
}

/// Receiving end of one pending request.
pub trait ResponseSink: Send {
    /// Offers a response; `None` means it did not decode and the request
    /// keeps waiting.
    fn deliver(&mut self, response: &Response) -> Option<Delivered>;

    fn expire(self: Box<Self>, error: RequestError);
}

pub struct Pending {
    pub name: &'static str,
    pub target: Option<(MacAddress, IpAddr)>,
    pub created_at: Instant,
    pub deadline: Instant,
    /// Stays registered until its deadline, accepting any number of replies.
    pub collect: bool,
    /// Issued by a watcher or monitor rather than a caller.
    pub background: bool,
    sink: Box<dyn ResponseSink>,
}

impl Pending {
    pub fn new(name: &'static str, timeout: Duration, sink: Box<dyn ResponseSink>) -> Self {
        let now = Instant::now();
        Self {
            name,
            target: None,
            created_at: now,
            deadline: now + timeout,
            collect: false,
            background: false,
            sink,
        }
    }

    pub fn target(mut self, mac: MacAddress, ip: IpAddr) -> Self {
        self.target = Some((mac, ip));
        self
    }

    pub fn collect(mut self) -> Self {
        self.collect = true;
        self
    }

    pub fn background(mut self) -> Self {
        self.background = true;
        self
    }

    pub fn mac(&self) -> Option<MacAddress> {
        self.target.map(|(mac, _)| mac)
    }

    pub fn expire(self, error: RequestError) {
        self.sink.expire(error);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// No request is waiting on this key. Late replies land here.
    Unmatched,
    /// The reply came from a different device than the one addressed.
    CrossTalk { expected: MacAddress },
    /// The reply did not decode as the expected state.
    Ignored,
    Delivered {
        delivered: Delivered,
        rtt: Duration,
    },
}

#[derive(Default)]
pub struct PendingTable {
    entries: HashMap<CorrelationKey, Pending>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &CorrelationKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_collecting(&self) -> bool {
        self.entries.values().any(|p| p.collect)
    }

    pub fn pending_for(&self, mac: &MacAddress) -> usize {
        self.entries
            .values()
            .filter(|p| p.mac().as_ref() == Some(mac))
            .count()
    }

    /// Registers a request. An occupied key is never overwritten: the new
    /// request fails with `SequenceInUse` and the older one keeps waiting.
    pub fn insert(&mut self, key: CorrelationKey, pending: Pending) -> Result<(), RequestError> {
        if self.entries.contains_key(&key) {
            let error = RequestError::SequenceInUse(key.1);
            pending.expire(error.clone());
            return Err(error);
        }
        self.entries.insert(key, pending);
        Ok(())
    }

    pub fn resolve(&mut self, response: &Response) -> Resolution {
        let key = (response.source, response.sequence);
        let Some(pending) = self.entries.get_mut(&key) else {
            return Resolution::Unmatched;
        };

        if let Some((mac, ip)) = pending.target {
            if mac != response.mac || ip != response.ip() {
                return Resolution::CrossTalk { expected: mac };
            }
        }

        let Some(delivered) = pending.sink.deliver(response) else {
            return Resolution::Ignored;
        };

        let rtt = pending.created_at.elapsed();
        if !pending.collect {
            self.entries.remove(&key);
        }

        Resolution::Delivered { delivered, rtt }
    }

    /// Removes every entry whose deadline has passed. The caller decides how
    /// each one is failed.
    pub fn take_expired(&mut self, now: Instant) -> Vec<(CorrelationKey, Pending)> {
        let keys: Vec<CorrelationKey> = self
            .entries
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(k, _)| *k)
            .collect();

        keys.into_iter()
            .filter_map(|key| self.entries.remove(&key).map(|p| (key, p)))
            .collect()
    }

    /// Fails every request addressed to `mac` with `Dropped`.
    pub fn drop_device(&mut self, mac: &MacAddress) -> usize {
        let keys: Vec<CorrelationKey> = self
            .entries
            .iter()
            .filter(|(_, p)| p.mac().as_ref() == Some(mac))
            .map(|(k, _)| *k)
            .collect();

        let count = keys.len();
        for key in keys {
            if let Some(pending) = self.entries.remove(&key) {
                pending.expire(RequestError::Dropped);
            }
        }
        count
    }

    pub fn drop_all(&mut self) {
        for (_, pending) in self.entries.drain() {
            pending.expire(RequestError::Dropped);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::protocol::{Flags, encode_frame};

    #[derive(Default)]
    struct Log {
        delivered: usize,
        expired: Vec<RequestError>,
    }

    struct RecordingSink {
        log: Arc<Mutex<Log>>,
        accept: u16,
    }

    impl ResponseSink for RecordingSink {
        fn deliver(&mut self, response: &Response) -> Option<Delivered> {
            if response.message_type != self.accept {
                return None;
            }
            self.log.lock().unwrap().delivered += 1;
            Some(Delivered::Matched)
        }

        fn expire(self: Box<Self>, error: RequestError) {
            self.log.lock().unwrap().expired.push(error);
        }
    }

    fn sink(log: &Arc<Mutex<Log>>) -> Box<dyn ResponseSink> {
        Box::new(RecordingSink {
            log: Arc::clone(log),
            accept: 22,
        })
    }

    fn response(mac: MacAddress, addr: &str, sequence: u8, message_type: u16) -> Response {
        let frame = encode_frame(7, sequence, mac, Flags::empty(), message_type, &[]);
        let addr: SocketAddr = addr.parse().unwrap();
        Response::parse(&frame, addr).unwrap()
    }

    const MAC: MacAddress = MacAddress([1, 2, 3, 4, 5, 6]);

    #[test]
    fn test_sequence_wraps() {
        let mut counter = SequenceCounter::default();
        for expected in 0..=255u8 {
            assert_eq!(counter.next(), expected);
        }
        assert_eq!(counter.next(), 0);
    }

    #[test]
    fn test_occupied_key_rejected() {
        let log = Arc::new(Mutex::new(Log::default()));
        let mut table = PendingTable::new();
        let timeout = Duration::from_secs(3);

        table
            .insert((7, 1), Pending::new("GetPower", timeout, sink(&log)))
            .unwrap();
        let second = table.insert((7, 1), Pending::new("GetPower", timeout, sink(&log)));

        assert_eq!(second, Err(RequestError::SequenceInUse(1)));
        assert_eq!(table.len(), 1);
        assert_eq!(log.lock().unwrap().expired, vec![RequestError::SequenceInUse(1)]);
    }

    #[test]
    fn test_resolve_checks_sender() {
        let log = Arc::new(Mutex::new(Log::default()));
        let mut table = PendingTable::new();
        let ip = "10.0.0.5".parse().unwrap();
        let pending = Pending::new("GetPower", Duration::from_secs(3), sink(&log)).target(MAC, ip);
        table.insert((7, 3), pending).unwrap();

        let other = MacAddress([9, 9, 9, 9, 9, 9]);
        assert_eq!(
            table.resolve(&response(other, "10.0.0.5:56700", 3, 22)),
            Resolution::CrossTalk { expected: MAC }
        );
        assert_eq!(
            table.resolve(&response(MAC, "10.0.0.6:56700", 3, 22)),
            Resolution::CrossTalk { expected: MAC }
        );
        assert_eq!(
            table.resolve(&response(MAC, "10.0.0.5:56700", 3, 45)),
            Resolution::Ignored
        );
        assert!(matches!(
            table.resolve(&response(MAC, "10.0.0.5:56700", 3, 22)),
            Resolution::Delivered {
                delivered: Delivered::Matched,
                ..
            }
        ));
        assert!(table.is_empty());
        assert_eq!(
            table.resolve(&response(MAC, "10.0.0.5:56700", 3, 22)),
            Resolution::Unmatched
        );
        assert_eq!(log.lock().unwrap().delivered, 1);
    }

    #[test]
    fn test_collect_entry_stays_until_deadline() {
        let log = Arc::new(Mutex::new(Log::default()));
        let mut table = PendingTable::new();
        let pending = Pending::new("GetService", Duration::from_millis(0), sink(&log)).collect();
        table.insert((7, 0), pending).unwrap();
        assert!(table.is_collecting());

        table.resolve(&response(MAC, "10.0.0.5:56700", 0, 22));
        table.resolve(&response(MAC, "10.0.0.5:56700", 0, 22));
        assert_eq!(table.len(), 1);

        let expired = table.take_expired(Instant::now());
        assert_eq!(expired.len(), 1);
        assert!(table.is_empty());
        assert_eq!(log.lock().unwrap().delivered, 2);
    }

    #[test]
    fn test_drop_device_fails_its_requests() {
        let log = Arc::new(Mutex::new(Log::default()));
        let mut table = PendingTable::new();
        let ip = "10.0.0.5".parse().unwrap();
        let timeout = Duration::from_secs(3);

        table
            .insert((7, 1), Pending::new("GetPower", timeout, sink(&log)).target(MAC, ip))
            .unwrap();
        table
            .insert((7, 2), Pending::new("GetLabel", timeout, sink(&log)).target(MAC, ip))
            .unwrap();
        table
            .insert((7, 3), Pending::new("GetService", timeout, sink(&log)))
            .unwrap();

        assert_eq!(table.pending_for(&MAC), 2);
        assert_eq!(table.drop_device(&MAC), 2);
        assert_eq!(table.len(), 1);
        assert_eq!(
            log.lock().unwrap().expired,
            vec![RequestError::Dropped, RequestError::Dropped]
        );
    }
}
