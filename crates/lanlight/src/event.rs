use std::collections::VecDeque;
use std::net::SocketAddr;

use serde::Serialize;

use crate::device::{StateChange, StateKey};
use crate::protocol::MacAddress;

const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ClientEvent {
    Connect { mac: MacAddress, addr: SocketAddr },
    Load { mac: MacAddress },
    Change { mac: MacAddress, change: StateChange },
    Disconnect { mac: MacAddress },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connect,
    Load,
    Change,
    Disconnect,
}

impl ClientEvent {
    pub fn mac(&self) -> MacAddress {
        match self {
            ClientEvent::Connect { mac, .. }
            | ClientEvent::Load { mac }
            | ClientEvent::Change { mac, .. }
            | ClientEvent::Disconnect { mac } => *mac,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            ClientEvent::Connect { .. } => EventKind::Connect,
            ClientEvent::Load { .. } => EventKind::Load,
            ClientEvent::Change { .. } => EventKind::Change,
            ClientEvent::Disconnect { .. } => EventKind::Disconnect,
        }
    }

    pub fn key(&self) -> Option<StateKey> {
        match self {
            ClientEvent::Change { change, .. } => Some(change.key()),
            _ => None,
        }
    }
}

/// Selects which events a listener sees. Unset fields match anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub kind: Option<EventKind>,
    pub mac: Option<MacAddress>,
    pub key: Option<StateKey>,
}

impl EventFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn kind(kind: EventKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Change events for one state key.
    pub fn key(key: StateKey) -> Self {
        Self {
            kind: Some(EventKind::Change),
            key: Some(key),
            ..Self::default()
        }
    }

    pub fn for_device(mut self, mac: MacAddress) -> Self {
        self.mac = Some(mac);
        self
    }

    pub fn matches(&self, event: &ClientEvent) -> bool {
        self.kind.is_none_or(|kind| kind == event.kind())
            && self.mac.is_none_or(|mac| mac == event.mac())
            && self.key.is_none_or(|key| Some(key) == event.key())
    }
}

pub type ListenerId = u64;

type Listener = Box<dyn FnMut(&ClientEvent) + Send>;

/// Typed publish/subscribe hub. Every emitted event goes to the matching
/// listeners and into a bounded queue for polling consumers.
pub struct EventBus {
    listeners: Vec<(ListenerId, EventFilter, Listener)>,
    next_id: ListenerId,
    queue: VecDeque<ClientEvent>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 1,
            queue: VecDeque::new(),
            capacity,
        }
    }

    pub fn subscribe<F>(&mut self, filter: EventFilter, listener: F) -> ListenerId
    where
        F: FnMut(&ClientEvent) + Send + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.push((id, filter, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub fn on_connect<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&ClientEvent) + Send + 'static,
    {
        self.subscribe(EventFilter::kind(EventKind::Connect), listener)
    }

    pub fn on_load<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&ClientEvent) + Send + 'static,
    {
        self.subscribe(EventFilter::kind(EventKind::Load), listener)
    }

    pub fn on_change<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&ClientEvent) + Send + 'static,
    {
        self.subscribe(EventFilter::kind(EventKind::Change), listener)
    }

    pub fn on_key<F>(&mut self, key: StateKey, listener: F) -> ListenerId
    where
        F: FnMut(&ClientEvent) + Send + 'static,
    {
        self.subscribe(EventFilter::key(key), listener)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn emit(&mut self, event: ClientEvent) {
        for (_, filter, listener) in &mut self.listeners {
            if filter.matches(&event) {
                listener(&event);
            }
        }

        if self.capacity == 0 {
            return;
        }
        while self.queue.len() >= self.capacity {
            self.queue.pop_front();
        }
        self.queue.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<ClientEvent> {
        self.queue.drain(..).collect()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::protocol::{Label, Power};

    const MAC: MacAddress = MacAddress([1, 1, 1, 1, 1, 1]);
    const OTHER: MacAddress = MacAddress([2, 2, 2, 2, 2, 2]);

    fn power(mac: MacAddress) -> ClientEvent {
        ClientEvent::Change {
            mac,
            change: StateChange::Power(Power { on: true }),
        }
    }

    #[test]
    fn test_filters_route_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = EventBus::new();

        let log = Arc::clone(&seen);
        bus.subscribe(EventFilter::key(StateKey::Power).for_device(MAC), move |e| {
            log.lock().unwrap().push(e.clone());
        });

        bus.emit(power(MAC));
        bus.emit(power(OTHER));
        bus.emit(ClientEvent::Change {
            mac: MAC,
            change: StateChange::Label(Label {
                label: "Desk".to_string(),
            }),
        });
        bus.emit(ClientEvent::Load { mac: MAC });

        assert_eq!(*seen.lock().unwrap(), vec![power(MAC)]);
        assert_eq!(bus.drain().len(), 4);
        assert_eq!(bus.queued(), 0);
    }

    #[test]
    fn test_unsubscribe() {
        let count = Arc::new(Mutex::new(0));
        let mut bus = EventBus::new();

        let hits = Arc::clone(&count);
        let id = bus.on_load(move |_| *hits.lock().unwrap() += 1);
        bus.emit(ClientEvent::Load { mac: MAC });
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(ClientEvent::Load { mac: MAC });

        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_queue_drops_oldest() {
        let mut bus = EventBus::with_capacity(2);
        bus.emit(ClientEvent::Load { mac: MAC });
        bus.emit(ClientEvent::Disconnect { mac: MAC });
        bus.emit(ClientEvent::Load { mac: OTHER });

        let events = bus.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], ClientEvent::Disconnect { mac: MAC });
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(power(MAC)).unwrap();
        assert_eq!(json["event"], "change");
        assert_eq!(json["mac"], "01:01:01:01:01:01");
        assert_eq!(json["change"]["key"], "power");
    }
}
