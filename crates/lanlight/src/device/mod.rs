mod registry;
pub mod slot;
mod state;

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

pub use registry::DeviceRegistry;
pub use slot::Slot;
pub use state::{DeviceState, Lifecycle, StateChange, StateKey};

use crate::product::{DEFAULT_TEMPERATURE, Features, ProductCatalog, TemperatureRange};
use crate::protocol::{GroupId, MacAddress};

pub const DEFAULT_KELVIN: u16 = 3500;

/// A recurring deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watch {
    pub interval: Duration,
    pub next_due: Instant,
}

impl Watch {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: Instant::now() + interval,
        }
    }

    /// Due on the next tick rather than one interval from now.
    pub fn immediate(interval: Duration) -> Self {
        Self {
            interval,
            next_due: Instant::now(),
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_due
    }

    pub fn reschedule(&mut self, now: Instant) {
        self.next_due = now + self.interval;
    }
}

/// One discovered device: its cached state plus the bookkeeping the client
/// needs to poll and rate limit it.
#[derive(Debug)]
pub struct Device {
    state: DeviceState,
    features: Option<Features>,
    temperature: Option<TemperatureRange>,
    watchers: HashMap<StateKey, Watch>,
    last_sent: Option<Instant>,
    timeouts: u32,
}

impl Device {
    pub fn new(mac: MacAddress, addr: SocketAddr) -> Self {
        Self {
            state: DeviceState::new(mac, addr),
            features: None,
            temperature: None,
            watchers: HashMap::new(),
            last_sent: None,
            timeouts: 0,
        }
    }

    pub fn mac(&self) -> MacAddress {
        self.state.mac
    }

    pub fn addr(&self) -> SocketAddr {
        self.state.addr()
    }

    /// Returns whether the address changed.
    pub fn set_addr(&mut self, addr: SocketAddr) -> bool {
        if self.addr() == addr {
            return false;
        }
        self.state.ip = addr.ip();
        self.state.port = addr.port();
        true
    }

    pub fn ip(&self) -> IpAddr {
        self.state.ip
    }

    pub fn port(&self) -> u16 {
        self.state.port
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn is_alive(&self) -> bool {
        self.state.alive
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.lifecycle
    }

    pub fn set_lifecycle(&mut self, lifecycle: Lifecycle) {
        if self.state.alive {
            self.state.lifecycle = lifecycle;
        }
    }

    pub fn get<S: Slot>(&self) -> Option<&S::Value> {
        S::get(&self.state).as_ref()
    }

    /// Stores `value` and reports the change, or returns `None` when it is
    /// structurally equal to what is cached.
    pub fn reconcile<S: Slot>(&mut self, value: S::Value) -> Option<StateChange> {
        let current = S::get_mut(&mut self.state);
        if current.as_ref() == Some(&value) {
            return None;
        }
        *current = Some(value.clone());
        Some(S::wrap(value))
    }

    /// Writes without change detection.
    pub fn store<S: Slot>(&mut self, value: S::Value) {
        *S::get_mut(&mut self.state) = Some(value);
    }

    pub fn apply(&mut self, change: StateChange) -> Option<StateChange> {
        match change {
            StateChange::Firmware(v) => self.reconcile::<slot::Firmware>(v),
            StateChange::Version(v) => self.reconcile::<slot::Version>(v),
            StateChange::Info(v) => self.reconcile::<slot::Info>(v),
            StateChange::Label(v) => self.reconcile::<slot::Label>(v),
            StateChange::Group(v) => self.reconcile::<slot::Group>(v),
            StateChange::Location(v) => self.reconcile::<slot::Location>(v),
            StateChange::Power(v) => self.reconcile::<slot::Power>(v),
            StateChange::Light(v) => self.reconcile::<slot::Light>(v),
            StateChange::Color(v) => self.reconcile::<slot::Color>(v),
            StateChange::Infrared(v) => self.reconcile::<slot::Infrared>(v),
        }
    }

    /// Looks up the product for the cached version and derives the feature
    /// set for the cached firmware. Returns whether a product was found.
    pub fn resolve_product(&mut self, catalog: &ProductCatalog) -> bool {
        let Some(product) = self.state.version.as_ref().and_then(|v| catalog.lookup(v)) else {
            return false;
        };

        let firmware = self.state.firmware.as_ref();
        self.features = Some(product.features_for(firmware));
        self.temperature = product.temperature_for(firmware);
        self.state.product = Some(product.clone());
        true
    }

    pub fn features(&self) -> Option<Features> {
        self.features
    }

    /// Devices with no resolved product are not gated.
    pub fn has_feature(&self, feature: Features) -> bool {
        self.features.is_none_or(|features| features.contains(feature))
    }

    pub fn temperature_range(&self) -> Option<TemperatureRange> {
        self.temperature
    }

    pub fn min_temperature(&self) -> u16 {
        self.temperature.map_or(DEFAULT_TEMPERATURE, |range| range.min)
    }

    pub fn max_temperature(&self) -> u16 {
        self.temperature.map_or(DEFAULT_TEMPERATURE, |range| range.max)
    }

    /// Kelvin used when a color is given without one.
    pub fn default_kelvin(&self) -> u16 {
        self.state
            .color
            .as_ref()
            .map(|state| state.color.kelvin)
            .or(self.temperature.map(|range| range.min))
            .unwrap_or(DEFAULT_KELVIN)
    }

    /// Device power, or the light power level when device power is unknown.
    pub fn is_on(&self) -> bool {
        self.state
            .power
            .map(|power| power.on)
            .or(self.state.light.as_ref().map(|light| light.level > 0.0))
            .unwrap_or(false)
    }

    pub fn label(&self) -> Option<&str> {
        self.state.label.as_ref().map(|label| label.label.as_str())
    }

    pub fn in_group(&self, id: &GroupId) -> bool {
        self.state.group.as_ref().is_some_and(|group| group.id == *id)
    }

    pub fn in_location(&self, id: &GroupId) -> bool {
        self.state
            .location
            .as_ref()
            .is_some_and(|location| location.id == *id)
    }

    /// Stamps and returns true when at least `rate_limit` has passed since
    /// the last stamp.
    pub fn can_send(&mut self, rate_limit: Duration) -> bool {
        let now = Instant::now();
        if self
            .last_sent
            .is_some_and(|last| now.duration_since(last) < rate_limit)
        {
            return false;
        }
        self.last_sent = Some(now);
        true
    }

    pub fn watch(&mut self, key: StateKey, interval: Duration) {
        self.watchers.insert(key, Watch::new(interval));
    }

    pub fn unwatch(&mut self, key: StateKey) -> bool {
        self.watchers.remove(&key).is_some()
    }

    pub fn watched(&self) -> Vec<StateKey> {
        let mut keys: Vec<StateKey> = self.watchers.keys().copied().collect();
        keys.sort();
        keys
    }

    pub fn stop_monitoring(&mut self) {
        self.watchers.clear();
    }

    /// Keys whose interval has elapsed; each is rescheduled.
    pub fn due_watches(&mut self, now: Instant) -> Vec<StateKey> {
        let mut due = Vec::new();
        for (key, watch) in &mut self.watchers {
            if watch.is_due(now) {
                watch.reschedule(now);
                due.push(*key);
            }
        }
        due.sort();
        due
    }

    pub fn record_timeout(&mut self) {
        self.timeouts += 1;
    }

    pub fn timeouts(&self) -> u32 {
        self.timeouts
    }

    /// Final transition. A removed device is never revived.
    pub fn mark_removed(&mut self) {
        self.stop_monitoring();
        self.state.lifecycle = Lifecycle::Removed;
        self.state.alive = false;
    }
}
