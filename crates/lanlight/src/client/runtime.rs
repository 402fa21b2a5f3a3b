use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use super::config::ClientConfig;
use super::error::ClientError;
use super::handle::DeviceHandle;
use super::reply::{DiscoverySink, PingSink, Reply, StateSink, TypedSink};
use crate::device::{Device, DeviceRegistry, DeviceState, Lifecycle, Slot, StateChange, StateKey, Watch, slot};
use crate::event::{ClientEvent, EventBus};
use crate::net::{
    CorrelationKey, Delivered, NetworkEndpoint, NetworkStats, Pending, PendingTable, RequestError,
    Resolution, ResponseSink, SequenceCounter, rand_source,
};
use crate::product::{Features, ProductCatalog};
use crate::protocol::device::{
    GetGroup, GetHostFirmware, GetInfo, GetLabel, GetLocation, GetPower, GetService, GetVersion,
    STATE_SERVICE, SetPower,
};
use crate::protocol::light::{GetColor, GetInfrared, LightGetPower, SetColor};
use crate::protocol::{
    GroupId, Hsbk, LightState, MacAddress, Packet, Power, Request, Response, UDP_SERVICE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tracking {
    Caller,
    Background,
    Collect,
}

/// Serializable snapshot of the whole client.
#[derive(Debug, Clone, Serialize)]
pub struct ClientState {
    pub source: u32,
    pub devices: Vec<DeviceState>,
}

pub type GroupResult<T> = Vec<(MacAddress, Result<T, ClientError>)>;

/// Owns the socket, the correlation table and every known device. Nothing
/// happens between calls: replies, timeouts, watchers and the monitor all
/// advance inside `tick_once`, which `wait` and `run` drive.
pub struct Client {
    endpoint: NetworkEndpoint,
    config: ClientConfig,
    source: u32,
    sequence: SequenceCounter,
    pending: PendingTable,
    devices: DeviceRegistry,
    catalog: ProductCatalog,
    events: EventBus,
    monitor: Option<Watch>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let catalog = ProductCatalog::builtin()?;
        Self::with_catalog(config, catalog)
    }

    pub fn with_catalog(config: ClientConfig, catalog: ProductCatalog) -> Result<Self, ClientError> {
        let endpoint = NetworkEndpoint::bind(config.bind)?;
        let source = config
            .source
            .filter(|source| *source != 0)
            .unwrap_or_else(rand_source);

        log::info!(
            "client {:08x} bound to {} ({} products known)",
            source,
            endpoint.local_addr(),
            catalog.len()
        );

        Ok(Self {
            endpoint,
            config,
            source,
            sequence: SequenceCounter::default(),
            pending: PendingTable::new(),
            devices: DeviceRegistry::new(),
            catalog,
            events: EventBus::new(),
            monitor: None,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.endpoint.local_addr()
    }

    pub fn source(&self) -> u32 {
        self.source
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn stats(&self) -> &NetworkStats {
        self.endpoint.stats()
    }

    pub fn catalog(&self) -> &ProductCatalog {
        &self.catalog
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        self.endpoint.running()
    }

    pub fn shutdown(&mut self) {
        self.endpoint.shutdown();
        self.pending.drop_all();
    }

    pub fn events(&mut self) -> &mut EventBus {
        &mut self.events
    }

    pub fn drain_events(&mut self) -> Vec<ClientEvent> {
        self.events.drain()
    }

    pub fn device(&self, mac: &MacAddress) -> Option<&Device> {
        self.devices.get(mac)
    }

    pub(crate) fn device_mut(&mut self, mac: &MacAddress) -> Result<&mut Device, ClientError> {
        self.devices
            .get_mut(mac)
            .ok_or(ClientError::UnknownDevice(*mac))
    }

    pub fn has_device(&self, mac: &MacAddress) -> bool {
        self.devices.contains(mac)
    }

    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    pub fn control(&mut self, mac: &MacAddress) -> Result<DeviceHandle<'_>, ClientError> {
        if !self.devices.contains(mac) {
            return Err(ClientError::UnknownDevice(*mac));
        }
        Ok(DeviceHandle::new(self, *mac))
    }

    pub fn get_group(&self, id: &GroupId) -> Vec<&Device> {
        self.devices.in_group(id)
    }

    pub fn get_location(&self, id: &GroupId) -> Vec<&Device> {
        self.devices.in_location(id)
    }

    pub fn state(&self) -> ClientState {
        let devices = self
            .devices
            .macs()
            .iter()
            .filter_map(|mac| self.devices.get(mac))
            .map(|device| device.state().clone())
            .collect();
        ClientState {
            source: self.source,
            devices,
        }
    }

    fn send_frame<P: Packet>(
        &mut self,
        request: &Request<P>,
        target: Option<MacAddress>,
        track: bool,
    ) -> Result<(CorrelationKey, Option<(MacAddress, IpAddr)>), ClientError> {
        let unicast = match target {
            Some(mac) => {
                let device = self
                    .devices
                    .get(&mac)
                    .ok_or(ClientError::UnknownDevice(mac))?;
                Some((mac, device.addr()))
            }
            None => None,
        };

        let sequence = self.sequence.next();
        let key = (self.source, sequence);
        if track && self.pending.contains(&key) {
            return Err(RequestError::SequenceInUse(sequence).into());
        }

        let transmission =
            request.build(self.source, sequence, target.unwrap_or(MacAddress::BROADCAST))?;

        match unicast {
            Some((_, addr)) => {
                self.endpoint
                    .send_to(&transmission, addr)
                    .map_err(|e| RequestError::Io(e.to_string()))?;
            }
            None => {
                for ip in &self.config.broadcast {
                    let addr = SocketAddr::new(*ip, self.config.device_port);
                    self.endpoint
                        .send_to(&transmission, addr)
                        .map_err(|e| RequestError::Io(e.to_string()))?;
                }
            }
        }

        log::trace!("sent {} #{} to {:?}", P::NAME, sequence, target);
        Ok((key, unicast.map(|(mac, addr)| (mac, addr.ip()))))
    }

    fn track<P, F>(
        &mut self,
        request: Request<P>,
        target: Option<MacAddress>,
        timeout: Duration,
        tracking: Tracking,
        sink: F,
    ) -> Result<u8, ClientError>
    where
        P: Packet,
        F: FnOnce(Request<P>) -> Box<dyn ResponseSink>,
    {
        let (key, addressed) = self.send_frame(&request, target, true)?;

        let mut pending = Pending::new(P::NAME, timeout, sink(request));
        if let Some((mac, ip)) = addressed {
            pending = pending.target(mac, ip);
        }
        pending = match tracking {
            Tracking::Caller => pending,
            Tracking::Background => pending.background(),
            Tracking::Collect => pending.collect(),
        };

        self.pending.insert(key, pending)?;
        Ok(key.1)
    }

    /// Sends without waiting for or tracking a reply. Returns the sequence.
    pub fn send<P: Packet>(
        &mut self,
        target: Option<MacAddress>,
        request: &Request<P>,
    ) -> Result<u8, ClientError> {
        let (key, _) = self.send_frame(request, target, false)?;
        Ok(key.1)
    }

    /// Sends and registers the request. The returned `Reply` resolves once a
    /// matching response arrives or `timeout` (default: the configured
    /// request timeout) elapses.
    pub fn request<P>(
        &mut self,
        target: Option<MacAddress>,
        request: Request<P>,
        timeout: Option<Duration>,
    ) -> Result<Reply<P::Response>, ClientError>
    where
        P: Packet + Send + 'static,
        P::Response: Send + 'static,
    {
        let timeout = timeout.unwrap_or(self.config.request_timeout);
        let (sender, receiver) = mpsc::channel();
        let sequence = self.track(request, target, timeout, Tracking::Caller, |request| {
            Box::new(TypedSink::new(request, sender))
        })?;
        Ok(Reply::new(receiver, sequence, target))
    }

    /// Drives the client until `reply` resolves.
    pub fn wait<T>(&mut self, reply: Reply<T>) -> Result<T, RequestError> {
        loop {
            self.tick_once();
            if let Some(result) = reply.try_take() {
                return result;
            }
            thread::sleep(self.config.poll_interval);
        }
    }

    /// Request and wait. A device that times out is removed.
    pub fn get<P>(
        &mut self,
        mac: MacAddress,
        request: Request<P>,
        timeout: Option<Duration>,
    ) -> Result<P::Response, ClientError>
    where
        P: Packet + Send + 'static,
        P::Response: Send + 'static,
    {
        let reply = self.request(Some(mac), request, timeout)?;
        self.settle(mac, reply)
    }

    fn settle<T>(&mut self, mac: MacAddress, reply: Reply<T>) -> Result<T, ClientError> {
        self.wait(reply).map_err(|error| {
            if matches!(error, RequestError::Timeout { .. }) {
                self.remove_device(&mac);
            }
            error.into()
        })
    }

    /// Broadcasts a discovery probe. Does nothing while a discovery window
    /// is still open unless `rescan` is set.
    pub fn discover(&mut self, rescan: bool) -> Result<bool, ClientError> {
        if !rescan && self.pending.is_collecting() {
            return Ok(false);
        }
        self.start_discovery(self.config.discovery_timeout)?;
        Ok(true)
    }

    /// Discovers for `window` and returns every MAC that answered, known or
    /// not.
    pub fn scan(&mut self, window: Duration) -> Result<Vec<MacAddress>, ClientError> {
        let reply = self.start_discovery(window)?;
        Ok(self.wait(reply)?)
    }

    fn start_discovery(&mut self, window: Duration) -> Result<Reply<Vec<MacAddress>>, ClientError> {
        let (sender, receiver) = mpsc::channel();
        let sequence = self.track(
            Request::new(GetService),
            None,
            window,
            Tracking::Collect,
            |request| Box::new(DiscoverySink::new(request, sender)),
        )?;
        log::debug!("discovery #{} open for {:?}", sequence, window);
        Ok(Reply::new(receiver, sequence, None))
    }

    /// Receives and routes every waiting datagram, then runs timers.
    pub fn tick_once(&mut self) {
        match self.endpoint.receive() {
            Ok(responses) => {
                for response in responses {
                    self.dispatch(response);
                }
            }
            Err(e) => log::error!("receive failed: {}", e),
        }

        let now = Instant::now();
        self.expire_requests(now);
        self.run_monitor(now);
        self.run_watchers(now);
    }

    pub fn run(&mut self) {
        while self.endpoint.is_running() {
            self.tick_once();
            thread::sleep(self.config.poll_interval);
        }
        self.pending.drop_all();
    }

    pub fn run_for(&mut self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while self.endpoint.is_running() && Instant::now() < deadline {
            self.tick_once();
            thread::sleep(self.config.poll_interval);
        }
    }

    fn dispatch(&mut self, response: Response) {
        if response.message_type == STATE_SERVICE {
            self.register_device(&response);
        }

        match self.pending.resolve(&response) {
            Resolution::Unmatched => {
                log::trace!(
                    "no request waiting for type {} #{} from {}",
                    response.message_type,
                    response.sequence,
                    response.mac
                );
            }
            Resolution::CrossTalk { expected } => {
                log::warn!(
                    "reply #{} from {} ({}) was addressed to {}",
                    response.sequence,
                    response.mac,
                    response.addr,
                    expected
                );
            }
            Resolution::Ignored => {
                log::debug!(
                    "type {} from {} does not answer #{}",
                    response.message_type,
                    response.mac,
                    response.sequence
                );
            }
            Resolution::Delivered { delivered, rtt } => {
                self.endpoint.stats_mut().record_rtt(rtt);
                if let Delivered::State(change) = delivered {
                    self.apply_change(response.mac, change);
                }
            }
        }
    }

    fn register_device(&mut self, response: &Response) {
        let Some(service) = Request::new(GetService).decode(response) else {
            return;
        };
        if service.service != UDP_SERVICE {
            return;
        }

        let port = u16::try_from(service.port)
            .ok()
            .filter(|port| *port != 0)
            .unwrap_or(self.config.device_port);
        let addr = SocketAddr::new(response.ip(), port);

        if let Some(device) = self.devices.get_mut(&response.mac) {
            let previous = device.addr();
            if device.set_addr(addr) {
                log::info!("device {} moved from {} to {}", response.mac, previous, addr);
            }
            return;
        }

        if self.devices.insert(Device::new(response.mac, addr)) {
            log::info!("device {} connected at {}", response.mac, addr);
            self.events.emit(ClientEvent::Connect {
                mac: response.mac,
                addr,
            });
        }
    }

    fn expire_requests(&mut self, now: Instant) {
        for ((_, sequence), pending) in self.pending.take_expired(now) {
            let mac = pending.mac();
            if !pending.collect {
                self.endpoint.stats_mut().timeouts += 1;
                log::debug!(
                    "{} #{} to {} timed out",
                    pending.name,
                    sequence,
                    mac.unwrap_or(MacAddress::BROADCAST)
                );
            }

            let background = pending.background;
            pending.expire(RequestError::Timeout {
                mac: mac.unwrap_or(MacAddress::BROADCAST),
                sequence,
            });

            if background {
                if let Some(mac) = mac {
                    self.remove_device(&mac);
                }
            }
        }
    }

    /// Periodically rediscovers and pings every known device in the
    /// background. Devices that miss a ping are removed.
    pub fn monitor(&mut self, interval: Duration) {
        self.monitor = Some(Watch::immediate(interval));
    }

    pub fn stop_monitor(&mut self) {
        self.monitor = None;
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.is_some()
    }

    fn run_monitor(&mut self, now: Instant) {
        let Some(watch) = self.monitor.as_mut() else {
            return;
        };
        if !watch.is_due(now) {
            return;
        }
        watch.reschedule(now);

        if let Err(e) = self.discover(false) {
            log::error!("discovery failed: {}", e);
        }
        for mac in self.devices.macs() {
            if let Err(e) = self.ping_background(mac) {
                log::warn!("ping to {} not sent: {}", mac, e);
            }
        }
    }

    fn ping_background(&mut self, mac: MacAddress) -> Result<u8, ClientError> {
        let timeout = self.config.ping_timeout;
        self.track(
            Request::new(GetInfo),
            Some(mac),
            timeout,
            Tracking::Background,
            |request| Box::new(PingSink::new(request)),
        )
    }

    /// Polls `key` on `mac` every `interval` (default: the configured watch
    /// interval). Polled values go through the same change detection as
    /// direct reads.
    pub fn watch(
        &mut self,
        mac: &MacAddress,
        key: StateKey,
        interval: Option<Duration>,
    ) -> Result<(), ClientError> {
        if !key.is_watchable() {
            return Err(ClientError::NotWatchable(key));
        }
        self.check_key(mac, key)?;
        let interval = interval.unwrap_or(self.config.watch_interval);
        self.device_mut(mac)?.watch(key, interval);
        Ok(())
    }

    pub fn unwatch(&mut self, mac: &MacAddress, key: StateKey) -> Result<bool, ClientError> {
        Ok(self.device_mut(mac)?.unwatch(key))
    }

    fn run_watchers(&mut self, now: Instant) {
        let mut due = Vec::new();
        for device in self.devices.iter_mut() {
            let mac = device.mac();
            due.extend(device.due_watches(now).into_iter().map(|key| (mac, key)));
        }

        for (mac, key) in due {
            if let Err(e) = self.poll(mac, key) {
                log::warn!("polling {} on {} failed: {}", key, mac, e);
            }
        }
    }

    /// Issues a background read of `key`. The reply lands in the cache.
    pub fn poll(&mut self, mac: MacAddress, key: StateKey) -> Result<u8, ClientError> {
        match key {
            StateKey::Firmware | StateKey::Version => Err(ClientError::NotWatchable(key)),
            StateKey::Info => self.poll_slot::<slot::Info, _>(mac, GetInfo),
            StateKey::Label => self.poll_slot::<slot::Label, _>(mac, GetLabel),
            StateKey::Group => self.poll_slot::<slot::Group, _>(mac, GetGroup),
            StateKey::Location => self.poll_slot::<slot::Location, _>(mac, GetLocation),
            StateKey::Power => self.poll_slot::<slot::Power, _>(mac, GetPower),
            StateKey::Light => self.poll_slot::<slot::Light, _>(mac, LightGetPower),
            StateKey::Color => self.poll_slot::<slot::Color, _>(mac, GetColor),
            StateKey::Infrared => self.poll_slot::<slot::Infrared, _>(mac, GetInfrared),
        }
    }

    fn poll_slot<S, P>(&mut self, mac: MacAddress, packet: P) -> Result<u8, ClientError>
    where
        S: Slot + 'static,
        P: Packet<Response = S::Value> + Send + 'static,
    {
        let timeout = self.config.request_timeout;
        self.track(
            Request::new(packet),
            Some(mac),
            timeout,
            Tracking::Background,
            |request| Box::new(StateSink::<S, P>::new(request)),
        )
    }

    /// Removes the device, stops its watchers and fails its pending
    /// requests with `Dropped`. A later discovery creates a fresh device.
    pub fn remove_device(&mut self, mac: &MacAddress) -> Option<Device> {
        let mut device = self.devices.remove(mac)?;
        device.mark_removed();
        let dropped = self.pending.drop_device(mac);
        log::info!("device {} removed ({} requests dropped)", mac, dropped);
        self.events.emit(ClientEvent::Disconnect { mac: *mac });
        Some(device)
    }

    /// Fills the cache in three waves: identity and power, then membership,
    /// then whatever the resolved product supports. Emits `Load` once done.
    pub fn load(&mut self, mac: MacAddress) -> Result<(), ClientError> {
        self.device_mut(&mac)?.set_lifecycle(Lifecycle::Loading);

        let firmware = self.request(Some(mac), Request::new(GetHostFirmware), None)?;
        let version = self.request(Some(mac), Request::new(GetVersion), None)?;
        let power = self.request(Some(mac), Request::new(GetPower), None)?;
        let label = self.request(Some(mac), Request::new(GetLabel), None)?;
        let info = self.request(Some(mac), Request::new(GetInfo), None)?;

        let firmware = self.settle(mac, firmware)?;
        let version = self.settle(mac, version)?;
        let power = self.settle(mac, power)?;
        let label = self.settle(mac, label)?;
        let info = self.settle(mac, info)?;

        let device = self
            .devices
            .get_mut(&mac)
            .ok_or(ClientError::UnknownDevice(mac))?;
        device.store::<slot::Firmware>(firmware);
        device.store::<slot::Version>(version);
        device.store::<slot::Power>(power);
        device.store::<slot::Label>(label);
        device.store::<slot::Info>(info);
        if !device.resolve_product(&self.catalog) {
            log::warn!(
                "device {} reports unknown product {}:{}",
                mac,
                version.vendor,
                version.product
            );
        }

        let group = self.request(Some(mac), Request::new(GetGroup), None)?;
        let location = self.request(Some(mac), Request::new(GetLocation), None)?;
        let group = self.settle(mac, group)?;
        let location = self.settle(mac, location)?;

        let device = self.device_mut(&mac)?;
        device.store::<slot::Group>(group);
        device.store::<slot::Location>(location);
        let features = device.features();

        if features.is_some_and(|f| f.contains(Features::COLOR)) {
            let color = self.get(mac, Request::new(GetColor), None)?;
            self.device_mut(&mac)?.store::<slot::Color>(color);
        }
        if features.is_some_and(|f| f.contains(Features::INFRARED)) {
            let infrared = self.get(mac, Request::new(GetInfrared), None)?;
            self.device_mut(&mac)?.store::<slot::Infrared>(infrared);
        }

        self.device_mut(&mac)?.set_lifecycle(Lifecycle::Ready);
        log::info!("device {} loaded", mac);
        self.events.emit(ClientEvent::Load { mac });
        Ok(())
    }

    pub(crate) fn check_feature(
        &self,
        mac: &MacAddress,
        feature: Features,
    ) -> Result<(), ClientError> {
        let device = self
            .devices
            .get(mac)
            .ok_or(ClientError::UnknownDevice(*mac))?;
        if device.has_feature(feature) {
            Ok(())
        } else {
            Err(ClientError::Feature { mac: *mac, feature })
        }
    }

    pub(crate) fn check_key(&self, mac: &MacAddress, key: StateKey) -> Result<(), ClientError> {
        match key.feature() {
            Some(feature) => self.check_feature(mac, feature),
            None if self.devices.contains(mac) => Ok(()),
            None => Err(ClientError::UnknownDevice(*mac)),
        }
    }

    /// Stores `value` and emits a change event when it differs from the
    /// cache. A stale device that answers is ready again.
    pub(crate) fn reconcile<S: Slot>(&mut self, mac: &MacAddress, value: S::Value) {
        let Some(device) = self.devices.get_mut(mac) else {
            return;
        };
        if device.lifecycle() == Lifecycle::Stale {
            device.set_lifecycle(Lifecycle::Ready);
        }
        if let Some(change) = device.reconcile::<S>(value) {
            self.after_change(*mac, change);
        }
    }

    fn apply_change(&mut self, mac: MacAddress, change: StateChange) {
        let Some(device) = self.devices.get_mut(&mac) else {
            return;
        };
        if device.lifecycle() == Lifecycle::Stale {
            device.set_lifecycle(Lifecycle::Ready);
        }
        if let Some(change) = device.apply(change) {
            self.after_change(mac, change);
        }
    }

    fn after_change(&mut self, mac: MacAddress, change: StateChange) {
        if matches!(change.key(), StateKey::Version | StateKey::Firmware) {
            if let Some(device) = self.devices.get_mut(&mac) {
                device.resolve_product(&self.catalog);
            }
        }
        log::debug!("device {} {} changed", mac, change.key());
        self.events.emit(ClientEvent::Change { mac, change });
    }

    pub(crate) fn mark_stale(&mut self, mac: &MacAddress) {
        if let Some(device) = self.devices.get_mut(mac) {
            device.set_lifecycle(Lifecycle::Stale);
            device.record_timeout();
        }
    }

    /// Issues every request before waiting on any, then reconciles each
    /// answer. Members whose request could not be built keep their error.
    fn fan_out<S, P>(
        &mut self,
        members: Vec<(MacAddress, Result<Request<P>, ClientError>)>,
    ) -> GroupResult<S::Value>
    where
        S: Slot,
        P: Packet<Response = S::Value> + Send + 'static,
    {
        let mut replies = Vec::with_capacity(members.len());
        for (mac, request) in members {
            let reply = request.and_then(|request| self.request(Some(mac), request, None));
            replies.push((mac, reply));
        }

        let mut results = Vec::with_capacity(replies.len());
        for (mac, reply) in replies {
            let result = reply.and_then(|reply| self.settle(mac, reply));
            if let Ok(value) = &result {
                self.reconcile::<S>(&mac, value.clone());
            }
            results.push((mac, result));
        }
        results
    }

    pub fn set_group_power(&mut self, id: &GroupId, on: bool) -> GroupResult<Power> {
        let members = self
            .devices
            .in_group(id)
            .iter()
            .map(|device| (device.mac(), Ok(Request::new(SetPower { on }))))
            .collect();
        self.fan_out::<slot::Power, _>(members)
    }

    /// Members without color support are skipped with a feature error.
    pub fn set_group_color(
        &mut self,
        id: &GroupId,
        color: Hsbk,
        duration: u32,
    ) -> GroupResult<LightState> {
        let members = self
            .devices
            .in_group(id)
            .iter()
            .map(|device| {
                let mac = device.mac();
                let request = if device.has_feature(Features::COLOR) {
                    Ok(Request::new(SetColor { color, duration }))
                } else {
                    Err(ClientError::Feature {
                        mac,
                        feature: Features::COLOR,
                    })
                };
                (mac, request)
            })
            .collect();
        self.fan_out::<slot::Color, _>(members)
    }

    /// Clamps `kelvin` to each member's range and re-sends its cached color
    /// (white when unknown) at the new temperature.
    pub fn set_group_temperature(
        &mut self,
        id: &GroupId,
        kelvin: u16,
        duration: u32,
    ) -> GroupResult<LightState> {
        let members = self
            .devices
            .in_group(id)
            .iter()
            .map(|device| {
                let kelvin = device
                    .temperature_range()
                    .map_or(kelvin, |range| range.clamp(kelvin));
                let base = device
                    .get::<slot::Color>()
                    .map_or(Hsbk::new(0.0, 0.0, 1.0, kelvin), |state| state.color);
                let color = Hsbk { kelvin, ..base };
                (device.mac(), Ok(Request::new(SetColor { color, duration })))
            })
            .collect();
        self.fan_out::<slot::Color, _>(members)
    }
}
