use std::time::Duration;

use super::error::ClientError;
use super::reply::Fetched;
use super::runtime::Client;
use crate::color::{css_to_hsb, rgb_to_hsb};
use crate::device::{Device, DeviceState, Slot, StateKey, slot};
use crate::product::Features;
use crate::protocol::device::{
    EchoRequest, GetGroup, GetHostFirmware, GetInfo, GetLabel, GetLocation, GetPower, GetVersion,
    GetWifiFirmware, SetGroup, SetLabel, SetLocation, SetPower, SetReboot,
};
use crate::protocol::light::{
    GetColor, GetInfrared, LightGetPower, LightSetPower, SetColor, SetInfrared,
};
use crate::protocol::{
    Firmware, Group, GroupId, Hsbk, Info, Infrared, Label, LightPower, LightState, MacAddress,
    Packet, Power, Request, Version,
};

/// Commands and reactive accessors for one device.
///
/// Getters return the fresh value, or the cached one marked stale when the
/// device does not answer. Setters return what the device reported, or the
/// attempted value marked unconfirmed when it does not answer. Either way a
/// timeout still removes the device.
pub struct DeviceHandle<'a> {
    client: &'a mut Client,
    mac: MacAddress,
}

impl<'a> DeviceHandle<'a> {
    pub(crate) fn new(client: &'a mut Client, mac: MacAddress) -> Self {
        Self { client, mac }
    }

    pub fn mac(&self) -> MacAddress {
        self.mac
    }

    pub fn device(&self) -> Option<&Device> {
        self.client.device(&self.mac)
    }

    pub fn state(&self) -> Option<&DeviceState> {
        self.device().map(Device::state)
    }

    pub fn is_on(&self) -> bool {
        self.device().is_some_and(Device::is_on)
    }

    pub fn min_temperature(&self) -> Option<u16> {
        self.device().map(Device::min_temperature)
    }

    pub fn max_temperature(&self) -> Option<u16> {
        self.device().map(Device::max_temperature)
    }

    /// Stamps the device's rate limiter. False means a command went out
    /// less than the configured spacing ago.
    pub fn can_send(&mut self) -> bool {
        let rate_limit = self.client.config().rate_limit;
        self.client
            .device_mut(&self.mac)
            .is_ok_and(|device| device.can_send(rate_limit))
    }

    fn cached<S: Slot>(&self) -> Option<S::Value> {
        self.device().and_then(|device| device.get::<S>().cloned())
    }

    fn reactive_get<S, P>(&mut self, packet: P) -> Result<Fetched<S::Value>, ClientError>
    where
        S: Slot,
        P: Packet<Response = S::Value> + Send + 'static,
    {
        self.client.check_key(&self.mac, S::KEY)?;
        let cached = self.cached::<S>();

        match self.client.get(self.mac, Request::new(packet), None) {
            Ok(value) => {
                self.client.reconcile::<S>(&self.mac, value.clone());
                Ok(Fetched::confirmed(value))
            }
            Err(error) if error.is_unanswered() => match cached {
                Some(value) => {
                    log::debug!("{} on {} served from cache: {}", S::KEY, self.mac, error);
                    self.client.mark_stale(&self.mac);
                    Ok(Fetched::stale(value))
                }
                None => Err(error),
            },
            Err(error) => Err(error),
        }
    }

    fn reactive_set<S, P>(
        &mut self,
        packet: P,
        attempted: S::Value,
    ) -> Result<Fetched<S::Value>, ClientError>
    where
        S: Slot,
        P: Packet<Response = S::Value> + Send + 'static,
    {
        match self.client.get(self.mac, Request::new(packet), None) {
            Ok(value) => {
                self.client.reconcile::<S>(&self.mac, value.clone());
                Ok(Fetched::confirmed(value))
            }
            Err(error) if error.is_unanswered() => {
                log::debug!("{} on {} unconfirmed: {}", S::KEY, self.mac, error);
                Ok(Fetched::unconfirmed(attempted))
            }
            Err(error) => Err(error),
        }
    }

    pub fn get_power(&mut self) -> Result<Fetched<Power>, ClientError> {
        self.reactive_get::<slot::Power, _>(GetPower)
    }

    pub fn set_power(&mut self, on: bool) -> Result<Fetched<Power>, ClientError> {
        self.reactive_set::<slot::Power, _>(SetPower { on }, Power { on })
    }

    pub fn turn_on(&mut self) -> Result<Fetched<Power>, ClientError> {
        self.set_power(true)
    }

    pub fn turn_off(&mut self) -> Result<Fetched<Power>, ClientError> {
        self.set_power(false)
    }

    pub fn get_light(&mut self) -> Result<Fetched<LightPower>, ClientError> {
        self.reactive_get::<slot::Light, _>(LightGetPower)
    }

    /// Light power with a transition of `duration` milliseconds.
    pub fn set_light(&mut self, on: bool, duration: u32) -> Result<Fetched<LightPower>, ClientError> {
        let packet = if on {
            LightSetPower::on(duration)
        } else {
            LightSetPower::off(duration)
        };
        let attempted = LightPower {
            level: packet.level,
        };
        self.reactive_set::<slot::Light, _>(packet, attempted)
    }

    pub fn fade_on(&mut self, duration: u32) -> Result<Fetched<LightPower>, ClientError> {
        self.set_light(true, duration)
    }

    pub fn fade_off(&mut self, duration: u32) -> Result<Fetched<LightPower>, ClientError> {
        self.set_light(false, duration)
    }

    pub fn get_color(&mut self) -> Result<Fetched<LightState>, ClientError> {
        self.reactive_get::<slot::Color, _>(GetColor)
    }

    pub fn set_color(
        &mut self,
        color: Hsbk,
        duration: u32,
    ) -> Result<Fetched<LightState>, ClientError> {
        self.client.check_feature(&self.mac, Features::COLOR)?;
        self.apply_color(color, duration)
    }

    fn apply_color(
        &mut self,
        color: Hsbk,
        duration: u32,
    ) -> Result<Fetched<LightState>, ClientError> {
        let previous = self.cached::<slot::Color>();
        let attempted = LightState {
            color,
            power: previous.as_ref().map_or(0, |state| state.power),
            label: previous.map(|state| state.label).unwrap_or_default(),
        };
        self.reactive_set::<slot::Color, _>(SetColor { color, duration }, attempted)
    }

    /// Channels are 0-255. `alpha`, when given, sets the brightness.
    pub fn set_rgb(
        &mut self,
        r: u8,
        g: u8,
        b: u8,
        alpha: Option<f64>,
        kelvin: Option<u16>,
    ) -> Result<Fetched<LightState>, ClientError> {
        let kelvin = self.kelvin_or_default(kelvin)?;
        self.set_color(rgb_to_hsb(r, g, b, alpha).with_kelvin(kelvin), 0)
    }

    /// Accepts color names, `#rgb`, `#rrggbb`, `rgb()` and `rgba()`.
    pub fn set_css(
        &mut self,
        css: &str,
        kelvin: Option<u16>,
    ) -> Result<Fetched<LightState>, ClientError> {
        let hsb = css_to_hsb(css)?;
        let kelvin = self.kelvin_or_default(kelvin)?;
        self.set_color(hsb.with_kelvin(kelvin), 0)
    }

    fn kelvin_or_default(&self, kelvin: Option<u16>) -> Result<u16, ClientError> {
        match kelvin {
            Some(kelvin) => Ok(kelvin),
            None => self
                .device()
                .map(Device::default_kelvin)
                .ok_or(ClientError::UnknownDevice(self.mac)),
        }
    }

    /// Re-sends the current color at `kelvin`, clamped to the product's
    /// range. Returns `None` for devices without a known range.
    pub fn set_temperature(
        &mut self,
        kelvin: u16,
        duration: u32,
    ) -> Result<Option<Fetched<LightState>>, ClientError> {
        let device = self
            .device()
            .ok_or(ClientError::UnknownDevice(self.mac))?;
        let Some(range) = device.temperature_range() else {
            return Ok(None);
        };
        let kelvin = range.clamp(kelvin);

        let base = if device.has_feature(Features::COLOR) {
            self.get_color()?.value.color
        } else {
            self.cached::<slot::Color>()
                .map_or(Hsbk::new(0.0, 0.0, 1.0, kelvin), |state| state.color)
        };

        self.apply_color(Hsbk { kelvin, ..base }, duration).map(Some)
    }

    pub fn get_infrared(&mut self) -> Result<Fetched<Infrared>, ClientError> {
        self.reactive_get::<slot::Infrared, _>(GetInfrared)
    }

    pub fn set_infrared(&mut self, brightness: f64) -> Result<Fetched<Infrared>, ClientError> {
        self.client.check_feature(&self.mac, Features::INFRARED)?;
        self.reactive_set::<slot::Infrared, _>(SetInfrared { brightness }, Infrared { brightness })
    }

    pub fn get_label(&mut self) -> Result<Fetched<Label>, ClientError> {
        self.reactive_get::<slot::Label, _>(GetLabel)
    }

    pub fn set_label(&mut self, label: &str) -> Result<Fetched<Label>, ClientError> {
        let attempted = Label {
            label: label.to_string(),
        };
        let packet = SetLabel {
            label: label.to_string(),
        };
        self.reactive_set::<slot::Label, _>(packet, attempted)
    }

    pub fn get_group(&mut self) -> Result<Fetched<Group>, ClientError> {
        self.reactive_get::<slot::Group, _>(GetGroup)
    }

    pub fn set_group(&mut self, id: GroupId, label: &str) -> Result<Fetched<Group>, ClientError> {
        let packet = SetGroup::new(id, label);
        let attempted = Group {
            id: packet.id,
            label: packet.label.clone(),
            updated: packet.updated,
        };
        self.reactive_set::<slot::Group, _>(packet, attempted)
    }

    pub fn get_location(&mut self) -> Result<Fetched<Group>, ClientError> {
        self.reactive_get::<slot::Location, _>(GetLocation)
    }

    pub fn set_location(&mut self, id: GroupId, label: &str) -> Result<Fetched<Group>, ClientError> {
        let packet = SetLocation::new(id, label);
        let attempted = Group {
            id: packet.id,
            label: packet.label.clone(),
            updated: packet.updated,
        };
        self.reactive_set::<slot::Location, _>(packet, attempted)
    }

    pub fn get_firmware(&mut self) -> Result<Fetched<Firmware>, ClientError> {
        self.reactive_get::<slot::Firmware, _>(GetHostFirmware)
    }

    /// Not cached.
    pub fn get_wifi_firmware(&mut self) -> Result<Firmware, ClientError> {
        self.client.get(self.mac, Request::new(GetWifiFirmware), None)
    }

    pub fn get_version(&mut self) -> Result<Fetched<Version>, ClientError> {
        self.reactive_get::<slot::Version, _>(GetVersion)
    }

    pub fn get_info(&mut self) -> Result<Fetched<Info>, ClientError> {
        self.reactive_get::<slot::Info, _>(GetInfo)
    }

    /// The device does not answer a reboot.
    pub fn reboot(&mut self) -> Result<(), ClientError> {
        self.client.send(Some(self.mac), &Request::new(SetReboot))?;
        Ok(())
    }

    pub fn echo(&mut self, text: &str) -> Result<String, ClientError> {
        let packet = EchoRequest {
            text: text.to_string(),
        };
        let echo = self.client.get(self.mac, Request::new(packet), None)?;
        Ok(echo.text)
    }

    /// Whether the device answered within the ping timeout. A device that
    /// does not is removed.
    pub fn ping(&mut self) -> Result<bool, ClientError> {
        let timeout = self.client.config().ping_timeout;
        match self.client.get(self.mac, Request::new(GetInfo), Some(timeout)) {
            Ok(info) => {
                self.client.reconcile::<slot::Info>(&self.mac, info);
                Ok(true)
            }
            Err(error) if error.is_unanswered() => Ok(false),
            Err(error) => Err(error),
        }
    }

    pub fn load(&mut self) -> Result<(), ClientError> {
        self.client.load(self.mac)
    }

    pub fn remove(self) -> Option<Device> {
        self.client.remove_device(&self.mac)
    }

    pub fn watch(&mut self, key: StateKey, interval: Option<Duration>) -> Result<(), ClientError> {
        self.client.watch(&self.mac, key, interval)
    }

    pub fn unwatch(&mut self, key: StateKey) -> Result<bool, ClientError> {
        self.client.unwatch(&self.mac, key)
    }

    pub fn stop_monitoring(&mut self) -> Result<(), ClientError> {
        self.client.device_mut(&self.mac)?.stop_monitoring();
        Ok(())
    }
}
