use std::collections::HashMap;

use super::Device;
use crate::protocol::{GroupId, MacAddress};

/// Known devices keyed by MAC address.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<MacAddress, Device>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a device unless one with the same MAC is already known. Returns
    /// whether it was inserted.
    pub fn insert(&mut self, device: Device) -> bool {
        let mac = device.mac();
        if self.devices.contains_key(&mac) {
            return false;
        }
        self.devices.insert(mac, device);
        true
    }

    pub fn get(&self, mac: &MacAddress) -> Option<&Device> {
        self.devices.get(mac)
    }

    pub fn get_mut(&mut self, mac: &MacAddress) -> Option<&mut Device> {
        self.devices.get_mut(mac)
    }

    pub fn contains(&self, mac: &MacAddress) -> bool {
        self.devices.contains_key(mac)
    }

    pub fn remove(&mut self, mac: &MacAddress) -> Option<Device> {
        self.devices.remove(mac)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Device> {
        self.devices.values_mut()
    }

    /// MACs in ascending order.
    pub fn macs(&self) -> Vec<MacAddress> {
        let mut macs: Vec<MacAddress> = self.devices.keys().copied().collect();
        macs.sort();
        macs
    }

    pub fn in_group(&self, id: &GroupId) -> Vec<&Device> {
        let mut devices: Vec<&Device> = self.iter().filter(|d| d.in_group(id)).collect();
        devices.sort_by_key(|d| d.mac());
        devices
    }

    pub fn in_location(&self, id: &GroupId) -> Vec<&Device> {
        let mut devices: Vec<&Device> = self.iter().filter(|d| d.in_location(id)).collect();
        devices.sort_by_key(|d| d.mac());
        devices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::slot;
    use crate::protocol::Group;

    fn device(last: u8) -> Device {
        Device::new(
            MacAddress([0xd0, 0x73, 0xd5, 0, 0, last]),
            format!("10.0.0.{}:56700", last).parse().unwrap(),
        )
    }

    #[test]
    fn test_insert_keeps_first() {
        let mut registry = DeviceRegistry::new();
        assert!(registry.insert(device(1)));
        assert!(!registry.insert(device(1)));
        assert_eq!(registry.len(), 1);

        let removed = registry.remove(&MacAddress([0xd0, 0x73, 0xd5, 0, 0, 1]));
        assert!(removed.is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_group_query() {
        let kitchen: GroupId = "11111111111111111111111111111111".parse().unwrap();
        let hall: GroupId = "22222222222222222222222222222222".parse().unwrap();
        let mut registry = DeviceRegistry::new();

        for (last, id) in [(3, kitchen), (1, kitchen), (2, hall)] {
            let mut d = device(last);
            d.store::<slot::Group>(Group {
                id,
                label: String::new(),
                updated: 0,
            });
            registry.insert(d);
        }

        let members: Vec<u8> = registry
            .in_group(&kitchen)
            .iter()
            .map(|d| d.mac().octets()[5])
            .collect();
        assert_eq!(members, vec![1, 3]);
        assert!(registry.in_location(&kitchen).is_empty());
    }
}
