use std::collections::HashMap;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::{Firmware, Version};

const BUILTIN: &str = include_str!("../data/products.json");

pub const DEFAULT_TEMPERATURE: u16 = 2700;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("product table is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("product {vendor}/{pid} listed twice")]
    Duplicate { vendor: u32, pid: u32 },
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
    pub struct Features: u16 {
        const COLOR = 1 << 0;
        const INFRARED = 1 << 1;
        const MULTIZONE = 1 << 2;
        const EXTENDED_MULTIZONE = 1 << 3;
        const CHAIN = 1 << 4;
        const MATRIX = 1 << 5;
        const RELAYS = 1 << 6;
        const BUTTONS = 1 << 7;
        const HEV = 1 << 8;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TemperatureRange {
    pub min: u16,
    pub max: u16,
}

impl TemperatureRange {
    pub fn clamp(&self, kelvin: u16) -> u16 {
        kelvin.clamp(self.min, self.max.max(self.min))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Upgrade {
    major: u16,
    minor: u16,
    features: Features,
    temperature: Option<TemperatureRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub vendor: u32,
    pub pid: u32,
    pub name: String,
    pub features: Features,
    pub temperature: Option<TemperatureRange>,
    #[serde(skip)]
    upgrades: Vec<Upgrade>,
}

impl Product {
    pub fn has(&self, features: Features) -> bool {
        self.features.contains(features)
    }

    /// Base features plus every upgrade the running firmware qualifies for.
    pub fn features_for(&self, firmware: Option<&Firmware>) -> Features {
        self.upgrades_for(firmware)
            .fold(self.features, |acc, upgrade| acc | upgrade.features)
    }

    pub fn temperature_for(&self, firmware: Option<&Firmware>) -> Option<TemperatureRange> {
        self.upgrades_for(firmware)
            .filter_map(|upgrade| upgrade.temperature)
            .last()
            .or(self.temperature)
    }

    fn upgrades_for<'a>(
        &'a self,
        firmware: Option<&'a Firmware>,
    ) -> impl Iterator<Item = &'a Upgrade> + 'a {
        self.upgrades.iter().filter(move |upgrade| {
            firmware.is_some_and(|fw| fw.at_least(upgrade.major, upgrade.minor))
        })
    }
}

#[derive(Deserialize)]
struct VendorRecord {
    vid: u32,
    products: Vec<ProductRecord>,
}

#[derive(Deserialize)]
struct ProductRecord {
    pid: u32,
    name: String,
    features: FeatureRecord,
    #[serde(default)]
    upgrades: Vec<UpgradeRecord>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct FeatureRecord {
    hev: bool,
    color: bool,
    chain: bool,
    matrix: bool,
    relays: bool,
    buttons: bool,
    infrared: bool,
    multizone: bool,
    extended_multizone: bool,
    temperature_range: Option<[u16; 2]>,
}

impl FeatureRecord {
    fn flags(&self) -> Features {
        [
            (self.color, Features::COLOR),
            (self.infrared, Features::INFRARED),
            (self.multizone, Features::MULTIZONE),
            (self.extended_multizone, Features::EXTENDED_MULTIZONE),
            (self.chain, Features::CHAIN),
            (self.matrix, Features::MATRIX),
            (self.relays, Features::RELAYS),
            (self.buttons, Features::BUTTONS),
            (self.hev, Features::HEV),
        ]
        .into_iter()
        .filter(|(set, _)| *set)
        .fold(Features::empty(), |acc, (_, flag)| acc | flag)
    }

    fn temperature(&self) -> Option<TemperatureRange> {
        self.temperature_range
            .map(|[min, max]| TemperatureRange { min, max })
    }
}

#[derive(Deserialize)]
struct UpgradeRecord {
    major: u16,
    minor: u16,
    features: FeatureRecord,
}

/// Read-only product table keyed by vendor and product id.
#[derive(Debug, Clone, Default)]
pub struct ProductCatalog {
    products: HashMap<(u32, u32), Product>,
}

impl ProductCatalog {
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let vendors: Vec<VendorRecord> = serde_json::from_str(json)?;
        let mut products = HashMap::new();

        for vendor in vendors {
            for record in vendor.products {
                let key = (vendor.vid, record.pid);
                if products.contains_key(&key) {
                    return Err(CatalogError::Duplicate {
                        vendor: vendor.vid,
                        pid: record.pid,
                    });
                }

                let upgrades = record
                    .upgrades
                    .iter()
                    .map(|upgrade| Upgrade {
                        major: upgrade.major,
                        minor: upgrade.minor,
                        features: upgrade.features.flags(),
                        temperature: upgrade.features.temperature(),
                    })
                    .collect();

                products.insert(
                    key,
                    Product {
                        vendor: vendor.vid,
                        pid: record.pid,
                        features: record.features.flags(),
                        temperature: record.features.temperature(),
                        name: record.name,
                        upgrades,
                    },
                );
            }
        }

        Ok(Self { products })
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn get(&self, vendor: u32, pid: u32) -> Option<&Product> {
        self.products.get(&(vendor, pid))
    }

    pub fn lookup(&self, version: &Version) -> Option<&Product> {
        self.get(version.vendor, version.product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn firmware(major: u16, minor: u16) -> Firmware {
        Firmware {
            build: 0,
            version_minor: minor,
            version_major: major,
        }
    }

    #[test]
    fn test_builtin_catalog_loads() {
        let catalog = ProductCatalog::builtin().unwrap();
        assert!(catalog.len() > 20);

        let night_vision = catalog.get(1, 29).unwrap();
        assert!(night_vision.has(Features::COLOR | Features::INFRARED));

        let white = catalog.get(1, 10).unwrap();
        assert!(!white.has(Features::COLOR));
        assert_eq!(
            white.temperature,
            Some(TemperatureRange {
                min: 2700,
                max: 6500
            })
        );
    }

    #[test]
    fn test_firmware_upgrades_apply() {
        let catalog = ProductCatalog::builtin().unwrap();
        let strip = catalog.get(1, 32).unwrap();

        assert!(!strip.features_for(None).contains(Features::EXTENDED_MULTIZONE));
        assert!(
            !strip
                .features_for(Some(&firmware(2, 76)))
                .contains(Features::EXTENDED_MULTIZONE)
        );
        assert!(
            strip
                .features_for(Some(&firmware(2, 77)))
                .contains(Features::EXTENDED_MULTIZONE)
        );

        assert_eq!(strip.temperature_for(Some(&firmware(2, 77))).unwrap().min, 2500);
        assert_eq!(strip.temperature_for(Some(&firmware(2, 80))).unwrap().min, 1500);
    }

    #[test]
    fn test_duplicate_product_rejected() {
        let json = r#"[{"vid":1,"name":"v","products":[
            {"pid":1,"name":"a","features":{}},
            {"pid":1,"name":"b","features":{}}
        ]}]"#;
        assert!(matches!(
            ProductCatalog::from_json(json),
            Err(CatalogError::Duplicate { vendor: 1, pid: 1 })
        ));
    }

    #[test]
    fn test_temperature_clamp() {
        let range = TemperatureRange {
            min: 1500,
            max: 4000,
        };
        assert_eq!(range.clamp(9000), 4000);
        assert_eq!(range.clamp(1000), 1500);
        assert_eq!(range.clamp(2700), 2700);
    }
}
