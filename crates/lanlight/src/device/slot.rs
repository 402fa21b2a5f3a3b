//! Typed access to the cached fields of `DeviceState`.

use super::state::{DeviceState, StateChange, StateKey};
use crate::protocol;

pub trait Slot {
    type Value: Clone + PartialEq + Send + 'static;

    const KEY: StateKey;

    fn get(state: &DeviceState) -> &Option<Self::Value>;

    fn get_mut(state: &mut DeviceState) -> &mut Option<Self::Value>;

    fn wrap(value: Self::Value) -> StateChange;
}

macro_rules! slot {
    ($name:ident, $value:ty, $field:ident) => {
        pub struct $name;

        impl Slot for $name {
            type Value = $value;

            const KEY: StateKey = StateKey::$name;

            fn get(state: &DeviceState) -> &Option<$value> {
                &state.$field
            }

            fn get_mut(state: &mut DeviceState) -> &mut Option<$value> {
                &mut state.$field
            }

            fn wrap(value: $value) -> StateChange {
                StateChange::$name(value)
            }
        }
    };
}

slot!(Firmware, protocol::Firmware, firmware);
slot!(Version, protocol::Version, version);
slot!(Info, protocol::Info, info);
slot!(Label, protocol::Label, label);
slot!(Group, protocol::Group, group);
slot!(Location, protocol::Group, location);
slot!(Power, protocol::Power, power);
slot!(Light, protocol::LightPower, light);
slot!(Color, protocol::LightState, color);
slot!(Infrared, protocol::Infrared, infrared);
