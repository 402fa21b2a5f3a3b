use lanlight::{ClientEvent, StateChange};

/// One log line per client event.
pub fn describe(event: &ClientEvent) -> (log::Level, String) {
    match event {
        ClientEvent::Connect { mac, addr } => {
            (log::Level::Info, format!("{} connected from {}", mac, addr))
        }
        ClientEvent::Load { mac } => (log::Level::Info, format!("{} loaded", mac)),
        ClientEvent::Change { mac, change } => {
            (log::Level::Info, format!("{} {}", mac, describe_change(change)))
        }
        ClientEvent::Disconnect { mac } => (log::Level::Warn, format!("{} disconnected", mac)),
    }
}

fn describe_change(change: &StateChange) -> String {
    match change {
        StateChange::Power(power) => format!("power {}", on_off(power.on)),
        StateChange::Light(light) => format!("light level {:.0}%", light.level * 100.0),
        StateChange::Color(state) => format!(
            "color h{:.0} s{:.0}% b{:.0}% {}K",
            state.color.hue * 360.0,
            state.color.saturation * 100.0,
            state.color.brightness * 100.0,
            state.color.kelvin
        ),
        StateChange::Label(label) => format!("label \"{}\"", label.label),
        StateChange::Group(group) => format!("group \"{}\" ({})", group.label, group.id),
        StateChange::Location(location) => {
            format!("location \"{}\" ({})", location.label, location.id)
        }
        StateChange::Infrared(infrared) => {
            format!("infrared {:.0}%", infrared.brightness * 100.0)
        }
        other => format!("{} changed", other.key()),
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}
