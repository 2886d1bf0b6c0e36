// ── Device references ──
//
// The hub hands out opaque integer handles for each entity the core
// publishes to. The core only ever writes values and strings to them.

use std::net::Ipv4Addr;

use serde::Serialize;

use crate::model::flow::PowerChannel;

/// Opaque handle for one hub entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DeviceRef(pub i32);

impl std::fmt::Display for DeviceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity every device for one gateway is addressed under.
pub fn address_base(ip: Ipv4Addr) -> String {
    format!("TGW:{ip}")
}

/// Address of a child channel under `base`.
pub fn channel_address(base: &str, suffix: &str) -> String {
    format!("{base}:{suffix}")
}

/// Handles for the root site entity and all of its channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceRefs {
    /// The site itself; its value is the system-status flag.
    pub root: DeviceRef,
    pub connected_to_tesla: DeviceRef,
    pub grid_status: DeviceRef,
    pub charge_percent: DeviceRef,
    pub site_power: DeviceRef,
    pub battery_power: DeviceRef,
    pub solar_power: DeviceRef,
    pub grid_power: DeviceRef,
}

impl DeviceRefs {
    pub fn power(&self, channel: PowerChannel) -> DeviceRef {
        match channel {
            PowerChannel::Site => self.site_power,
            PowerChannel::Battery => self.battery_power,
            PowerChannel::Solar => self.solar_power,
            PowerChannel::Grid => self.grid_power,
        }
    }
}
