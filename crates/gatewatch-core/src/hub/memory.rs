// In-process device directory.
//
// Assigns a stable ref per address on first sight and keeps the latest
// value and text written to each one.

use std::sync::atomic::{AtomicI32, Ordering};

use dashmap::DashMap;
use tracing::info;

use crate::error::CoreError;
use crate::hub::DeviceDirectory;
use crate::model::{DeviceRef, DeviceRefs, PowerChannel, channel_address};

/// One entity known to the directory.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceEntry {
    pub device: DeviceRef,
    pub address: String,
    pub name: String,
    pub value: Option<f64>,
    pub text: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemoryDirectory {
    last_ref: AtomicI32,
    by_address: DashMap<String, DeviceRef>,
    entries: DashMap<DeviceRef, DeviceEntry>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure(&self, address: String, name: &str) -> DeviceRef {
        *self
            .by_address
            .entry(address.clone())
            .or_insert_with(|| {
                let device = DeviceRef(self.last_ref.fetch_add(1, Ordering::Relaxed) + 1);
                info!(%device, %address, name, "created device");
                self.entries.insert(
                    device,
                    DeviceEntry {
                        device,
                        address,
                        name: name.to_owned(),
                        value: None,
                        text: None,
                    },
                );
                device
            })
    }

    pub fn lookup(&self, address: &str) -> Option<DeviceRef> {
        self.by_address.get(address).map(|r| *r)
    }

    pub fn entry(&self, device: DeviceRef) -> Option<DeviceEntry> {
        self.entries.get(&device).map(|e| e.clone())
    }

    pub fn value(&self, device: DeviceRef) -> Option<f64> {
        self.entries.get(&device).and_then(|e| e.value)
    }

    pub fn text(&self, device: DeviceRef) -> Option<String> {
        self.entries.get(&device).and_then(|e| e.text.clone())
    }
}

impl DeviceDirectory for MemoryDirectory {
    fn ensure_devices(
        &self,
        address_base: &str,
        site_name: &str,
    ) -> Result<DeviceRefs, CoreError> {
        if address_base.is_empty() {
            return Err(CoreError::Directory {
                message: "empty address base".into(),
            });
        }

        let child = |suffix: &str, name: &str| self.ensure(channel_address(address_base, suffix), name);
        let power = |channel: PowerChannel| {
            self.ensure(
                channel_address(address_base, channel.address_suffix()),
                &channel.to_string(),
            )
        };

        Ok(DeviceRefs {
            root: self.ensure(address_base.to_owned(), site_name),
            connected_to_tesla: child("Connected", "Tesla Connection"),
            grid_status: child("GridStatus", "Grid Status"),
            charge_percent: child("Charge", "Powerwall Charge"),
            site_power: power(PowerChannel::Site),
            battery_power: power(PowerChannel::Battery),
            solar_power: power(PowerChannel::Solar),
            grid_power: power(PowerChannel::Grid),
        })
    }

    fn set_value(&self, device: DeviceRef, value: f64) {
        if let Some(mut entry) = self.entries.get_mut(&device) {
            entry.value = Some(value);
        }
    }

    fn set_text(&self, device: DeviceRef, text: &str) {
        if let Some(mut entry) = self.entries.get_mut(&device) {
            entry.text = Some(text.to_owned());
        }
    }
}
