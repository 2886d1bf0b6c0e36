// ── Telemetry snapshot ──

use gatewatch_api::{Aggregates, GridStatus, MeterEntry, SiteMaster};
use serde::Serialize;

use crate::model::flow::{PowerChannel, PowerFlow};

/// Everything one successful poll cycle learned about the site.
///
/// Immutable once built; only the rounded power readings outlive the cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub site_master: SiteMaster,
    pub grid: GridStatus,
    pub charge_percent: f64,
    pub aggregates: Aggregates,
}

impl TelemetrySnapshot {
    pub fn grid_connected(&self) -> bool {
        self.grid.is_connected()
    }

    /// Charge percentage as published: one decimal place.
    pub fn charge_display(&self) -> f64 {
        round_tenths(self.charge_percent)
    }

    /// Raw meter backing a channel. Site power is the home's `load` meter
    /// and grid power is the gateway's `site` meter.
    pub fn meter(&self, channel: PowerChannel) -> &MeterEntry {
        match channel {
            PowerChannel::Site => &self.aggregates.load,
            PowerChannel::Battery => &self.aggregates.battery,
            PowerChannel::Solar => &self.aggregates.solar,
            PowerChannel::Grid => &self.aggregates.site,
        }
    }

    /// Power per channel, rounded to whole watts.
    pub fn readings(&self) -> PowerReadings {
        let watts = |channel| self.meter(channel).instant_power.round();
        PowerReadings {
            site: watts(PowerChannel::Site),
            battery: watts(PowerChannel::Battery),
            solar: watts(PowerChannel::Solar),
            grid: watts(PowerChannel::Grid),
        }
    }
}

/// Whole-watt readings for the four channels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct PowerReadings {
    pub site: f64,
    pub battery: f64,
    pub solar: f64,
    pub grid: f64,
}

impl PowerReadings {
    pub fn get(&self, channel: PowerChannel) -> f64 {
        match channel {
            PowerChannel::Site => self.site,
            PowerChannel::Battery => self.battery,
            PowerChannel::Solar => self.solar,
            PowerChannel::Grid => self.grid,
        }
    }

    pub fn flow(&self, channel: PowerChannel) -> PowerFlow {
        PowerFlow::classify(self.get(channel))
    }
}

/// Round to one decimal place. Negative zero collapses to zero.
pub fn round_tenths(value: f64) -> f64 {
    let rounded = (value * 10.0).round() / 10.0;
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Human-readable kilowatt string, e.g. `"1.2 kW"`.
pub fn kilowatt_label(watts: f64) -> String {
    format!("{} kW", round_tenths(watts / 1000.0))
}
