// ── Power-flow banding ──

use serde::Serialize;
use strum::{Display, EnumIter};

/// Magnitude below which a reading counts as no flow at all.
pub const POWER_FLOW_THRESHOLD_WATTS: f64 = 50.0;

/// Direction of a channel's instantaneous power, banded around zero so
/// sensor noise near idle does not flap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
pub enum PowerFlow {
    Negative,
    Zero,
    Positive,
}

impl PowerFlow {
    /// Both boundaries are inclusive: ±50 W already counts as flow.
    pub fn classify(watts: f64) -> Self {
        if watts >= POWER_FLOW_THRESHOLD_WATTS {
            Self::Positive
        } else if watts <= -POWER_FLOW_THRESHOLD_WATTS {
            Self::Negative
        } else {
            Self::Zero
        }
    }
}

/// One of the four power channels the gateway reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, Serialize)]
pub enum PowerChannel {
    /// Home consumption (the gateway's `load` meter).
    #[strum(to_string = "Total Site Power")]
    Site,
    #[strum(to_string = "Powerwall Power")]
    Battery,
    #[strum(to_string = "Solar Power")]
    Solar,
    /// Grid connection point (the gateway's `site` meter).
    #[strum(to_string = "Grid Power")]
    Grid,
}

impl PowerChannel {
    /// Channels the trigger engine watches for band changes.
    pub const MONITORED: [PowerChannel; 3] = [Self::Battery, Self::Solar, Self::Grid];

    /// Suffix appended to the site's address base for this channel's device.
    pub fn address_suffix(self) -> &'static str {
        match self {
            Self::Site => "SitePower",
            Self::Battery => "BatteryPower",
            Self::Solar => "SolarPower",
            Self::Grid => "GridPower",
        }
    }
}
