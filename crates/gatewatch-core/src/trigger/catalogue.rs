// ── Sub-trigger catalogue ──
//
// The eight power-flow events a hub can subscribe to, in menu order. Each
// one names a channel and the band that channel must enter (as a trigger)
// or currently be in (as a condition).

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

use crate::model::{PowerChannel, PowerFlow, PowerReadings};

/// How the hub is using a subscription, as far as it can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum TriggerUsage {
    /// Fires an event (WHEN / OR WHEN).
    Trigger,
    /// Gates an event (IF / AND IF).
    Condition,
    Unknown,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum SubTrigger {
    BatteryCharging,
    BatteryDischarging,
    BatteryIdle,
    SolarProducing,
    SolarIdle,
    GridImporting,
    GridExporting,
    GridIdle,
}

impl SubTrigger {
    pub fn channel(self) -> PowerChannel {
        match self {
            Self::BatteryCharging | Self::BatteryDischarging | Self::BatteryIdle => {
                PowerChannel::Battery
            }
            Self::SolarProducing | Self::SolarIdle => PowerChannel::Solar,
            Self::GridImporting | Self::GridExporting | Self::GridIdle => PowerChannel::Grid,
        }
    }

    /// The band this sub-trigger stands for on its channel.
    pub fn band(self) -> PowerFlow {
        match self {
            Self::BatteryCharging | Self::GridExporting => PowerFlow::Negative,
            Self::BatteryIdle | Self::SolarIdle | Self::GridIdle => PowerFlow::Zero,
            Self::BatteryDischarging | Self::SolarProducing | Self::GridImporting => {
                PowerFlow::Positive
            }
        }
    }

    /// The event raised when `channel` enters `flow`. Solar has no
    /// negative band, so `None` there.
    pub fn for_edge(channel: PowerChannel, flow: PowerFlow) -> Option<Self> {
        Self::iter().find(|t| t.channel() == channel && t.band() == flow)
    }

    /// Menu wording, covering both trigger and condition use.
    pub fn menu_label(self) -> &'static str {
        match self {
            Self::BatteryCharging => "Powerwall begins/is charging",
            Self::BatteryDischarging => "Powerwall begins/is discharging",
            Self::BatteryIdle => "Powerwall becomes/is idle",
            Self::SolarProducing => "Solar begins/is producing",
            Self::SolarIdle => "Solar becomes/is idle",
            Self::GridImporting => "Grid begins/is importing",
            Self::GridExporting => "Grid begins/is exporting",
            Self::GridIdle => "Grid becomes/is idle",
        }
    }

    /// Long-form help text for trigger use.
    pub fn trigger_explanation(self) -> &'static str {
        match self {
            Self::BatteryCharging => "Triggers the event when your Powerwall begins charging",
            Self::BatteryDischarging => "Triggers the event when your Powerwall begins discharging",
            Self::BatteryIdle => {
                "Triggers the event when your Powerwall becomes idle (neither charging nor discharging)"
            }
            Self::SolarProducing => "Triggers the event when your solar panels begin producing power",
            Self::SolarIdle => "Triggers the event when your solar panels stop producing power",
            Self::GridImporting => {
                "Triggers the event when your home begins importing/buying power from the grid"
            }
            Self::GridExporting => {
                "Triggers the event when your home begins exporting/selling power to the grid"
            }
            Self::GridIdle => {
                "Triggers the event when your home stops importing or exporting power to or from the grid"
            }
        }
    }

    /// Long-form help text for condition use.
    pub fn condition_explanation(self) -> &'static str {
        match self {
            Self::BatteryCharging => "Passes if your Powerwall is currently charging",
            Self::BatteryDischarging => "Passes if your Powerwall is currently discharging",
            Self::BatteryIdle => {
                "Passes if your Powerwall is currently idle (neither charging nor discharging)"
            }
            Self::SolarProducing => "Passes if your solar panels are currently producing power",
            Self::SolarIdle => "Passes if your solar panels are currently not producing power",
            Self::GridImporting => {
                "Passes if your home is currently importing/buying power from the grid"
            }
            Self::GridExporting => {
                "Passes if your home is currently exporting/selling power to the grid"
            }
            Self::GridIdle => {
                "Passes if your home is currently not importing or exporting power to or from the grid"
            }
        }
    }

    /// Predicate wording as `(trigger, condition)`.
    fn phrases(self) -> (&'static str, &'static str) {
        match self {
            Self::BatteryCharging => ("begins charging", "is charging"),
            Self::BatteryDischarging => ("begins discharging", "is discharging"),
            Self::BatteryIdle | Self::SolarIdle | Self::GridIdle => ("becomes idle", "is idle"),
            Self::SolarProducing => ("begins producing", "is producing"),
            Self::GridImporting => ("begins importing", "is importing"),
            Self::GridExporting => ("begins exporting", "is exporting"),
        }
    }

    /// One-line description, e.g. `"Tesla: Powerwall begins charging"`.
    ///
    /// With [`TriggerUsage::Unknown`] the neutral menu wording is kept.
    pub fn describe(self, usage: TriggerUsage) -> String {
        let label = self.menu_label();
        let (subject, neutral) = label.split_once(' ').unwrap_or((label, ""));
        let (as_trigger, as_condition) = self.phrases();
        let predicate = match usage {
            TriggerUsage::Trigger => as_trigger,
            TriggerUsage::Condition => as_condition,
            TriggerUsage::Unknown => neutral,
        };
        format!("Tesla: {subject} {predicate}")
    }

    /// Whether the latest readings currently satisfy this sub-trigger.
    /// Nothing is true before the first reading arrives.
    pub fn is_condition_true(self, readings: Option<&PowerReadings>) -> bool {
        readings.is_some_and(|r| r.flow(self.channel()) == self.band())
    }
}
