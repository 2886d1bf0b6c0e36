// ── Domain model ──
//
// Canonical types the supervisor, poller and trigger engine share.

pub mod devices;
pub mod flow;
pub mod telemetry;

pub use devices::{DeviceRef, DeviceRefs, address_base, channel_address};
pub use flow::{POWER_FLOW_THRESHOLD_WATTS, PowerChannel, PowerFlow};
pub use telemetry::{PowerReadings, TelemetrySnapshot, kilowatt_label, round_tenths};
