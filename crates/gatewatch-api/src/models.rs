// Gateway API wire records
//
// Typed shapes for every endpoint the client consumes. Unknown fields are
// ignored; missing required fields surface as `Error::MalformedResponse`.

use serde::{Deserialize, Serialize};

/// `GET /site_info/site_name`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteInfo {
    pub site_name: String,
    pub timezone: String,
}

/// `GET /sitemaster`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteMaster {
    pub status: String,
    pub running: bool,
    pub connected_to_tesla: bool,
}

/// One meter of the `/meters/aggregates` report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterEntry {
    #[serde(default = "epoch_timestamp")]
    pub last_communication_time: String,
    /// Signed instantaneous real power in watts.
    pub instant_power: f64,
    pub instant_reactive_power: f64,
    pub instant_apparent_power: f64,
    pub frequency: f64,
    pub energy_exported: f64,
    pub energy_imported: f64,
    pub instant_average_voltage: f64,
    pub instant_total_current: f64,
}

impl MeterEntry {
    /// Placeholder for a meter the gateway doesn't report (no solar installed).
    pub fn blank() -> Self {
        Self {
            last_communication_time: epoch_timestamp(),
            instant_power: 0.0,
            instant_reactive_power: 0.0,
            instant_apparent_power: 0.0,
            frequency: 0.0,
            energy_exported: 0.0,
            energy_imported: 0.0,
            instant_average_voltage: 0.0,
            instant_total_current: 0.0,
        }
    }
}

fn epoch_timestamp() -> String {
    "1970-01-01T00:00:00.000Z".into()
}

/// `GET /meters/aggregates`
///
/// Note the naming: `site` is the grid connection point, `load` is the
/// home's consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregates {
    pub site: MeterEntry,
    pub battery: MeterEntry,
    pub load: MeterEntry,
    #[serde(default = "MeterEntry::blank")]
    pub solar: MeterEntry,
}

/// `GET /system_status/grid_status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridStatus {
    pub grid_status: String,
    #[serde(default)]
    pub grid_services_active: bool,
}

impl GridStatus {
    pub fn is_connected(&self) -> bool {
        self.grid_status == "SystemGridConnected"
    }
}

/// `GET /system_status/soe`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChargePercentage {
    pub percentage: f64,
}

/// `GET /operation`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationConfig {
    pub real_mode: String,
    pub backup_reserve_percent: f64,
}

/// `POST /login/Basic` request body.
#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub username: &'a str,
    pub force_sm_off: bool,
}

/// `POST /login/Basic` response; only the error field matters to us.
#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    #[serde(default)]
    pub error: Option<String>,
}
