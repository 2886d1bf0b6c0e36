// Gateway telemetry endpoints
//
// One GET per record, all under the `/api` prefix. Every endpoint treats
// an unsuccessful status as a failure.

use tracing::debug;

use crate::client::GatewayClient;
use crate::error::Error;
use crate::models::{
    Aggregates, ChargePercentage, GridStatus, OperationConfig, SiteInfo, SiteMaster,
};

pub const SITE_INFO_PATH: &str = "/site_info/site_name";
pub const SITE_MASTER_PATH: &str = "/sitemaster";
pub const AGGREGATES_PATH: &str = "/meters/aggregates";
pub const GRID_STATUS_PATH: &str = "/system_status/grid_status";
pub const CHARGE_PATH: &str = "/system_status/soe";
pub const OPERATION_PATH: &str = "/operation";

impl GatewayClient {
    /// `GET /api/site_info/site_name`
    pub async fn site_info(&self) -> Result<SiteInfo, Error> {
        debug!("fetching site info");
        self.get(SITE_INFO_PATH).await
    }

    /// `GET /api/sitemaster`
    pub async fn site_master(&self) -> Result<SiteMaster, Error> {
        debug!("fetching site master");
        self.get(SITE_MASTER_PATH).await
    }

    /// `GET /api/meters/aggregates`
    pub async fn aggregates(&self) -> Result<Aggregates, Error> {
        debug!("fetching meter aggregates");
        self.get(AGGREGATES_PATH).await
    }

    /// `GET /api/system_status/grid_status`
    pub async fn grid_status(&self) -> Result<GridStatus, Error> {
        debug!("fetching grid status");
        self.get(GRID_STATUS_PATH).await
    }

    /// `GET /api/system_status/soe` -- state of energy, in percent.
    pub async fn charge_percentage(&self) -> Result<f64, Error> {
        debug!("fetching charge percentage");
        let soe: ChargePercentage = self.get(CHARGE_PATH).await?;
        Ok(soe.percentage)
    }

    /// `GET /api/operation`
    pub async fn operation_config(&self) -> Result<OperationConfig, Error> {
        debug!("fetching operation config");
        self.get(OPERATION_PATH).await
    }
}
