// ── Gateway session seam ──
//
// The supervisor and poller talk to a session through `Gateway` and open
// new ones through `Connector`, so both can run against the real HTTPS
// client or an in-process fake.

use std::future::Future;

use gatewatch_api::{
    Aggregates, GatewayClient, GatewayEndpoint, GridStatus, SiteInfo, SiteMaster, TransportConfig,
};
use tracing::debug;

use crate::config::{GatewaySettings, SupervisorTimings};
use crate::error::CoreError;

type ApiResult<T> = Result<T, gatewatch_api::Error>;

/// The telemetry calls one session must answer.
pub trait Gateway: Send + Sync + 'static {
    fn site_info(&self) -> impl Future<Output = ApiResult<SiteInfo>> + Send;
    fn site_master(&self) -> impl Future<Output = ApiResult<SiteMaster>> + Send;
    fn aggregates(&self) -> impl Future<Output = ApiResult<Aggregates>> + Send;
    fn grid_status(&self) -> impl Future<Output = ApiResult<GridStatus>> + Send;
    fn charge_percentage(&self) -> impl Future<Output = ApiResult<f64>> + Send;

    /// Relay address announced by the gateway's certificate, if any.
    fn upstream_identity(&self) -> Option<String> {
        None
    }
}

impl Gateway for GatewayClient {
    fn site_info(&self) -> impl Future<Output = ApiResult<SiteInfo>> + Send {
        GatewayClient::site_info(self)
    }

    fn site_master(&self) -> impl Future<Output = ApiResult<SiteMaster>> + Send {
        GatewayClient::site_master(self)
    }

    fn aggregates(&self) -> impl Future<Output = ApiResult<Aggregates>> + Send {
        GatewayClient::aggregates(self)
    }

    fn grid_status(&self) -> impl Future<Output = ApiResult<GridStatus>> + Send {
        GatewayClient::grid_status(self)
    }

    fn charge_percentage(&self) -> impl Future<Output = ApiResult<f64>> + Send {
        GatewayClient::charge_percentage(self)
    }

    fn upstream_identity(&self) -> Option<String> {
        GatewayClient::upstream_identity(self)
    }
}

/// Opens a fresh session for validated settings.
pub trait Connector: Send + Sync + 'static {
    type Session: Gateway;

    fn open(
        &self,
        endpoint: GatewayEndpoint,
        settings: &GatewaySettings,
    ) -> Result<Self::Session, CoreError>;
}

/// Opens real HTTPS sessions.
#[derive(Debug, Clone)]
pub struct HttpsConnector {
    transport: TransportConfig,
}

impl HttpsConnector {
    pub fn new(timings: &SupervisorTimings) -> Self {
        Self {
            transport: TransportConfig {
                timeout: timings.request_timeout,
                ..TransportConfig::default()
            },
        }
    }
}

impl Connector for HttpsConnector {
    type Session = GatewayClient;

    fn open(
        &self,
        endpoint: GatewayEndpoint,
        settings: &GatewaySettings,
    ) -> Result<GatewayClient, CoreError> {
        debug!(address = %endpoint.address, port = endpoint.port, "opening gateway session");
        // Every session gets its own jar: cookies never outlive the session.
        let transport = self.transport.clone().with_cookie_jar();
        GatewayClient::new(endpoint, settings.credentials.clone(), &transport)
            .map_err(|source| CoreError::connect(settings.address.as_str(), source))
    }
}
