// gatewatch-api: Async client for a backup gateway's local HTTPS API

pub mod auth;
pub mod client;
pub mod endpoints;
pub mod error;
pub mod models;
pub mod tls;
pub mod transport;

pub use auth::Credentials;
pub use client::GatewayClient;
pub use error::{Error, innermost_message};
pub use models::{
    Aggregates, ChargePercentage, GridStatus, MeterEntry, OperationConfig, SiteInfo, SiteMaster,
};
pub use transport::{GatewayEndpoint, TransportConfig};
