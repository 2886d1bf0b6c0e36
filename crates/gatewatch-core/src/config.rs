// ── Runtime gateway configuration ──
//
// These types describe *which* gateway to supervise and how often to talk
// to it. They never touch disk; the binary builds them from the config
// crate and hands them in.

use std::net::Ipv4Addr;
use std::time::Duration;

use gatewatch_api::transport::DEFAULT_REQUEST_TIMEOUT;
use gatewatch_api::{Credentials, GatewayEndpoint};

use crate::error::CoreError;

/// Port the gateway's local API listens on.
pub const DEFAULT_GATEWAY_PORT: u16 = 443;

/// Endpoint and credentials for a single gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    /// Dotted-quad IPv4 address, as entered by the user.
    pub address: String,
    pub port: u16,
    /// `None` when the gateway firmware does not require a login.
    pub credentials: Option<Credentials>,
}

impl GatewaySettings {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port: DEFAULT_GATEWAY_PORT,
            credentials: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Validated endpoint. No DNS resolution is attempted.
    pub fn endpoint(&self) -> Result<GatewayEndpoint, CoreError> {
        parse_gateway_address(&self.address).map(|ip| GatewayEndpoint::new(ip, self.port))
    }
}

/// Strict dotted-quad validation of a gateway address.
pub fn parse_gateway_address(raw: &str) -> Result<Ipv4Addr, CoreError> {
    if raw.is_empty() {
        return Err(CoreError::ConfigInvalid {
            reason: "gateway address is empty".into(),
        });
    }
    raw.parse::<Ipv4Addr>()
        .map_err(|_| CoreError::ConfigInvalid {
            reason: format!("{raw:?} is not a dotted-quad IPv4 address"),
        })
}

/// Scheduling constants for the supervisor and poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorTimings {
    /// Delay between the end of one poll cycle and the start of the next.
    pub poll_interval: Duration,
    /// Delay before retrying after a failed initial contact.
    pub retry_interval: Duration,
    /// Quiet period that collapses bursts of reconfiguration.
    pub debounce: Duration,
    /// Bound on a single HTTP exchange with the gateway.
    pub request_timeout: Duration,
    /// Consecutive failed cycles before the failure becomes visible.
    pub failure_threshold: u32,
}

impl Default for SupervisorTimings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            retry_interval: Duration::from_secs(60),
            debounce: Duration::from_millis(500),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            failure_threshold: 5,
        }
    }
}
