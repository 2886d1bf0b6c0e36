// Transport configuration for building the gateway's reqwest::Client.
//
// Pins the outgoing SNI to a fixed virtual hostname by resolving that
// name to the configured gateway address, and installs the accept-any
// certificate verifier.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use reqwest::cookie::Jar;
use url::Url;

use crate::error::Error;
use crate::tls::GatewayCertVerifier;

/// Virtual hostname some gateway firmware expects in the TLS SNI.
pub const GATEWAY_SERVER_NAME: &str = "powerwall";

/// Upper bound the gateway gets to answer a single request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Network location of a gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayEndpoint {
    pub address: Ipv4Addr,
    pub port: u16,
}

impl GatewayEndpoint {
    pub fn new(address: Ipv4Addr, port: u16) -> Self {
        Self { address, port }
    }

    fn socket_addr(self) -> SocketAddr {
        SocketAddr::from((self.address, self.port))
    }
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Timeout raced against every request.
    pub timeout: Duration,
    /// Hostname sent as SNI (and `Host`).
    pub server_name: String,
    pub cookie_jar: Option<Arc<Jar>>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_REQUEST_TIMEOUT,
            server_name: GATEWAY_SERVER_NAME.into(),
            cookie_jar: None,
        }
    }
}

impl TransportConfig {
    /// Create a config with a fresh cookie jar (for session auth).
    pub fn with_cookie_jar(mut self) -> Self {
        self.cookie_jar = Some(Arc::new(Jar::default()));
        self
    }

    /// Base URL the client addresses; the host is the virtual name.
    pub(crate) fn base_url(&self, endpoint: GatewayEndpoint) -> Result<Url, Error> {
        Ok(Url::parse(&format!(
            "https://{}:{}/",
            self.server_name, endpoint.port
        ))?)
    }

    /// Build a `reqwest::Client` bound to one gateway endpoint.
    ///
    /// `upstream` receives the relay address announced by the gateway
    /// certificate on every handshake.
    pub(crate) fn build_client(
        &self,
        endpoint: GatewayEndpoint,
        upstream: Arc<ArcSwapOption<String>>,
    ) -> Result<reqwest::Client, Error> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let tls = rustls::ClientConfig::builder_with_provider(Arc::clone(&provider))
            .with_safe_default_protocol_versions()
            .map_err(|e| Error::Tls(format!("unsupported protocol versions: {e}")))?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(GatewayCertVerifier::new(
                provider, upstream,
            )))
            .with_no_client_auth();

        let mut builder = reqwest::Client::builder()
            .use_preconfigured_tls(tls)
            .resolve(&self.server_name, endpoint.socket_addr())
            .connect_timeout(self.timeout)
            .user_agent(concat!("gatewatch/", env!("CARGO_PKG_VERSION")));

        if let Some(ref jar) = self.cookie_jar {
            builder = builder.cookie_provider(Arc::clone(jar));
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_uses_virtual_host_and_port() {
        let cfg = TransportConfig::default();
        let url = cfg
            .base_url(GatewayEndpoint::new(Ipv4Addr::new(192, 168, 1, 50), 443))
            .expect("valid url");
        assert_eq!(url.as_str(), "https://powerwall/");

        let url = cfg
            .base_url(GatewayEndpoint::new(Ipv4Addr::new(10, 0, 0, 2), 8443))
            .expect("valid url");
        assert_eq!(url.as_str(), "https://powerwall:8443/");
    }
}
