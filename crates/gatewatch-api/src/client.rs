// Gateway session HTTP client
//
// Wraps `reqwest::Client` with gateway URL construction, the request
// timeout race, and the 403 → login → single retry recovery. Endpoint
// methods and the login flow live in sibling modules as inherent impls.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{trace, warn};
use url::Url;

use crate::auth::Credentials;
use crate::error::Error;
use crate::transport::{GatewayEndpoint, TransportConfig};

/// Status and body of a completed exchange.
pub(crate) struct RawResponse {
    pub status: StatusCode,
    pub body: String,
}

/// One authenticated HTTPS session against a single gateway.
///
/// Session cookies set by the login endpoint live in the client's cookie
/// jar and are reused by every request. At most one login is in flight at
/// a time; other requests fail fast while it runs.
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: Option<Credentials>,
    timeout: Duration,
    logging_in: AtomicBool,
    last_login: ArcSwapOption<DateTime<Utc>>,
    /// Relay address announced by the gateway certificate, refreshed per handshake.
    upstream: Arc<ArcSwapOption<String>>,
}

impl GatewayClient {
    /// Create a session for `endpoint` from a `TransportConfig`.
    ///
    /// A cookie jar is added if the config lacks one; the gateway's
    /// session auth depends on it.
    pub fn new(
        endpoint: GatewayEndpoint,
        credentials: Option<Credentials>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let config = if transport.cookie_jar.is_some() {
            transport.clone()
        } else {
            transport.clone().with_cookie_jar()
        };
        let upstream = Arc::new(ArcSwapOption::empty());
        let http = config.build_client(endpoint, Arc::clone(&upstream))?;
        let base_url = config.base_url(endpoint)?;

        Ok(Self {
            http,
            base_url,
            credentials,
            timeout: config.timeout,
            logging_in: AtomicBool::new(false),
            last_login: ArcSwapOption::empty(),
            upstream,
        })
    }

    /// Create a session with a pre-built `reqwest::Client` and base URL.
    ///
    /// No certificate inspection happens on this path, so
    /// [`upstream_identity`](Self::upstream_identity) stays `None`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        credentials: Option<Credentials>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url,
            credentials,
            timeout,
            logging_in: AtomicBool::new(false),
            last_login: ArcSwapOption::empty(),
            upstream: Arc::new(ArcSwapOption::empty()),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub(crate) fn logging_in_flag(&self) -> &AtomicBool {
        &self.logging_in
    }

    pub(crate) fn record_login(&self) {
        self.last_login.store(Some(Arc::new(Utc::now())));
    }

    /// When the last successful login completed.
    pub fn last_login(&self) -> Option<DateTime<Utc>> {
        self.last_login.load_full().map(|t| *t)
    }

    /// Whether a login request is currently in flight.
    pub fn is_logging_in(&self) -> bool {
        self.logging_in.load(Ordering::Acquire)
    }

    /// Relay address announced by the gateway certificate, if any.
    ///
    /// For display only; nothing else relies on it.
    pub fn upstream_identity(&self) -> Option<String> {
        self.upstream.load_full().map(|s| (*s).clone())
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/api{path}` for a gateway endpoint path.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/api{path}"))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Race an exchange against the request timeout.
    ///
    /// When the timer wins, the in-flight request future is dropped, so a
    /// late response never reaches the caller.
    pub(crate) async fn race(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<RawResponse, Error> {
        let exchange = async {
            let resp = request.send().await?;
            let status = resp.status();
            let body = resp.text().await?;
            Ok::<_, Error>(RawResponse { status, body })
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| Error::RequestTimeout {
                endpoint: endpoint_label(endpoint).to_owned(),
            })?
    }

    async fn send_get(&self, endpoint: &str) -> Result<RawResponse, Error> {
        if self.is_logging_in() {
            trace!(endpoint, "suppressing request while logging in");
            return Err(Error::LoginInProgress {
                endpoint: endpoint.to_owned(),
            });
        }

        let url = self.api_url(endpoint)?;
        trace!("requesting {url}");
        let raw = self.race(endpoint, self.http.get(url)).await?;
        trace!(endpoint, status = %raw.status, "request complete");
        Ok(raw)
    }

    /// GET an endpoint and decode its JSON body.
    ///
    /// A 403 triggers one login and one retry; a second 403 is final.
    pub(crate) async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, Error> {
        let mut raw = self.send_get(endpoint).await?;

        if raw.status == StatusCode::FORBIDDEN {
            warn!(endpoint, "request failed with status code Forbidden; attempting to login");
            self.login().await?;

            raw = self.send_get(endpoint).await?;
            if raw.status == StatusCode::FORBIDDEN {
                return Err(Error::Forbidden {
                    endpoint: endpoint.to_owned(),
                });
            }
        }

        decode(endpoint, &raw)
    }
}

/// Reject unsuccessful statuses, then decode the body.
fn decode<T: DeserializeOwned>(endpoint: &str, raw: &RawResponse) -> Result<T, Error> {
    if !raw.status.is_success() {
        return Err(Error::Http {
            endpoint: endpoint.to_owned(),
            status: raw.status.as_u16(),
        });
    }

    serde_json::from_str(&raw.body).map_err(|e| {
        let preview = raw.body.chars().take(200).collect::<String>();
        Error::MalformedResponse {
            endpoint: endpoint.to_owned(),
            message: format!("{e} (body preview: {preview:?})"),
            body: raw.body.clone(),
        }
    })
}

/// Short label for an endpoint path: its last segment.
pub(crate) fn endpoint_label(endpoint: &str) -> &str {
    endpoint.rsplit('/').next().unwrap_or(endpoint)
}
