// ── Core error types ──
//
// Connection and polling failures as the supervisor sees them. Missing or
// rejected credentials and undecodable bodies get their own variants; any
// other API error stays attached as `source()` so the innermost cause can
// be shown to the user verbatim.

use gatewatch_api::innermost_message;
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration ────────────────────────────────────────────────
    /// The configured gateway address is not a dotted-quad IPv4 address.
    /// Fatal until the settings change.
    #[error("No endpoint configured: {reason}")]
    ConfigInvalid { reason: String },

    // ── Connection ───────────────────────────────────────────────────
    #[error("Cannot contact gateway at {address}")]
    ConnectFailed {
        address: String,
        #[source]
        source: gatewatch_api::Error,
    },

    #[error("Telemetry poll failed at {stage}")]
    PollFailed {
        stage: &'static str,
        #[source]
        source: gatewatch_api::Error,
    },

    // ── Authentication ───────────────────────────────────────────────
    #[error("No credentials configured")]
    MissingCredentials,

    #[error("Login failed ({message})")]
    LoginRejected { message: String },

    // ── Data ─────────────────────────────────────────────────────────
    #[error("Malformed response from {endpoint}: {message}")]
    MalformedResponse { endpoint: String, message: String },

    /// The device directory refused to create or look up an entity.
    #[error("Device directory error: {message}")]
    Directory { message: String },

    /// The supervisor task has exited; commands can no longer be delivered.
    #[error("Gateway supervisor is not running")]
    SupervisorStopped,
}

impl CoreError {
    /// The API error underneath a connect or poll failure, if any.
    pub fn api_error(&self) -> Option<&gatewatch_api::Error> {
        match self {
            Self::ConnectFailed { source, .. } | Self::PollFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Credentials are missing or were refused. Retrying on the normal
    /// cadence will not help until they change.
    pub fn is_login_failure(&self) -> bool {
        match self {
            Self::MissingCredentials | Self::LoginRejected { .. } => true,
            _ => self.api_error().is_some_and(gatewatch_api::Error::is_login_failure),
        }
    }

    /// Root cause as a single human-readable line.
    pub fn user_message(&self) -> String {
        innermost_message(self)
    }
}

// ── Classification of transport-layer errors ─────────────────────────

impl CoreError {
    /// Classify an error raised while opening a session to `address`.
    pub fn connect(address: impl Into<String>, err: gatewatch_api::Error) -> Self {
        Self::classify(err, |source| Self::ConnectFailed {
            address: address.into(),
            source,
        })
    }

    /// Classify an error raised by one stage of a poll cycle.
    pub fn poll(stage: &'static str, err: gatewatch_api::Error) -> Self {
        Self::classify(err, |source| Self::PollFailed { stage, source })
    }

    fn classify(
        err: gatewatch_api::Error,
        otherwise: impl FnOnce(gatewatch_api::Error) -> Self,
    ) -> Self {
        match err {
            gatewatch_api::Error::NoCredentialsConfigured => Self::MissingCredentials,
            gatewatch_api::Error::LoginFailed { message } => Self::LoginRejected { message },
            gatewatch_api::Error::MalformedResponse {
                endpoint, message, ..
            } => Self::MalformedResponse { endpoint, message },
            other => otherwise(other),
        }
    }
}
