//! CLI error types with miette diagnostics.
//!
//! Maps core, config and API errors into user-facing errors with
//! actionable help text and a stable exit code.

use miette::Diagnostic;
use thiserror::Error;

use gatewatch_api::innermost_message;
use gatewatch_config::ConfigError;
use gatewatch_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Cannot contact gateway at {address}")]
    #[diagnostic(
        code(gatewatch::connection_failed),
        help(
            "{cause}\n\
             Check that the gateway is powered and reachable on your LAN."
        )
    )]
    ConnectionFailed { address: String, cause: String },

    #[error("{endpoint} request timed out")]
    #[diagnostic(
        code(gatewatch::timeout),
        help("Raise timings.request_timeout_secs if the gateway is slow to answer.")
    )]
    Timeout { endpoint: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Login failed ({message})")]
    #[diagnostic(
        code(gatewatch::auth_failed),
        help("Check gateway.email and run: gatewatch config set-password")
    )]
    AuthFailed { message: String },

    #[error("No credentials configured")]
    #[diagnostic(
        code(gatewatch::no_credentials),
        help(
            "Set the customer login with: gatewatch config set email <email>\n\
             then: gatewatch config set-password\n\
             Or set GATEWATCH_PASSWORD."
        )
    )]
    NoCredentials,

    // ── Gateway ──────────────────────────────────────────────────────
    #[error("Gateway error: {message}")]
    #[diagnostic(code(gatewatch::gateway))]
    Gateway { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(gatewatch::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("No gateway address configured")]
    #[diagnostic(
        code(gatewatch::no_config),
        help(
            "Set one with: gatewatch config set address <ip>\n\
             Config file: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(gatewatch::config))]
    Config(Box<ConfigError>),

    #[error("Could not read the password: {0}")]
    #[diagnostic(code(gatewatch::prompt))]
    Prompt(#[source] std::io::Error),

    // ── Output ───────────────────────────────────────────────────────
    #[error("Failed to encode output: {0}")]
    #[diagnostic(code(gatewatch::output))]
    Output(#[from] serde_json::Error),

    #[error(transparent)]
    #[diagnostic(code(gatewatch::io))]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials => exit_code::AUTH,
            Self::Validation { .. } | Self::NoConfig { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Failure talking to the gateway at `address`.
    pub fn from_gateway(address: &str, err: gatewatch_api::Error) -> Self {
        match err {
            gatewatch_api::Error::Transport(_) | gatewatch_api::Error::Tls(_) => {
                Self::ConnectionFailed {
                    address: address.to_owned(),
                    cause: innermost_message(&err),
                }
            }
            other => other.into(),
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<gatewatch_api::Error> for CliError {
    fn from(err: gatewatch_api::Error) -> Self {
        match err {
            gatewatch_api::Error::NoCredentialsConfigured => Self::NoCredentials,
            gatewatch_api::Error::LoginFailed { message } => Self::AuthFailed { message },
            gatewatch_api::Error::Forbidden { .. } => Self::AuthFailed {
                message: err.to_string(),
            },
            gatewatch_api::Error::RequestTimeout { endpoint } => Self::Timeout { endpoint },
            gatewatch_api::Error::Transport(_) | gatewatch_api::Error::Tls(_) => {
                Self::ConnectionFailed {
                    address: "gateway".into(),
                    cause: innermost_message(&err),
                }
            }
            other => Self::Gateway {
                message: other.to_string(),
            },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConfigInvalid { reason } => Self::Validation {
                field: "gateway.address".into(),
                reason,
            },
            CoreError::MissingCredentials => Self::NoCredentials,
            CoreError::LoginRejected { message } => Self::AuthFailed { message },
            CoreError::ConnectFailed { address, source } => Self::from_gateway(&address, source),
            CoreError::PollFailed { source, .. } => source.into(),
            other => Self::Gateway {
                message: other.to_string(),
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}
