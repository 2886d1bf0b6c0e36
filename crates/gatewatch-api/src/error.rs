use thiserror::Error;

/// Top-level error type for the `gatewatch-api` crate.
///
/// Covers every failure mode of a gateway session: transport, TLS,
/// timeouts, HTTP status handling, authentication, and body decoding.
/// `gatewatch-core` maps these into its own connection/poll taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login was required but no email/password pair is configured.
    #[error("No credentials configured")]
    NoCredentialsConfigured,

    /// The gateway answered the login request with an explicit error.
    #[error("Login failed ({message})")]
    LoginFailed { message: String },

    /// A request was suppressed because a login is in flight on this session.
    #[error("Suppressing {endpoint} request because we are actively logging in")]
    LoginInProgress { endpoint: String },

    /// The gateway still returned 403 after a fresh login.
    #[error("Request \"{endpoint}\" is forbidden even after re-authenticating")]
    Forbidden { endpoint: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, reset, TLS alert, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// No response arrived inside the request timeout window.
    #[error("{endpoint} request timed out")]
    RequestTimeout { endpoint: String },

    /// TLS configuration error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── HTTP ────────────────────────────────────────────────────────
    /// The gateway answered with an unsuccessful status code.
    #[error("Request \"{endpoint}\" failed with status code \"{status}\"")]
    Http { endpoint: String, status: u16 },

    // ── Data ────────────────────────────────────────────────────────
    /// The body could not be decoded into the expected record.
    #[error("Malformed response from {endpoint}: {message}")]
    MalformedResponse {
        endpoint: String,
        message: String,
        body: String,
    },
}

impl Error {
    /// Returns `true` for login failures (missing or rejected credentials).
    pub fn is_login_failure(&self) -> bool {
        matches!(
            self,
            Self::NoCredentialsConfigured | Self::LoginFailed { .. } | Self::Forbidden { .. }
        )
    }
}

/// Walk an error's `source()` chain and return the innermost message.
///
/// Transport failures arrive wrapped several layers deep (reqwest → hyper
/// → io); the root cause is what a user can act on.
pub fn innermost_message(err: &(dyn std::error::Error + 'static)) -> String {
    let mut current = err;
    while let Some(next) = current.source() {
        current = next;
    }
    current.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("outer")]
    struct Outer(#[source] Middle);

    #[derive(Debug, Error)]
    #[error("middle")]
    struct Middle(#[source] std::io::Error);

    #[test]
    fn innermost_message_unwraps_the_whole_chain() {
        let err = Outer(Middle(std::io::Error::other("connection reset by peer")));
        assert_eq!(innermost_message(&err), "connection reset by peer");
    }

    #[test]
    fn innermost_message_of_leaf_is_its_display() {
        let err = Error::NoCredentialsConfigured;
        assert_eq!(innermost_message(&err), "No credentials configured");
    }

    #[test]
    fn timeout_message_names_the_endpoint() {
        let err = Error::RequestTimeout {
            endpoint: "aggregates".into(),
        };
        assert_eq!(err.to_string(), "aggregates request timed out");
        assert!(!err.is_login_failure());
    }
}
