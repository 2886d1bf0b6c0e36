// Gateway authentication
//
// Cookie-based session login. The login endpoint sets a session cookie
// in the client's jar; subsequent requests use it automatically.

use std::sync::atomic::{AtomicBool, Ordering};

use secrecy::{ExposeSecret, SecretString};
use tracing::{info, trace};

use crate::client::GatewayClient;
use crate::error::Error;
use crate::models::{LoginRequest, LoginResponse};

const LOGIN_PATH: &str = "/login/Basic";

/// Local account the gateway's customer login is bound to.
const LOGIN_USERNAME: &str = "customer";

/// Email/password pair for the gateway's customer account.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: SecretString) -> Self {
        Self {
            email: email.into(),
            password,
        }
    }

    /// Both halves are non-empty.
    pub fn is_complete(&self) -> bool {
        !self.email.is_empty() && !self.password.expose_secret().is_empty()
    }
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        self.email == other.email && self.password.expose_secret() == other.password.expose_secret()
    }
}

impl Eq for Credentials {}

/// Clears the in-flight flag on every exit path, including cancellation.
struct LoginGuard<'a>(&'a AtomicBool);

impl Drop for LoginGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl GatewayClient {
    /// Authenticate with the gateway using the configured email/password.
    ///
    /// `POST /api/login/Basic`. If a login is already in flight this
    /// returns `Ok(())` immediately without a second request; callers that
    /// need the session must wait on the original login instead.
    pub async fn login(&self) -> Result<(), Error> {
        if self.is_logging_in() {
            trace!("suppressing login attempt because we're already trying to login");
            return Ok(());
        }

        let creds = self
            .credentials()
            .filter(|c| c.is_complete())
            .ok_or(Error::NoCredentialsConfigured)?;

        if self
            .logging_in_flag()
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            trace!("suppressing login attempt because we're already trying to login");
            return Ok(());
        }
        let _guard = LoginGuard(self.logging_in_flag());

        let url = self.api_url(LOGIN_PATH)?;
        trace!("logging in at {url}");

        let body = LoginRequest {
            email: &creds.email,
            password: creds.password.expose_secret(),
            username: LOGIN_USERNAME,
            force_sm_off: false,
        };
        let raw = self
            .race("login", self.http().post(url).json(&body))
            .await?;
        trace!(status = %raw.status, "login request complete");

        let response: LoginResponse =
            serde_json::from_str(&raw.body).map_err(|e| Error::MalformedResponse {
                endpoint: LOGIN_PATH.into(),
                message: e.to_string(),
                body: raw.body.clone(),
            })?;

        if let Some(message) = response.error {
            return Err(Error::LoginFailed { message });
        }
        if !raw.status.is_success() {
            return Err(Error::LoginFailed {
                message: format!("HTTP {}", raw.status),
            });
        }

        self.record_login();
        info!("successfully logged into gateway API");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_need_both_halves() {
        let full = Credentials::new("me@example.com", SecretString::from("hunter2".to_owned()));
        let no_pw = Credentials::new("me@example.com", SecretString::from(String::new()));
        let no_email = Credentials::new("", SecretString::from("hunter2".to_owned()));
        assert!(full.is_complete());
        assert!(!no_pw.is_complete());
        assert!(!no_email.is_complete());
    }

    #[test]
    fn credentials_compare_by_email_and_password() {
        let secret = |s: &str| SecretString::from(s.to_owned());
        let a = Credentials::new("me@example.com", secret("hunter2"));
        assert_eq!(a, Credentials::new("me@example.com", secret("hunter2")));
        assert_ne!(a, Credentials::new("me@example.com", secret("hunter3")));
        assert_ne!(a, Credentials::new("you@example.com", secret("hunter2")));
    }
}
