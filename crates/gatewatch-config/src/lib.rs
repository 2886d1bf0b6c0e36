//! Configuration for the gatewatch binary.
//!
//! A TOML file in the platform config directory, overridden by
//! `GATEWATCH_` environment variables, plus password resolution
//! (env + keyring + plaintext) and translation to the runtime
//! `gatewatch_core::GatewaySettings`. The core never reads files itself.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use gatewatch_core::{
    Credentials, DEFAULT_GATEWAY_PORT, GatewaySettings, SubTrigger, SupervisorTimings,
};

const KEYRING_SERVICE: &str = "gatewatch";
const PASSWORD_ENV: &str = "GATEWATCH_PASSWORD";
const CONFIG_PATH_ENV: &str = "GATEWATCH_CONFIG";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub timings: TimingsSection,

    /// Triggers to listen for while running.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subscriptions: Vec<SubscriptionEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewaySection {
    /// Dotted-quad IPv4 address of the gateway.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Customer account email. Leave unset if the gateway needs no login.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Password (plaintext; prefer the keyring or an env var).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable name containing the password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    /// Consult the system keyring for the password.
    #[serde(default = "default_true")]
    pub keyring: bool,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            address: None,
            port: default_port(),
            email: None,
            password: None,
            password_env: None,
            keyring: true,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_GATEWAY_PORT
}
fn default_true() -> bool {
    true
}

/// Optional overrides of the supervisor's scheduling constants.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TimingsSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_interval_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_threshold: Option<u32>,
}

/// A named listener for one sub-trigger.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SubscriptionEntry {
    pub name: String,
    pub trigger: SubTrigger,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `GATEWATCH_CONFIG`, else the platform
/// config directory.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("com", "gatewatch", "gatewatch").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("gatewatch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` (missing file means defaults), then apply
/// `GATEWATCH_SECTION__KEY` environment overrides.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(
            Env::prefixed("GATEWATCH_")
                .ignore(&["password", "config"])
                .split("__"),
        );

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(address: &str) -> Result<keyring::Entry, keyring::Error> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{address}/password"))
}

/// Resolve the gateway password from the credential chain.
pub fn resolve_password(gateway: &GatewaySection) -> Option<SecretString> {
    // 1. Section's password_env → env var lookup
    if let Some(ref env_name) = gateway.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }

    // 2. Well-known env var
    if let Ok(val) = std::env::var(PASSWORD_ENV) {
        return Some(SecretString::from(val));
    }

    // 3. System keyring
    if gateway.keyring {
        if let Some(ref address) = gateway.address {
            if let Ok(pw) = keyring_entry(address).and_then(|e| e.get_password()) {
                return Some(SecretString::from(pw));
            }
        }
    }

    // 4. Plaintext in config
    gateway
        .password
        .as_ref()
        .map(|pw| SecretString::from(pw.clone()))
}

/// Store the password for `address` in the system keyring.
pub fn store_password(address: &str, password: &SecretString) -> Result<(), ConfigError> {
    keyring_entry(address)?.set_password(password.expose_secret())?;
    Ok(())
}

/// Credentials for the gateway, or `None` if no email is configured.
///
/// An email without any resolvable password still yields credentials
/// (with an empty password) so the login reports them as missing.
pub fn resolve_credentials(gateway: &GatewaySection) -> Option<Credentials> {
    let email = gateway.email.as_deref().filter(|e| !e.is_empty())?;
    let password = resolve_password(gateway).unwrap_or_else(|| SecretString::from(String::new()));
    Some(Credentials::new(email, password))
}

// ── Translation to runtime types ────────────────────────────────────

/// Build `GatewaySettings` from the config. The address is passed through
/// as written; the supervisor validates it on every connect.
pub fn gateway_settings(cfg: &Config) -> Result<GatewaySettings, ConfigError> {
    let address = cfg
        .gateway
        .address
        .clone()
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ConfigError::Validation {
            field: "gateway.address".into(),
            reason: "not set (run `gatewatch config set address <ip>`)".into(),
        })?;

    if cfg.gateway.port == 0 {
        return Err(ConfigError::Validation {
            field: "gateway.port".into(),
            reason: "must be between 1 and 65535".into(),
        });
    }

    let mut settings = GatewaySettings::new(address).with_port(cfg.gateway.port);
    if let Some(credentials) = resolve_credentials(&cfg.gateway) {
        settings = settings.with_credentials(credentials);
    }
    Ok(settings)
}

/// Accepted per-request timeout, in whole seconds.
const REQUEST_TIMEOUT_SECS: RangeInclusive<u64> = 5..=10;

/// Supervisor timings with any configured overrides applied.
pub fn supervisor_timings(cfg: &Config) -> Result<SupervisorTimings, ConfigError> {
    let t = &cfg.timings;
    let mut timings = SupervisorTimings::default();

    if let Some(ms) = t.poll_interval_ms {
        timings.poll_interval = Duration::from_millis(ms);
    }
    if let Some(secs) = t.retry_interval_secs {
        timings.retry_interval = Duration::from_secs(secs);
    }
    if let Some(ms) = t.debounce_ms {
        timings.debounce = Duration::from_millis(ms);
    }
    if let Some(secs) = t.request_timeout_secs {
        timings.request_timeout = Duration::from_secs(secs);
    }
    if let Some(n) = t.failure_threshold {
        timings.failure_threshold = n;
    }

    if timings.poll_interval.is_zero() {
        return Err(ConfigError::Validation {
            field: "timings.poll_interval_ms".into(),
            reason: "must be greater than zero".into(),
        });
    }
    if !REQUEST_TIMEOUT_SECS.contains(&timings.request_timeout.as_secs()) {
        return Err(ConfigError::Validation {
            field: "timings.request_timeout_secs".into(),
            reason: format!(
                "must be between {} and {} seconds",
                REQUEST_TIMEOUT_SECS.start(),
                REQUEST_TIMEOUT_SECS.end()
            ),
        });
    }
    if timings.failure_threshold == 0 {
        return Err(ConfigError::Validation {
            field: "timings.failure_threshold".into(),
            reason: "must be at least 1".into(),
        });
    }
    Ok(timings)
}
