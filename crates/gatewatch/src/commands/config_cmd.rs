//! Config subcommand handlers.

use std::path::Path;

use secrecy::SecretString;

use gatewatch_config::{Config, SubscriptionEntry, save_config_to, store_password};
use gatewatch_core::{SubTrigger, parse_gateway_address};

use crate::cli::{ConfigArgs, ConfigCommand, ConfigKey, GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Copy of the config that is safe to print.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    if cfg.gateway.password.is_some() {
        cfg.gateway.password = Some("****".into());
    }
    cfg
}

fn save(cfg: &Config, path: &Path, global: &GlobalOpts, message: &str) -> Result<(), CliError> {
    save_config_to(cfg, path)?;
    output::print_output(message, global.quiet);
    Ok(())
}

/// Apply `key = value` to the gateway section, validating as we go.
fn apply(cfg: &mut Config, key: ConfigKey, value: &str) -> Result<(), CliError> {
    let gateway = &mut cfg.gateway;
    match key {
        ConfigKey::Address => {
            parse_gateway_address(value)?;
            gateway.address = Some(value.to_owned());
        }
        ConfigKey::Port => {
            let port = value
                .parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| CliError::Validation {
                    field: "gateway.port".into(),
                    reason: format!("{value:?} is not a port between 1 and 65535"),
                })?;
            gateway.port = port;
        }
        ConfigKey::Email => {
            gateway.email = Some(value.to_owned()).filter(|e| !e.is_empty());
        }
        ConfigKey::PasswordEnv => {
            gateway.password_env = Some(value.to_owned()).filter(|e| !e.is_empty());
        }
    }
    Ok(())
}

fn subscribe(cfg: &mut Config, trigger: SubTrigger, name: String) -> Result<(), CliError> {
    let entry = SubscriptionEntry { name, trigger };
    if cfg.subscriptions.contains(&entry) {
        return Err(CliError::Validation {
            field: "subscriptions".into(),
            reason: format!("{:?} already listens for {trigger}", entry.name),
        });
    }
    cfg.subscriptions.push(entry);
    Ok(())
}

fn unsubscribe(cfg: &mut Config, name: &str) -> Result<usize, CliError> {
    let before = cfg.subscriptions.len();
    cfg.subscriptions.retain(|s| s.name != name);
    match before - cfg.subscriptions.len() {
        0 => Err(CliError::Validation {
            field: "subscriptions".into(),
            reason: format!("no subscription named {name:?}"),
        }),
        removed => Ok(removed),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (mut cfg, path) = super::load(global)?;

    match args.command {
        ConfigCommand::Show => {
            let cfg = redacted(&cfg);
            let out = match global.output {
                OutputFormat::Table | OutputFormat::Plain => {
                    toml::to_string_pretty(&cfg).map_err(gatewatch_config::ConfigError::from)?
                }
                OutputFormat::Json => serde_json::to_string_pretty(&cfg)?,
                OutputFormat::JsonCompact => serde_json::to_string(&cfg)?,
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Set { key, value } => {
            apply(&mut cfg, key, &value)?;
            save(&cfg, &path, global, &format!("Updated {}", path.display()))
        }

        ConfigCommand::SetPassword { plaintext } => {
            let address = cfg
                .gateway
                .address
                .clone()
                .filter(|a| !a.is_empty())
                .ok_or_else(|| CliError::NoConfig {
                    path: path.display().to_string(),
                })?;
            let password = rpassword::prompt_password("Gateway password: ").map_err(CliError::Prompt)?;
            if password.is_empty() {
                return Err(CliError::Validation {
                    field: "password".into(),
                    reason: "cannot be empty".into(),
                });
            }

            if plaintext {
                cfg.gateway.password = Some(password);
                save(&cfg, &path, global, "Password saved to the config file (plaintext)")
            } else {
                store_password(&address, &SecretString::from(password))?;
                output::print_output("Password stored in the system keyring", global.quiet);
                Ok(())
            }
        }

        ConfigCommand::Subscribe { trigger, name } => {
            subscribe(&mut cfg, trigger, name)?;
            save(&cfg, &path, global, &format!("Subscribed to {trigger}"))
        }

        ConfigCommand::Unsubscribe { name } => {
            let removed = unsubscribe(&mut cfg, &name)?;
            save(&cfg, &path, global, &format!("Removed {removed} subscription(s)"))
        }
    }
}
