//! Long-running supervision: connect, poll, fire subscriptions and print
//! what happens until interrupted.
//!
//! `SIGHUP` reloads the config file (settings and subscriptions) and
//! `SIGUSR1` skips a pending retry delay.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use gatewatch_config::{Config, load_config_from, supervisor_timings};
use gatewatch_core::model::kilowatt_label;
use gatewatch_core::{
    ConnectionState, HttpsConnector, InterfaceStatus, PowerFlowTriggerEngine, PowerReadings,
    StatusLevel, SubTrigger, Subscription, SubscriptionRegistry, Supervisor, TelemetrySnapshot,
};

use crate::cli::{GlobalOpts, OutputFormat, RunArgs};
use crate::error::CliError;
use crate::hub::{ChannelSink, ConfiguredUsage, LoggingDirectory};
use crate::output;

// ── Events printed by the run loop ──────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
enum RunEvent<'a> {
    State {
        state: &'a ConnectionState,
    },
    Status {
        status: &'a InterfaceStatus,
    },
    Telemetry {
        readings: PowerReadings,
        charge_percent: f64,
        grid_connected: bool,
    },
    Fired {
        name: &'a str,
        trigger: SubTrigger,
        description: String,
    },
}

impl RunEvent<'_> {
    fn telemetry(snapshot: &TelemetrySnapshot) -> Self {
        Self::Telemetry {
            readings: snapshot.readings(),
            charge_percent: snapshot.charge_display(),
            grid_connected: snapshot.grid_connected(),
        }
    }

    fn render(&self, format: OutputFormat) -> Result<String, CliError> {
        if matches!(format, OutputFormat::Json | OutputFormat::JsonCompact) {
            // One object per line so the stream stays greppable.
            return Ok(serde_json::to_string(self)?);
        }
        Ok(match self {
            Self::State { state } => match state {
                ConnectionState::Fatal { reason } => format!("connection: failed ({reason})"),
                other => format!("connection: {other:?}").to_lowercase(),
            },
            Self::Status { status } => match status.level {
                StatusLevel::Ok => "status: ok".to_owned(),
                level => format!("status: {}: {}", level.to_string().to_lowercase(), status.message),
            },
            Self::Telemetry {
                readings,
                charge_percent,
                grid_connected,
            } => format!(
                "site {} | powerwall {} | solar {} | grid {} | charge {charge_percent:.1}% | {}",
                kilowatt_label(readings.site),
                kilowatt_label(readings.battery),
                kilowatt_label(readings.solar),
                kilowatt_label(readings.grid),
                if *grid_connected { "on grid" } else { "off grid" },
            ),
            Self::Fired {
                name, description, ..
            } => format!("fired: {name} ({description})"),
        })
    }
}

// ── Signals ─────────────────────────────────────────────────────────

enum Request {
    Reload,
    Retry,
}

#[cfg(unix)]
struct Signals {
    hangup: tokio::signal::unix::Signal,
    user1: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        Ok(Self {
            hangup: signal(SignalKind::hangup())?,
            user1: signal(SignalKind::user_defined1())?,
        })
    }

    async fn recv(&mut self) -> Request {
        tokio::select! {
            _ = self.hangup.recv() => Request::Reload,
            _ = self.user1.recv() => Request::Retry,
        }
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    #[allow(clippy::unnecessary_wraps)]
    fn new() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> Request {
        std::future::pending().await
    }
}

// ── Handler ─────────────────────────────────────────────────────────

fn register_all(registry: &SubscriptionRegistry, cfg: &Config) {
    for id in registry.snapshot().iter().map(|s| s.id) {
        registry.unregister(id);
    }
    for entry in &cfg.subscriptions {
        registry.register(entry.trigger, entry.name.clone());
    }
}

/// Re-read the config file and hand the result to the supervisor, which
/// keeps a live session unless the address, port or credentials changed.
/// Failures keep the running configuration.
fn reload(
    path: &Path,
    global: &GlobalOpts,
    supervisor: &Supervisor,
    registry: &SubscriptionRegistry,
) -> Result<(), CliError> {
    let mut cfg = load_config_from(path)?;
    if let Some(ref address) = global.address {
        cfg.gateway.address = Some(address.clone());
    }
    let settings = super::settings(&cfg, path)?;
    register_all(registry, &cfg);
    supervisor.reconfigure(settings)?;
    info!(subscriptions = registry.len(), "configuration reloaded");
    Ok(())
}

fn emit(event: &RunEvent<'_>, global: &GlobalOpts) -> Result<(), CliError> {
    output::print_output(&event.render(global.output)?, global.quiet);
    Ok(())
}

pub async fn handle(args: &RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (cfg, path) = super::load(global)?;
    let settings = super::settings(&cfg, &path)?;
    let timings = supervisor_timings(&cfg)?;

    let registry = Arc::new(SubscriptionRegistry::new());
    register_all(&registry, &cfg);
    let (fired_tx, mut fired_rx) = mpsc::unbounded_channel::<Subscription>();
    let engine = Arc::new(PowerFlowTriggerEngine::new(
        Arc::clone(&registry),
        Arc::new(ChannelSink::new(fired_tx)),
    ));

    info!(
        address = %settings.address,
        subscriptions = registry.len(),
        "supervising gateway"
    );
    let supervisor = Supervisor::spawn(
        settings,
        timings,
        HttpsConnector::new(&timings),
        Arc::new(LoggingDirectory::new()),
        engine,
    );

    let mut state = supervisor.connection_state();
    let mut status = supervisor.status();
    let mut telemetry = supervisor.telemetry();
    let mut signals = Signals::new()?;
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let initial = state.borrow_and_update().clone();
    emit(&RunEvent::State { state: &initial }, global)?;
    status.mark_unchanged();

    let outcome = loop {
        tokio::select! {
            biased;

            res = &mut shutdown => break res.map_err(CliError::from),

            request = signals.recv() => match request {
                Request::Reload => {
                    if let Err(e) = reload(&path, global, &supervisor, &registry) {
                        warn!(error = %e, "reload failed; keeping the running configuration");
                    }
                }
                Request::Retry => {
                    if let Err(e) = supervisor.retry_now() {
                        break Err(e.into());
                    }
                }
            },

            Some(sub) = fired_rx.recv() => {
                let event = RunEvent::Fired {
                    name: &sub.name,
                    trigger: sub.trigger,
                    description: sub.describe(&ConfiguredUsage),
                };
                if let Err(e) = emit(&event, global) {
                    break Err(e);
                }
            }

            changed = state.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let current = state.borrow_and_update().clone();
                if let Err(e) = emit(&RunEvent::State { state: &current }, global) {
                    break Err(e);
                }
            }

            changed = status.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let current = status.borrow_and_update().clone();
                if let Err(e) = emit(&RunEvent::Status { status: &current }, global) {
                    break Err(e);
                }
            }

            changed = telemetry.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let latest = telemetry.borrow_and_update().clone();
                if let Some(snapshot) = latest.filter(|_| args.watch) {
                    if let Err(e) = emit(&RunEvent::telemetry(&snapshot), global) {
                        break Err(e);
                    }
                }
            }
        }
    };

    supervisor.shutdown().await;
    outcome
}
