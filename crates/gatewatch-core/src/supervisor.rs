// ── Reconnect supervisor ──
//
// A single actor task owns the connection state machine, the active
// session and its poller. Commands arrive over an mpsc channel; the
// connect-retry, debounce and poll timers are deadlines inside the same
// select loop, so no two of them ever run concurrently.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use strum::Display;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{GatewaySettings, SupervisorTimings};
use crate::error::CoreError;
use crate::gateway::{Connector, Gateway};
use crate::hub::DeviceDirectory;
use crate::model::{TelemetrySnapshot, address_base};
use crate::poller::{CycleOutcome, TelemetryPoller};
use crate::trigger::{PowerFlowTriggerEngine, SubTrigger};

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Initial contact failed; `reason` is the innermost error message.
    Fatal { reason: String },
}

// ── InterfaceStatus ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum StatusLevel {
    Ok,
    Warning,
    Fatal,
}

/// User-facing health line for the integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceStatus {
    pub level: StatusLevel,
    pub message: String,
}

impl InterfaceStatus {
    pub fn ok() -> Self {
        Self {
            level: StatusLevel::Ok,
            message: String::new(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Warning,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Fatal,
            message: message.into(),
        }
    }
}

// ── Supervisor handle ────────────────────────────────────────────

enum Command {
    Reconfigure(GatewaySettings),
    RetryNow,
}

/// Handle to the supervisor task.
///
/// Cheaply cloneable via `Arc<SupervisorInner>`. State, status and the
/// latest telemetry are exposed as `watch` receivers.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<SupervisorInner>,
}

struct SupervisorInner {
    commands: mpsc::UnboundedSender<Command>,
    connection_state: watch::Receiver<ConnectionState>,
    status: watch::Receiver<InterfaceStatus>,
    telemetry: watch::Receiver<Option<Arc<TelemetrySnapshot>>>,
    upstream: watch::Receiver<Option<String>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Supervisor {
    /// Start supervising the gateway described by `settings`.
    ///
    /// The first connection attempt begins immediately on the spawned task.
    pub fn spawn<C: Connector>(
        settings: GatewaySettings,
        timings: SupervisorTimings,
        connector: C,
        directory: Arc<dyn DeviceDirectory>,
        engine: Arc<PowerFlowTriggerEngine>,
    ) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, connection_state) = watch::channel(ConnectionState::Disconnected);
        let (status_tx, status) = watch::channel(InterfaceStatus::ok());
        let (telemetry_tx, telemetry) = watch::channel(None);
        let (upstream_tx, upstream) = watch::channel(None);
        let cancel = CancellationToken::new();

        let mut timers = Timers::default();
        timers.arm(TimerKind::Connect, Duration::ZERO);

        let actor = Actor {
            connector,
            directory,
            engine,
            timings,
            settings,
            pending: None,
            session: None,
            timers,
            state: state_tx,
            status: status_tx,
            telemetry: telemetry_tx,
            upstream: upstream_tx,
        };
        let task = tokio::spawn(actor.run(command_rx, cancel.clone()));

        Self {
            inner: Arc::new(SupervisorInner {
                commands,
                connection_state,
                status,
                telemetry,
                upstream,
                cancel,
                task: Mutex::new(Some(task)),
            }),
        }
    }

    /// Replace the gateway settings. Bursts of calls inside the debounce
    /// window collapse into one reconnection using the last value.
    pub fn reconfigure(&self, settings: GatewaySettings) -> Result<(), CoreError> {
        self.send(Command::Reconfigure(settings))
    }

    /// Skip the remaining retry delay and attempt to connect now.
    pub fn retry_now(&self) -> Result<(), CoreError> {
        self.send(Command::RetryNow)
    }

    fn send(&self, command: Command) -> Result<(), CoreError> {
        self.inner
            .commands
            .send(command)
            .map_err(|_| CoreError::SupervisorStopped)
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.clone()
    }

    pub fn status(&self) -> watch::Receiver<InterfaceStatus> {
        self.inner.status.clone()
    }

    /// Latest published snapshot; `None` until the first full cycle.
    pub fn telemetry(&self) -> watch::Receiver<Option<Arc<TelemetrySnapshot>>> {
        self.inner.telemetry.clone()
    }

    /// Relay address announced by the gateway certificate, if any.
    pub fn upstream_identity(&self) -> Option<String> {
        self.inner.upstream.borrow().clone()
    }

    /// Whether the latest readings satisfy `trigger` used as a condition.
    pub fn is_condition_true(&self, trigger: SubTrigger) -> bool {
        let snapshot = self.inner.telemetry.borrow();
        let readings = snapshot.as_ref().map(|s| s.readings());
        trigger.is_condition_true(readings.as_ref())
    }

    /// Stop timers, abandon any in-flight attempt and wait for the task.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let handle = self.inner.task.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "supervisor task ended abnormally");
            }
        }
        debug!("supervisor shut down");
    }
}

// ── Timers ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Connect,
    Debounce,
    Poll,
}

/// One-shot deadlines, at most one per kind. Re-arming replaces.
#[derive(Debug, Default)]
struct Timers {
    connect: Option<Instant>,
    debounce: Option<Instant>,
    poll: Option<Instant>,
}

impl Timers {
    fn slot(&mut self, kind: TimerKind) -> &mut Option<Instant> {
        match kind {
            TimerKind::Connect => &mut self.connect,
            TimerKind::Debounce => &mut self.debounce,
            TimerKind::Poll => &mut self.poll,
        }
    }

    fn arm(&mut self, kind: TimerKind, after: Duration) {
        *self.slot(kind) = Some(Instant::now() + after);
    }

    fn disarm(&mut self, kind: TimerKind) {
        *self.slot(kind) = None;
    }

    fn next_due(&self) -> Option<(TimerKind, Instant)> {
        [
            (TimerKind::Connect, self.connect),
            (TimerKind::Debounce, self.debounce),
            (TimerKind::Poll, self.poll),
        ]
        .into_iter()
        .filter_map(|(kind, at)| at.map(|at| (kind, at)))
        .min_by_key(|(_, at)| *at)
    }
}

async fn wait_for(due: Option<(TimerKind, Instant)>) -> TimerKind {
    match due {
        Some((kind, at)) => {
            tokio::time::sleep_until(at).await;
            kind
        }
        None => std::future::pending().await,
    }
}

// ── Actor ────────────────────────────────────────────────────────

struct Session<G> {
    gateway: G,
    poller: TelemetryPoller,
}

struct Actor<C: Connector> {
    connector: C,
    directory: Arc<dyn DeviceDirectory>,
    engine: Arc<PowerFlowTriggerEngine>,
    timings: SupervisorTimings,
    settings: GatewaySettings,
    /// Settings waiting out the debounce window.
    pending: Option<GatewaySettings>,
    session: Option<Session<C::Session>>,
    timers: Timers,
    state: watch::Sender<ConnectionState>,
    status: watch::Sender<InterfaceStatus>,
    telemetry: watch::Sender<Option<Arc<TelemetrySnapshot>>>,
    upstream: watch::Sender<Option<String>>,
}

impl<C: Connector> Actor<C> {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>, cancel: CancellationToken) {
        loop {
            let due = self.timers.next_due();
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                command = commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                kind = wait_for(due) => {
                    self.timers.disarm(kind);
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        () = self.fire(kind) => {}
                    }
                }
            }
        }

        self.session = None;
        self.state.send_replace(ConnectionState::Disconnected);
        debug!("supervisor loop exited");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Reconfigure(settings) => {
                debug!(address = %settings.address, port = settings.port, "reconfiguration received");
                self.pending = Some(settings);
                self.timers.arm(TimerKind::Debounce, self.timings.debounce);
            }
            Command::RetryNow => self.timers.arm(TimerKind::Connect, Duration::ZERO),
        }
    }

    async fn fire(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::Debounce => {
                if let Some(settings) = self.pending.take() {
                    if settings == self.settings && self.session.is_some() {
                        debug!("gateway settings unchanged; keeping the current session");
                        return;
                    }
                    self.settings = settings;
                }
                self.connect().await;
            }
            TimerKind::Connect => {
                if self.pending.is_some() {
                    debug!("connect deferred to pending reconfiguration");
                    return;
                }
                self.connect().await;
            }
            TimerKind::Poll => self.poll().await,
        }
    }

    async fn connect(&mut self) {
        self.timers.disarm(TimerKind::Poll);
        self.timers.disarm(TimerKind::Connect);
        if self.session.take().is_some() {
            debug!("discarding previous gateway session");
        }
        self.upstream.send_replace(None);
        self.state.send_replace(ConnectionState::Connecting);
        info!(address = %self.settings.address, port = self.settings.port, "connecting to gateway");

        match self.open_session().await {
            Ok(session) => {
                self.upstream.send_replace(session.gateway.upstream_identity());
                self.session = Some(session);
                self.state.send_replace(ConnectionState::Connected);
                self.status.send_replace(InterfaceStatus::ok());
                self.timers.arm(TimerKind::Poll, self.timings.poll_interval);
            }
            Err(e) => self.fail(&e),
        }
    }

    async fn open_session(&self) -> Result<Session<C::Session>, CoreError> {
        let endpoint = self.settings.endpoint()?;
        let gateway = self.connector.open(endpoint, &self.settings)?;

        let info = gateway
            .site_info()
            .await
            .map_err(|source| CoreError::connect(self.settings.address.as_str(), source))?;

        let base = address_base(endpoint.address);
        let devices = self.directory.ensure_devices(&base, &info.site_name)?;
        info!(site = %info.site_name, address_base = %base, "connected to gateway");

        let poller = TelemetryPoller::new(
            devices,
            Arc::clone(&self.directory),
            Arc::clone(&self.engine),
        );
        Ok(Session { gateway, poller })
    }

    fn fail(&mut self, err: &CoreError) {
        let reason = err.user_message();
        error!(error = %err, cause = %reason, "cannot contact gateway");
        self.state.send_replace(ConnectionState::Fatal {
            reason: reason.clone(),
        });
        self.status.send_replace(InterfaceStatus::fatal(reason));

        if matches!(err, CoreError::ConfigInvalid { .. }) {
            return;
        }
        info!(
            retry_in_secs = self.timings.retry_interval.as_secs(),
            "will retry gateway connection"
        );
        self.timers.arm(TimerKind::Connect, self.timings.retry_interval);
    }

    async fn poll(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let outcome = session.poller.run_cycle(&session.gateway).await;
        let failures = session.poller.consecutive_failures();
        let upstream = session.gateway.upstream_identity();

        self.upstream.send_if_modified(|current| {
            if *current == upstream {
                false
            } else {
                current.clone_from(&upstream);
                true
            }
        });

        match outcome {
            CycleOutcome::Published { snapshot, .. } => {
                self.telemetry.send_replace(Some(snapshot));
                if self.status.borrow().level != StatusLevel::Ok {
                    info!("gateway telemetry recovered");
                    self.status.send_replace(InterfaceStatus::ok());
                }
            }
            CycleOutcome::SiteStopped => {}
            CycleOutcome::Failed(err) => {
                if err.is_login_failure() {
                    warn!(error = %err.user_message(), "gateway session rejected; reconnecting");
                    self.connect().await;
                    return;
                }
                if failures == self.timings.failure_threshold {
                    error!(failures, error = %err.user_message(), "gateway telemetry keeps failing");
                }
                if failures >= self.timings.failure_threshold {
                    self.status
                        .send_replace(InterfaceStatus::warning(err.user_message()));
                }
            }
        }

        self.timers.arm(TimerKind::Poll, self.timings.poll_interval);
    }
}

#[cfg(test)]
mod tests {
    use gatewatch_api::Credentials;
    use pretty_assertions::assert_eq;
    use secrecy::SecretString;

    use super::*;
    use crate::hub::{MemoryDirectory, TriggerSink};
    use crate::testing::{FakeConnector, FakeState, RecordingSink};
    use crate::trigger::SubscriptionRegistry;

    struct Harness {
        supervisor: Supervisor,
        gateway: Arc<FakeState>,
        directory: Arc<MemoryDirectory>,
        registry: Arc<SubscriptionRegistry>,
        sink: Arc<RecordingSink>,
    }

    impl Harness {
        fn state(&self) -> ConnectionState {
            self.supervisor.connection_state().borrow().clone()
        }

        fn status(&self) -> InterfaceStatus {
            self.supervisor.status().borrow().clone()
        }
    }

    fn start(address: &str, setup: impl FnOnce(&FakeState)) -> Harness {
        let connector = FakeConnector::default();
        setup(&connector.state);
        let gateway = Arc::clone(&connector.state);
        let directory = Arc::new(MemoryDirectory::new());
        let registry = Arc::new(SubscriptionRegistry::new());
        let sink = Arc::new(RecordingSink::default());
        let engine = Arc::new(PowerFlowTriggerEngine::new(
            Arc::clone(&registry),
            Arc::clone(&sink) as Arc<dyn TriggerSink>,
        ));
        let supervisor = Supervisor::spawn(
            GatewaySettings::new(address),
            SupervisorTimings::default(),
            connector,
            Arc::clone(&directory) as Arc<dyn DeviceDirectory>,
            engine,
        );
        Harness {
            supervisor,
            gateway,
            directory,
            registry,
            sink,
        }
    }

    async fn advance(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn connects_then_polls() {
        let h = start("10.0.0.2", |_| {});
        advance(10).await;

        assert_eq!(h.state(), ConnectionState::Connected);
        assert_eq!(h.gateway.opened(), vec!["10.0.0.2"]);
        assert_eq!(h.gateway.calls(), vec!["site_info"]);
        assert!(h.directory.lookup("TGW:10.0.0.2").is_some());
        assert!(h.supervisor.telemetry().borrow().is_none());

        advance(2_000).await;
        assert!(h.supervisor.telemetry().borrow().is_some());
        assert_eq!(h.gateway.count("site_master"), 1);

        advance(4_000).await;
        assert_eq!(h.gateway.count("site_master"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_address_is_fatal_without_retry() {
        let h = start("powerwall.local", |_| {});
        advance(10).await;

        let ConnectionState::Fatal { reason } = h.state() else {
            panic!("expected fatal state, got {:?}", h.state());
        };
        assert!(reason.starts_with("No endpoint configured"), "{reason}");
        assert_eq!(h.status().level, StatusLevel::Fatal);

        advance(120_000).await;
        assert!(h.gateway.opened().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_contact_retries_after_a_minute() {
        let h = start("10.0.0.2", |s| s.script(|s| s.site_info_failures = 1));
        advance(10).await;

        assert_eq!(
            h.state(),
            ConnectionState::Fatal {
                reason: "site_name request timed out".into()
            }
        );
        assert_eq!(h.status(), InterfaceStatus::fatal("site_name request timed out"));

        advance(59_000).await;
        assert_eq!(h.gateway.opened().len(), 1);

        advance(1_000).await;
        assert_eq!(h.gateway.opened().len(), 2);
        assert_eq!(h.state(), ConnectionState::Connected);
        assert_eq!(h.status(), InterfaceStatus::ok());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_now_skips_the_delay() {
        let h = start("10.0.0.2", |s| s.script(|s| s.site_info_failures = 1));
        advance(10).await;
        assert!(matches!(h.state(), ConnectionState::Fatal { .. }));

        h.supervisor.retry_now().expect("supervisor running");
        advance(10).await;
        assert_eq!(h.state(), ConnectionState::Connected);
        assert_eq!(h.gateway.opened().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_reconfiguration_collapses_into_one_attempt() {
        let h = start("10.0.0.2", |_| {});
        advance(10).await;
        assert_eq!(h.gateway.opened(), vec!["10.0.0.2"]);

        h.supervisor
            .reconfigure(GatewaySettings::new("10.0.0.3"))
            .expect("supervisor running");
        advance(200).await;
        h.supervisor
            .reconfigure(GatewaySettings::new("10.0.0.4"))
            .expect("supervisor running");
        advance(450).await;
        assert_eq!(h.gateway.opened().len(), 1);
        assert_eq!(h.state(), ConnectionState::Connected);

        advance(100).await;
        assert_eq!(h.gateway.opened(), vec!["10.0.0.2", "10.0.0.4"]);
        assert_eq!(h.state(), ConnectionState::Connected);
        assert!(h.directory.lookup("TGW:10.0.0.4").is_some());
        assert!(h.directory.lookup("TGW:10.0.0.3").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_settings_keep_the_live_session() {
        let h = start("10.0.0.2", |_| {});
        advance(10).await;

        h.supervisor
            .reconfigure(GatewaySettings::new("10.0.0.2"))
            .expect("supervisor running");
        advance(600).await;
        assert_eq!(h.gateway.opened(), vec!["10.0.0.2"]);
        assert_eq!(h.state(), ConnectionState::Connected);

        // Polling carries on from the original session.
        advance(2_000).await;
        assert!(h.supervisor.telemetry().borrow().is_some());

        h.supervisor
            .reconfigure(GatewaySettings::new("10.0.0.2").with_port(8443))
            .expect("supervisor running");
        advance(600).await;
        assert_eq!(h.gateway.opened(), vec!["10.0.0.2", "10.0.0.2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn changed_credentials_reconnect() {
        let h = start("10.0.0.2", |_| {});
        advance(10).await;

        let with_password = |pw: &str| {
            GatewaySettings::new("10.0.0.2").with_credentials(Credentials::new(
                "owner@example.com",
                SecretString::from(pw.to_owned()),
            ))
        };
        h.supervisor
            .reconfigure(with_password("first"))
            .expect("supervisor running");
        advance(600).await;
        assert_eq!(h.gateway.opened().len(), 2);

        h.supervisor
            .reconfigure(with_password("first"))
            .expect("supervisor running");
        advance(600).await;
        assert_eq!(h.gateway.opened().len(), 2);

        h.supervisor
            .reconfigure(with_password("second"))
            .expect("supervisor running");
        advance(600).await;
        assert_eq!(h.gateway.opened().len(), 3);
        assert_eq!(h.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_failures_escalate_after_five_and_clear_on_success() {
        let h = start("10.0.0.2", |_| {});
        advance(10).await;
        h.gateway.script(|s| s.site_master_failures = 5);

        // Cycles run at 2, 4, 6, 8, 10 s (failing) and 12 s (succeeding).
        advance(9_000).await;
        assert_eq!(h.status(), InterfaceStatus::ok());

        advance(2_000).await;
        assert_eq!(h.status(), InterfaceStatus::warning("sitemaster request timed out"));
        assert_eq!(h.state(), ConnectionState::Connected);

        advance(2_000).await;
        assert_eq!(h.status(), InterfaceStatus::ok());
        assert_eq!(h.gateway.count("site_master"), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_site_is_never_asked_for_statistics() {
        let h = start("10.0.0.2", |s| s.script(|s| s.running = false));
        advance(10_000).await;

        assert!(h.gateway.count("site_master") >= 4);
        assert_eq!(h.gateway.count("aggregates"), 0);
        assert_eq!(h.gateway.count("grid_status"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn band_changes_fire_subscriptions() {
        let h = start("10.0.0.2", |s| s.script(|s| s.battery_watts = 600.0));
        h.registry.register(SubTrigger::BatteryCharging, "charging scene");
        h.registry.register(SubTrigger::BatteryDischarging, "discharging scene");

        advance(2_010).await;
        assert!(h.sink.fired.lock().expect("fired lock").is_empty());
        assert!(h.supervisor.is_condition_true(SubTrigger::BatteryDischarging));

        h.gateway.script(|s| s.battery_watts = -600.0);
        advance(2_000).await;
        assert_eq!(
            *h.sink.fired.lock().expect("fired lock"),
            vec!["charging scene".to_owned()]
        );
        assert!(h.supervisor.is_condition_true(SubTrigger::BatteryCharging));

        advance(2_000).await;
        assert_eq!(h.sink.fired.lock().expect("fired lock").len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_session_reconnects_and_goes_fatal() {
        let h = start("10.0.0.2", |_| {});
        advance(10).await;
        h.gateway.script(|s| s.reject_login = true);

        advance(2_000).await;
        assert_eq!(h.gateway.opened().len(), 2);
        assert_eq!(
            h.state(),
            ConnectionState::Fatal {
                reason: "Login failed (bad credentials)".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn missing_credentials_are_fatal_and_retried() {
        let h = start("10.0.0.2", |s| s.script(|s| s.missing_credentials = true));
        advance(10).await;

        assert_eq!(
            h.state(),
            ConnectionState::Fatal {
                reason: "No credentials configured".into()
            }
        );
        assert_eq!(h.status(), InterfaceStatus::fatal("No credentials configured"));

        h.gateway.script(|s| s.missing_credentials = false);
        advance(60_000).await;
        assert_eq!(h.state(), ConnectionState::Connected);
        assert_eq!(h.gateway.opened().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_actor() {
        let h = start("10.0.0.2", |_| {});
        advance(10).await;

        h.supervisor.shutdown().await;
        assert_eq!(h.state(), ConnectionState::Disconnected);
        assert!(matches!(
            h.supervisor.reconfigure(GatewaySettings::new("10.0.0.9")),
            Err(CoreError::SupervisorStopped)
        ));

        h.gateway.clear_calls();
        advance(10_000).await;
        assert!(h.gateway.calls().is_empty());
    }
}
