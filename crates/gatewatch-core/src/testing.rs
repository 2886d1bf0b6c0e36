// In-process gateway fakes shared by the poller and supervisor tests.

use std::future::Future;
use std::sync::{Arc, Mutex};

use gatewatch_api::{
    Aggregates, GatewayEndpoint, GridStatus, MeterEntry, SiteInfo, SiteMaster,
};

use crate::config::GatewaySettings;
use crate::error::CoreError;
use crate::gateway::{Connector, Gateway};
use crate::hub::TriggerSink;
use crate::trigger::Subscription;

type ApiResult<T> = Result<T, gatewatch_api::Error>;

/// What the fake gateway answers next.
#[derive(Debug, Clone)]
pub(crate) struct Script {
    pub site_info_failures: u32,
    pub site_master_failures: u32,
    pub reject_login: bool,
    pub missing_credentials: bool,
    pub running: bool,
    pub battery_watts: f64,
    pub solar_watts: f64,
    pub grid_watts: f64,
    pub charge: f64,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            site_info_failures: 0,
            site_master_failures: 0,
            reject_login: false,
            missing_credentials: false,
            running: true,
            battery_watts: 0.0,
            solar_watts: 0.0,
            grid_watts: 0.0,
            charge: 50.0,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeState {
    script: Mutex<Script>,
    calls: Mutex<Vec<&'static str>>,
    opened: Mutex<Vec<String>>,
}

impl FakeState {
    pub fn script(&self, edit: impl FnOnce(&mut Script)) {
        edit(&mut self.script.lock().expect("script lock"));
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().expect("calls lock").clear();
    }

    /// Addresses sessions were opened for, in order.
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().expect("opened lock").clone()
    }

    fn record(&self, call: &'static str) -> Script {
        self.calls.lock().expect("calls lock").push(call);
        self.script.lock().expect("script lock").clone()
    }

    fn take_failure(&self, pick: impl FnOnce(&mut Script) -> &mut u32) -> bool {
        let mut script = self.script.lock().expect("script lock");
        let remaining = pick(&mut script);
        if *remaining > 0 {
            *remaining -= 1;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeGateway {
    pub state: Arc<FakeState>,
}

fn meter(watts: f64) -> MeterEntry {
    MeterEntry {
        instant_power: watts,
        ..MeterEntry::blank()
    }
}

fn timeout(endpoint: &str) -> gatewatch_api::Error {
    gatewatch_api::Error::RequestTimeout {
        endpoint: endpoint.into(),
    }
}

impl Gateway for FakeGateway {
    fn site_info(&self) -> impl Future<Output = ApiResult<SiteInfo>> + Send {
        let state = Arc::clone(&self.state);
        async move {
            let script = state.record("site_info");
            if script.missing_credentials {
                return Err(gatewatch_api::Error::NoCredentialsConfigured);
            }
            if script.reject_login {
                return Err(gatewatch_api::Error::LoginFailed {
                    message: "bad credentials".into(),
                });
            }
            if state.take_failure(|s| &mut s.site_info_failures) {
                return Err(timeout("site_name"));
            }
            Ok(SiteInfo {
                site_name: "Home".into(),
                timezone: "America/New_York".into(),
            })
        }
    }

    fn site_master(&self) -> impl Future<Output = ApiResult<SiteMaster>> + Send {
        let state = Arc::clone(&self.state);
        async move {
            let script = state.record("site_master");
            if script.missing_credentials {
                return Err(gatewatch_api::Error::NoCredentialsConfigured);
            }
            if script.reject_login {
                return Err(gatewatch_api::Error::LoginFailed {
                    message: "bad credentials".into(),
                });
            }
            if state.take_failure(|s| &mut s.site_master_failures) {
                return Err(timeout("sitemaster"));
            }
            Ok(SiteMaster {
                status: "StatusUp".into(),
                running: script.running,
                connected_to_tesla: true,
            })
        }
    }

    fn aggregates(&self) -> impl Future<Output = ApiResult<Aggregates>> + Send {
        let state = Arc::clone(&self.state);
        async move {
            let script = state.record("aggregates");
            Ok(Aggregates {
                site: meter(script.grid_watts),
                battery: meter(script.battery_watts),
                load: meter(1500.0),
                solar: meter(script.solar_watts),
            })
        }
    }

    fn grid_status(&self) -> impl Future<Output = ApiResult<GridStatus>> + Send {
        let state = Arc::clone(&self.state);
        async move {
            state.record("grid_status");
            Ok(GridStatus {
                grid_status: "SystemGridConnected".into(),
                grid_services_active: false,
            })
        }
    }

    fn charge_percentage(&self) -> impl Future<Output = ApiResult<f64>> + Send {
        let state = Arc::clone(&self.state);
        async move { Ok(state.record("charge_percentage").charge) }
    }
}

/// Hands out sessions that all share one script.
#[derive(Debug, Clone, Default)]
pub(crate) struct FakeConnector {
    pub state: Arc<FakeState>,
}

impl Connector for FakeConnector {
    type Session = FakeGateway;

    fn open(
        &self,
        _endpoint: GatewayEndpoint,
        settings: &GatewaySettings,
    ) -> Result<FakeGateway, CoreError> {
        self.state
            .opened
            .lock()
            .expect("opened lock")
            .push(settings.address.clone());
        Ok(FakeGateway {
            state: Arc::clone(&self.state),
        })
    }
}

pub(crate) struct NullSink;

impl TriggerSink for NullSink {
    fn fire(&self, _subscription: &Subscription) {}
}

/// Records fired subscription names.
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    pub fired: Mutex<Vec<String>>,
}

impl TriggerSink for RecordingSink {
    fn fire(&self, subscription: &Subscription) {
        self.fired
            .lock()
            .expect("fired lock")
            .push(subscription.name.clone());
    }
}
