// ── Telemetry poller ──
//
// One fetch-and-publish cycle against the active session. The supervisor
// awaits each cycle before scheduling the next, so cycles never overlap and
// the previous readings and failure counter have a single writer.

use std::sync::Arc;

use strum::IntoEnumIterator;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::gateway::Gateway;
use crate::hub::DeviceDirectory;
use crate::model::{DeviceRefs, PowerChannel, PowerReadings, TelemetrySnapshot, kilowatt_label};
use crate::trigger::{PowerFlowTriggerEngine, SubTrigger};

/// What a single cycle achieved.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Every endpoint answered; values were published and edges evaluated.
    Published {
        snapshot: Arc<TelemetrySnapshot>,
        raised: Vec<SubTrigger>,
    },
    /// The site reported it is not running; statistics were skipped.
    SiteStopped,
    Failed(CoreError),
}

pub struct TelemetryPoller {
    devices: DeviceRefs,
    directory: Arc<dyn DeviceDirectory>,
    engine: Arc<PowerFlowTriggerEngine>,
    previous: Option<PowerReadings>,
    consecutive_failures: u32,
}

impl TelemetryPoller {
    /// A fresh poller has no previous readings, so its first successful
    /// cycle never raises edges.
    pub fn new(
        devices: DeviceRefs,
        directory: Arc<dyn DeviceDirectory>,
        engine: Arc<PowerFlowTriggerEngine>,
    ) -> Self {
        Self {
            devices,
            directory,
            engine,
            previous: None,
            consecutive_failures: 0,
        }
    }

    pub fn devices(&self) -> &DeviceRefs {
        &self.devices
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn previous_readings(&self) -> Option<&PowerReadings> {
        self.previous.as_ref()
    }

    pub async fn run_cycle<G: Gateway>(&mut self, gateway: &G) -> CycleOutcome {
        match self.fetch(gateway).await {
            Ok(Some(snapshot)) => {
                self.consecutive_failures = 0;
                let readings = snapshot.readings();
                self.publish(&snapshot, &readings);

                let raised = self.engine.update(self.previous.as_ref(), &readings);
                self.previous = Some(readings);
                debug!(edges = raised.len(), "poll cycle complete");

                CycleOutcome::Published {
                    snapshot: Arc::new(snapshot),
                    raised,
                }
            }
            Ok(None) => CycleOutcome::SiteStopped,
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                warn!(
                    error = %e.user_message(),
                    failures = self.consecutive_failures,
                    "poll cycle failed"
                );
                CycleOutcome::Failed(e)
            }
        }
    }

    /// Site-master first and alone; statistics only if the site is running.
    async fn fetch<G: Gateway>(&self, gateway: &G) -> Result<Option<TelemetrySnapshot>, CoreError> {
        let site_master = gateway
            .site_master()
            .await
            .map_err(poll_failed("sitemaster"))?;

        self.directory
            .set_value(self.devices.root, flag(site_master.running));
        self.directory
            .set_value(self.devices.connected_to_tesla, flag(site_master.connected_to_tesla));

        if !site_master.running {
            debug!(status = %site_master.status, "site is not running; skipping statistics");
            return Ok(None);
        }

        let aggregates = gateway
            .aggregates()
            .await
            .map_err(poll_failed("aggregates"))?;
        let grid = gateway
            .grid_status()
            .await
            .map_err(poll_failed("grid_status"))?;
        let charge_percent = gateway
            .charge_percentage()
            .await
            .map_err(poll_failed("soe"))?;

        Ok(Some(TelemetrySnapshot {
            site_master,
            grid,
            charge_percent,
            aggregates,
        }))
    }

    fn publish(&self, snapshot: &TelemetrySnapshot, readings: &PowerReadings) {
        let dir = &self.directory;
        dir.set_value(self.devices.charge_percent, snapshot.charge_display());
        dir.set_value(self.devices.grid_status, flag(snapshot.grid_connected()));

        for channel in PowerChannel::iter() {
            let device = self.devices.power(channel);
            dir.set_value(device, readings.get(channel));
            dir.set_text(device, &kilowatt_label(snapshot.meter(channel).instant_power));
        }
    }
}

fn flag(on: bool) -> f64 {
    if on { 1.0 } else { 0.0 }
}

fn poll_failed(stage: &'static str) -> impl FnOnce(gatewatch_api::Error) -> CoreError {
    move |source| CoreError::poll(stage, source)
}
