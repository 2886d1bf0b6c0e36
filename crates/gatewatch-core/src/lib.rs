//! Supervision and telemetry layer between `gatewatch-api` and a
//! home-automation hub.
//!
//! - **[`Supervisor`]** owns the connection state machine for one gateway:
//!   initial contact, the 60 s retry after a failure, debounced
//!   reconfiguration and graceful shutdown. State and status are published
//!   on `tokio::sync::watch` channels.
//!
//! - **[`TelemetryPoller`]** runs one fetch-and-publish cycle at a time
//!   against the active session and counts consecutive failures.
//!
//! - **[`PowerFlowTriggerEngine`]** bands each channel's power and fires
//!   registered subscriptions when a band changes.
//!
//! - **Hub ports** ([`hub`]) are the traits the hub implements: device
//!   directory, trigger sink and usage probe. [`MemoryDirectory`] is an
//!   in-process directory.

pub mod config;
pub mod error;
pub mod gateway;
pub mod hub;
pub mod model;
pub mod poller;
pub mod supervisor;
pub mod trigger;

#[cfg(test)]
mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DEFAULT_GATEWAY_PORT, GatewaySettings, SupervisorTimings, parse_gateway_address};
pub use error::CoreError;
pub use gateway::{Connector, Gateway, HttpsConnector};
pub use hub::{DeviceDirectory, MemoryDirectory, TriggerSink, UsageProbe};
pub use model::{
    DeviceRef, DeviceRefs, POWER_FLOW_THRESHOLD_WATTS, PowerChannel, PowerFlow, PowerReadings,
    TelemetrySnapshot,
};
pub use poller::{CycleOutcome, TelemetryPoller};
pub use supervisor::{ConnectionState, InterfaceStatus, StatusLevel, Supervisor};
pub use trigger::{
    PowerFlowTriggerEngine, SubTrigger, Subscription, SubscriptionId, SubscriptionRegistry,
    TriggerUsage,
};

// Credentials are shared with the API crate.
pub use gatewatch_api::Credentials;
