// ── Hub collaborator ports ──
//
// The home-automation hub owns device provisioning, event registration and
// usage detection. The core reaches it only through these traits.

mod memory;

use crate::error::CoreError;
use crate::model::{DeviceRef, DeviceRefs};
use crate::trigger::{Subscription, TriggerUsage};

pub use memory::{DeviceEntry, MemoryDirectory};

/// Provisions and updates the entities representing one gateway.
pub trait DeviceDirectory: Send + Sync {
    /// Find or create the root entity (named `site_name`) at
    /// `address_base` and every channel beneath it. Must be idempotent.
    fn ensure_devices(&self, address_base: &str, site_name: &str)
    -> Result<DeviceRefs, CoreError>;

    fn set_value(&self, device: DeviceRef, value: f64);

    fn set_text(&self, device: DeviceRef, text: &str);
}

/// Receives fired subscriptions.
pub trait TriggerSink: Send + Sync {
    fn fire(&self, subscription: &Subscription);
}

/// Best-effort answer to "is this subscription a trigger or a condition".
///
/// Implementations must return [`TriggerUsage::Unknown`] rather than guess.
pub trait UsageProbe: Send + Sync {
    fn usage(&self, subscription: &Subscription) -> TriggerUsage;
}
