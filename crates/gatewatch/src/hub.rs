//! The CLI's side of the hub ports: published values are logged and
//! fired subscriptions are forwarded to the run loop over a channel.

use tokio::sync::mpsc;
use tracing::{debug, info};

use gatewatch_core::{
    CoreError, DeviceDirectory, DeviceRef, DeviceRefs, MemoryDirectory, Subscription, TriggerSink,
    TriggerUsage, UsageProbe,
};

/// In-memory directory that logs every value or text change.
#[derive(Debug, Default)]
pub struct LoggingDirectory {
    inner: MemoryDirectory,
}

impl LoggingDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn name(&self, device: DeviceRef) -> String {
        self.inner
            .entry(device)
            .map_or_else(|| device.to_string(), |e| e.name)
    }
}

impl DeviceDirectory for LoggingDirectory {
    fn ensure_devices(
        &self,
        address_base: &str,
        site_name: &str,
    ) -> Result<DeviceRefs, CoreError> {
        self.inner.ensure_devices(address_base, site_name)
    }

    #[allow(clippy::float_cmp)]
    fn set_value(&self, device: DeviceRef, value: f64) {
        if self.inner.value(device) != Some(value) {
            debug!(%device, name = %self.name(device), value, "value changed");
        }
        self.inner.set_value(device, value);
    }

    fn set_text(&self, device: DeviceRef, text: &str) {
        if self.inner.text(device).as_deref() != Some(text) {
            debug!(%device, name = %self.name(device), text, "text changed");
        }
        self.inner.set_text(device, text);
    }
}

/// Forwards every fired subscription to the run loop.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Subscription>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<Subscription>) -> Self {
        Self { tx }
    }
}

impl TriggerSink for ChannelSink {
    fn fire(&self, subscription: &Subscription) {
        info!(
            name = %subscription.name,
            trigger = %subscription.trigger,
            "subscription fired"
        );
        // The run loop may already be gone during shutdown.
        let _ = self.tx.send(subscription.clone());
    }
}

/// Subscriptions in the config file are always event triggers; conditions
/// are evaluated on demand and never registered.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfiguredUsage;

impl UsageProbe for ConfiguredUsage {
    fn usage(&self, _subscription: &Subscription) -> TriggerUsage {
        TriggerUsage::Trigger
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use gatewatch_core::{SubTrigger, SubscriptionId};

    #[test]
    fn fired_subscriptions_reach_the_receiver() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = ChannelSink::new(tx);
        let sub = Subscription {
            id: SubscriptionId(7),
            trigger: SubTrigger::SolarProducing,
            name: "Open blinds".into(),
        };
        sink.fire(&sub);
        assert_eq!(rx.try_recv().ok(), Some(sub.clone()));
        assert_eq!(sub.describe(&ConfiguredUsage), "Tesla: Solar begins producing");
    }

    #[test]
    fn logging_directory_delegates_to_memory() {
        let directory = LoggingDirectory::new();
        let refs = directory
            .ensure_devices("TGW:192.168.1.50", "Home")
            .expect("devices");
        directory.set_value(refs.battery_power, -812.0);
        directory.set_text(refs.battery_power, "-0.8 kW");
        directory.set_value(refs.battery_power, -812.0);

        assert_eq!(directory.inner.value(refs.battery_power), Some(-812.0));
        assert_eq!(directory.inner.text(refs.battery_power).as_deref(), Some("-0.8 kW"));
        assert_eq!(directory.name(refs.root), "Home");
    }

    #[test]
    fn firing_after_the_receiver_is_gone_is_harmless() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        ChannelSink::new(tx).fire(&Subscription {
            id: SubscriptionId(1),
            trigger: SubTrigger::GridIdle,
            name: "noop".into(),
        });
    }
}
