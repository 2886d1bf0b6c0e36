// ── Power-flow trigger engine ──
//
// Compares each cycle's readings with the previous cycle's and raises one
// edge event per monitored channel whose band changed. Events are matched
// against registered subscriptions and handed to the hub synchronously.

mod catalogue;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use serde::Serialize;
use tracing::{debug, info};

use crate::hub::{TriggerSink, UsageProbe};
use crate::model::{PowerChannel, PowerReadings};

pub use catalogue::{SubTrigger, TriggerUsage};

/// Identifier assigned at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubscriptionId(pub u64);

/// A hub event listening for one sub-trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub trigger: SubTrigger,
    /// Hub-side name of the event, for logging.
    pub name: String,
}

impl Subscription {
    /// Description worded for how the hub is using this subscription.
    pub fn describe(&self, probe: &dyn UsageProbe) -> String {
        self.trigger.describe(probe.usage(self))
    }
}

/// Registered subscriptions, in registration order.
///
/// Readers take a lock-free snapshot; writers copy-on-write.
pub struct SubscriptionRegistry {
    next_id: AtomicU64,
    subscriptions: ArcSwap<Vec<Subscription>>,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            subscriptions: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn register(&self, trigger: SubTrigger, name: impl Into<String>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscription = Subscription {
            id,
            trigger,
            name: name.into(),
        };
        self.subscriptions.rcu(|current| {
            let mut next = (**current).clone();
            next.push(subscription.clone());
            next
        });
        debug!(id = id.0, %trigger, "registered subscription");
        id
    }

    /// Returns `false` if `id` was not registered.
    pub fn unregister(&self, id: SubscriptionId) -> bool {
        let previous = self.subscriptions.rcu(|current| {
            current
                .iter()
                .filter(|s| s.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
        previous.iter().any(|s| s.id == id)
    }

    pub fn snapshot(&self) -> Arc<Vec<Subscription>> {
        self.subscriptions.load_full()
    }

    /// Subscriptions for `trigger`, in registration order.
    pub fn matching(&self, trigger: SubTrigger) -> Vec<Subscription> {
        self.subscriptions
            .load()
            .iter()
            .filter(|s| s.trigger == trigger)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Edge detector plus dispatch to the hub.
pub struct PowerFlowTriggerEngine {
    registry: Arc<SubscriptionRegistry>,
    sink: Arc<dyn TriggerSink>,
}

impl PowerFlowTriggerEngine {
    pub fn new(registry: Arc<SubscriptionRegistry>, sink: Arc<dyn TriggerSink>) -> Self {
        Self { registry, sink }
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Sub-triggers raised by moving from `previous` to `current`, in
    /// channel order (battery, solar, grid). At most one per channel.
    pub fn edges(previous: &PowerReadings, current: &PowerReadings) -> Vec<SubTrigger> {
        PowerChannel::MONITORED
            .into_iter()
            .filter_map(|channel| {
                let before = previous.flow(channel);
                let after = current.flow(channel);
                if before == after {
                    return None;
                }
                SubTrigger::for_edge(channel, after)
            })
            .collect()
    }

    /// Detect edges and fire every matching subscription.
    ///
    /// With no previous reading (first cycle after connecting) nothing
    /// fires. Returns the edges that were raised.
    pub fn update(&self, previous: Option<&PowerReadings>, current: &PowerReadings) -> Vec<SubTrigger> {
        let Some(previous) = previous else {
            debug!("no previous readings; skipping edge detection");
            return Vec::new();
        };

        let raised = Self::edges(previous, current);
        for trigger in &raised {
            let subscriptions = self.registry.matching(*trigger);
            info!(%trigger, subscribers = subscriptions.len(), "power flow changed");
            for subscription in &subscriptions {
                self.sink.fire(subscription);
            }
        }
        raised
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        fired: Mutex<Vec<SubscriptionId>>,
    }

    impl TriggerSink for RecordingSink {
        fn fire(&self, subscription: &Subscription) {
            self.fired.lock().expect("sink lock").push(subscription.id);
        }
    }

    fn readings(battery: f64, solar: f64, grid: f64) -> PowerReadings {
        PowerReadings {
            site: 1000.0,
            battery,
            solar,
            grid,
        }
    }

    fn engine() -> (PowerFlowTriggerEngine, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let engine = PowerFlowTriggerEngine::new(
            Arc::new(SubscriptionRegistry::new()),
            Arc::clone(&sink) as Arc<dyn TriggerSink>,
        );
        (engine, sink)
    }

    #[test]
    fn charging_to_idle_raises_only_battery_idle() {
        let raised = PowerFlowTriggerEngine::edges(
            &readings(-100.0, 0.0, 0.0),
            &readings(0.0, 0.0, 0.0),
        );
        assert_eq!(raised, vec![SubTrigger::BatteryIdle]);
    }

    #[test]
    fn unchanged_band_raises_nothing_even_if_watts_move() {
        let a = readings(-400.0, 2500.0, 300.0);
        let b = readings(-60.0, 120.0, 1200.0);
        assert!(PowerFlowTriggerEngine::edges(&a, &b).is_empty());
        assert!(PowerFlowTriggerEngine::edges(&b, &b).is_empty());
    }

    #[test]
    fn one_edge_per_changed_channel() {
        let raised = PowerFlowTriggerEngine::edges(
            &readings(300.0, 0.0, 500.0),
            &readings(-300.0, 800.0, -500.0),
        );
        assert_eq!(
            raised,
            vec![
                SubTrigger::BatteryCharging,
                SubTrigger::SolarProducing,
                SubTrigger::GridExporting,
            ]
        );
    }

    #[test]
    fn solar_going_negative_raises_nothing() {
        let raised =
            PowerFlowTriggerEngine::edges(&readings(0.0, 10.0, 0.0), &readings(0.0, -80.0, 0.0));
        assert!(raised.is_empty());
    }

    #[test]
    fn first_cycle_never_fires() {
        let (engine, sink) = engine();
        engine.registry().register(SubTrigger::BatteryCharging, "charging");
        let raised = engine.update(None, &readings(-500.0, 0.0, 0.0));
        assert!(raised.is_empty());
        assert!(sink.fired.lock().expect("sink lock").is_empty());
    }

    #[test]
    fn fires_matching_subscriptions_in_registration_order() {
        let (engine, sink) = engine();
        let registry = engine.registry();
        let first = registry.register(SubTrigger::GridExporting, "export lights");
        let _other = registry.register(SubTrigger::GridImporting, "import alert");
        let second = registry.register(SubTrigger::GridExporting, "export log");

        engine.update(Some(&readings(0.0, 0.0, 200.0)), &readings(0.0, 0.0, -200.0));

        assert_eq!(*sink.fired.lock().expect("sink lock"), vec![first, second]);
    }

    #[test]
    fn unregistered_subscriptions_stop_firing() {
        let (engine, sink) = engine();
        let id = engine.registry().register(SubTrigger::SolarIdle, "sunset");
        assert!(engine.registry().unregister(id));
        assert!(!engine.registry().unregister(id));

        engine.update(Some(&readings(0.0, 900.0, 0.0)), &readings(0.0, 0.0, 0.0));
        assert!(sink.fired.lock().expect("sink lock").is_empty());
        assert!(engine.registry().is_empty());
    }

    #[test]
    fn describe_uses_the_usage_probe() {
        struct AlwaysCondition;
        impl UsageProbe for AlwaysCondition {
            fn usage(&self, _: &Subscription) -> TriggerUsage {
                TriggerUsage::Condition
            }
        }

        let registry = SubscriptionRegistry::new();
        registry.register(SubTrigger::SolarProducing, "daytime");
        let sub = registry.snapshot()[0].clone();
        assert_eq!(sub.describe(&AlwaysCondition), "Tesla: Solar is producing");
    }
}
