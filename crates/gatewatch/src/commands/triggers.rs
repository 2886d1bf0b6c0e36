use serde::Serialize;
use strum::IntoEnumIterator;
use tabled::Tabled;

use gatewatch_config::SubscriptionEntry;
use gatewatch_core::{SubTrigger, TriggerUsage};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct TriggerInfo {
    key: &'static str,
    label: &'static str,
    as_trigger: String,
    as_condition: String,
    trigger_help: &'static str,
    condition_help: &'static str,
    subscriptions: Vec<String>,
}

#[derive(Tabled)]
struct TriggerRow {
    #[tabled(rename = "Key")]
    key: &'static str,
    #[tabled(rename = "Menu")]
    label: &'static str,
    #[tabled(rename = "Explanation")]
    help: &'static str,
    #[tabled(rename = "Subscribed")]
    subscriptions: String,
}

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let (cfg, _) = super::load(global)?;
    let catalogue = catalogue(&cfg.subscriptions);
    let out = output::render_list(
        global.output,
        &catalogue,
        |t| TriggerRow {
            key: t.key,
            label: t.label,
            help: t.trigger_help,
            subscriptions: t.subscriptions.join(", "),
        },
        |t| t.key.to_owned(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn catalogue(subscriptions: &[SubscriptionEntry]) -> Vec<TriggerInfo> {
    SubTrigger::iter()
        .map(|trigger| TriggerInfo {
            key: trigger.into(),
            label: trigger.menu_label(),
            as_trigger: trigger.describe(TriggerUsage::Trigger),
            as_condition: trigger.describe(TriggerUsage::Condition),
            trigger_help: trigger.trigger_explanation(),
            condition_help: trigger.condition_explanation(),
            subscriptions: subscriptions
                .iter()
                .filter(|s| s.trigger == trigger)
                .map(|s| s.name.clone())
                .collect(),
        })
        .collect()
}
