//! One-shot gateway query.

use serde::Serialize;
use strum::IntoEnumIterator;
use tabled::Tabled;

use gatewatch_api::{GatewayClient, OperationConfig, SiteInfo, SiteMaster};
use gatewatch_config::supervisor_timings;
use gatewatch_core::model::kilowatt_label;
use gatewatch_core::{
    Connector, CoreError, HttpsConnector, PowerChannel, PowerFlow, TelemetrySnapshot,
};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct GatewayReport {
    address: String,
    site: SiteInfo,
    site_master: SiteMaster,
    operation: OperationConfig,
    upstream: Option<String>,
    /// Absent while the site is stopped.
    telemetry: Option<TelemetryReport>,
}

#[derive(Debug, Serialize)]
struct TelemetryReport {
    grid_status: String,
    grid_connected: bool,
    charge_percent: f64,
    channels: Vec<ChannelReading>,
}

#[derive(Debug, Serialize)]
struct ChannelReading {
    channel: String,
    watts: f64,
    label: String,
    flow: PowerFlow,
}

#[derive(Tabled)]
struct ChannelRow {
    #[tabled(rename = "Channel")]
    channel: String,
    #[tabled(rename = "Power")]
    label: String,
    #[tabled(rename = "Watts")]
    watts: f64,
    #[tabled(rename = "Flow")]
    flow: String,
}

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let (cfg, path) = super::load(global)?;
    let settings = super::settings(&cfg, &path)?;
    let timings = supervisor_timings(&cfg)?;

    let endpoint = settings.endpoint()?;
    let client = HttpsConnector::new(&timings).open(endpoint, &settings)?;
    let report = fetch_report(&client, &settings.address).await?;

    let out = output::render_single(global.output, &report, render_detail)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Same order as a poll cycle: the site master decides whether the
/// statistics endpoints are asked at all.
async fn fetch_report(client: &GatewayClient, address: &str) -> Result<GatewayReport, CliError> {
    let gateway = |err| CliError::from(CoreError::connect(address, err));

    let site = client.site_info().await.map_err(gateway)?;
    let site_master = client.site_master().await.map_err(gateway)?;
    let operation = client.operation_config().await.map_err(gateway)?;

    let telemetry = if site_master.running {
        let aggregates = client.aggregates().await.map_err(gateway)?;
        let grid = client.grid_status().await.map_err(gateway)?;
        let charge_percent = client.charge_percentage().await.map_err(gateway)?;
        let snapshot = TelemetrySnapshot {
            site_master: site_master.clone(),
            grid,
            charge_percent,
            aggregates,
        };
        Some(telemetry_report(&snapshot))
    } else {
        None
    };

    Ok(GatewayReport {
        address: address.to_owned(),
        site,
        site_master,
        operation,
        upstream: client.upstream_identity(),
        telemetry,
    })
}

fn telemetry_report(snapshot: &TelemetrySnapshot) -> TelemetryReport {
    let readings = snapshot.readings();
    let channels = PowerChannel::iter()
        .map(|channel| ChannelReading {
            channel: channel.to_string(),
            watts: readings.get(channel),
            label: kilowatt_label(snapshot.meter(channel).instant_power),
            flow: readings.flow(channel),
        })
        .collect();
    TelemetryReport {
        grid_status: snapshot.grid.grid_status.clone(),
        grid_connected: snapshot.grid_connected(),
        charge_percent: snapshot.charge_display(),
        channels,
    }
}

fn yes_no(flag: bool) -> String {
    if flag { "yes" } else { "no" }.to_owned()
}

fn render_detail(report: &GatewayReport) -> String {
    let mut pairs = vec![
        ("Gateway", report.address.clone()),
        ("Site", report.site.site_name.clone()),
        ("Timezone", report.site.timezone.clone()),
        ("Running", yes_no(report.site_master.running)),
        ("Connected to Tesla", yes_no(report.site_master.connected_to_tesla)),
        ("Mode", report.operation.real_mode.clone()),
        (
            "Backup reserve",
            format!("{:.1}%", report.operation.backup_reserve_percent),
        ),
    ];
    if let Some(ref upstream) = report.upstream {
        pairs.push(("Upstream", upstream.clone()));
    }

    let Some(ref telemetry) = report.telemetry else {
        pairs.push(("Telemetry", "site is stopped".into()));
        return output::detail_lines(&pairs);
    };
    pairs.push(("Grid", telemetry.grid_status.clone()));
    pairs.push(("Charge", format!("{:.1}%", telemetry.charge_percent)));

    let rows: Vec<ChannelRow> = telemetry
        .channels
        .iter()
        .map(|c| ChannelRow {
            channel: c.channel.clone(),
            label: c.label.clone(),
            watts: c.watts,
            flow: c.flow.to_string(),
        })
        .collect();
    format!(
        "{}\n\n{}",
        output::detail_lines(&pairs),
        output::render_table(&rows)
    )
}
