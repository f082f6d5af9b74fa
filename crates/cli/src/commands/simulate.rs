use std::fs;
use std::path::Path;

use anyhow::Context;
use mediaplan_core::audit::{AuditContext, AuditEvent, InMemoryAuditSink};
use mediaplan_core::config::{AppConfig, LoadOptions};
use mediaplan_core::domain::catalog::{Contract, Media};
use mediaplan_core::domain::line::OrderLine;
use mediaplan_core::domain::plan::{CampaignRef, Plan, PlanId, PlanPeriod};
use mediaplan_core::errors::{ApplicationError, InterfaceError};
use mediaplan_core::orchestrator::{LineCommand, OrderLineOrchestrator};
use mediaplan_core::pricing::DeterministicPricingEngine;
use mediaplan_store::{
    resolve_catalog_entries, InMemoryCatalog, InMemoryLineRepository, LineRepository,
};
use serde::{Deserialize, Serialize};

use crate::commands::CommandResult;

const CORRELATION_ID: &str = "cli-simulate";

#[derive(Debug, Deserialize)]
struct Scenario {
    #[serde(default)]
    issue_order: bool,
    plan: ScenarioPlan,
    contract: Contract,
    media: Media,
    #[serde(default)]
    commands: Vec<toml::Table>,
}

#[derive(Debug, Deserialize)]
struct ScenarioPlan {
    id: String,
    year: i32,
    month: u32,
    #[serde(default)]
    campaign: String,
}

#[derive(Debug, Serialize)]
struct StepOutcome {
    index: usize,
    command: &'static str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct SimulationReport {
    line: OrderLine,
    steps: Vec<StepOutcome>,
    rejected: usize,
    audit_events: Vec<AuditEvent>,
}

pub fn run(options: &LoadOptions, scenario_path: &Path) -> CommandResult {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "simulate",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let (plan, scenario, commands) =
        match load_scenario(scenario_path, config.calendar.autofill_default) {
            Ok(loaded) => loaded,
            Err(error) => {
                return CommandResult::failure("simulate", "scenario_load", format!("{error:#}"), 3);
            }
        };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "simulate",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                4,
            );
        }
    };

    let result = runtime.block_on(simulate(&config, plan, scenario, commands));
    match result {
        Ok(report) => {
            let message = format!(
                "line {} is {} with order total {} ({} of {} commands rejected)",
                report.line.id,
                report.line.state.as_str(),
                report.line.totals.total_order,
                report.rejected,
                report.steps.len()
            );
            CommandResult::success_with_data("simulate", message, &report)
        }
        Err(error) => {
            let interface = error.into_interface(CORRELATION_ID);
            CommandResult::failure(
                "simulate",
                interface_class(&interface),
                format!("{}: {interface}", interface.user_message()),
                5,
            )
        }
    }
}

async fn simulate(
    config: &AppConfig,
    plan: Plan,
    scenario: Scenario,
    commands: Vec<LineCommand>,
) -> Result<SimulationReport, ApplicationError> {
    let engine = DeterministicPricingEngine::with_rates(config.pricing.rates())?;

    let catalog = InMemoryCatalog::default();
    let contract_ref = scenario.contract.id.clone();
    catalog.insert_contract(scenario.contract).await;
    catalog.insert_media(scenario.media).await;
    let (contract, media) = resolve_catalog_entries(&catalog, &contract_ref).await?;

    let mut line =
        OrderLineOrchestrator::new(&plan, contract.clone(), media.clone(), engine.clone())?;
    let sink = InMemoryAuditSink::default();
    let audit = AuditContext::new(CORRELATION_ID, "mediaplan-cli");

    let mut steps = Vec::with_capacity(commands.len());
    for (index, command) in commands.into_iter().enumerate() {
        let name = command.event_type();
        let outcome = match line.apply_with_audit(command, &sink, &audit) {
            Ok(_) => StepOutcome {
                index,
                command: name,
                status: "applied",
                error_kind: None,
                error: None,
            },
            Err(error) => StepOutcome {
                index,
                command: name,
                status: "rejected",
                error_kind: Some(error.kind()),
                error: Some(error.to_string()),
            },
        };
        steps.push(outcome);
    }

    let repository = InMemoryLineRepository::default();
    repository.save(line.to_snapshot()).await?;

    let mut snapshot = line.to_snapshot();
    if scenario.issue_order {
        let ordered = repository.issue_order(line.id()).await?;
        let locked = OrderLineOrchestrator::from_snapshot(ordered, contract, media, engine)?;
        snapshot = locked.to_snapshot();
    }

    let rejected = steps.iter().filter(|step| step.status == "rejected").count();
    tracing::info!(
        event_name = "cli.simulation_completed",
        line_id = %snapshot.id,
        rejected,
        "scenario replayed"
    );

    Ok(SimulationReport { line: snapshot, steps, rejected, audit_events: sink.events() })
}

fn load_scenario(
    path: &Path,
    autofill_default: bool,
) -> anyhow::Result<(Plan, Scenario, Vec<LineCommand>)> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read scenario `{}`", path.display()))?;
    let mut scenario: Scenario = toml::from_str(&raw)
        .with_context(|| format!("could not parse scenario `{}`", path.display()))?;

    let period = PlanPeriod::new(scenario.plan.year, scenario.plan.month)
        .context("scenario plan period is invalid")?;
    let plan = Plan {
        id: PlanId(scenario.plan.id.clone()),
        period,
        campaign: CampaignRef(scenario.plan.campaign.clone()),
    };

    let commands = std::mem::take(&mut scenario.commands)
        .into_iter()
        .enumerate()
        .map(|(index, mut table)| {
            let is_calendar = table.get("command").and_then(toml::Value::as_str)
                == Some("set_calendar_quantity");
            if is_calendar && !table.contains_key("autofill") {
                table.insert("autofill".to_string(), toml::Value::Boolean(autofill_default));
            }
            toml::Value::Table(table)
                .try_into::<LineCommand>()
                .with_context(|| format!("scenario command #{index} is invalid"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok((plan, scenario, commands))
}

fn interface_class(error: &InterfaceError) -> &'static str {
    match error {
        InterfaceError::BadRequest { .. } => "bad_request",
        InterfaceError::Conflict { .. } => "conflict",
        InterfaceError::ServiceUnavailable { .. } => "service_unavailable",
        InterfaceError::Internal { .. } => "internal",
    }
}
