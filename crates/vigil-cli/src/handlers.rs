//! Command handlers.

use crate::commands::{ComposeArgs, UpdateArgs};
use crate::config::VigilConfig;
use anyhow::{Context, bail};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use vigil_client::{
    ComposeMetadataClient, MetadataConfig, OpenQaClient, OpenQaConfig, ResultsDbClient,
    ResultsDbConfig, WikiClient, WikiConfig,
};
use vigil_core::ports::{ReleaseMetadata, TestExecutionApi};
use vigil_core::rules::RuleTable;
use vigil_core::{GroupId, JobId, RuleBook};
use vigil_results::{ReportMode, Reporter, RetryPolicy};
use vigil_scheduler::{
    ComposeScheduler, ComposeTrigger, SelectionFilter, UpdateScheduler, UpdateTarget, UpdateTrigger,
};

/// Built-in rule tables with any configured overrides applied.
fn rules(config: &VigilConfig) -> anyhow::Result<Arc<RuleBook>> {
    let mut rules = RuleBook::builtin().context("built-in rule tables are invalid")?;
    if let Some(path) = &config.overrides.shapes {
        rules = rules.with_shapes_file(path)?;
    }
    if let Some(path) = &config.overrides.updates {
        rules = rules.with_updates_file(path)?;
    }
    for warning in rules.validate() {
        warn!(warning = %warning, "Rule table inconsistency");
    }
    Ok(Arc::new(rules))
}

fn openqa(config: &VigilConfig) -> anyhow::Result<Arc<dyn TestExecutionApi>> {
    Ok(Arc::new(OpenQaClient::new(OpenQaConfig {
        url: config.openqa.url.clone(),
        api_key: config.openqa.api_key.clone(),
        important_group: GroupId::new(config.openqa.important_group),
    })?))
}

fn metadata(config: &VigilConfig) -> anyhow::Result<Arc<dyn ReleaseMetadata>> {
    Ok(Arc::new(ComposeMetadataClient::new(MetadataConfig {
        compose_base_url: config.metadata.compose_base_url.clone(),
        releases_url: config.metadata.releases_url.clone(),
    })?))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn compose(config: &VigilConfig, args: ComposeArgs) -> anyhow::Result<()> {
    let scheduler = ComposeScheduler::new(rules(config)?, openqa(config)?, metadata(config)?);
    let trigger = ComposeTrigger {
        location: args.location,
        filter: SelectionFilter {
            arches: args.arches,
            flavors: args.flavors,
        },
        force: args.force,
        updates_img: args.updates_img,
        extra_params: args.params.into_iter().collect(),
    };

    let outcome = scheduler.schedule(&trigger).await?;
    print_json(&outcome)
}

pub fn advisory(advisory: String) -> UpdateTarget {
    UpdateTarget::Update { advisory }
}

pub fn task(id: u64) -> UpdateTarget {
    UpdateTarget::Task { id }
}

pub fn tag(tag: String) -> UpdateTarget {
    UpdateTarget::Tag { tag }
}

/// Parse `OWNER/PROJECT` into a COPR target.
pub fn copr(project: &str) -> anyhow::Result<UpdateTarget> {
    match project.split_once('/') {
        Some((owner, project)) if !owner.is_empty() && !project.is_empty() => {
            Ok(UpdateTarget::Copr {
                owner: owner.to_string(),
                project: project.to_string(),
            })
        }
        _ => bail!("COPR project must be OWNER/PROJECT, got {}", project),
    }
}

pub async fn update(
    config: &VigilConfig,
    target: UpdateTarget,
    args: UpdateArgs,
) -> anyhow::Result<()> {
    let scheduler = UpdateScheduler::new(rules(config)?, openqa(config)?, metadata(config)?);
    let mut trigger = UpdateTrigger::new(target, args.release);
    trigger.packages = args.packages;
    trigger.critpath = args.critpath;
    trigger.flavors = args.flavors;
    trigger.arches = args.arches;
    trigger.force = args.force;

    let outcome = scheduler.schedule(&trigger).await?;
    print_json(&outcome)
}

fn reporter(config: &VigilConfig) -> anyhow::Result<Reporter> {
    let mut reporter = Reporter::new(rules(config)?, openqa(config)?).with_retry(RetryPolicy::new(
        config.report.attempts,
        Duration::from_secs(config.report.delay_seconds),
    ));

    match &config.wiki.url {
        Some(url) => {
            reporter = reporter.with_wiki(Arc::new(WikiClient::new(WikiConfig {
                url: url.clone(),
                token: config.wiki.token.clone(),
            })?));
        }
        None => info!("Wiki reporting not configured"),
    }

    match &config.resultsdb.url {
        Some(url) => {
            reporter = reporter.with_store(Arc::new(ResultsDbClient::new(ResultsDbConfig {
                url: url.clone(),
                username: config.resultsdb.username.clone(),
                password: config.resultsdb.password.clone(),
                job_url_base: config.openqa.url.clone(),
            })?));
        }
        None => info!("Result store reporting not configured"),
    }

    Ok(reporter)
}

fn mode(inspect: bool) -> ReportMode {
    if inspect { ReportMode::Inspect } else { ReportMode::Submit }
}

pub async fn report(config: &VigilConfig, job_ids: &[JobId], inspect: bool) -> anyhow::Result<()> {
    let summary = reporter(config)?.report_jobs(job_ids, mode(inspect)).await?;
    print_json(&summary)
}

pub async fn report_build(config: &VigilConfig, build: &str, inspect: bool) -> anyhow::Result<()> {
    let summary = reporter(config)?.report_build(build, mode(inspect)).await?;
    print_json(&summary)
}

pub fn check_rules(config: &VigilConfig) -> anyhow::Result<()> {
    let rules = rules(config)?;
    let warnings = rules.validate();
    print_json(&warnings)?;
    if !warnings.is_empty() {
        bail!("{} rule table inconsistencies", warnings.len());
    }
    Ok(())
}

pub fn schema(table: RuleTable) -> anyhow::Result<()> {
    print_json(&table.schema())
}
