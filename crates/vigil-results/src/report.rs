//! Report aggregation: partitioning, locators and submission.

use crate::resolve::Resolver;
use crate::retry::RetryPolicy;
use serde::Serialize;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use vigil_core::artifact::{asset_name, decompressed_name};
use vigil_core::job::{JobOutcome, JobQuery, JobRecord, JobState};
use vigil_core::ports::{ResultStore, TestExecutionApi, WikiReporter};
use vigil_core::result::{
    AggregatorOutcome, AggregatorRecord, LocatorKind, ResolvedResult, ResultLocator, WikiSubmission,
};
use vigil_core::{Error, JobId, Result, RuleBook, is_unreported_build};

/// Settings holding the primary image of a compose job, in priority order.
const IMAGE_SETTINGS: [&str; 5] = ["ISO", "HDD_1", "ISO_URL", "HDD_1_DECOMPRESS_URL", "HDD_1_URL"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportMode {
    #[default]
    Submit,
    /// Compute everything, contact no reporting service.
    Inspect,
}

/// What a reporting run computed and, when submitting, what the wiki said.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportSummary {
    /// Jobs that produced output, including abandoned children.
    pub reported_jobs: Vec<JobId>,
    pub skipped_jobs: Vec<JobId>,
    pub wiki: Vec<ResolvedResult>,
    pub aggregator: Vec<AggregatorRecord>,
    pub wiki_response: Option<WikiSubmission>,
}

pub struct Reporter {
    resolver: Resolver,
    api: Arc<dyn TestExecutionApi>,
    wiki: Option<Arc<dyn WikiReporter>>,
    store: Option<Arc<dyn ResultStore>>,
    retry: RetryPolicy,
}

impl Reporter {
    pub fn new(rules: Arc<RuleBook>, api: Arc<dyn TestExecutionApi>) -> Self {
        Self {
            resolver: Resolver::new(rules, api.clone()),
            api,
            wiki: None,
            store: None,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_wiki(mut self, wiki: Arc<dyn WikiReporter>) -> Self {
        self.wiki = Some(wiki);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn ResultStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Report the given jobs and any children abandoned by their failure.
    pub async fn report_jobs(&self, ids: &[JobId], mode: ReportMode) -> Result<ReportSummary> {
        let mut jobs = Vec::with_capacity(ids.len());
        for id in ids {
            jobs.push(self.api.get_job(*id).await?);
        }
        self.report_records(jobs, mode).await
    }

    /// Report the latest jobs of a build.
    pub async fn report_build(&self, build: &str, mode: ReportMode) -> Result<ReportSummary> {
        if is_unreported_build(build) {
            info!(build = %build, "Build is never reported");
            return Ok(ReportSummary::default());
        }
        let jobs = self.api.find_jobs(&JobQuery::build(build).latest()).await?;
        info!(build = %build, jobs = jobs.len(), "Reporting build");
        self.report_records(jobs, mode).await
    }

    async fn report_records(
        &self,
        jobs: Vec<JobRecord>,
        mode: ReportMode,
    ) -> Result<ReportSummary> {
        let mut summary = ReportSummary::default();
        let mut seen: BTreeSet<JobId> = BTreeSet::new();
        let mut queue: VecDeque<(JobRecord, bool)> =
            jobs.into_iter().map(|job| (job, false)).collect();

        while let Some((job, abandoned)) = queue.pop_front() {
            if !seen.insert(job.id) {
                continue;
            }
            if !abandoned && !is_reportable(&job) {
                debug!(
                    job = %job.id,
                    state = ?job.state,
                    result = ?job.result,
                    "Job not reportable"
                );
                summary.skipped_jobs.push(job.id);
                continue;
            }
            if is_unreported_build(job.build()) {
                summary.skipped_jobs.push(job.id);
                continue;
            }

            if !job.result.is_pass() {
                for child in self.abandoned_children(&job, &seen).await? {
                    info!(
                        parent = %job.id,
                        job = %child.id,
                        result = ?child.result,
                        "Reporting abandoned child"
                    );
                    queue.push_back((child, true));
                }
            }

            if self.is_wiki_eligible(&job) {
                summary.wiki.extend(self.resolver.resolve(&job).await?);
            }
            summary.aggregator.push(aggregator_record(&job));
            summary.reported_jobs.push(job.id);
        }

        summary.wiki.sort();
        summary.wiki.dedup();

        if mode == ReportMode::Inspect {
            info!(
                wiki = summary.wiki.len(),
                aggregator = summary.aggregator.len(),
                "Inspection only, nothing submitted"
            );
            return Ok(summary);
        }

        self.submit(summary).await
    }

    /// Children of a failed parent that never ran because of it. A child a
    /// user cancelled or restarted is not the parent's doing and is left out.
    async fn abandoned_children(
        &self,
        parent: &JobRecord,
        seen: &BTreeSet<JobId>,
    ) -> Result<Vec<JobRecord>> {
        let mut children = Vec::new();
        for id in parent.children.iter().filter(|id| !seen.contains(id)) {
            let child = self.api.get_job(*id).await?;
            let abandoned = child.result.is_abandoned() || child.state == JobState::Cancelled;
            if abandoned && !child.result.is_unreportable() {
                children.push(child);
            }
        }
        Ok(children)
    }

    fn is_wiki_eligible(&self, job: &JobRecord) -> bool {
        if job.is_update_target() {
            return false;
        }
        match job.setting("SUBVARIANT") {
            Some(subvariant) => !self.resolver.rules().is_wiki_excluded(subvariant),
            None => true,
        }
    }

    /// Attempt every submission, then surface the first failure.
    async fn submit(&self, mut summary: ReportSummary) -> Result<ReportSummary> {
        let mut failure: Option<Error> = None;

        if let Some(wiki) = self.wiki.as_ref().filter(|_| !summary.wiki.is_empty()) {
            let results = summary.wiki.clone();
            match self.retry.run("wiki", || wiki.submit(&results)).await {
                Ok(response) => {
                    for duplicate in &response.duplicates {
                        info!(
                            testcase = %duplicate.testcase,
                            environment = %duplicate.environment,
                            "Already recorded in wiki"
                        );
                    }
                    for unlocated in &response.unlocated {
                        info!(
                            testcase = %unlocated.testcase,
                            environment = %unlocated.environment,
                            "No wiki row for result"
                        );
                    }
                    info!(recorded = response.recorded, "Wiki results submitted");
                    summary.wiki_response = Some(response);
                }
                Err(e) => {
                    error!(error = %e, "Wiki reporting failed");
                    failure.get_or_insert(e);
                }
            }
        }

        if let Some(store) = &self.store {
            for record in &summary.aggregator {
                match self.retry.run("resultsdb", || store.submit(record)).await {
                    Ok(()) => {
                        debug!(job = %record.job_id, testcase = %record.testcase, "Result stored")
                    }
                    Err(e) => {
                        error!(job = %record.job_id, error = %e, "Result store reporting failed");
                        failure.get_or_insert(e);
                    }
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }
}

/// Finished jobs whose outcome says something about the artifact.
fn is_reportable(job: &JobRecord) -> bool {
    job.state == JobState::Done && !job.result.is_unreportable()
}

/// The per-job record for the result-aggregation service.
pub fn aggregator_record(job: &JobRecord) -> AggregatorRecord {
    let prefix = if job.is_update_target() { "update" } else { "compose" };
    let outcome = match job.result {
        JobOutcome::Passed => AggregatorOutcome::Passed,
        JobOutcome::Softfailed => AggregatorOutcome::Info,
        _ => AggregatorOutcome::Failed,
    };
    AggregatorRecord {
        job_id: job.id,
        testcase: format!("{}.{}", prefix, job.test),
        outcome,
        locator: locate(job),
        arch: job.arch().to_string(),
        flavor: job.flavor().to_string(),
    }
}

/// Locate the item a job tested, by whichever target setting it carries.
pub fn locate(job: &JobRecord) -> ResultLocator {
    let build = job.build().to_string();
    if let Some(advisory) = job.setting("ADVISORY") {
        return ResultLocator {
            item: advisory.to_string(),
            kind: LocatorKind::BodhiUpdate,
            build: None,
        };
    }

    let bare = [
        ("KOJITASK", LocatorKind::KojiTask),
        ("TAG", LocatorKind::KojiTag),
        ("COPR", LocatorKind::Copr),
    ];
    if let Some((_, kind)) = bare.into_iter().find(|(key, _)| job.setting(key).is_some()) {
        return ResultLocator {
            item: build,
            kind,
            build: None,
        };
    }

    match IMAGE_SETTINGS.iter().find_map(|key| job.setting(key)) {
        Some(image) => ResultLocator {
            item: decompressed_name(asset_name(image)).to_string(),
            kind: LocatorKind::Compose,
            build: Some(build),
        },
        None => {
            warn!(job = %job.id, "No image setting, locating by build");
            ResultLocator {
                item: build,
                kind: LocatorKind::Compose,
                build: None,
            }
        }
    }
}
