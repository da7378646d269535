//! Result resolution: which test cases a finished job certifies.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};
use vigil_core::job::{JobOutcome, JobQuery, JobRecord};
use vigil_core::ports::TestExecutionApi;
use vigil_core::result::{ResolvedResult, ResultStatus};
use vigil_core::rules::{CaseConditions, TestSuiteRule};
use vigil_core::substitution::JobFacts;
use vigil_core::{Error, Result, RuleBook, is_unreported_build};

/// Evaluates suite rules against finished jobs.
///
/// Holds no state between calls: resolving the same job twice against the
/// same service state gives the same results.
pub struct Resolver {
    rules: Arc<RuleBook>,
    api: Arc<dyn TestExecutionApi>,
}

impl Resolver {
    pub fn new(rules: Arc<RuleBook>, api: Arc<dyn TestExecutionApi>) -> Self {
        Self { rules, api }
    }

    pub fn rules(&self) -> &RuleBook {
        &self.rules
    }

    /// Test cases certified by `job`, with matrix placement filled in.
    pub async fn resolve(&self, job: &JobRecord) -> Result<Vec<ResolvedResult>> {
        let build = job.build();
        if is_unreported_build(build) {
            debug!(job = %job.id, build = %build, "Build is never reported");
            return Ok(Vec::new());
        }

        let Some(rule) = self.rules.suite(&job.test) else {
            let gap = Error::ConfigurationGap(format!("no rule for test suite {}", job.test));
            warn!(job = %job.id, error = %gap, "Skipping job");
            return Ok(Vec::new());
        };

        let overall_status = status_for(job.result);
        let mut certified: Vec<(String, ResultStatus)> = Vec::new();

        match rule {
            TestSuiteRule::Flat(cases) => {
                if let Some(status) = overall_status {
                    certified.extend(cases.iter().map(|case| (case.clone(), status)));
                }
            }
            TestSuiteRule::Conditional(cases) => {
                let mut companions: Option<Vec<JobRecord>> = None;
                for (case, conditions) in cases {
                    if let Some(status) = self
                        .evaluate(job, conditions, overall_status, &mut companions)
                        .await?
                    {
                        certified.push((case.clone(), status));
                    }
                }
            }
        }

        if let Some(status) = overall_status {
            for extra in self.rules.extras_for(&job.test) {
                let applies = extra
                    .when
                    .iter()
                    .all(|(key, value)| job.setting(key) == Some(value.as_str()));
                if applies {
                    certified.push((extra.testcase.clone(), status));
                }
            }
        }

        let facts = JobFacts::from_job(job);
        let mut results = BTreeSet::new();
        for (case, status) in certified {
            let Some(template) = self.rules.testcase(&case) else {
                let gap = Error::ConfigurationGap(format!("no template for test case {}", case));
                warn!(job = %job.id, suite = %job.test, error = %gap, "Skipping test case");
                continue;
            };
            let placed = facts.substitute(template);
            results.insert(ResolvedResult {
                testcase: case,
                testtype: placed.testtype,
                environment: placed.env,
                section: placed.section,
                name: placed.name,
                build: build.to_string(),
                status,
            });
        }

        debug!(job = %job.id, suite = %job.test, results = results.len(), "Job resolved");
        Ok(results.into_iter().collect())
    }

    /// Evaluate one conditional entry; `None` when it is not certified.
    ///
    /// A passing module gate stands in for the overall outcome. When
    /// companion suites are named, the status covers every participant:
    /// a soft failure on either side yields `Warn`, so both jobs of a pair
    /// resolve to the same result.
    async fn evaluate(
        &self,
        job: &JobRecord,
        conditions: &CaseConditions,
        overall_status: Option<ResultStatus>,
        companions: &mut Option<Vec<JobRecord>>,
    ) -> Result<Option<ResultStatus>> {
        let status = if conditions.modules.is_empty() {
            match overall_status {
                Some(status) => status,
                None => return Ok(None),
            }
        } else {
            let modules_pass = conditions
                .modules
                .iter()
                .all(|name| job.module(name).is_some_and(|m| m.result.is_pass()));
            if !modules_pass {
                return Ok(None);
            }
            ResultStatus::Pass
        };

        if conditions.suites.is_empty() {
            return Ok(Some(status));
        }

        if companions.is_none() {
            *companions = Some(self.companion_jobs(job).await?);
        }
        let found: Vec<&JobRecord> = companions
            .iter()
            .flatten()
            .filter(|other| conditions.suites.contains(&other.test))
            .collect();

        let satisfied = found.len() == conditions.suites.len()
            && found.iter().all(|other| other.result.is_pass());
        if !satisfied {
            debug!(
                job = %job.id,
                needed = ?conditions.suites,
                found = found.len(),
                "Companion suites not yet satisfied"
            );
            return Ok(None);
        }

        let softfailed = job.result == JobOutcome::Softfailed
            || found.iter().any(|other| other.result == JobOutcome::Softfailed);
        Ok(Some(if softfailed { ResultStatus::Warn } else { ResultStatus::Pass }))
    }

    /// Most recent jobs of the same build, machine and flavor.
    async fn companion_jobs(&self, job: &JobRecord) -> Result<Vec<JobRecord>> {
        let query = JobQuery::build(job.build()).latest();
        let jobs = self.api.find_jobs(&query).await?;
        Ok(jobs
            .into_iter()
            .filter(|other| other.id != job.id)
            .filter(|other| other.machine() == job.machine() && other.flavor() == job.flavor())
            .collect())
    }
}

/// Matrix status for an overall outcome; `None` unless it passed.
fn status_for(outcome: JobOutcome) -> Option<ResultStatus> {
    match outcome {
        JobOutcome::Passed => Some(ResultStatus::Pass),
        JobOutcome::Softfailed => Some(ResultStatus::Warn),
        _ => None,
    }
}
