//! Duplicate request detection and request submission.

use std::sync::Arc;
use tracing::{info, warn};
use vigil_core::Result;
use vigil_core::artifact::TestRequest;
use vigil_core::ids::JobId;
use vigil_core::job::{JobOutcome, JobQuery, JobRecord, JobState};
use vigil_core::ports::TestExecutionApi;

/// Advisory guard against scheduling the same request twice.
///
/// Not a lock: two concurrent schedulers may both pass the check. The
/// service obsoletes earlier pending jobs of the same build on submission.
pub struct DuplicateGuard {
    api: Arc<dyn TestExecutionApi>,
}

impl DuplicateGuard {
    pub fn new(api: Arc<dyn TestExecutionApi>) -> Self {
        Self { api }
    }

    /// Existing, non-cancelled jobs equivalent to the request.
    pub async fn find_duplicates(&self, request: &TestRequest) -> Result<Vec<JobRecord>> {
        let query = JobQuery::build(&request.build).with_asset(request.asset.clone());
        let jobs = self.api.find_jobs(&query).await?;

        Ok(jobs
            .into_iter()
            .filter(|job| job.flavor() == request.flavor)
            .filter(|job| job.setting("ARCH").is_none_or(|arch| arch == request.arch))
            .filter(|job| job.state != JobState::Cancelled)
            .filter(|job| job.result != JobOutcome::UserCancelled)
            .collect())
    }

    /// Submit each request in order, skipping duplicates unless forced.
    pub async fn submit_all(&self, requests: &[TestRequest], force: bool) -> Result<Vec<JobId>> {
        let mut job_ids = Vec::new();

        for request in requests {
            if !force {
                let duplicates = self.find_duplicates(request).await?;
                if let Some(existing) = duplicates.first() {
                    info!(
                        build = %request.build,
                        flavor = %request.flavor,
                        arch = %request.arch,
                        existing = %existing.id,
                        "Skipping request, equivalent job exists"
                    );
                    continue;
                }
            }

            let created = self.api.submit(request).await?;
            if created.is_empty() {
                warn!(
                    build = %request.build,
                    flavor = %request.flavor,
                    arch = %request.arch,
                    "Request created no jobs"
                );
            } else {
                info!(
                    build = %request.build,
                    flavor = %request.flavor,
                    arch = %request.arch,
                    jobs = ?created,
                    "Request submitted"
                );
            }
            job_ids.extend(created);
        }

        Ok(job_ids)
    }
}
