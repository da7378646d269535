//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the decision engines and the
//! external services they consume.

use crate::Result;
use crate::artifact::{Release, TestRequest};
use crate::ids::JobId;
use crate::job::{JobQuery, JobRecord};
use crate::result::{AggregatorRecord, ResolvedResult, WikiSubmission};
use async_trait::async_trait;

/// The service that executes test jobs.
#[async_trait]
pub trait TestExecutionApi: Send + Sync {
    /// Submit a request; returns the ids of the jobs it created.
    async fn submit(&self, request: &TestRequest) -> Result<Vec<JobId>>;

    /// Query jobs matching a filter.
    async fn find_jobs(&self, query: &JobQuery) -> Result<Vec<JobRecord>>;

    /// Fetch a single job, including its modules and children.
    async fn get_job(&self, id: JobId) -> Result<JobRecord>;

    /// Annotate a build as important so it is kept and highlighted.
    async fn tag_important(&self, build: &str, label: &str) -> Result<()>;
}

/// Resolves release locators and release numbers.
#[async_trait]
pub trait ReleaseMetadata: Send + Sync {
    /// Resolve a compose id or URL to its release and artifacts.
    ///
    /// Fails with `ReleaseNotFound`, `UnsupportedCompose` or `UrlMismatch`.
    async fn get_release(&self, locator: &str) -> Result<Release>;

    /// Highest stable release number.
    async fn current_release(&self) -> Result<u32>;

    /// Release number currently carried by Rawhide.
    async fn rawhide_release(&self) -> Result<u32>;

    /// Oldest release still receiving updates.
    async fn oldest_supported_release(&self) -> Result<u32>;
}

/// The wiki-based test matrix.
#[async_trait]
pub trait WikiReporter: Send + Sync {
    async fn submit(&self, results: &[ResolvedResult]) -> Result<WikiSubmission>;
}

/// The generic result-aggregation service.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn submit(&self, record: &AggregatorRecord) -> Result<()>;
}
