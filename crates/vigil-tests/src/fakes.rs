//! In-memory port implementations.

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use vigil_core::artifact::{Release, TestRequest};
use vigil_core::job::{JobOutcome, JobQuery, JobRecord, JobState};
use vigil_core::ports::{ReleaseMetadata, ResultStore, TestExecutionApi, WikiReporter};
use vigil_core::result::{AggregatorRecord, ResolvedResult, WikiSubmission};
use vigil_core::{Error, JobId, Result};

/// Test-execution service keeping jobs in memory.
///
/// Each submitted request creates one scheduled job whose test is the
/// request flavor, so submissions are visible to later duplicate checks.
pub struct FakeExecution {
    jobs: Mutex<BTreeMap<JobId, JobRecord>>,
    submitted: Mutex<Vec<TestRequest>>,
    tags: Mutex<Vec<(String, String)>>,
    next_id: AtomicU64,
    fail_tagging: AtomicBool,
}

impl Default for FakeExecution {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeExecution {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(BTreeMap::new()),
            submitted: Mutex::new(Vec::new()),
            tags: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1000),
            fail_tagging: AtomicBool::new(false),
        }
    }

    pub fn insert(&self, job: JobRecord) {
        self.jobs.lock().unwrap().insert(job.id, job);
    }

    pub fn jobs(&self) -> Vec<JobRecord> {
        self.jobs.lock().unwrap().values().cloned().collect()
    }

    pub fn submitted(&self) -> Vec<TestRequest> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn important_tags(&self) -> Vec<(String, String)> {
        self.tags.lock().unwrap().clone()
    }

    pub fn fail_tagging(&self) {
        self.fail_tagging.store(true, Ordering::SeqCst);
    }

    /// Mark a job finished with the given outcome.
    pub fn finish(&self, id: JobId, result: JobOutcome) {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&id) {
            job.state = JobState::Done;
            job.result = result;
        }
    }

    fn matches(job: &JobRecord, query: &JobQuery) -> bool {
        let build_ok = query.build.as_deref().is_none_or(|b| job.build() == b);
        let asset_ok = query
            .asset
            .as_ref()
            .is_none_or(|a| job.setting(a.kind.setting()) == Some(a.name.as_str()));
        let test_ok = query.test.as_deref().is_none_or(|t| job.test == t);
        build_ok && asset_ok && test_ok
    }
}

#[async_trait]
impl TestExecutionApi for FakeExecution {
    async fn submit(&self, request: &TestRequest) -> Result<Vec<JobId>> {
        self.submitted.lock().unwrap().push(request.clone());

        let id = JobId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut settings = request.to_params();
        if let Some(asset) = &request.asset {
            settings.insert(asset.kind.setting().to_string(), asset.name.clone());
        }
        self.insert(JobRecord {
            id,
            test: request.flavor.clone(),
            state: JobState::Scheduled,
            result: JobOutcome::None,
            settings,
            modules: vec![],
            children: vec![],
        });
        Ok(vec![id])
    }

    async fn find_jobs(&self, query: &JobQuery) -> Result<Vec<JobRecord>> {
        let jobs = self.jobs.lock().unwrap();
        let mut found: Vec<JobRecord> = jobs
            .values()
            .filter(|job| Self::matches(job, query))
            .cloned()
            .collect();

        if query.latest {
            let mut seen = BTreeSet::new();
            found.sort_by(|a, b| b.id.cmp(&a.id));
            found.retain(|job| {
                seen.insert((
                    job.test.clone(),
                    job.machine().to_string(),
                    job.flavor().to_string(),
                    job.arch().to_string(),
                ))
            });
            found.sort_by_key(|job| job.id);
        }
        Ok(found)
    }

    async fn get_job(&self, id: JobId) -> Result<JobRecord> {
        self.jobs.lock().unwrap().get(&id).cloned().ok_or_else(|| Error::Api {
            status: 404,
            message: format!("job {} not found", id),
        })
    }

    async fn tag_important(&self, build: &str, label: &str) -> Result<()> {
        if self.fail_tagging.load(Ordering::SeqCst) {
            return Err(Error::Network("comment service unavailable".to_string()));
        }
        self.tags.lock().unwrap().push((build.to_string(), label.to_string()));
        Ok(())
    }
}

/// How the fake metadata provider answers release lookups.
#[derive(Debug, Clone)]
pub enum ReleaseAnswer {
    Found(Release),
    NotFound,
    Unsupported,
    Mismatch { found: String },
}

pub struct FakeMetadata {
    answer: ReleaseAnswer,
    current: Option<u32>,
    rawhide: Option<u32>,
    oldest: Option<u32>,
}

impl FakeMetadata {
    pub fn new(answer: ReleaseAnswer) -> Self {
        Self {
            answer,
            current: Some(41),
            rawhide: Some(43),
            oldest: Some(40),
        }
    }

    pub fn with_release(release: Release) -> Self {
        Self::new(ReleaseAnswer::Found(release))
    }

    /// Make every release-number lookup fail.
    pub fn without_release_numbers(mut self) -> Self {
        self.current = None;
        self.rawhide = None;
        self.oldest = None;
        self
    }

    pub fn with_oldest(mut self, oldest: u32) -> Self {
        self.oldest = Some(oldest);
        self
    }
}

fn number(value: Option<u32>, what: &str) -> Result<u32> {
    value.ok_or_else(|| Error::Network(format!("{} release lookup failed", what)))
}

#[async_trait]
impl ReleaseMetadata for FakeMetadata {
    async fn get_release(&self, locator: &str) -> Result<Release> {
        match &self.answer {
            ReleaseAnswer::Found(release) => Ok(release.clone()),
            ReleaseAnswer::NotFound => Err(Error::ReleaseNotFound(locator.to_string())),
            ReleaseAnswer::Unsupported => Err(Error::UnsupportedCompose(locator.to_string())),
            ReleaseAnswer::Mismatch { found } => Err(Error::UrlMismatch {
                requested: locator.to_string(),
                found: found.clone(),
            }),
        }
    }

    async fn current_release(&self) -> Result<u32> {
        number(self.current, "current")
    }

    async fn rawhide_release(&self) -> Result<u32> {
        number(self.rawhide, "Rawhide")
    }

    async fn oldest_supported_release(&self) -> Result<u32> {
        number(self.oldest, "oldest supported")
    }
}

/// Wiki matrix remembering every result it has recorded.
#[derive(Default)]
pub struct FakeWiki {
    recorded: Mutex<BTreeSet<ResolvedResult>>,
    calls: AtomicU32,
    transient_failures: AtomicU32,
    reject_auth: AtomicBool,
}

impl FakeWiki {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` submissions with a network error.
    pub fn fail_next(&self, count: u32) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    pub fn reject_auth(&self) {
        self.reject_auth.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn recorded(&self) -> Vec<ResolvedResult> {
        self.recorded.lock().unwrap().iter().cloned().collect()
    }
}

fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl WikiReporter for FakeWiki {
    async fn submit(&self, results: &[ResolvedResult]) -> Result<WikiSubmission> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_auth.load(Ordering::SeqCst) {
            return Err(Error::AuthenticationFailed("wiki login rejected".to_string()));
        }
        if take_failure(&self.transient_failures) {
            return Err(Error::Network("wiki unavailable".to_string()));
        }

        let mut recorded = self.recorded.lock().unwrap();
        let mut response = WikiSubmission::default();
        for result in results {
            if recorded.insert(result.clone()) {
                response.recorded += 1;
            } else {
                response.duplicates.push(result.clone());
            }
        }
        Ok(response)
    }
}

/// Result store keeping submitted records.
#[derive(Default)]
pub struct FakeStore {
    records: Mutex<Vec<AggregatorRecord>>,
    calls: AtomicU32,
    transient_failures: AtomicU32,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, count: u32) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn records(&self) -> Vec<AggregatorRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultStore for FakeStore {
    async fn submit(&self, record: &AggregatorRecord) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.transient_failures) {
            return Err(Error::Network("result store unavailable".to_string()));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}
