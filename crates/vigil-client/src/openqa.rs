//! Test-execution service adapter (openQA REST API).

use crate::http;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info};
use vigil_core::artifact::TestRequest;
use vigil_core::job::{JobOutcome, JobQuery, JobRecord, JobState, ModuleResult};
use vigil_core::ports::TestExecutionApi;
use vigil_core::{GroupId, JobId, Result};

#[derive(Debug, Clone)]
pub struct OpenQaConfig {
    pub url: String,
    /// Bearer credential for write operations.
    pub api_key: Option<String>,
    /// Job group that carries the "important" build annotations.
    pub important_group: GroupId,
}

pub struct OpenQaClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    important_group: GroupId,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default)]
    ids: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct JobsResponse {
    jobs: Vec<WireJob>,
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    job: WireJob,
}

#[derive(Debug, Deserialize)]
struct WireJob {
    id: u64,
    test: String,
    state: JobState,
    #[serde(default = "no_outcome")]
    result: JobOutcome,
    #[serde(default)]
    settings: BTreeMap<String, String>,
    #[serde(default)]
    modules: Vec<WireModule>,
    /// Child ids keyed by dependency type (`Chained`, `Parallel`, ...).
    #[serde(default)]
    children: BTreeMap<String, Vec<u64>>,
}

#[derive(Debug, Deserialize)]
struct WireModule {
    name: String,
    #[serde(default = "no_outcome")]
    result: JobOutcome,
}

fn no_outcome() -> JobOutcome {
    JobOutcome::None
}

impl From<WireJob> for JobRecord {
    fn from(job: WireJob) -> Self {
        let mut children: Vec<JobId> =
            job.children.into_values().flatten().map(JobId::new).collect();
        children.sort();
        children.dedup();
        Self {
            id: JobId::new(job.id),
            test: job.test,
            state: job.state,
            result: job.result,
            settings: job.settings,
            modules: job
                .modules
                .into_iter()
                .map(|m| ModuleResult {
                    name: m.name,
                    result: m.result,
                })
                .collect(),
            children,
        }
    }
}

impl OpenQaClient {
    pub fn new(config: OpenQaConfig) -> Result<Self> {
        Ok(Self {
            client: http::client()?,
            base_url: http::base(&config.url),
            api_key: config.api_key,
            important_group: config.important_group,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/api/v1{}", self.base_url, path);
        let mut req = self.client.request(method, &url);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }
}

fn query_pairs(query: &JobQuery) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    if let Some(build) = &query.build {
        pairs.push(("build", build.clone()));
    }
    if let Some(asset) = &query.asset {
        pairs.push((asset.kind.query_key(), asset.name.clone()));
    }
    if let Some(test) = &query.test {
        pairs.push(("test", test.clone()));
    }
    if query.latest {
        pairs.push(("latest", "1".to_string()));
    }
    pairs
}

#[async_trait]
impl TestExecutionApi for OpenQaClient {
    async fn submit(&self, request: &TestRequest) -> Result<Vec<JobId>> {
        let params = request.to_params();
        debug!(
            build = %request.build,
            flavor = %request.flavor,
            arch = %request.arch,
            "Posting request"
        );
        let response: SubmitResponse =
            http::send_json(self.request(reqwest::Method::POST, "/isos").form(&params)).await?;
        Ok(response.ids.into_iter().map(JobId::new).collect())
    }

    async fn find_jobs(&self, query: &JobQuery) -> Result<Vec<JobRecord>> {
        let request = self
            .request(reqwest::Method::GET, "/jobs")
            .query(&query_pairs(query));
        let response: JobsResponse = http::send_json(request).await?;
        Ok(response.jobs.into_iter().map(JobRecord::from).collect())
    }

    async fn get_job(&self, id: JobId) -> Result<JobRecord> {
        let path = format!("/jobs/{}", id);
        let request = self
            .request(reqwest::Method::GET, &path)
            .query(&[("details", "1")]);
        let response: JobResponse = http::send_json(request).await?;
        Ok(response.job.into())
    }

    async fn tag_important(&self, build: &str, label: &str) -> Result<()> {
        let path = format!("/groups/{}/comments", self.important_group);
        let text = format!("tag:{}:important:{}", build, label);
        let request = self
            .request(reqwest::Method::POST, &path)
            .form(&[("text", text.as_str())]);
        http::send(request).await?;
        info!(build = %build, label = %label, "Build tagged important");
        Ok(())
    }
}
