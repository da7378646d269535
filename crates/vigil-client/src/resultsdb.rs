//! Result-aggregation service adapter (ResultsDB v2 API).

use crate::http;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;
use vigil_core::Result;
use vigil_core::ports::ResultStore;
use vigil_core::result::AggregatorRecord;

#[derive(Debug, Clone)]
pub struct ResultsDbConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Base URL of the test-execution service, for job links.
    pub job_url_base: String,
}

pub struct ResultsDbClient {
    client: Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    job_url_base: String,
}

impl ResultsDbClient {
    pub fn new(config: ResultsDbConfig) -> Result<Self> {
        Ok(Self {
            client: http::client()?,
            base_url: http::base(&config.url),
            username: config.username,
            password: config.password,
            job_url_base: http::base(&config.job_url_base),
        })
    }

    fn payload(&self, record: &AggregatorRecord) -> Value {
        let mut data = json!({
            "item": record.locator.item,
            "type": record.locator.kind,
            "arch": record.arch,
            "flavor": record.flavor,
        });
        if let Some(build) = &record.locator.build {
            data["productmd.compose.id"] = json!(build);
        }
        json!({
            "testcase": { "name": record.testcase },
            "outcome": record.outcome,
            "ref_url": format!("{}/tests/{}", self.job_url_base, record.job_id),
            "data": data,
        })
    }
}

#[async_trait]
impl ResultStore for ResultsDbClient {
    async fn submit(&self, record: &AggregatorRecord) -> Result<()> {
        let url = format!("{}/api/v2.0/results", self.base_url);
        let mut req = self.client.post(&url).json(&self.payload(record));
        if let Some(username) = &self.username {
            req = req.basic_auth(username, self.password.as_ref());
        }
        debug!(job = %record.job_id, testcase = %record.testcase, "Submitting result");
        http::send(req).await
    }
}
