//! Wiki test-matrix adapter.

use crate::http;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;
use vigil_core::Result;
use vigil_core::ports::WikiReporter;
use vigil_core::result::{ResolvedResult, WikiSubmission};

#[derive(Debug, Clone)]
pub struct WikiConfig {
    pub url: String,
    pub token: Option<String>,
}

/// Posts resolved results to the matrix service, which places each one in
/// its test case row and reports the ones it already had or could not place.
pub struct WikiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Serialize)]
struct ResultBatch<'a> {
    results: &'a [ResolvedResult],
}

impl WikiClient {
    pub fn new(config: WikiConfig) -> Result<Self> {
        Ok(Self {
            client: http::client()?,
            base_url: http::base(&config.url),
            token: config.token,
        })
    }
}

#[async_trait]
impl WikiReporter for WikiClient {
    async fn submit(&self, results: &[ResolvedResult]) -> Result<WikiSubmission> {
        let url = format!("{}/api/results", self.base_url);
        let mut req = self.client.post(&url).json(&ResultBatch { results });
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        debug!(results = results.len(), "Submitting wiki results");
        http::send_json(req).await
    }
}
