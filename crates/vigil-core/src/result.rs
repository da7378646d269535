//! Resolved results and the records handed to reporting services.

use crate::ids::JobId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Pass,
    Warn,
}

/// A test case certified by a finished job.
///
/// Identical values are duplicates; reporting services treat a resubmission
/// as a no-op.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResolvedResult {
    pub testcase: String,
    pub testtype: String,
    pub environment: String,
    pub section: Option<String>,
    pub name: Option<String>,
    pub build: String,
    pub status: ResultStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregatorOutcome {
    Passed,
    Info,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorKind {
    #[serde(rename = "productmd-compose")]
    Compose,
    BodhiUpdate,
    KojiTask,
    KojiTag,
    Copr,
}

/// Identifies the item a result belongs to in the result-aggregation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultLocator {
    pub item: String,
    pub kind: LocatorKind,
    /// Enclosing build, set when `item` is an image filename.
    pub build: Option<String>,
}

/// One job outcome as submitted to the result-aggregation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorRecord {
    pub job_id: JobId,
    pub testcase: String,
    pub outcome: AggregatorOutcome,
    pub locator: ResultLocator,
    pub arch: String,
    pub flavor: String,
}

/// Response of the wiki service to a batch of results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WikiSubmission {
    pub recorded: usize,
    /// Results already present in the matrix.
    #[serde(default)]
    pub duplicates: Vec<ResolvedResult>,
    /// Results whose destination row could not be located.
    #[serde(default)]
    pub unlocated: Vec<ResolvedResult>,
}
