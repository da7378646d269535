//! Job records as read back from the test-execution service.

use crate::artifact::Asset;
use crate::ids::JobId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Settings that select an update-style target rather than a compose.
pub const UPDATE_TARGET_KEYS: [&str; 4] = ["ADVISORY", "KOJITASK", "TAG", "COPR"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Scheduled,
    Assigned,
    Setup,
    Running,
    Uploading,
    Done,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    None,
    Passed,
    Softfailed,
    Failed,
    Incomplete,
    Skipped,
    Obsoleted,
    ParallelFailed,
    ParallelRestarted,
    UserCancelled,
    UserRestarted,
    TimeoutExceeded,
}

impl JobOutcome {
    /// Passed or soft-failed.
    pub fn is_pass(&self) -> bool {
        matches!(self, JobOutcome::Passed | JobOutcome::Softfailed)
    }

    /// Outcomes that say nothing about the artifact under test.
    pub fn is_unreportable(&self) -> bool {
        matches!(
            self,
            JobOutcome::UserCancelled
                | JobOutcome::Obsoleted
                | JobOutcome::UserRestarted
                | JobOutcome::ParallelRestarted
        )
    }

    /// Outcomes given to children abandoned because a parent failed.
    pub fn is_abandoned(&self) -> bool {
        matches!(self, JobOutcome::Skipped | JobOutcome::ParallelFailed)
    }
}

/// Outcome of one named sub-step of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleResult {
    pub name: String,
    pub result: JobOutcome,
}

/// A test run owned by the test-execution service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    /// Test suite name.
    pub test: String,
    pub state: JobState,
    pub result: JobOutcome,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
    #[serde(default)]
    pub modules: Vec<ModuleResult>,
    /// Chained and parallel children.
    #[serde(default)]
    pub children: Vec<JobId>,
}

impl JobRecord {
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn build(&self) -> &str {
        self.setting("BUILD").unwrap_or_default()
    }

    pub fn flavor(&self) -> &str {
        self.setting("FLAVOR").unwrap_or_default()
    }

    pub fn arch(&self) -> &str {
        self.setting("ARCH").unwrap_or_default()
    }

    pub fn machine(&self) -> &str {
        self.setting("MACHINE").unwrap_or_default()
    }

    pub fn module(&self, name: &str) -> Option<&ModuleResult> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Whether the job was triggered by an update, task, tag or COPR.
    pub fn is_update_target(&self) -> bool {
        UPDATE_TARGET_KEYS.iter().any(|key| self.setting(key).is_some())
    }
}

/// Filter for job queries against the test-execution service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobQuery {
    pub build: Option<String>,
    pub asset: Option<Asset>,
    pub test: Option<String>,
    /// Only the most recent clone of each job.
    pub latest: bool,
}

impl JobQuery {
    pub fn build(build: impl Into<String>) -> Self {
        Self {
            build: Some(build.into()),
            ..Default::default()
        }
    }

    pub fn with_asset(mut self, asset: Option<Asset>) -> Self {
        self.asset = asset;
        self
    }

    pub fn latest(mut self) -> Self {
        self.latest = true;
        self
    }
}
