//! Scheduling for updates, scratch tasks, tags and COPR projects.

use crate::ScheduleOutcome;
use crate::guard::DuplicateGuard;
use crate::releases::ReleaseNumbers;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};
use vigil_core::artifact::TestRequest;
use vigil_core::catalogue::UpdatePolicy;
use vigil_core::ports::{ReleaseMetadata, TestExecutionApi};
use vigil_core::{Result, RuleBook};

/// What an update-style trigger points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UpdateTarget {
    Update { advisory: String },
    Task { id: u64 },
    Tag { tag: String },
    Copr { owner: String, project: String },
}

impl UpdateTarget {
    /// Build label grouping every job for this target.
    pub fn build_label(&self) -> String {
        match self {
            Self::Update { advisory } => format!("Update-{}", advisory),
            Self::Task { id } => format!("Kojitask-{}", id),
            Self::Tag { tag } => format!("TAG_{}", tag),
            Self::Copr { owner, project } => format!("COPR_{}_{}", owner, project),
        }
    }

    /// Target-selecting parameters added to every request.
    pub fn params(&self) -> BTreeMap<String, String> {
        match self {
            Self::Update { advisory } => BTreeMap::from([
                ("ADVISORY".to_string(), advisory.clone()),
                ("ADVISORY_OR_TASK".to_string(), advisory.clone()),
            ]),
            Self::Task { id } => BTreeMap::from([
                ("KOJITASK".to_string(), id.to_string()),
                ("ADVISORY_OR_TASK".to_string(), id.to_string()),
            ]),
            Self::Tag { tag } => BTreeMap::from([("TAG".to_string(), tag.clone())]),
            Self::Copr { owner, project } => {
                BTreeMap::from([("COPR".to_string(), format!("{}/{}", owner, project))])
            }
        }
    }
}

impl fmt::Display for UpdateTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build_label())
    }
}

#[derive(Debug, Clone)]
pub struct UpdateTrigger {
    pub target: UpdateTarget,
    /// Release the update is for; a number or `Rawhide`.
    pub version: String,
    /// Packages contained in the update.
    pub packages: Vec<String>,
    /// Critical path classification tags.
    pub critpath: Vec<String>,
    pub flavors: Vec<String>,
    pub arches: Vec<String>,
    pub force: bool,
    pub extra_params: BTreeMap<String, String>,
}

impl UpdateTrigger {
    pub fn new(target: UpdateTarget, version: impl Into<String>) -> Self {
        Self {
            target,
            version: version.into(),
            packages: Vec::new(),
            critpath: Vec::new(),
            flavors: Vec::new(),
            arches: Vec::new(),
            force: false,
            extra_params: BTreeMap::new(),
        }
    }
}

/// Flavors an update needs, from its critical path tags or its packages.
///
/// Critical path classification wins outright; package groups are only
/// consulted when no tag applies.
pub fn select_flavors(
    policy: &UpdatePolicy,
    packages: &[String],
    critpath: &[String],
) -> BTreeSet<String> {
    let mut groups = policy.critpath_groups(critpath);
    if groups.is_empty() {
        groups = policy.package_groups(packages);
    }

    let mut flavors = BTreeSet::new();
    for group in groups {
        match policy.groups.get(group) {
            Some(members) => flavors.extend(members.iter().cloned()),
            None => warn!(group = %group, "Variant group has no flavors"),
        }
    }
    flavors
}

pub struct UpdateScheduler {
    rules: Arc<RuleBook>,
    api: Arc<dyn TestExecutionApi>,
    metadata: Arc<dyn ReleaseMetadata>,
}

impl UpdateScheduler {
    pub fn new(
        rules: Arc<RuleBook>,
        api: Arc<dyn TestExecutionApi>,
        metadata: Arc<dyn ReleaseMetadata>,
    ) -> Self {
        Self {
            rules,
            api,
            metadata,
        }
    }

    /// Build every request for the trigger, before duplicate checks.
    pub async fn plan(&self, trigger: &UpdateTrigger) -> Result<Vec<TestRequest>> {
        let policy = &self.rules.updates;
        let mut flavors = select_flavors(policy, &trigger.packages, &trigger.critpath);
        if !trigger.flavors.is_empty() {
            flavors.retain(|f| trigger.flavors.contains(f));
        }
        if flavors.is_empty() {
            info!(update = %trigger.target, "No flavors selected for update");
            return Ok(Vec::new());
        }

        let numbers = ReleaseNumbers::resolve(self.metadata.as_ref()).await;
        let version = numbers
            .numeric(&trigger.version)
            .map(|n| n.to_string())
            .unwrap_or_else(|| trigger.version.clone());

        match self.metadata.oldest_supported_release().await {
            Ok(oldest) if numbers.numeric(&trigger.version) == Some(oldest) => {
                flavors.retain(|f| !f.contains("upgrade"));
                info!(
                    update = %trigger.target,
                    release = oldest,
                    "Oldest supported release, skipping upgrade flavors"
                );
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Could not determine oldest supported release"),
        }

        let build = trigger.target.build_label();
        let arches = policy
            .arches
            .iter()
            .filter(|a| trigger.arches.is_empty() || trigger.arches.contains(a));

        let mut requests = Vec::new();
        for arch in arches {
            for flavor in &flavors {
                let mut request = TestRequest::new(flavor, arch, &build)
                    .param("DISTRI", "fedora")
                    .param("VERSION", &version)
                    .param("_OBSOLETE", "1");
                request.params.extend(numbers.params(&trigger.version));
                request.params.extend(trigger.target.params());
                request.params.extend(trigger.extra_params.clone());
                requests.push(request);
            }
        }
        Ok(requests)
    }

    pub async fn schedule(&self, trigger: &UpdateTrigger) -> Result<ScheduleOutcome> {
        let build = trigger.target.build_label();
        let requests = self.plan(trigger).await?;
        if requests.is_empty() {
            return Ok(ScheduleOutcome {
                build,
                jobs: Vec::new(),
            });
        }

        let guard = DuplicateGuard::new(self.api.clone());
        let jobs = guard.submit_all(&requests, trigger.force).await?;
        info!(build = %build, requests = requests.len(), jobs = jobs.len(), "Update scheduled");
        Ok(ScheduleOutcome { build, jobs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> UpdatePolicy {
        UpdatePolicy {
            arches: vec!["x86_64".to_string()],
            critpath: BTreeMap::from([
                (
                    "critical-path-base".to_string(),
                    vec!["server".to_string(), "workstation".to_string()],
                ),
                ("critical-path-gnome".to_string(), vec!["workstation".to_string()]),
            ]),
            packages: BTreeMap::from([
                ("cockpit".to_string(), vec!["server".to_string()]),
                ("mystery".to_string(), vec!["unmapped".to_string()]),
            ]),
            groups: BTreeMap::from([
                (
                    "server".to_string(),
                    vec!["updates-server".to_string(), "updates-server-upgrade".to_string()],
                ),
                ("workstation".to_string(), vec!["updates-workstation".to_string()]),
            ]),
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_critpath_unions_tag_groups() {
        let flavors = select_flavors(
            &policy(),
            &[],
            &strings(&["critical-path-base", "critical-path-gnome"]),
        );
        assert_eq!(
            flavors.into_iter().collect::<Vec<_>>(),
            strings(&["updates-server", "updates-server-upgrade", "updates-workstation"])
        );
    }

    #[test]
    fn test_critpath_ignores_packages() {
        let critpath = strings(&["critical-path-gnome"]);
        let flavors = select_flavors(&policy(), &strings(&["cockpit"]), &critpath);
        assert_eq!(flavors.into_iter().collect::<Vec<_>>(), strings(&["updates-workstation"]));
    }

    #[test]
    fn test_allow_listed_package_selects_group() {
        let flavors = select_flavors(&policy(), &strings(&["cockpit", "bash"]), &[]);
        assert!(flavors.contains("updates-server"));
        assert!(!flavors.contains("updates-workstation"));
    }

    #[test]
    fn test_nothing_applies_selects_nothing() {
        let critpath = strings(&["not-a-tag"]);
        assert!(select_flavors(&policy(), &strings(&["bash"]), &critpath).is_empty());
    }

    #[test]
    fn test_unmapped_group_is_skipped() {
        assert!(select_flavors(&policy(), &strings(&["mystery"]), &[]).is_empty());
    }

    #[test]
    fn test_target_labels_and_params() {
        let update = UpdateTarget::Update {
            advisory: "FEDORA-2024-abc".to_string(),
        };
        assert_eq!(update.build_label(), "Update-FEDORA-2024-abc");
        assert_eq!(update.params()["ADVISORY_OR_TASK"], "FEDORA-2024-abc");

        let task = UpdateTarget::Task { id: 1234 };
        assert_eq!(task.build_label(), "Kojitask-1234");
        assert_eq!(task.params()["KOJITASK"], "1234");

        let tag = UpdateTarget::Tag {
            tag: "f41-build-side-1".to_string(),
        };
        assert_eq!(tag.build_label(), "TAG_f41-build-side-1");

        let copr = UpdateTarget::Copr {
            owner: "alice".to_string(),
            project: "tools".to_string(),
        };
        assert_eq!(copr.build_label(), "COPR_alice_tools");
        assert_eq!(copr.params()["COPR"], "alice/tools");
    }
}
