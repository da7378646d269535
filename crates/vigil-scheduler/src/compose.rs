//! Scheduling for new composes.

use crate::ScheduleOutcome;
use crate::guard::DuplicateGuard;
use crate::releases::ReleaseNumbers;
use crate::selector::{ArtifactMatch, ArtifactSelector, SelectionFilter};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use vigil_core::artifact::{Asset, AssetKind, Release, TestRequest, UNIVERSAL_FLAVOR};
use vigil_core::ports::{ReleaseMetadata, TestExecutionApi};
use vigil_core::{Error, Result, RuleBook};

/// Build label suffix for runs that must never be reported.
pub const DIRTY_BUILD_SUFFIX: &str = "-NOREPORT";

/// A request to test a compose.
#[derive(Debug, Clone, Default)]
pub struct ComposeTrigger {
    /// Compose id or compose URL.
    pub location: String,
    pub filter: SelectionFilter,
    pub force: bool,
    /// Alternate installer updates image.
    pub updates_img: Option<String>,
    pub extra_params: BTreeMap<String, String>,
}

impl ComposeTrigger {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Default::default()
        }
    }

    fn is_dirty(&self) -> bool {
        self.updates_img.is_some() || !self.extra_params.is_empty()
    }
}

/// The requests a compose trigger resolves to, before duplicate checks.
#[derive(Debug, Clone)]
pub struct ComposePlan {
    pub release: Release,
    pub build: String,
    pub requests: Vec<TestRequest>,
}

pub struct ComposeScheduler {
    rules: Arc<RuleBook>,
    api: Arc<dyn TestExecutionApi>,
    metadata: Arc<dyn ReleaseMetadata>,
}

impl ComposeScheduler {
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

    /// Resolve the release and build every request for it.
    ///
    /// Returns `None` for composes the metadata provider does not support.
    pub async fn plan(&self, trigger: &ComposeTrigger) -> Result<Option<ComposePlan>> {
        let release = match self.metadata.get_release(&trigger.location).await {
            Ok(release) => release,
            Err(Error::UnsupportedCompose(reason)) => {
                info!(
                    location = %trigger.location,
                    reason = %reason,
                    "Unsupported compose, nothing to schedule"
                );
                return Ok(None);
            }
            Err(Error::ReleaseNotFound(reason)) => {
                return Err(Error::TriggerFailure(format!("release lookup failed: {}", reason)));
            }
            Err(Error::UrlMismatch { requested, found }) => {
                return Err(Error::TriggerFailure(format!(
                    "compose location {} does not match requested {}",
                    found, requested
                )));
            }
            Err(e) => return Err(e),
        };

        if is_url(&trigger.location)
            && trigger.location.trim_end_matches('/') != release.location.trim_end_matches('/')
        {
            return Err(Error::TriggerFailure(format!(
                "compose location {} does not match requested {}",
                release.location, trigger.location
            )));
        }

        let mut build = release.compose_id.clone();
        if trigger.is_dirty() {
            build.push_str(DIRTY_BUILD_SUFFIX);
        }

        let numbers = ReleaseNumbers::resolve(self.metadata.as_ref()).await;
        let selection =
            ArtifactSelector::new(&self.rules.shapes).select(&release.artifacts, &trigger.filter)?;

        let mut requests = Vec::new();
        for found in &selection.matches {
            let flavor = &found.flavor;
            let request = self.artifact_request(&release, &build, &numbers, trigger, found, flavor);
            requests.push(request);
        }
        for found in &selection.universal {
            requests.push(self.artifact_request(
                &release,
                &build,
                &numbers,
                trigger,
                found,
                UNIVERSAL_FLAVOR,
            ));
        }

        if release.has_installable_tree {
            for special in &self.rules.shapes.specials {
                if !trigger.filter.allows_flavor(&special.flavor) {
                    continue;
                }
                for arch in special.arches.iter().filter(|a| trigger.filter.allows_arch(a)) {
                    let request = TestRequest::new(&special.flavor, arch, &build);
                    requests.push(self.finish(request, &release, &numbers, trigger));
                }
            }
        }

        Ok(Some(ComposePlan {
            release,
            build,
            requests,
        }))
    }

    /// Plan, guard and submit; tags production builds as important.
    pub async fn schedule(&self, trigger: &ComposeTrigger) -> Result<ScheduleOutcome> {
        let Some(plan) = self.plan(trigger).await? else {
            return Ok(ScheduleOutcome::default());
        };

        let guard = DuplicateGuard::new(self.api.clone());
        let jobs = guard.submit_all(&plan.requests, trigger.force).await?;
        info!(
            build = %plan.build,
            requests = plan.requests.len(),
            jobs = jobs.len(),
            "Compose scheduled"
        );

        if !jobs.is_empty() && plan.release.is_production_candidate() {
            let label = plan
                .release
                .label
                .clone()
                .unwrap_or_else(|| plan.release.milestone.clone());
            if let Err(e) = self.api.tag_important(&plan.build, &label).await {
                warn!(build = %plan.build, error = %e, "Failed to tag build as important");
            }
        }

        Ok(ScheduleOutcome {
            build: plan.build,
            jobs,
        })
    }

    fn artifact_request(
        &self,
        release: &Release,
        build: &str,
        numbers: &ReleaseNumbers,
        trigger: &ComposeTrigger,
        found: &ArtifactMatch,
        flavor: &str,
    ) -> TestRequest {
        let artifact = &found.artifact;
        let mut request = TestRequest::new(flavor, &artifact.arch, build)
            .param("SUBVARIANT", &artifact.subvariant)
            .param("IMAGETYPE", &artifact.image_type);

        let (kind, url_key) = if artifact.format == "iso" {
            (AssetKind::Iso, "ISO_URL")
        } else if artifact.is_compressed() {
            (AssetKind::Hdd, "HDD_1_DECOMPRESS_URL")
        } else {
            (AssetKind::Hdd, "HDD_1_URL")
        };
        request = request
            .with_asset(Asset::new(kind, artifact.stored_name()))
            .param(url_key, &artifact.url);

        if found.dkboot {
            let tree = format!(
                "{}/{}/{}/os/images/pxeboot",
                release.location.trim_end_matches('/'),
                artifact.variant,
                artifact.arch
            );
            request = request
                .param("KERNEL", format!("{}/vmlinuz", tree))
                .param("INITRD", format!("{}/initrd.img", tree));
        }

        self.finish(request, release, numbers, trigger)
    }

    fn finish(
        &self,
        mut request: TestRequest,
        release: &Release,
        numbers: &ReleaseNumbers,
        trigger: &ComposeTrigger,
    ) -> TestRequest {
        request.params.insert("DISTRI".to_string(), "fedora".to_string());
        request.params.insert("VERSION".to_string(), release.version.clone());
        request.params.insert("LOCATION".to_string(), release.location.clone());
        request.params.insert("_ONLY_OBSOLETE_SAME_BUILD".to_string(), "1".to_string());
        if let Some(label) = &release.label {
            request.params.insert("LABEL".to_string(), label.clone());
        }
        request.params.extend(numbers.params(&release.version));
        if let Some(url) = &trigger.updates_img {
            request.params.insert("GRUBADD".to_string(), format!("inst.updates={}", url));
        }
        request.params.extend(trigger.extra_params.clone());
        request
    }
}

fn is_url(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}
