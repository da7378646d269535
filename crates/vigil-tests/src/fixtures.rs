//! Test fixtures for creating sample data.

use std::collections::BTreeMap;
use vigil_core::JobId;
use vigil_core::artifact::{ComposeType, DiscoveredArtifact, Release};
use vigil_core::job::{JobOutcome, JobRecord, JobState, ModuleResult};

pub const COMPOSE_ID: &str = "Fedora-41-20241001.0";
pub const COMPOSE_LOCATION: &str =
    "https://kojipkgs.example/compose/41/Fedora-41-20241001.0/compose";

/// Factory for discovered artifacts under the fixture compose.
pub struct ArtifactFixture;

impl ArtifactFixture {
    pub fn iso(
        variant: &str,
        subvariant: &str,
        image_type: &str,
        arch: &str,
    ) -> DiscoveredArtifact {
        DiscoveredArtifact {
            arch: arch.to_string(),
            subvariant: subvariant.to_string(),
            image_type: image_type.to_string(),
            format: "iso".to_string(),
            variant: variant.to_string(),
            url: format!(
                "{}/{}/{}/iso/Fedora-{}-{}-{}-41-1.2.iso",
                COMPOSE_LOCATION, variant, arch, subvariant, image_type, arch
            ),
            extra: BTreeMap::new(),
        }
    }

    pub fn server_boot() -> DiscoveredArtifact {
        Self::iso("Server", "Server", "boot", "x86_64")
    }

    pub fn server_dvd() -> DiscoveredArtifact {
        Self::iso("Server", "Server", "dvd", "x86_64")
    }

    pub fn minimal_raw(arch: &str) -> DiscoveredArtifact {
        DiscoveredArtifact {
            arch: arch.to_string(),
            subvariant: "Minimal".to_string(),
            image_type: "raw-xz".to_string(),
            format: "raw.xz".to_string(),
            variant: "Spins".to_string(),
            url: format!(
                "{}/Spins/{}/images/Fedora-Minimal-41-1.2.{}.raw.xz",
                COMPOSE_LOCATION, arch, arch
            ),
            extra: BTreeMap::new(),
        }
    }
}

/// Factory for releases.
pub struct ReleaseFixture;

impl ReleaseFixture {
    pub fn nightly(artifacts: Vec<DiscoveredArtifact>) -> Release {
        Release {
            compose_id: COMPOSE_ID.to_string(),
            version: "41".to_string(),
            milestone: "Nightly".to_string(),
            label: None,
            compose_type: ComposeType::Nightly,
            location: COMPOSE_LOCATION.to_string(),
            artifacts,
            has_installable_tree: false,
        }
    }

    pub fn candidate(artifacts: Vec<DiscoveredArtifact>) -> Release {
        Release {
            milestone: "RC".to_string(),
            label: Some("RC-1.2".to_string()),
            compose_type: ComposeType::Production,
            has_installable_tree: true,
            ..Self::nightly(artifacts)
        }
    }
}

/// Builder for finished job records.
pub struct JobFixture {
    job: JobRecord,
}

impl JobFixture {
    /// A finished compose job on the x86_64 UEFI machine.
    pub fn new(id: u64, test: &str) -> Self {
        let settings = [
            ("BUILD", COMPOSE_ID),
            ("FLAVOR", "Server-dvd-iso"),
            ("ARCH", "x86_64"),
            ("MACHINE", "64bit"),
            ("UEFI", "1"),
            ("SUBVARIANT", "Server"),
            ("IMAGETYPE", "dvd"),
            ("ISO", "Fedora-Server-dvd-x86_64-41-1.2.iso"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            job: JobRecord {
                id: JobId::new(id),
                test: test.to_string(),
                state: JobState::Done,
                result: JobOutcome::Passed,
                settings,
                modules: vec![],
                children: vec![],
            },
        }
    }

    pub fn result(mut self, result: JobOutcome) -> Self {
        self.job.result = result;
        self
    }

    pub fn passed(self) -> Self {
        self.result(JobOutcome::Passed)
    }

    pub fn softfailed(self) -> Self {
        self.result(JobOutcome::Softfailed)
    }

    pub fn failed(self) -> Self {
        self.result(JobOutcome::Failed)
    }

    pub fn state(mut self, state: JobState) -> Self {
        self.job.state = state;
        self
    }

    pub fn setting(mut self, key: &str, value: &str) -> Self {
        self.job.settings.insert(key.to_string(), value.to_string());
        self
    }

    pub fn without(mut self, key: &str) -> Self {
        self.job.settings.remove(key);
        self
    }

    pub fn module(mut self, name: &str, result: JobOutcome) -> Self {
        self.job.modules.push(ModuleResult {
            name: name.to_string(),
            result,
        });
        self
    }

    pub fn child(mut self, id: u64) -> Self {
        self.job.children.push(JobId::new(id));
        self
    }

    /// Turn the job into an update test for an advisory.
    pub fn for_update(self, advisory: &str) -> Self {
        self.setting("BUILD", &format!("Update-{}", advisory))
            .setting("ADVISORY", advisory)
            .setting("FLAVOR", "updates-server")
            .without("ISO")
            .without("SUBVARIANT")
            .without("IMAGETYPE")
    }

    pub fn build(self) -> JobRecord {
        self.job
    }
}
