//! Artifact, release and test request types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Flavor id used for the cross-cutting request of each architecture.
pub const UNIVERSAL_FLAVOR: &str = "universal";

/// A wanted artifact shape from the shape catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ArtifactShape {
    /// Attribute equality predicate; every pair must be present on the artifact.
    #[serde(rename = "match")]
    pub predicate: BTreeMap<String, String>,
    /// Only used to pick the universal artifact per architecture.
    #[serde(default)]
    pub score: u32,
    /// Boot the artifact with kernel and initrd passed directly.
    #[serde(default)]
    pub dkboot: bool,
    /// Explicit flavor id, overriding the derived one.
    #[serde(default)]
    pub flavor: Option<String>,
}

impl ArtifactShape {
    pub fn matches(&self, artifact: &DiscoveredArtifact) -> bool {
        self.predicate
            .iter()
            .all(|(key, value)| artifact.attribute(key) == Some(value.as_str()))
    }

    pub fn flavor_for(&self, artifact: &DiscoveredArtifact) -> String {
        self.flavor.clone().unwrap_or_else(|| artifact.flavor())
    }
}

/// One concrete build output discovered for a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DiscoveredArtifact {
    pub arch: String,
    pub subvariant: String,
    #[serde(rename = "type")]
    pub image_type: String,
    pub format: String,
    /// Compose variant the artifact was built in (e.g. `Everything`).
    #[serde(default)]
    pub variant: String,
    pub url: String,
    /// Additional metadata attributes, also available for matching.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl DiscoveredArtifact {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        match key {
            "arch" => Some(&self.arch),
            "subvariant" => Some(&self.subvariant),
            "type" => Some(&self.image_type),
            "format" => Some(&self.format),
            "variant" => Some(&self.variant),
            _ => self.extra.get(key).map(String::as_str),
        }
    }

    /// Stable human-readable name, e.g. `Server-dvd-iso`.
    pub fn flavor(&self) -> String {
        format!("{}-{}-{}", self.subvariant, self.image_type, self.format)
    }

    /// Basename of the download URL.
    pub fn filename(&self) -> &str {
        asset_name(&self.url)
    }

    pub fn is_compressed(&self) -> bool {
        decompressed_name(self.filename()) != self.filename()
    }

    /// Asset name the test-execution service stores the artifact under.
    pub fn stored_name(&self) -> &str {
        decompressed_name(self.filename())
    }
}

const COMPRESSION_EXTENSIONS: [&str; 4] = [".xz", ".gz", ".bz2", ".zst"];

/// Basename of a URL or path, ignoring any trailing slash.
pub fn asset_name(url: &str) -> &str {
    let trimmed = url.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// File name with any compression extension removed.
pub fn decompressed_name(name: &str) -> &str {
    COMPRESSION_EXTENSIONS
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
        .unwrap_or(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ComposeType {
    Production,
    Nightly,
    Test,
}

/// A release as resolved by the release-metadata provider.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Release {
    /// Compose id, used as the build label.
    pub compose_id: String,
    /// Release number, or `Rawhide`.
    pub version: String,
    pub milestone: String,
    pub label: Option<String>,
    pub compose_type: ComposeType,
    pub location: String,
    pub artifacts: Vec<DiscoveredArtifact>,
    /// Whether a generic installable tree (the `Everything` variant) exists.
    pub has_installable_tree: bool,
}

impl Release {
    /// Production candidates get their build tagged as important.
    pub fn is_production_candidate(&self) -> bool {
        self.compose_type == ComposeType::Production
    }

    pub fn is_rawhide(&self) -> bool {
        self.version.eq_ignore_ascii_case("rawhide")
    }
}

/// How the test-execution service stores a job's primary asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Iso,
    Hdd,
}

impl AssetKind {
    /// Job setting holding the stored asset name.
    pub fn setting(&self) -> &'static str {
        match self {
            AssetKind::Iso => "ISO",
            AssetKind::Hdd => "HDD_1",
        }
    }

    /// Job query parameter filtering on the stored asset name.
    pub fn query_key(&self) -> &'static str {
        match self {
            AssetKind::Iso => "iso",
            AssetKind::Hdd => "hdd_1",
        }
    }
}

/// The primary asset of a request, as the service stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub kind: AssetKind,
    pub name: String,
}

impl Asset {
    pub fn new(kind: AssetKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

/// A request submitted to the test-execution service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRequest {
    pub flavor: String,
    pub arch: String,
    pub build: String,
    /// Primary asset used by the duplicate guard.
    pub asset: Option<Asset>,
    pub params: BTreeMap<String, String>,
}

impl TestRequest {
    pub fn new(
        flavor: impl Into<String>,
        arch: impl Into<String>,
        build: impl Into<String>,
    ) -> Self {
        Self {
            flavor: flavor.into(),
            arch: arch.into(),
            build: build.into(),
            asset: None,
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_asset(mut self, asset: Asset) -> Self {
        self.asset = Some(asset);
        self
    }

    /// Full parameter map as submitted, including the identity keys.
    pub fn to_params(&self) -> BTreeMap<String, String> {
        let mut params = self.params.clone();
        params.insert("FLAVOR".to_string(), self.flavor.clone());
        params.insert("ARCH".to_string(), self.arch.clone());
        params.insert("BUILD".to_string(), self.build.clone());
        params
    }
}
