//! Scheduling catalogues: wanted artifact shapes and the update policy.

use crate::artifact::ArtifactShape;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Wanted artifact shapes for compose scheduling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ShapeCatalogue {
    /// Architectures that get a universal request.
    #[serde(default = "default_universal_arches")]
    pub universal_arches: Vec<String>,
    pub shapes: Vec<ArtifactShape>,
    /// Requests not tied to a concrete artifact.
    #[serde(default)]
    pub specials: Vec<SpecialFlavor>,
}

fn default_universal_arches() -> Vec<String> {
    vec!["x86_64".to_string(), "aarch64".to_string()]
}

/// A flavor scheduled once per arch when the release has an installable tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SpecialFlavor {
    pub flavor: String,
    pub arches: Vec<String>,
}

impl ShapeCatalogue {
    pub fn has_universal(&self, arch: &str) -> bool {
        self.universal_arches.iter().any(|a| a == arch)
    }
}

/// Variant selection policy for update, task, tag and COPR triggers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UpdatePolicy {
    pub arches: Vec<String>,
    /// Critical path classification tag -> variant groups.
    #[serde(default)]
    pub critpath: BTreeMap<String, Vec<String>>,
    /// Package name -> variant groups.
    #[serde(default)]
    pub packages: BTreeMap<String, Vec<String>>,
    /// Variant group -> flavors.
    pub groups: BTreeMap<String, Vec<String>>,
}

impl UpdatePolicy {
    /// Variant groups implied by the critical path tags, unioned.
    pub fn critpath_groups<'a>(&'a self, tags: &[String]) -> BTreeSet<&'a str> {
        tags.iter()
            .filter_map(|tag| self.critpath.get(tag))
            .flatten()
            .map(String::as_str)
            .collect()
    }

    /// Variant groups implied by allow-listed packages.
    pub fn package_groups<'a>(&'a self, packages: &[String]) -> BTreeSet<&'a str> {
        packages
            .iter()
            .filter_map(|package| self.packages.get(package))
            .flatten()
            .map(String::as_str)
            .collect()
    }
}
