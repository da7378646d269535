//! Matching discovered artifacts against the shape catalogue.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;
use vigil_core::artifact::{DiscoveredArtifact, UNIVERSAL_FLAVOR};
use vigil_core::catalogue::ShapeCatalogue;
use vigil_core::{Error, Result};

/// An artifact paired with the shape it matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactMatch {
    pub artifact: DiscoveredArtifact,
    pub flavor: String,
    pub score: u32,
    pub dkboot: bool,
}

/// Optional architecture and flavor restriction; empty lists allow everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionFilter {
    pub arches: Vec<String>,
    pub flavors: Vec<String>,
}

impl SelectionFilter {
    pub fn allows_arch(&self, arch: &str) -> bool {
        self.arches.is_empty() || self.arches.iter().any(|a| a == arch)
    }

    pub fn allows_flavor(&self, flavor: &str) -> bool {
        self.flavors.is_empty() || self.flavors.iter().any(|f| f == flavor)
    }
}

/// Result of artifact selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    /// Every match, in artifact encounter order.
    pub matches: Vec<ArtifactMatch>,
    /// Best scored match per architecture, in order of first appearance.
    pub universal: Vec<ArtifactMatch>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty() && self.universal.is_empty()
    }
}

/// Selects testable artifacts from a release.
pub struct ArtifactSelector<'a> {
    catalogue: &'a ShapeCatalogue,
}

impl<'a> ArtifactSelector<'a> {
    pub fn new(catalogue: &'a ShapeCatalogue) -> Self {
        Self { catalogue }
    }

    /// Match artifacts against every shape and pick the universal artifacts.
    ///
    /// Fails when the release has no artifacts or nothing survives the filter.
    pub fn select(
        &self,
        artifacts: &[DiscoveredArtifact],
        filter: &SelectionFilter,
    ) -> Result<Selection> {
        if artifacts.is_empty() {
            return Err(Error::TriggerFailure("release contains no artifacts".to_string()));
        }

        let mut matches: Vec<ArtifactMatch> = Vec::new();
        let mut arch_order: Vec<String> = Vec::new();
        let mut best: BTreeMap<String, ArtifactMatch> = BTreeMap::new();

        for artifact in artifacts {
            if !filter.allows_arch(&artifact.arch) {
                continue;
            }
            for shape in &self.catalogue.shapes {
                if !shape.matches(artifact) {
                    continue;
                }
                let found = ArtifactMatch {
                    artifact: artifact.clone(),
                    flavor: shape.flavor_for(artifact),
                    score: shape.score,
                    dkboot: shape.dkboot,
                };
                debug!(
                    flavor = %found.flavor,
                    arch = %artifact.arch,
                    url = %artifact.url,
                    "Artifact matched"
                );

                if found.score > 0 && self.catalogue.has_universal(&artifact.arch) {
                    let current = best.get(&artifact.arch).map_or(0, |m| m.score);
                    if found.score > current {
                        if !arch_order.contains(&artifact.arch) {
                            arch_order.push(artifact.arch.clone());
                        }
                        best.insert(artifact.arch.clone(), found.clone());
                    }
                }

                let duplicate = matches
                    .iter()
                    .any(|m| m.flavor == found.flavor && m.artifact.url == found.artifact.url);
                if !duplicate {
                    matches.push(found);
                }
            }
        }

        matches.retain(|m| filter.allows_flavor(&m.flavor));
        let universal = if filter.allows_flavor(UNIVERSAL_FLAVOR) {
            arch_order
                .iter()
                .filter_map(|arch| best.remove(arch))
                .collect()
        } else {
            Vec::new()
        };

        let selection = Selection { matches, universal };
        if selection.is_empty() {
            return Err(Error::TriggerFailure("no testable artifacts found".to_string()));
        }
        Ok(selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vigil_core::artifact::ArtifactShape;

    fn artifact(subvariant: &str, image_type: &str, arch: &str) -> DiscoveredArtifact {
        DiscoveredArtifact {
            arch: arch.to_string(),
            subvariant: subvariant.to_string(),
            image_type: image_type.to_string(),
            format: "iso".to_string(),
            variant: subvariant.to_string(),
            url: format!("https://dl.example/{}-{}-{}.iso", subvariant, image_type, arch),
            extra: Default::default(),
        }
    }

    fn shape(subvariant: &str, image_type: &str, score: u32) -> ArtifactShape {
        ArtifactShape {
            predicate: BTreeMap::from([
                ("subvariant".to_string(), subvariant.to_string()),
                ("type".to_string(), image_type.to_string()),
            ]),
            score,
            dkboot: false,
            flavor: None,
        }
    }

    fn catalogue() -> ShapeCatalogue {
        ShapeCatalogue {
            universal_arches: vec!["x86_64".to_string(), "aarch64".to_string()],
            shapes: vec![
                shape("Server", "boot", 6),
                shape("Server", "dvd", 10),
                shape("Everything", "boot", 10),
                shape("Workstation", "live", 0),
            ],
            specials: vec![],
        }
    }

    #[test]
    fn test_highest_score_wins_universal() {
        let catalogue = catalogue();
        let selector = ArtifactSelector::new(&catalogue);
        let artifacts = vec![
            artifact("Server", "boot", "x86_64"),
            artifact("Server", "dvd", "x86_64"),
        ];

        let selection = selector.select(&artifacts, &SelectionFilter::default()).unwrap();

        assert_eq!(selection.matches.len(), 2);
        assert_eq!(selection.universal.len(), 1);
        assert_eq!(selection.universal[0].flavor, "Server-dvd-iso");
    }

    #[test]
    fn test_score_tie_keeps_first_seen() {
        let catalogue = catalogue();
        let selector = ArtifactSelector::new(&catalogue);
        let artifacts = vec![
            artifact("Everything", "boot", "x86_64"),
            artifact("Server", "dvd", "x86_64"),
        ];

        let selection = selector.select(&artifacts, &SelectionFilter::default()).unwrap();
        assert_eq!(selection.universal[0].flavor, "Everything-boot-iso");
    }

    #[test]
    fn test_unscored_matches_never_universal() {
        let catalogue = catalogue();
        let selector = ArtifactSelector::new(&catalogue);
        let artifacts = vec![artifact("Workstation", "live", "x86_64")];

        let selection = selector.select(&artifacts, &SelectionFilter::default()).unwrap();
        assert_eq!(selection.matches.len(), 1);
        assert!(selection.universal.is_empty());
    }

    #[test]
    fn test_universal_only_for_configured_arches() {
        let catalogue = catalogue();
        let selector = ArtifactSelector::new(&catalogue);
        let artifacts = vec![artifact("Server", "dvd", "ppc64le")];

        let selection = selector.select(&artifacts, &SelectionFilter::default()).unwrap();
        assert_eq!(selection.matches.len(), 1);
        assert!(selection.universal.is_empty());
    }

    #[test]
    fn test_empty_release_is_trigger_failure() {
        let catalogue = catalogue();
        let selector = ArtifactSelector::new(&catalogue);
        let err = selector.select(&[], &SelectionFilter::default()).unwrap_err();
        assert!(matches!(err, Error::TriggerFailure(_)));
    }

    #[test]
    fn test_filter_removing_everything_is_trigger_failure() {
        let catalogue = catalogue();
        let selector = ArtifactSelector::new(&catalogue);
        let artifacts = vec![artifact("Server", "dvd", "x86_64")];
        let filter = SelectionFilter {
            arches: vec!["aarch64".to_string()],
            flavors: vec![],
        };
        let err = selector.select(&artifacts, &filter).unwrap_err();
        assert!(matches!(err, Error::TriggerFailure(_)));
    }

    #[test]
    fn test_flavor_filter_can_keep_only_universal() {
        let catalogue = catalogue();
        let selector = ArtifactSelector::new(&catalogue);
        let artifacts = vec![
            artifact("Server", "boot", "x86_64"),
            artifact("Server", "dvd", "x86_64"),
        ];
        let filter = SelectionFilter {
            arches: vec![],
            flavors: vec![UNIVERSAL_FLAVOR.to_string()],
        };

        let selection = selector.select(&artifacts, &filter).unwrap();
        assert!(selection.matches.is_empty());
        assert_eq!(selection.universal[0].flavor, "Server-dvd-iso");
    }
}
