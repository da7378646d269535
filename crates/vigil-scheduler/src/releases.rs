//! Release number resolution for upgrade-path parameters.

use std::collections::BTreeMap;
use tracing::warn;
use vigil_core::ports::ReleaseMetadata;

/// Substituted for any release number that could not be resolved.
pub const UNKNOWN_RELEASE: &str = "UNKNOWN";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseNumbers {
    pub current: Option<u32>,
    pub rawhide: Option<u32>,
}

impl ReleaseNumbers {
    /// Look up current and Rawhide release numbers; failures degrade to unknown.
    pub async fn resolve(metadata: &dyn ReleaseMetadata) -> Self {
        let current = match metadata.current_release().await {
            Ok(release) => Some(release),
            Err(e) => {
                warn!(error = %e, "Could not determine current release");
                None
            }
        };
        let rawhide = match metadata.rawhide_release().await {
            Ok(release) => Some(release),
            Err(e) => {
                warn!(error = %e, "Could not determine Rawhide release");
                None
            }
        };
        Self { current, rawhide }
    }

    /// Numeric form of a version; `Rawhide` maps to the Rawhide release.
    pub fn numeric(&self, version: &str) -> Option<u32> {
        if version.eq_ignore_ascii_case("rawhide") {
            self.rawhide
        } else {
            version.parse().ok()
        }
    }

    /// Release-number parameters for a request against `version`.
    pub fn params(&self, version: &str) -> BTreeMap<String, String> {
        let base = self.numeric(version);
        let minus = |n: Option<u32>, by: u32| n.and_then(|n| n.checked_sub(by));

        BTreeMap::from([
            ("CURRREL".to_string(), render(self.current)),
            ("PREVREL".to_string(), render(minus(self.current, 1))),
            ("RAWREL".to_string(), render(self.rawhide)),
            ("UP1REL".to_string(), render(minus(base, 1))),
            ("UP2REL".to_string(), render(minus(base, 2))),
        ])
    }
}

fn render(release: Option<u32>) -> String {
    release.map_or_else(|| UNKNOWN_RELEASE.to_string(), |n| n.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_release_params() {
        let numbers = ReleaseNumbers {
            current: Some(40),
            rawhide: Some(42),
        };
        let params = numbers.params("41");
        assert_eq!(params["CURRREL"], "40");
        assert_eq!(params["PREVREL"], "39");
        assert_eq!(params["RAWREL"], "42");
        assert_eq!(params["UP1REL"], "40");
        assert_eq!(params["UP2REL"], "39");
    }

    #[test]
    fn test_rawhide_upgrades_from_rawhide_minus_one() {
        let numbers = ReleaseNumbers {
            current: Some(40),
            rawhide: Some(42),
        };
        let params = numbers.params("Rawhide");
        assert_eq!(params["UP1REL"], "41");
        assert_eq!(params["UP2REL"], "40");
    }

    #[test]
    fn test_failed_lookups_use_sentinel() {
        let numbers = ReleaseNumbers {
            current: None,
            rawhide: None,
        };
        let params = numbers.params("Rawhide");
        assert_eq!(params["CURRREL"], UNKNOWN_RELEASE);
        assert_eq!(params["PREVREL"], UNKNOWN_RELEASE);
        assert_eq!(params["UP1REL"], UNKNOWN_RELEASE);

        assert_eq!(numbers.params("40")["UP1REL"], "39");
    }
}
