//! CLI configuration management.

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VigilConfig {
    pub openqa: OpenQaSection,
    pub metadata: MetadataSection,
    pub wiki: WikiSection,
    pub resultsdb: ResultsDbSection,
    pub report: ReportSection,
    pub overrides: OverrideSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenQaSection {
    pub url: String,
    pub api_key: Option<String>,
    pub important_group: u64,
}

impl Default for OpenQaSection {
    fn default() -> Self {
        Self {
            url: "http://localhost".to_string(),
            api_key: None,
            important_group: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataSection {
    pub compose_base_url: String,
    pub releases_url: String,
}

impl Default for MetadataSection {
    fn default() -> Self {
        Self {
            compose_base_url: "https://kojipkgs.fedoraproject.org/compose".to_string(),
            releases_url: "https://bodhi.fedoraproject.org".to_string(),
        }
    }
}

/// Wiki reporting is disabled unless `url` is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WikiSection {
    pub url: Option<String>,
    pub token: Option<String>,
}

/// Result store reporting is disabled unless `url` is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultsDbSection {
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSection {
    pub attempts: u32,
    pub delay_seconds: u64,
}

impl Default for ReportSection {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay_seconds: 30,
        }
    }
}

/// Files replacing the built-in scheduling tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverrideSection {
    pub shapes: Option<PathBuf>,
    pub updates: Option<PathBuf>,
}

impl VigilConfig {
    /// Load from an explicit path, or from the default location if present.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    bail!("config file {} does not exist", path.display());
                }
                path.to_path_buf()
            }
            None => match Self::config_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Default configuration file path.
    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "vigil", "vigil")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = VigilConfig::parse("openqa:\n  url: https://openqa.example\n").unwrap();
        assert_eq!(config.openqa.url, "https://openqa.example");
        assert_eq!(config.openqa.important_group, 1);
        assert_eq!(config.report.attempts, 3);
        assert_eq!(config.report.delay_seconds, 30);
        assert!(config.wiki.url.is_none());
        assert!(config.overrides.shapes.is_none());
    }

    #[test]
    fn test_full_config() {
        let config = VigilConfig::parse(
            r#"
openqa:
  url: https://openqa.example
  api_key: abc
  important_group: 7
resultsdb:
  url: https://resultsdb.example
  username: bot
  password: hunter2
report:
  attempts: 5
  delay_seconds: 2
overrides:
  shapes: /etc/vigil/shapes.yaml
"#,
        )
        .unwrap();
        assert_eq!(config.openqa.api_key.as_deref(), Some("abc"));
        assert_eq!(config.openqa.important_group, 7);
        assert_eq!(config.resultsdb.username.as_deref(), Some("bot"));
        assert_eq!(config.report.attempts, 5);
        assert_eq!(config.overrides.shapes, Some(PathBuf::from("/etc/vigil/shapes.yaml")));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        assert!(VigilConfig::load(Some(Path::new("/nonexistent/vigil.yaml"))).is_err());
    }
}
