//! Release-metadata adapter: productmd compose metadata and the release
//! state service.

use crate::http;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;
use vigil_core::artifact::{ComposeType, DiscoveredArtifact, Release};
use vigil_core::ports::ReleaseMetadata;
use vigil_core::{Error, Result};

const COMPOSEINFO: &str = "metadata/composeinfo.json";
const IMAGES: &str = "metadata/images.json";

#[derive(Debug, Clone)]
pub struct MetadataConfig {
    /// Compose ids resolve to `<compose_base_url>/<id>/compose`.
    pub compose_base_url: String,
    /// Release state service (Bodhi).
    pub releases_url: String,
}

pub struct ComposeMetadataClient {
    client: Client,
    compose_base_url: String,
    releases_url: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    payload: T,
}

#[derive(Debug, Deserialize)]
struct ComposeInfo {
    compose: ComposeHeader,
    release: ReleaseHeader,
    #[serde(default)]
    variants: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ComposeHeader {
    id: String,
    #[serde(rename = "type")]
    compose_type: String,
    #[serde(default)]
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseHeader {
    short: String,
    version: String,
}

#[derive(Debug, Deserialize)]
struct ImageManifest {
    /// variant -> arch -> images
    images: BTreeMap<String, BTreeMap<String, Vec<ImageEntry>>>,
}

#[derive(Debug, Deserialize)]
struct ImageEntry {
    arch: String,
    subvariant: String,
    #[serde(rename = "type")]
    image_type: String,
    format: String,
    path: String,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ReleaseList {
    releases: Vec<ReleaseEntry>,
}

#[derive(Debug, Deserialize)]
struct ReleaseEntry {
    version: String,
    #[serde(default)]
    branch: String,
    #[serde(default)]
    id_prefix: String,
}

impl ComposeMetadataClient {
    pub fn new(config: MetadataConfig) -> Result<Self> {
        Ok(Self {
            client: http::client()?,
            compose_base_url: http::base(&config.compose_base_url),
            releases_url: http::base(&config.releases_url),
        })
    }

    fn location_for(&self, locator: &str) -> String {
        if is_url(locator) {
            http::base(locator)
        } else {
            format!("{}/{}/compose", self.compose_base_url, locator)
        }
    }

    /// Fetch a metadata document; returns it with the URL it was served from.
    async fn fetch<T: for<'de> Deserialize<'de>>(&self, url: &str) -> Result<(T, Url)> {
        let response = self.client.get(url).send().await.map_err(http::transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::ReleaseNotFound(url.to_string()));
        }
        let response = http::check(response).await?;
        let served_from = response.url().clone();
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| Error::Serialization(format!("invalid metadata at {}: {}", url, e)))?;
        Ok((envelope.payload, served_from))
    }

    async fn releases(&self, state: &str) -> Result<Vec<ReleaseEntry>> {
        let url = format!("{}/releases/", self.releases_url);
        let list: ReleaseList = http::send_json(
            self.client
                .get(&url)
                .query(&[("state", state), ("rows_per_page", "100")]),
        )
        .await?;
        Ok(list
            .releases
            .into_iter()
            .filter(|r| r.id_prefix.is_empty() || r.id_prefix == "FEDORA")
            .collect())
    }

    async fn stable_versions(&self) -> Result<Vec<u32>> {
        let mut versions: Vec<u32> = self
            .releases("current")
            .await?
            .iter()
            .filter_map(|r| r.version.parse().ok())
            .collect();
        versions.sort_unstable();
        Ok(versions)
    }
}

fn is_url(locator: &str) -> bool {
    locator.starts_with("http://") || locator.starts_with("https://")
}

fn compose_type(value: &str) -> Option<ComposeType> {
    match value {
        "production" => Some(ComposeType::Production),
        "nightly" => Some(ComposeType::Nightly),
        "test" => Some(ComposeType::Test),
        _ => None,
    }
}

/// Milestone from a compose label (`Beta-1.2` is `Beta`), or from the type.
fn milestone(label: Option<&str>, compose_type: ComposeType) -> String {
    match label.and_then(|l| l.split('-').next()).filter(|m| !m.is_empty()) {
        Some(milestone) => milestone.to_string(),
        None => match compose_type {
            ComposeType::Production => "Production".to_string(),
            ComposeType::Nightly => "Nightly".to_string(),
            ComposeType::Test => "Test".to_string(),
        },
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn artifacts(location: &str, manifest: ImageManifest) -> Vec<DiscoveredArtifact> {
    let mut found = Vec::new();
    for (variant, arches) in manifest.images {
        for image in arches.into_values().flatten() {
            found.push(DiscoveredArtifact {
                arch: image.arch,
                subvariant: image.subvariant,
                image_type: image.image_type,
                format: image.format,
                variant: variant.clone(),
                url: format!("{}/{}", location, image.path.trim_start_matches('/')),
                extra: image
                    .extra
                    .iter()
                    .filter_map(|(k, v)| scalar(v).map(|v| (k.clone(), v)))
                    .collect(),
            });
        }
    }
    found
}

#[async_trait]
impl ReleaseMetadata for ComposeMetadataClient {
    async fn get_release(&self, locator: &str) -> Result<Release> {
        let location = self.location_for(locator);
        let (info, served_from): (ComposeInfo, Url) =
            self.fetch(&format!("{}/{}", location, COMPOSEINFO)).await?;

        if info.release.short != "Fedora" {
            return Err(Error::UnsupportedCompose(format!(
                "{} composes are not tested",
                info.release.short
            )));
        }
        let Some(kind) = compose_type(&info.compose.compose_type) else {
            return Err(Error::UnsupportedCompose(format!(
                "compose type {} is not tested",
                info.compose.compose_type
            )));
        };
        if !is_url(locator) && info.compose.id != locator {
            return Err(Error::UrlMismatch {
                requested: locator.to_string(),
                found: info.compose.id,
            });
        }

        let served = served_from.as_str();
        let location = served
            .strip_suffix(COMPOSEINFO)
            .map(http::base)
            .unwrap_or(location);

        let (manifest, _): (ImageManifest, Url) =
            self.fetch(&format!("{}/{}", location, IMAGES)).await?;
        let artifacts = artifacts(&location, manifest);
        debug!(compose = %info.compose.id, artifacts = artifacts.len(), "Compose metadata loaded");

        Ok(Release {
            milestone: milestone(info.compose.label.as_deref(), kind),
            compose_id: info.compose.id,
            version: info.release.version,
            label: info.compose.label,
            compose_type: kind,
            location,
            artifacts,
            has_installable_tree: info.variants.contains_key("Everything"),
        })
    }

    async fn current_release(&self) -> Result<u32> {
        self.stable_versions()
            .await?
            .last()
            .copied()
            .ok_or_else(|| Error::ReleaseNotFound("no current releases".to_string()))
    }

    async fn rawhide_release(&self) -> Result<u32> {
        self.releases("pending")
            .await?
            .iter()
            .filter(|r| r.branch == "rawhide")
            .find_map(|r| r.version.parse().ok())
            .ok_or_else(|| Error::ReleaseNotFound("no Rawhide release".to_string()))
    }

    async fn oldest_supported_release(&self) -> Result<u32> {
        self.stable_versions()
            .await?
            .first()
            .copied()
            .ok_or_else(|| Error::ReleaseNotFound("no current releases".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_milestone_from_label_or_type() {
        assert_eq!(milestone(Some("Beta-1.2"), ComposeType::Production), "Beta");
        assert_eq!(milestone(Some("RC-1.5"), ComposeType::Production), "RC");
        assert_eq!(milestone(None, ComposeType::Nightly), "Nightly");
    }

    #[test]
    fn test_artifacts_carry_variant_and_scalar_extras() {
        let manifest: ImageManifest = serde_json::from_value(serde_json::json!({
            "images": {
                "Server": {
                    "x86_64": [{
                        "arch": "x86_64",
                        "subvariant": "Server",
                        "type": "dvd",
                        "format": "iso",
                        "path": "Server/x86_64/iso/Fedora-Server-dvd-x86_64-41.iso",
                        "bootable": true,
                        "checksums": {"sha256": "abc"}
                    }]
                }
            }
        }))
        .unwrap();

        let found = artifacts("https://dl.example/compose", manifest);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].variant, "Server");
        assert_eq!(
            found[0].url,
            "https://dl.example/compose/Server/x86_64/iso/Fedora-Server-dvd-x86_64-41.iso"
        );
        assert_eq!(found[0].extra.get("bootable").map(String::as_str), Some("true"));
        assert!(!found[0].extra.contains_key("checksums"));
    }
}
