//! Per-job token substitution for test case templates.

use crate::job::JobRecord;
use crate::rules::TestCaseTemplate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([A-Z_]+)\$").expect("token pattern is valid"));

/// Architectures whose boot method is named after the architecture itself.
const SELF_BOOTING_ARCHES: [&str; 2] = ["aarch64", "ppc64le"];

/// Job facts a template may refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Fact {
    RunArch,
    Firmware,
    BootMethod,
    Subvariant,
    ImageType,
    Fs,
    Desktop,
}

impl Fact {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "RUNARCH" => Some(Fact::RunArch),
            "FIRMWARE" => Some(Fact::Firmware),
            "BOOTMETHOD" => Some(Fact::BootMethod),
            "SUBVARIANT" => Some(Fact::Subvariant),
            "IMAGETYPE" => Some(Fact::ImageType),
            "FS" => Some(Fact::Fs),
            "DESKTOP" => Some(Fact::Desktop),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Fact::RunArch => "RUNARCH",
            Fact::Firmware => "FIRMWARE",
            Fact::BootMethod => "BOOTMETHOD",
            Fact::Subvariant => "SUBVARIANT",
            Fact::ImageType => "IMAGETYPE",
            Fact::Fs => "FS",
            Fact::Desktop => "DESKTOP",
        }
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}$", self.token())
    }
}

/// Fact values derived from one job's settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFacts {
    values: BTreeMap<Fact, String>,
}

impl JobFacts {
    pub fn from_job(job: &JobRecord) -> Self {
        let arch = job.arch().to_string();
        let firmware = if SELF_BOOTING_ARCHES.contains(&arch.as_str()) {
            arch.clone()
        } else if job.setting("UEFI").is_some_and(|v| v != "0") {
            "UEFI".to_string()
        } else {
            "BIOS".to_string()
        };
        let bootmethod = if SELF_BOOTING_ARCHES.contains(&arch.as_str()) {
            arch.clone()
        } else {
            format!("{} {}", arch, firmware)
        };
        let subvariant = job.setting("SUBVARIANT").unwrap_or_default();
        let subvariant = subvariant.strip_suffix("_Base").unwrap_or(subvariant).to_string();
        let imagetype = match job.setting("IMAGETYPE").unwrap_or_default() {
            "boot" => "netinst".to_string(),
            other => other.to_string(),
        };
        let fs = job.test.rsplit('_').next().unwrap_or_default().to_string();
        let desktop = match job.setting("DESKTOP").unwrap_or_default() {
            "gnome" => "GNOME".to_string(),
            "kde" => "KDE".to_string(),
            other => other.to_string(),
        };

        let values = BTreeMap::from([
            (Fact::RunArch, arch),
            (Fact::Firmware, firmware),
            (Fact::BootMethod, bootmethod),
            (Fact::Subvariant, subvariant),
            (Fact::ImageType, imagetype),
            (Fact::Fs, fs),
            (Fact::Desktop, desktop),
        ]);
        Self { values }
    }

    pub fn with(mut self, fact: Fact, value: impl Into<String>) -> Self {
        self.values.insert(fact, value.into());
        self
    }

    pub fn value(&self, fact: Fact) -> Option<&str> {
        self.values.get(&fact).map(String::as_str)
    }

    /// Substitute every recognized token in a template.
    ///
    /// Returns a fresh copy; the shared template is never modified.
    pub fn substitute(&self, template: &TestCaseTemplate) -> TestCaseTemplate {
        TestCaseTemplate {
            testtype: self.substitute_str(&template.testtype),
            env: self.substitute_str(&template.env),
            section: template.section.as_deref().map(|s| self.substitute_str(s)),
            name: template.name.as_deref().map(|s| self.substitute_str(s)),
        }
    }

    /// Substitute tokens in a string. Unknown tokens are left untouched.
    pub fn substitute_str(&self, input: &str) -> String {
        TOKEN
            .replace_all(input, |caps: &regex::Captures| {
                let token = caps.get(1).map_or("", |m| m.as_str());
                match Fact::from_token(token).and_then(|fact| self.value(fact)) {
                    Some(value) => value.to_string(),
                    None => {
                        warn!(token = %token, "Unrecognized token left in test case template");
                        caps[0].to_string()
                    }
                }
            })
            .to_string()
    }
}
