//! Declarative rule tables.
//!
//! Test suite rules map a finished job to the external test cases it
//! certifies; test case templates describe where a result lands in the
//! matrix. Tables are parsed once into a [`RuleBook`] and shared read-only.

use crate::catalogue::{ShapeCatalogue, UpdatePolicy};
use crate::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

const BUILTIN_SHAPES: &str = include_str!("../data/shapes.yaml");
const BUILTIN_UPDATES: &str = include_str!("../data/updates.yaml");
const BUILTIN_SUITES: &str = include_str!("../data/suites.yaml");
const BUILTIN_TESTCASES: &str = include_str!("../data/testcases.yaml");

/// What a test suite certifies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TestSuiteRule {
    /// Every test case is certified by an overall pass.
    Flat(BTreeSet<String>),
    /// Each test case carries its own conditions.
    Conditional(BTreeMap<String, CaseConditions>),
}

impl TestSuiteRule {
    pub fn testcases(&self) -> Vec<&str> {
        match self {
            TestSuiteRule::Flat(cases) => cases.iter().map(String::as_str).collect(),
            TestSuiteRule::Conditional(cases) => cases.keys().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CaseConditions {
    /// Sub-steps that must each pass; replaces the overall outcome check.
    #[serde(default)]
    pub modules: Vec<String>,
    /// Companion suites that must have passed for the same build, machine and flavor.
    #[serde(default)]
    pub suites: Vec<String>,
}

/// Matrix placement of a test case; fields may contain `$TOKEN$` markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TestCaseTemplate {
    pub testtype: String,
    pub env: String,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// An additional test case certified by a suite under specific settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExtraCase {
    pub suite: String,
    /// Job settings that must all be equal.
    pub when: BTreeMap<String, String>,
    pub testcase: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SuiteTable {
    /// Subvariants never reported to the wiki.
    #[serde(default)]
    pub wiki_excluded_subvariants: Vec<String>,
    /// Rules are written as `flat:` or `conditional:` maps, not YAML tags.
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    #[schemars(with = "BTreeMap<String, TestSuiteRule>")]
    pub suites: BTreeMap<String, TestSuiteRule>,
    #[serde(default)]
    pub extras: Vec<ExtraCase>,
}

/// Rule tables addressed by the `schema` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleTable {
    Shapes,
    Updates,
    Suites,
    Testcases,
}

impl RuleTable {
    /// JSON schema for override files of this table.
    pub fn schema(&self) -> serde_json::Value {
        let schema = match self {
            RuleTable::Shapes => schemars::schema_for!(ShapeCatalogue),
            RuleTable::Updates => schemars::schema_for!(UpdatePolicy),
            RuleTable::Suites => schemars::schema_for!(SuiteTable),
            RuleTable::Testcases => schemars::schema_for!(BTreeMap<String, TestCaseTemplate>),
        };
        serde_json::to_value(schema).unwrap_or_default()
    }
}

impl std::str::FromStr for RuleTable {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "shapes" => Ok(RuleTable::Shapes),
            "updates" => Ok(RuleTable::Updates),
            "suites" => Ok(RuleTable::Suites),
            "testcases" => Ok(RuleTable::Testcases),
            other => Err(Error::InvalidRules(format!("unknown rule table: {}", other))),
        }
    }
}

/// All process-wide rule tables.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleBook {
    pub shapes: ShapeCatalogue,
    pub updates: UpdatePolicy,
    pub suites: SuiteTable,
    pub testcases: BTreeMap<String, TestCaseTemplate>,
}

impl RuleBook {
    /// The built-in tables.
    pub fn builtin() -> Result<Self> {
        Self::from_sources(BUILTIN_SHAPES, BUILTIN_UPDATES, BUILTIN_SUITES, BUILTIN_TESTCASES)
    }

    pub fn from_sources(
        shapes: &str,
        updates: &str,
        suites: &str,
        testcases: &str,
    ) -> Result<Self> {
        Ok(Self {
            shapes: parse("shapes", shapes)?,
            updates: parse("updates", updates)?,
            suites: parse("suites", suites)?,
            testcases: parse("testcases", testcases)?,
        })
    }

    /// Replace the shape catalogue with the contents of a YAML file.
    pub fn with_shapes_file(mut self, path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Loading shape catalogue override");
        self.shapes = parse("shapes", &std::fs::read_to_string(path)?)?;
        Ok(self)
    }

    /// Replace the update policy with the contents of a YAML file.
    pub fn with_updates_file(mut self, path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Loading update policy override");
        self.updates = parse("updates", &std::fs::read_to_string(path)?)?;
        Ok(self)
    }

    pub fn suite(&self, name: &str) -> Option<&TestSuiteRule> {
        self.suites.suites.get(name)
    }

    pub fn testcase(&self, id: &str) -> Option<&TestCaseTemplate> {
        self.testcases.get(id)
    }

    pub fn extras_for<'a>(&'a self, suite: &'a str) -> impl Iterator<Item = &'a ExtraCase> + 'a {
        self.suites.extras.iter().filter(move |extra| extra.suite == suite)
    }

    pub fn is_wiki_excluded(&self, subvariant: &str) -> bool {
        self.suites
            .wiki_excluded_subvariants
            .iter()
            .any(|s| s == subvariant)
    }

    /// Consistency problems that silently drop results at report time.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (suite, rule) in &self.suites.suites {
            for testcase in rule.testcases() {
                if !self.testcases.contains_key(testcase) {
                    warnings.push(format!(
                        "suite {} references unknown test case {}",
                        suite, testcase
                    ));
                }
            }

            let TestSuiteRule::Conditional(cases) = rule else {
                continue;
            };
            for (testcase, conditions) in cases {
                for companion in &conditions.suites {
                    let reciprocal = match self.suite(companion) {
                        Some(TestSuiteRule::Conditional(other)) => other
                            .get(testcase)
                            .is_some_and(|c| c.suites.iter().any(|s| s == suite)),
                        _ => false,
                    };
                    if !reciprocal {
                        warnings.push(format!(
                            "suite {} needs {} for {} but {} has no matching entry",
                            suite, companion, testcase, companion
                        ));
                    }
                }
            }
        }

        for extra in &self.suites.extras {
            if !self.suites.suites.contains_key(&extra.suite) {
                warnings.push(format!(
                    "extra case {} names unknown suite {}",
                    extra.testcase, extra.suite
                ));
            }
            if !self.testcases.contains_key(&extra.testcase) {
                warnings.push(format!(
                    "extra case references unknown test case {}",
                    extra.testcase
                ));
            }
        }

        warnings
    }
}

fn parse<T: serde::de::DeserializeOwned>(table: &str, source: &str) -> Result<T> {
    serde_yaml::from_str(source).map_err(|e| Error::InvalidRules(format!("{}: {}", table, e)))
}
