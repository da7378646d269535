//! Vigil Core
//!
//! Domain types, rule tables, token substitution and port traits shared by
//! the scheduling and result resolution engines. This crate performs no I/O
//! beyond reading rule override files.

pub mod artifact;
pub mod catalogue;
pub mod error;
pub mod ids;
pub mod job;
pub mod ports;
pub mod result;
pub mod rules;
pub mod substitution;

pub use error::{Error, Result};
pub use ids::*;
pub use rules::RuleBook;

/// Build label suffixes whose jobs are never reported.
pub const UNREPORTED_BUILD_SUFFIXES: [&str; 2] = ["-NOREPORT", "-EXPERIMENTAL"];

/// Whether results for a build label must never be reported.
pub fn is_unreported_build(build: &str) -> bool {
    UNREPORTED_BUILD_SUFFIXES
        .iter()
        .any(|suffix| build.ends_with(suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreported_builds() {
        assert!(is_unreported_build("Fedora-40-20240101.0-NOREPORT"));
        assert!(is_unreported_build("Update-FEDORA-2024-abc-EXPERIMENTAL"));
        assert!(!is_unreported_build("Fedora-40-20240101.0"));
    }
}
