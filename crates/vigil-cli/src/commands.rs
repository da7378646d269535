//! CLI command definitions.

use clap::{Args, Subcommand};
use vigil_core::JobId;
use vigil_core::rules::RuleTable;

#[derive(Subcommand)]
pub enum Commands {
    /// Schedule jobs for a compose
    Compose(ComposeArgs),

    /// Schedule jobs for an update advisory
    Update {
        /// Advisory id, e.g. FEDORA-2024-1a2b3c
        advisory: String,

        #[command(flatten)]
        args: UpdateArgs,
    },

    /// Schedule jobs for a scratch build task
    Task {
        /// Build system task id
        id: u64,

        #[command(flatten)]
        args: UpdateArgs,
    },

    /// Schedule jobs for a side tag
    Tag {
        tag: String,

        #[command(flatten)]
        args: UpdateArgs,
    },

    /// Schedule jobs for a COPR project
    Copr {
        /// OWNER/PROJECT
        project: String,

        #[command(flatten)]
        args: UpdateArgs,
    },

    /// Report results for finished jobs
    Report {
        #[arg(required = true)]
        job_ids: Vec<JobId>,

        /// Compute results without submitting them
        #[arg(long)]
        inspect: bool,
    },

    /// Report results for the latest jobs of a build
    ReportBuild {
        build: String,

        /// Compute results without submitting them
        #[arg(long)]
        inspect: bool,
    },

    /// Check rule tables for inconsistencies
    CheckRules,

    /// Print the JSON schema of a rule table
    Schema {
        /// shapes, updates, suites or testcases
        table: RuleTable,
    },
}

#[derive(Args)]
pub struct ComposeArgs {
    /// Compose id or compose URL
    pub location: String,

    /// Only schedule these architectures
    #[arg(long = "arch")]
    pub arches: Vec<String>,

    /// Only schedule these flavors
    #[arg(long = "flavor")]
    pub flavors: Vec<String>,

    /// Schedule even if equivalent jobs exist
    #[arg(long)]
    pub force: bool,

    /// Installer updates image URL; results will not be reported
    #[arg(long)]
    pub updates_img: Option<String>,

    /// Extra job parameter as KEY=VALUE; results will not be reported
    #[arg(long = "param", value_parser = parse_param)]
    pub params: Vec<(String, String)>,
}

#[derive(Args)]
pub struct UpdateArgs {
    /// Release the update is for, a number or Rawhide
    #[arg(long)]
    pub release: String,

    /// Package contained in the update
    #[arg(long = "package")]
    pub packages: Vec<String>,

    /// Critical path classification tag
    #[arg(long = "critpath")]
    pub critpath: Vec<String>,

    /// Only schedule these flavors
    #[arg(long = "flavor")]
    pub flavors: Vec<String>,

    /// Only schedule these architectures
    #[arg(long = "arch")]
    pub arches: Vec<String>,

    /// Schedule even if equivalent jobs exist
    #[arg(long)]
    pub force: bool,
}

pub fn parse_param(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {}", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("GRUB=nomodeset=1").unwrap(),
            ("GRUB".to_string(), "nomodeset=1".to_string())
        );
        assert!(parse_param("=value").is_err());
        assert!(parse_param("novalue").is_err());
    }
}
