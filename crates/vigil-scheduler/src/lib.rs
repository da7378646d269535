//! Artifact selection and test scheduling for Vigil.
//!
//! Compose triggers go through the [`selector::ArtifactSelector`]; update,
//! task, tag and COPR triggers are driven by the update policy. Both submit
//! through the [`guard::DuplicateGuard`].

pub mod compose;
pub mod guard;
pub mod releases;
pub mod selector;
pub mod updates;

use serde::Serialize;
use vigil_core::JobId;

pub use compose::{ComposePlan, ComposeScheduler, ComposeTrigger};
pub use guard::DuplicateGuard;
pub use selector::{ArtifactSelector, SelectionFilter};
pub use updates::{UpdateScheduler, UpdateTarget, UpdateTrigger};

/// Jobs created by one scheduling run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScheduleOutcome {
    /// Build label; empty when nothing was scheduled for an unsupported compose.
    pub build: String,
    pub jobs: Vec<JobId>,
}
