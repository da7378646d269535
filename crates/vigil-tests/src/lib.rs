//! Test infrastructure for Vigil.
//!
//! In-memory implementations of every port plus fixtures for releases and
//! job records, so both engines can be exercised without any service.
//!
//! # Usage
//!
//! ```ignore
//! use vigil_tests::{FakeExecution, JobFixture};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let api = FakeExecution::new();
//!     api.insert(JobFixture::new(1, "install_default").passed().build());
//! }
//! ```

pub mod fakes;
pub mod fixtures;

pub use fakes::*;
pub use fixtures::*;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("warn,vigil_scheduler=debug,vigil_results=debug")
        }))
        .with_test_writer()
        .try_init();
}
