//! Result resolution and reporting for Vigil.
//!
//! [`Resolver`] decides which test cases a finished job certifies;
//! [`Reporter`] partitions jobs between the wiki matrix and the result
//! store and submits them with bounded retries.

pub mod report;
pub mod resolve;
pub mod retry;

pub use report::{ReportMode, ReportSummary, Reporter};
pub use resolve::Resolver;
pub use retry::RetryPolicy;
