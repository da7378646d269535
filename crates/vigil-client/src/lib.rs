//! HTTP adapters implementing the Vigil ports.
//!
//! Every adapter maps transport failures and 5xx responses to
//! `Error::Network` (retryable), 401/403 to `Error::AuthenticationFailed`,
//! and anything else unexpected to `Error::Api`.

mod http;
pub mod metadata;
pub mod openqa;
pub mod resultsdb;
pub mod wiki;

pub use metadata::{ComposeMetadataClient, MetadataConfig};
pub use openqa::{OpenQaClient, OpenQaConfig};
pub use resultsdb::{ResultsDbClient, ResultsDbConfig};
pub use wiki::{WikiClient, WikiConfig};
