//! UCS Performance Manager device inventory
//!
//! - **Router** (`router.rs`) - numbered JSON-RPC requests with Basic auth
//! - **Types** (`types.rs`) - typed response decoding
//! - **Policy** (`policy.rs`) - ignore rules, classification, metric naming
//! - **Collector** (`collector.rs`) - enumeration, expansion, identity, dedup
//! - **Performance** (`performance.rs`) - monthly CPU utilisation export

pub mod collector;
pub mod performance;
pub mod policy;
pub mod router;
pub mod types;

use std::time::Duration;

use reqwest::Client;

use crate::error::{Error, Result};

pub use collector::{
    apply_ignore_policy, deduplicate, discovered_uuids, CollectorConfig, DeviceCollector,
};
pub use performance::{PerformanceExporter, ReportPeriod};
pub use router::{Router, RouterClient};

/// HTTP client for Performance Manager. Its certificate is usually self-signed.
pub fn build_client(request_timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(request_timeout)
        .danger_accept_invalid_certs(true)
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))
}
