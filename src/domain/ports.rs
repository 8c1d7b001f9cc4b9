//! Domain Ports (Port/Adapter Pattern)
//!
//! The two collectors are reached through these traits so the pipeline can
//! be driven by the real HTTP clients or by in-memory fakes.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Pipeline                            │
//! │     HardwareInventory            DeviceInventory            │
//! └─────────────────────────────────────────────────────────────┘
//!               │                           │
//!               ▼                           ▼
//! ┌──────────────────────────┐  ┌──────────────────────────────┐
//! │  UcsFleet (XML API)      │  │  DeviceCollector (routers)   │
//! └──────────────────────────┘  └──────────────────────────────┘
//! ```

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::model::{MonitoredDevice, ServerRecord};
use crate::error::Result;

// =============================================================================
// Hardware Inventory Port
// =============================================================================

/// Server records gathered across every configured domain.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HardwareCollection {
    /// Flat list across all domains, in domain order
    pub records: Vec<ServerRecord>,
    pub domains_attempted: usize,
    pub domains_connected: usize,
}

/// Port for enumerating physical servers.
///
/// Implementations are best-effort: a domain that cannot be reached is
/// logged and skipped, never reported as an error.
#[async_trait]
pub trait HardwareInventory: Send + Sync {
    /// Collect server records from every domain, stopping early on cancellation.
    async fn collect_servers(&self, cancel: &CancellationToken) -> HardwareCollection;
}

// =============================================================================
// Device Inventory Port
// =============================================================================

/// Port for enumerating monitored devices.
#[async_trait]
pub trait DeviceInventory: Send + Sync {
    /// Enumerate, expand, enrich and deduplicate devices.
    ///
    /// Returns the whole arena, ignored devices included.
    async fn discover_devices(&self) -> Result<Vec<MonitoredDevice>>;
}
