//! UCS Reconcile - UCS Manager / UCS Performance Manager inventory reconciliation
//!
//! Collects physical servers from one or more UCS Manager domains over the
//! XML API, collects monitored hosts from UCS Performance Manager over its
//! JSON-RPC routers, and correlates the two by hardware UUID.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            Pipeline                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │   UcsFleet   │───▶│  Reconciler  │───▶│ ReportWriter │       │
//! │  │  (XML API)   │    │  (by UUID)   │    │ (CSV, JSON)  │       │
//! │  └──────────────┘    └──────────────┘    └──────────────┘       │
//! │  ┌──────────────┐           ▲                                   │
//! │  │DeviceCollector───────────┘                                   │
//! │  │  (routers)   │                                               │
//! │  └──────────────┘                                               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`config`] - Run file and credential resolution
//! - [`domain`] - Data model and collector ports
//! - [`error`] - Error types
//! - [`monitor`] - Performance Manager router client, device inventory, CPU export
//! - [`pipeline`] - Run modes
//! - [`reconcile`] - UUID correlation
//! - [`report`] - Output files
//! - [`ucs`] - UCS Manager XML codec, sessions and fleet collection

pub mod config;
pub mod domain;
pub mod error;
pub mod monitor;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod ucs;

// Re-export commonly used types
pub use config::RunConfig;
pub use domain::{DeviceInventory, HardwareInventory, MonitoredDevice, ServerRecord};
pub use error::{Error, Result};
pub use monitor::{DeviceCollector, PerformanceExporter, RouterClient};
pub use pipeline::{Pipeline, RunMode, RunSummary};
pub use reconcile::{ReconcileOptions, Reconciler};
pub use report::ReportWriter;
pub use ucs::UcsFleet;
