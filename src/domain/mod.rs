//! Domain Layer
//!
//! Data model and the ports the collectors are reached through.
//!
//! - **Model** (`model.rs`) - credentials, server records, monitored devices,
//!   reconciled records
//! - **Ports** (`ports.rs`) - `HardwareInventory` and `DeviceInventory` traits

pub mod model;
pub mod ports;

pub use model::{
    Credential, DiscoveredUuid, DomainCredential, MonitorCredential, MonitoredDevice,
    ReconciledRecord, ServerRecord, UNKNOWN,
};
pub use ports::{DeviceInventory, HardwareCollection, HardwareInventory};
