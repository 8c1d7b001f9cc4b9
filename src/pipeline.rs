//! Run orchestration.
//!
//! ```text
//! full:      devices ──▶ discovered file ──▶ hardware ──▶ reconcile ──▶ reports
//! devices:   devices ──▶ discovered file
//! hardware:  discovered file ──▶ hardware ──▶ reconcile ──▶ reports
//! ```
//!
//! Collection is best-effort. Only output files and the discovered-UUID
//! input of a hardware run can fail a run.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::{
    DeviceInventory, DiscoveredUuid, HardwareCollection, HardwareInventory, MonitoredDevice,
};
use crate::error::{Error, Result};
use crate::monitor::{discovered_uuids, PerformanceExporter};
use crate::reconcile::Reconciler;
use crate::report::ReportWriter;

// =============================================================================
// Run Mode
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Devices, then hardware, then reports
    Full,
    /// Device inventory only
    Devices,
    /// Hardware against a saved device inventory
    Hardware,
}

impl FromStr for RunMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "full" | "all" => Ok(RunMode::Full),
            "devices" | "ucspm" => Ok(RunMode::Devices),
            "hardware" | "ucs" => Ok(RunMode::Hardware),
            other => Err(Error::Config(format!(
                "unknown run mode '{}', expected full, devices or hardware",
                other
            ))),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunMode::Full => "full",
            RunMode::Devices => "devices",
            RunMode::Hardware => "hardware",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Run Summary
// =============================================================================

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub domains_attempted: usize,
    pub domains_connected: usize,
    pub servers: usize,
    pub devices_discovered: usize,
    pub devices_ignored: usize,
    pub matched: usize,
    pub unmatched: usize,
    pub performance_reports: usize,
}

impl RunSummary {
    fn record_devices(&mut self, devices: &[MonitoredDevice]) {
        self.devices_discovered = devices.len();
        self.devices_ignored = devices.iter().filter(|d| d.ignore).count();
    }

    fn record_hardware(&mut self, collection: &HardwareCollection) {
        self.domains_attempted = collection.domains_attempted;
        self.domains_connected = collection.domains_connected;
        self.servers = collection.records.len();
    }

    fn log(&self, mode: RunMode) {
        info!(
            mode = %mode,
            domains_attempted = self.domains_attempted,
            domains_connected = self.domains_connected,
            servers = self.servers,
            devices_discovered = self.devices_discovered,
            devices_ignored = self.devices_ignored,
            matched = self.matched,
            unmatched = self.unmatched,
            performance_reports = self.performance_reports,
            "Run complete"
        );
    }
}

// =============================================================================
// Pipeline
// =============================================================================

pub struct Pipeline {
    reconciler: Reconciler,
    writer: ReportWriter,
    cancel: CancellationToken,
    performance: Option<PerformanceExporter>,
}

impl Pipeline {
    pub fn new(reconciler: Reconciler, writer: ReportWriter, cancel: CancellationToken) -> Self {
        Self {
            reconciler,
            writer,
            cancel,
            performance: None,
        }
    }

    /// Also export monthly CPU reports for managed hosts.
    pub fn with_performance(mut self, exporter: PerformanceExporter) -> Self {
        self.performance = Some(exporter);
        self
    }

    pub fn writer(&self) -> &ReportWriter {
        &self.writer
    }

    /// Device inventory, then hardware, then every report.
    pub async fn run_full(
        &self,
        devices: &dyn DeviceInventory,
        hardware: &dyn HardwareInventory,
    ) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let discovered = self.inventory_devices(devices, &mut summary).await?;
        self.reconcile_and_report(hardware, discovered, &mut summary)
            .await?;
        summary.log(RunMode::Full);
        Ok(summary)
    }

    /// Device inventory only. Writes the discovered-UUID file.
    pub async fn run_devices_only(&self, devices: &dyn DeviceInventory) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        self.inventory_devices(devices, &mut summary).await?;
        summary.log(RunMode::Devices);
        Ok(summary)
    }

    /// Hardware collection against the discovered-UUID file of an earlier run.
    pub async fn run_hardware_only(&self, hardware: &dyn HardwareInventory) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let discovered: Vec<DiscoveredUuid> = self
            .writer
            .read_discovered()
            .await?
            .into_iter()
            .map(DiscoveredUuid::from)
            .collect();
        info!(uuids = discovered.len(), "Loaded discovered UUIDs");

        self.reconcile_and_report(hardware, discovered, &mut summary)
            .await?;
        summary.log(RunMode::Hardware);
        Ok(summary)
    }

    async fn inventory_devices(
        &self,
        inventory: &dyn DeviceInventory,
        summary: &mut RunSummary,
    ) -> Result<Vec<DiscoveredUuid>> {
        let result = tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            result = inventory.discover_devices() => result,
        };

        let devices = match result {
            Ok(devices) => devices,
            Err(e) if e.is_recoverable() || matches!(e, Error::Cancelled) => {
                // keep the discovered file of the last good run
                warn!("Device inventory failed, continuing without devices: {}", e);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        summary.record_devices(&devices);

        let discovered = discovered_uuids(&devices);
        let uuids: Vec<String> = discovered.iter().map(|d| d.uuid.clone()).collect();
        self.writer.write_discovered(&uuids).await?;
        Ok(discovered)
    }

    async fn reconcile_and_report(
        &self,
        hardware: &dyn HardwareInventory,
        discovered: Vec<DiscoveredUuid>,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let collection = hardware.collect_servers(&self.cancel).await;
        summary.record_hardware(&collection);

        let reconciliation = self.reconciler.reconcile(&collection.records, &discovered);
        summary.matched = reconciliation.matched_uuids().len();
        summary.unmatched = reconciliation.unmatched.len();

        self.writer.write_report(&reconciliation.records).await?;
        self.writer
            .write_unmatched(&reconciliation.unmatched)
            .await?;
        self.writer.write_merged(&reconciliation.records).await?;

        if let Some(exporter) = &self.performance {
            if self.cancel.is_cancelled() {
                warn!("Run cancelled, skipping performance reports");
            } else {
                summary.performance_reports =
                    exporter.export(&reconciliation.records, &self.writer).await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ServerRecord;
    use crate::report::OutputConfig;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct FakeDevices(Vec<MonitoredDevice>);

    #[async_trait]
    impl DeviceInventory for FakeDevices {
        async fn discover_devices(&self) -> Result<Vec<MonitoredDevice>> {
            Ok(self.0.clone())
        }
    }

    struct UnreachableMonitor;

    #[async_trait]
    impl DeviceInventory for UnreachableMonitor {
        async fn discover_devices(&self) -> Result<Vec<MonitoredDevice>> {
            Err(Error::HttpStatus {
                endpoint: "https://ucspm.lab/zport/dmd/device_router".into(),
                status: 503,
            })
        }
    }

    struct FakeHardware(Vec<ServerRecord>);

    #[async_trait]
    impl HardwareInventory for FakeHardware {
        async fn collect_servers(&self, _cancel: &CancellationToken) -> HardwareCollection {
            HardwareCollection {
                records: self.0.clone(),
                domains_attempted: 2,
                domains_connected: 2,
            }
        }
    }

    fn device(name: &str, uuid: &str) -> MonitoredDevice {
        let mut d = MonitoredDevice::top_level(format!("/zport/dmd/Devices/vSphere/devices/{}", name), name);
        d.hardware_uuid = Some(uuid.to_string());
        d
    }

    fn server(dn: &str, uuid: &str) -> ServerRecord {
        ServerRecord {
            dn: dn.to_string(),
            name: None,
            model: None,
            part_number: None,
            serial: None,
            uuid: Some(uuid.to_string()),
            original_uuid: None,
            position: None,
            description: None,
            domain_name: "UCS".to_string(),
            domain_version: "4.0".to_string(),
        }
    }

    fn pipeline(dir: &TempDir) -> Pipeline {
        let writer = ReportWriter::new(OutputConfig {
            directory: dir.path().to_path_buf(),
            ..Default::default()
        });
        Pipeline::new(Reconciler::default(), writer, CancellationToken::new())
    }

    #[test]
    fn test_run_mode_parse() {
        assert_eq!("full".parse::<RunMode>().unwrap(), RunMode::Full);
        assert_eq!("Devices".parse::<RunMode>().unwrap(), RunMode::Devices);
        assert_eq!("ucs".parse::<RunMode>().unwrap(), RunMode::Hardware);
        assert!("sideways".parse::<RunMode>().is_err());
        assert_eq!(RunMode::Hardware.to_string(), "hardware");
    }

    #[tokio::test]
    async fn test_full_run() {
        let dir = TempDir::new().unwrap();
        let p = pipeline(&dir);

        let summary = p
            .run_full(
                &FakeDevices(vec![device("a", "A"), device("c", "C")]),
                &FakeHardware(vec![server("sys/rack-unit-1", "A"), server("sys/rack-unit-2", "B")]),
            )
            .await
            .unwrap();

        assert_eq!(summary.matched, 1);
        assert_eq!(summary.unmatched, 1);
        assert_eq!(summary.servers, 2);
        assert_eq!(summary.devices_discovered, 2);

        let csv = std::fs::read_to_string(dir.path().join("output.csv")).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(dir.path().join("merged-results.json").exists());

        let unmatched = std::fs::read_to_string(dir.path().join("unmatcheduuid.json")).unwrap();
        assert_eq!(crate::report::parse_uuid_list(&unmatched).unwrap(), vec!["C"]);
    }

    #[tokio::test]
    async fn test_devices_then_hardware_run() {
        let dir = TempDir::new().unwrap();
        let p = pipeline(&dir);

        p.run_devices_only(&FakeDevices(vec![device("a", "A")]))
            .await
            .unwrap();
        assert!(dir.path().join("matcheduuid.json").exists());
        assert!(!dir.path().join("output.csv").exists());

        let summary = p
            .run_hardware_only(&FakeHardware(vec![server("sys/rack-unit-1", "A")]))
            .await
            .unwrap();
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.unmatched, 0);
        assert!(!dir.path().join("unmatcheduuid.json").exists());
    }

    #[tokio::test]
    async fn test_hardware_run_without_inventory_file_fails() {
        let dir = TempDir::new().unwrap();
        let err = pipeline(&dir)
            .run_hardware_only(&FakeHardware(Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn test_unreachable_monitor_yields_empty_report() {
        let dir = TempDir::new().unwrap();
        let summary = pipeline(&dir)
            .run_full(
                &UnreachableMonitor,
                &FakeHardware(vec![server("sys/rack-unit-1", "A")]),
            )
            .await
            .unwrap();

        assert_eq!(summary.devices_discovered, 0);
        assert_eq!(summary.matched, 0);
        let csv = std::fs::read_to_string(dir.path().join("output.csv")).unwrap();
        assert_eq!(csv.lines().count(), 1);
        assert!(!dir.path().join("matcheduuid.json").exists());
    }

    #[tokio::test]
    async fn test_failed_inventory_keeps_discovered_file() {
        let dir = TempDir::new().unwrap();
        let p = pipeline(&dir);
        p.writer().write_discovered(&["A".to_string()]).await.unwrap();

        p.run_devices_only(&UnreachableMonitor).await.unwrap();
        assert_eq!(p.writer().read_discovered().await.unwrap(), vec!["A"]);
    }
}
