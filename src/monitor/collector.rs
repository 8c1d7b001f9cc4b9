//! Device inventory collector.
//!
//! Walks Performance Manager's device tree in a fixed order:
//!
//! 1. enumerate top-level devices, dropping the control-plane appliance
//! 2. ignore compute-fabric, network and storage devices
//! 3. expand every vCenter into its host systems
//! 4. fetch hardware identity for every device still in play
//! 5. name each device's CPU metric
//! 6. ignore later devices sharing a hardware UUID
//!
//! Devices are never removed once enumerated. Exclusion sets `ignore`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use super::policy::{self, DEVICE_ROOT, HOST_META_TYPE, ROUTER_ROOT, STANDALONE_HOST_SUFFIX};
use super::router::{Router, RouterClient};
use super::types::{
    ComponentList, DeviceList, GuestHostInfo, HostComponent, InfoEnvelope, StandaloneHostInfo,
};
use crate::domain::{DeviceInventory, DiscoveredUuid, MonitoredDevice};
use crate::error::{Error, Result};

const COMPONENT_KEYS: [&str; 7] = [
    "uid",
    "id",
    "title",
    "name",
    "hypervisorVersion",
    "totalMemory",
    "uuid",
];
const GUEST_INFO_KEYS: [&str; 5] = ["hardwareModel", "id", "hardwareUUID", "uuid", "hostname"];
const STANDALONE_INFO_KEYS: [&str; 6] = [
    "hardwareModel",
    "hardwareUUID",
    "hostname",
    "name",
    "hypervisorVersion",
    "device",
];

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the device collector
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Identity lookups in flight at once
    pub max_concurrent_details: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_details: 8,
        }
    }
}

/// Hardware identity reported for one device.
#[derive(Debug, Clone, Default)]
struct DeviceIdentity {
    hardware_uuid: String,
    model: Option<String>,
    name: Option<String>,
    hypervisor_name: String,
    hypervisor_version: Option<String>,
}

impl From<GuestHostInfo> for DeviceIdentity {
    fn from(info: GuestHostInfo) -> Self {
        let name = (!info.hostname.is_empty()).then(|| info.hostname.clone());
        Self {
            hardware_uuid: info.hardware_uuid.unwrap_or_default(),
            model: info.hardware_model,
            name,
            hypervisor_name: info.hostname,
            hypervisor_version: None,
        }
    }
}

impl From<StandaloneHostInfo> for DeviceIdentity {
    fn from(info: StandaloneHostInfo) -> Self {
        Self {
            hardware_uuid: info.hardware_uuid.unwrap_or_default(),
            model: info.hardware_model,
            name: info.device.map(|d| d.name).filter(|n| !n.is_empty()),
            hypervisor_name: info.name,
            hypervisor_version: Some(info.hypervisor_version),
        }
    }
}

// =============================================================================
// Collector
// =============================================================================

/// Collects monitored devices over one Performance Manager session.
pub struct DeviceCollector {
    router: Arc<RouterClient>,
    config: CollectorConfig,
}

impl DeviceCollector {
    pub fn new(router: Arc<RouterClient>, config: CollectorConfig) -> Self {
        Self { router, config }
    }

    pub fn router(&self) -> &Arc<RouterClient> {
        &self.router
    }

    /// List every device under the tree root.
    #[instrument(skip(self))]
    pub async fn enumerate_devices(&self) -> Result<Vec<MonitoredDevice>> {
        let list: Option<DeviceList> = self
            .router
            .call(
                ROUTER_ROOT,
                Router::Device,
                "getDevices",
                json!([{ "uid": DEVICE_ROOT }]),
            )
            .await?;

        let Some(list) = list else {
            return Err(Error::NoData(format!(
                "{} getDevices",
                self.router.url(ROUTER_ROOT)
            )));
        };

        let mut devices = Vec::with_capacity(list.devices.len());
        for summary in list.devices {
            if summary.uid.is_empty() {
                continue;
            }
            if policy::is_control_plane(&summary.python_class) {
                debug!(uid = %summary.uid, "Skipping control-plane appliance");
                continue;
            }

            let mut device = MonitoredDevice::top_level(&summary.uid, &summary.name);
            device.is_hypervisor_host = policy::is_hypervisor_manager(summary.os_model_name());
            if device.is_hypervisor_host {
                info!(uid = %device.uid, name = %device.name, "Found hypervisor manager");
            }
            devices.push(device);
        }

        info!(devices = devices.len(), "Enumerated monitored devices");
        Ok(devices)
    }

    async fn host_components(&self, uid: &str) -> Result<Vec<HostComponent>> {
        let list: Option<ComponentList> = self
            .router
            .call(
                uid,
                Router::Device,
                "getComponents",
                json!([{
                    "uid": uid,
                    "keys": COMPONENT_KEYS,
                    "meta_type": HOST_META_TYPE,
                    "sort": "name",
                    "dir": "ASC",
                }]),
            )
            .await?;
        Ok(list.map(|l| l.data).unwrap_or_default())
    }

    /// Append the hosts of every hypervisor manager and retire the manager.
    #[instrument(skip(self, devices))]
    pub async fn expand_hypervisors(&self, devices: &mut Vec<MonitoredDevice>) -> usize {
        let managers: Vec<String> = devices
            .iter()
            .filter(|d| d.is_hypervisor_host && !d.ignore)
            .map(|d| d.uid.clone())
            .collect();

        let expansions: Vec<(String, Vec<HostComponent>)> = stream::iter(managers)
            .map(|uid| async move {
                let components = match self.host_components(&uid).await {
                    Ok(components) => components,
                    Err(e) => {
                        warn!(uid = %uid, "Failed to list hosts: {}", e);
                        Vec::new()
                    }
                };
                (uid, components)
            })
            .buffered(self.config.max_concurrent_details.max(1))
            .collect()
            .await;

        let mut added = 0;
        for (uid, hosts) in expansions {
            if let Some(manager) = devices.iter_mut().find(|d| d.uid == uid) {
                manager.ignore = true;
            }

            for host in hosts {
                if host.uid.is_empty() {
                    continue;
                }
                let mut child = MonitoredDevice::guest_host(host.uid, host.name, host.hypervisor_version);
                if let Some(category) = policy::ignored_category(&child.uid) {
                    debug!(uid = %child.uid, category, "Ignoring host");
                    child.ignore = true;
                }
                debug!(parent = %uid, uid = %child.uid, name = %child.name, "Found host");
                devices.push(child);
                added += 1;
            }
        }

        info!(hosts = added, "Expanded hypervisor managers");
        added
    }

    async fn fetch_identity(&self, device: &MonitoredDevice) -> Result<Option<DeviceIdentity>> {
        if device.has_parent_hypervisor {
            let info: Option<InfoEnvelope<GuestHostInfo>> = self
                .router
                .call(
                    ROUTER_ROOT,
                    Router::Device,
                    "getInfo",
                    json!([{ "uid": device.uid, "keys": GUEST_INFO_KEYS }]),
                )
                .await?;
            return Ok(info.and_then(|i| i.data).map(DeviceIdentity::from));
        }

        if policy::is_vsphere_device(&device.uid) {
            let host_uid = format!("{}{}", device.uid, STANDALONE_HOST_SUFFIX);
            let info: Option<InfoEnvelope<StandaloneHostInfo>> = self
                .router
                .call(
                    &device.uid,
                    Router::Device,
                    "getInfo",
                    json!([{ "uid": host_uid, "keys": STANDALONE_INFO_KEYS }]),
                )
                .await?;
            return Ok(info.and_then(|i| i.data).map(DeviceIdentity::from));
        }

        Ok(None)
    }

    /// Fill in hardware identity for every device still in play.
    ///
    /// Devices without an answer, or answering with a blank UUID, are ignored.
    #[instrument(skip(self, devices))]
    pub async fn resolve_identities(&self, devices: &mut [MonitoredDevice]) {
        let targets: Vec<MonitoredDevice> = devices.iter().filter(|d| !d.ignore).cloned().collect();

        let answers: Vec<(String, Option<DeviceIdentity>)> = stream::iter(targets)
            .map(|device| async move {
                let identity = match self.fetch_identity(&device).await {
                    Ok(identity) => identity,
                    Err(e) => {
                        warn!(uid = %device.uid, "Identity lookup failed: {}", e);
                        None
                    }
                };
                (device.uid, identity)
            })
            .buffer_unordered(self.config.max_concurrent_details.max(1))
            .collect()
            .await;

        let mut by_uid: HashMap<String, Option<DeviceIdentity>> = HashMap::new();
        for (uid, identity) in answers {
            by_uid.entry(uid).or_insert(identity);
        }

        for device in devices.iter_mut().filter(|d| !d.ignore) {
            match by_uid.get(&device.uid).cloned().flatten() {
                Some(identity) => apply_identity(device, identity),
                None => {
                    debug!(uid = %device.uid, "No hardware identity, ignoring");
                    device.ignore = true;
                }
            }
        }
    }
}

fn apply_identity(device: &mut MonitoredDevice, identity: DeviceIdentity) {
    let uuid = identity.hardware_uuid.trim();
    if uuid.is_empty() {
        debug!(uid = %device.uid, "Blank hardware UUID, ignoring");
        device.ignore = true;
        return;
    }

    device.hardware_uuid = Some(uuid.to_string());
    device.model = identity.model;
    if let Some(name) = identity.name {
        device.name = name;
    }
    device.hypervisor_name = identity.hypervisor_name;
    if let Some(version) = identity.hypervisor_version {
        device.hypervisor_version = version;
    }
    debug!(uid = %device.uid, uuid = ?device.hardware_uuid, "Resolved hardware identity");
}

#[async_trait]
impl DeviceInventory for DeviceCollector {
    async fn discover_devices(&self) -> Result<Vec<MonitoredDevice>> {
        let mut devices = self.enumerate_devices().await?;

        let policy_ignored = apply_ignore_policy(&mut devices);
        self.expand_hypervisors(&mut devices).await;
        self.resolve_identities(&mut devices).await;
        assign_metric_names(&mut devices);
        let duplicates = deduplicate(&mut devices);

        let retained = devices.iter().filter(|d| !d.ignore).count();
        info!(
            total = devices.len(),
            policy_ignored,
            duplicates,
            retained,
            last_tid = self.router.last_tid(),
            "Device inventory complete"
        );
        if !self.router.is_healthy() {
            warn!(
                base_url = %self.router.base_url(),
                "Performance Manager stopped answering, inventory may be incomplete"
            );
        }
        Ok(devices)
    }
}

// =============================================================================
// Arena passes
// =============================================================================

/// Ignore compute-fabric, network and storage devices. Returns how many
/// devices were newly ignored.
pub fn apply_ignore_policy(devices: &mut [MonitoredDevice]) -> usize {
    let mut count = 0;
    for device in devices.iter_mut().filter(|d| !d.ignore) {
        if let Some(category) = policy::ignored_category(&device.uid) {
            debug!(uid = %device.uid, category, "Ignoring device");
            device.ignore = true;
            count += 1;
        }
    }
    info!(ignored = count, "Applied ignore policy");
    count
}

/// Name the CPU metric of every device still in play.
pub fn assign_metric_names(devices: &mut [MonitoredDevice]) {
    for device in devices.iter_mut().filter(|d| !d.ignore) {
        device.metric_name = policy::metric_name(&device.uid, &device.name, &device.hypervisor_name);
    }
}

/// Ignore every device whose hardware UUID was already seen.
///
/// The first device in arena order keeps the UUID. Returns the number of
/// devices newly ignored.
pub fn deduplicate(devices: &mut [MonitoredDevice]) -> usize {
    let mut seen: HashSet<String> = HashSet::new();
    let mut dropped = 0;

    for device in devices.iter_mut().filter(|d| !d.ignore) {
        let Some(uuid) = device.correlation_uuid().map(|u| u.trim().to_string()) else {
            continue;
        };
        if !seen.insert(uuid) {
            debug!(uid = %device.uid, uuid = ?device.hardware_uuid, "Duplicate hardware UUID, ignoring");
            device.ignore = true;
            dropped += 1;
        }
    }
    dropped
}

/// UUIDs of the retained devices, in arena order.
pub fn discovered_uuids(devices: &[MonitoredDevice]) -> Vec<DiscoveredUuid> {
    devices
        .iter()
        .filter(|d| !d.ignore)
        .filter_map(DiscoveredUuid::from_device)
        .collect()
}
