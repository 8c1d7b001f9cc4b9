//! Inventory Data Model
//!
//! Value objects shared by the hardware collector, the device collector,
//! the reconciliation engine and the report assembler.
//!
//! Attributes the UCS Manager API omits are held as `None` and only turn
//! into the [`UNKNOWN`] sentinel when a record is serialized.

use serde::{Deserialize, Serialize, Serializer};

/// Text written in place of an attribute the remote side did not report.
pub const UNKNOWN: &str = "unknown";

// =============================================================================
// Credentials
// =============================================================================

/// Resolved, decrypted login for one remote endpoint.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct Credential {
    /// Host name, IP address or URL
    pub address: String,
    /// Login name
    pub username: String,
    /// Plain-text password
    pub password: String,
}

/// Login for one UCS Manager domain.
pub type DomainCredential = Credential;

/// Login for the UCS Performance Manager instance.
pub type MonitorCredential = Credential;

impl Credential {
    pub fn new(
        address: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

// =============================================================================
// Server Record (UCS Manager side)
// =============================================================================

/// One physical compute element discovered in a UCS domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerRecord {
    /// Distinguished name inside the domain, e.g. `sys/chassis-1/blade-3`
    pub dn: String,
    #[serde(serialize_with = "or_unknown")]
    pub name: Option<String>,
    #[serde(serialize_with = "or_unknown")]
    pub model: Option<String>,
    #[serde(serialize_with = "or_unknown")]
    pub part_number: Option<String>,
    #[serde(serialize_with = "or_unknown")]
    pub serial: Option<String>,
    /// Primary hardware UUID
    #[serde(serialize_with = "or_unknown")]
    pub uuid: Option<String>,
    /// UUID burned in at manufacture, reported as `originalUuid`
    #[serde(serialize_with = "or_unknown")]
    pub original_uuid: Option<String>,
    /// Already formatted, e.g. `Chassis: 1 | Blade: 3`
    #[serde(serialize_with = "or_unknown")]
    pub position: Option<String>,
    #[serde(serialize_with = "or_unknown")]
    pub description: Option<String>,
    /// Name of the owning UCS domain (`topSystem`)
    pub domain_name: String,
    /// Firmware version reported at login
    pub domain_version: String,
}

impl ServerRecord {
    /// Check whether `candidate` is this server's primary or original UUID.
    ///
    /// Blank candidates and the literal sentinel never match.
    pub fn matches_uuid(&self, candidate: &str) -> bool {
        if !is_real_uuid(candidate) {
            return false;
        }
        self.uuid.as_deref() == Some(candidate) || self.original_uuid.as_deref() == Some(candidate)
    }
}

/// A UUID that can take part in matching.
pub fn is_real_uuid(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !value.eq_ignore_ascii_case(UNKNOWN)
}

/// Render an optional attribute, substituting the sentinel.
pub fn display_or_unknown(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or(UNKNOWN)
}

fn or_unknown<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(display_or_unknown(value))
}

// =============================================================================
// Monitored Device (Performance Manager side)
// =============================================================================

/// One device known to UCS Performance Manager.
///
/// Devices live in an arena: excluding one sets `ignore` instead of
/// removing it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MonitoredDevice {
    /// Hierarchical object path, e.g. `/zport/dmd/Devices/vSphere/devices/vc01`
    pub uid: String,
    pub name: String,
    pub hardware_uuid: Option<String>,
    pub model: Option<String>,
    pub is_hypervisor_host: bool,
    pub hypervisor_name: String,
    pub hypervisor_version: String,
    /// Host synthesised from a vCenter's component list
    pub has_parent_hypervisor: bool,
    /// CPU utilisation metric name used for performance queries
    pub metric_name: String,
    pub ignore: bool,
}

impl MonitoredDevice {
    /// Top-level device returned by the device tree enumeration.
    pub fn top_level(uid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Host found underneath a hypervisor manager.
    pub fn guest_host(
        uid: impl Into<String>,
        name: impl Into<String>,
        hypervisor_version: impl Into<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            hypervisor_version: hypervisor_version.into(),
            has_parent_hypervisor: true,
            ..Default::default()
        }
    }

    /// The hardware UUID, if one was reported and is usable.
    pub fn correlation_uuid(&self) -> Option<&str> {
        self.hardware_uuid.as_deref().filter(|u| is_real_uuid(u))
    }

    /// Still a candidate for correlation.
    pub fn is_candidate(&self) -> bool {
        !self.ignore && self.correlation_uuid().is_some()
    }
}

/// A UUID handed to the reconciliation engine.
///
/// `device` is absent when the UUID was read back from a file written by
/// an earlier device-inventory run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredUuid {
    pub uuid: String,
    pub device: Option<MonitoredDevice>,
}

impl DiscoveredUuid {
    pub fn from_device(device: &MonitoredDevice) -> Option<Self> {
        device.correlation_uuid().map(|uuid| Self {
            uuid: uuid.to_string(),
            device: Some(device.clone()),
        })
    }
}

impl From<String> for DiscoveredUuid {
    fn from(uuid: String) -> Self {
        Self { uuid, device: None }
    }
}

impl From<&str> for DiscoveredUuid {
    fn from(uuid: &str) -> Self {
        Self::from(uuid.to_string())
    }
}

// =============================================================================
// Reconciled Record
// =============================================================================

/// Outcome of correlating one UUID across both systems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciledRecord {
    /// The UUID both sides agreed on (or the unmatched device UUID)
    pub uuid: String,
    pub server: Option<ServerRecord>,
    pub device: Option<MonitoredDevice>,
    /// Correlated to a UCS Manager hardware record
    pub is_managed: bool,
}

impl ReconciledRecord {
    pub fn managed(
        uuid: impl Into<String>,
        server: ServerRecord,
        device: Option<MonitoredDevice>,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            server: Some(server),
            device,
            is_managed: true,
        }
    }

    pub fn unmanaged(uuid: impl Into<String>, device: MonitoredDevice) -> Self {
        Self {
            uuid: uuid.into(),
            server: None,
            device: Some(device),
            is_managed: false,
        }
    }
}
