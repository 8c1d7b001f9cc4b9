//! Typed decoding of Performance Manager responses.
//!
//! Fields the server leaves out or sends as `null` decode to their default,
//! so a sparse answer never fails the whole call.

use serde::{Deserialize, Deserializer};

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// `{"result": ...}` wrapper around every router answer
#[derive(Debug, Deserialize)]
pub struct RouterResponse<T> {
    #[serde(default = "Option::default")]
    pub result: Option<T>,
}

/// Reference object carrying only a display name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedRef {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
}

// =============================================================================
// DeviceRouter.getDevices
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct DeviceList {
    #[serde(default)]
    pub devices: Vec<DeviceSummary>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceSummary {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub uid: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(rename = "pythonClass", default, deserialize_with = "null_as_empty")]
    pub python_class: String,
    #[serde(rename = "osModel", default)]
    pub os_model: Option<NamedRef>,
}

impl DeviceSummary {
    pub fn os_model_name(&self) -> &str {
        self.os_model.as_ref().map(|m| m.name.as_str()).unwrap_or("")
    }
}

// =============================================================================
// DeviceRouter.getComponents
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ComponentList {
    #[serde(default)]
    pub data: Vec<HostComponent>,
}

/// Host system listed under a vCenter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostComponent {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub uid: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(rename = "hypervisorVersion", default, deserialize_with = "null_as_empty")]
    pub hypervisor_version: String,
}

// =============================================================================
// DeviceRouter.getInfo
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct InfoEnvelope<T> {
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

/// Identity of a host found under a vCenter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GuestHostInfo {
    #[serde(rename = "hardwareUUID", default)]
    pub hardware_uuid: Option<String>,
    #[serde(rename = "hardwareModel", default)]
    pub hardware_model: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub hostname: String,
}

/// Identity of a standalone ESXi host.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StandaloneHostInfo {
    #[serde(rename = "hardwareUUID", default)]
    pub hardware_uuid: Option<String>,
    #[serde(rename = "hardwareModel", default)]
    pub hardware_model: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(rename = "hypervisorVersion", default, deserialize_with = "null_as_empty")]
    pub hypervisor_version: String,
    #[serde(default)]
    pub device: Option<NamedRef>,
}

// =============================================================================
// Performance query API
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct PerformanceResponse {
    #[serde(default)]
    pub results: Vec<PerformanceSeries>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PerformanceSeries {
    #[serde(default)]
    pub datapoints: Vec<Datapoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Datapoint {
    pub timestamp: f64,
    #[serde(default)]
    pub value: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_device_list() {
        let body = r#"{"uuid":"x","action":"DeviceRouter","result":{"devices":[
            {"uid":"/zport/dmd/Devices/vSphere/devices/vc01","name":"vc01","pythonClass":"ZenPacks.zenoss.vSphere.Endpoint","osModel":{"name":"VMware vCenter Server 6.5"}},
            {"uid":"/zport/dmd/Devices/Server/Linux/devices/db1","name":"db1","pythonClass":null,"osModel":null}
        ],"totalCount":2,"success":true},"tid":1,"type":"rpc","method":"getDevices"}"#;

        let response: RouterResponse<DeviceList> = serde_json::from_str(body).unwrap();
        let devices = response.result.unwrap().devices;

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].os_model_name(), "VMware vCenter Server 6.5");
        assert_eq!(devices[1].python_class, "");
        assert_eq!(devices[1].os_model_name(), "");
    }

    #[test]
    fn test_decode_missing_result() {
        let response: RouterResponse<DeviceList> =
            serde_json::from_str(r#"{"tid":3,"type":"exception"}"#).unwrap();
        assert!(response.result.is_none());
    }

    #[test]
    fn test_decode_guest_info() {
        let body = r#"{"result":{"data":{"hardwareUUID":"4c4c4544-0042","hardwareModel":"UCSB-B200-M4","hostname":"esx-01.lab"},"success":true}}"#;
        let response: RouterResponse<InfoEnvelope<GuestHostInfo>> =
            serde_json::from_str(body).unwrap();
        let info = response.result.unwrap().data.unwrap();

        assert_eq!(info.hardware_uuid.as_deref(), Some("4c4c4544-0042"));
        assert_eq!(info.hostname, "esx-01.lab");
    }

    #[test]
    fn test_decode_standalone_info() {
        let body = r#"{"result":{"data":{"hardwareUUID":"","name":"ha-host","hypervisorVersion":"6.0.0","device":{"name":"esx-standalone"}}}}"#;
        let response: RouterResponse<InfoEnvelope<StandaloneHostInfo>> =
            serde_json::from_str(body).unwrap();
        let info = response.result.unwrap().data.unwrap();

        assert_eq!(info.hardware_uuid.as_deref(), Some(""));
        assert!(info.hardware_model.is_none());
        assert_eq!(info.device.unwrap().name, "esx-standalone");
    }

    #[test]
    fn test_decode_performance() {
        let body = r#"{"results":[{"datapoints":[{"timestamp":1509494400,"value":12.5},{"timestamp":1509498000,"value":null}]}]}"#;
        let response: PerformanceResponse = serde_json::from_str(body).unwrap();
        let points = &response.results[0].datapoints;

        assert_eq!(points[0].value, Some(12.5));
        assert!(points[1].value.is_none());
    }
}
