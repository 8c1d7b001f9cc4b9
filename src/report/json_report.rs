//! JSON artifacts: UUID lists and merged results.
//!
//! The UUID list (`{"uuids": [...]}`) is written for discovered and for
//! unmatched UUIDs, and read back as the input of a hardware-only run.

use serde::{Deserialize, Serialize};

use crate::domain::model::display_or_unknown;
use crate::domain::{ReconciledRecord, UNKNOWN};
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UuidList {
    #[serde(default)]
    pub uuids: Vec<String>,
}

pub fn render_uuid_list(uuids: &[String]) -> Result<String> {
    let list = UuidList {
        uuids: uuids.to_vec(),
    };
    Ok(serde_json::to_string_pretty(&list)?)
}

/// Parse a UUID list. Blank entries are dropped.
pub fn parse_uuid_list(text: &str) -> Result<Vec<String>> {
    let list: UuidList = serde_json::from_str(text)?;
    Ok(list
        .uuids
        .into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect())
}

// =============================================================================
// Merged results
// =============================================================================

#[derive(Debug, Serialize)]
struct MergedEntry<'a> {
    name: &'a str,
    description: &'a str,
    model: &'a str,
    serial: &'a str,
    system: &'a str,
    position: &'a str,
    dn: &'a str,
    is_managed: bool,
    device_name: &'a str,
    uid: &'a str,
    metric_name: &'a str,
    uuid: &'a str,
}

#[derive(Debug, Serialize)]
struct MergedResults<'a> {
    results: Vec<MergedEntry<'a>>,
}

fn attr(value: Option<&Option<String>>) -> &str {
    value.map(display_or_unknown).unwrap_or(UNKNOWN)
}

impl<'a> From<&'a ReconciledRecord> for MergedEntry<'a> {
    fn from(record: &'a ReconciledRecord) -> Self {
        let server = record.server.as_ref();
        let device = record.device.as_ref();

        Self {
            name: attr(server.map(|s| &s.name)),
            description: attr(server.map(|s| &s.description)),
            model: attr(server.map(|s| &s.model)),
            serial: attr(server.map(|s| &s.serial)),
            system: server.map(|s| s.domain_name.as_str()).unwrap_or(UNKNOWN),
            position: attr(server.map(|s| &s.position)),
            dn: server.map(|s| s.dn.as_str()).unwrap_or(UNKNOWN),
            is_managed: record.is_managed,
            device_name: device.map(|d| d.name.as_str()).unwrap_or(""),
            uid: device.map(|d| d.uid.as_str()).unwrap_or(""),
            metric_name: device.map(|d| d.metric_name.as_str()).unwrap_or(""),
            uuid: &record.uuid,
        }
    }
}

/// `{"results": [...]}`, one entry per record.
pub fn render_merged(records: &[ReconciledRecord]) -> Result<String> {
    let merged = MergedResults {
        results: records.iter().map(MergedEntry::from).collect(),
    };
    Ok(serde_json::to_string_pretty(&merged)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MonitoredDevice, ServerRecord};
    use serde_json::Value;

    #[test]
    fn test_uuid_list_shape() {
        let json = render_uuid_list(&["C".to_string()]).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, serde_json::json!({ "uuids": ["C"] }));
    }

    #[test]
    fn test_parse_uuid_list() {
        let uuids = parse_uuid_list(r#"{"uuids": ["A", " B ", ""]}"#).unwrap();
        assert_eq!(uuids, vec!["A", "B"]);

        assert!(parse_uuid_list("{}").unwrap().is_empty());
        assert!(parse_uuid_list("[not json").is_err());
    }

    #[test]
    fn test_merged_entries() {
        let server = ServerRecord {
            dn: "sys/rack-unit-3".into(),
            name: Some("db-host".into()),
            model: Some("UCSC-C240-M4".into()),
            part_number: None,
            serial: Some("WZP1".into()),
            uuid: Some("A".into()),
            original_uuid: None,
            position: Some("3".into()),
            description: None,
            domain_name: "UCS-A".into(),
            domain_version: "3.1".into(),
        };
        let mut device = MonitoredDevice::guest_host("/uid/h1", "esx-1", "6.5");
        device.metric_name = "CPU_Utilization_-_-vSphere-vCenter_-_esx-1".into();
        let mut stray = MonitoredDevice::top_level("/uid/h2", "esx-2");
        stray.hardware_uuid = Some("Z".into());

        let records = vec![
            ReconciledRecord::managed("A", server, Some(device)),
            ReconciledRecord::unmanaged("Z", stray),
        ];
        let value: Value = serde_json::from_str(&render_merged(&records).unwrap()).unwrap();
        let results = value["results"].as_array().unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["name"], "db-host");
        assert_eq!(results[0]["description"], "unknown");
        assert_eq!(results[0]["system"], "UCS-A");
        assert_eq!(results[0]["is_managed"], true);
        assert_eq!(results[0]["device_name"], "esx-1");
        assert_eq!(results[1]["serial"], "unknown");
        assert_eq!(results[1]["is_managed"], false);
        assert_eq!(results[1]["uuid"], "Z");
    }
}
