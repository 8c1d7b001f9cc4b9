//! Property-Based Tests for Reconciliation
//!
//! # Test Properties
//!
//! 1. **Partition**: matched ∪ unmatched = discovered, and the two are disjoint
//! 2. **Sentinel**: servers without UUIDs never match, not even `"unknown"`
//! 3. **Idempotent dedup**: a second dedup pass changes nothing
//! 4. **Ignore policy**: fabric, network and storage devices never reach the output

#![cfg(test)]

use std::collections::HashSet;

use proptest::prelude::*;

use super::engine::{collapse_discovered, Reconciler};
use crate::domain::{DiscoveredUuid, MonitoredDevice, ServerRecord};
use crate::monitor::{apply_ignore_policy, deduplicate, discovered_uuids};

// =============================================================================
// Property Strategies
// =============================================================================

/// Small alphabet so collisions between the two sides are common.
fn uuid_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        8 => "[A-F]",
        1 => Just("unknown".to_string()),
        1 => Just(String::new()),
    ]
}

fn optional_uuid_strategy() -> impl Strategy<Value = Option<String>> {
    prop::option::of(uuid_strategy())
}

fn server_strategy() -> impl Strategy<Value = ServerRecord> {
    (0u32..1000, optional_uuid_strategy(), optional_uuid_strategy()).prop_map(
        |(slot, uuid, original_uuid)| ServerRecord {
            dn: format!("sys/rack-unit-{}", slot),
            name: None,
            model: None,
            part_number: None,
            serial: None,
            uuid,
            original_uuid,
            position: None,
            description: None,
            domain_name: "UCS".to_string(),
            domain_version: "4.0".to_string(),
        },
    )
}

fn uid_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,6}".prop_map(|n| format!("/zport/dmd/Devices/vSphere/devices/{}", n)),
        "[a-z]{1,6}".prop_map(|n| format!("/zport/dmd/Devices/Server/Linux/devices/{}", n)),
        "[a-z]{1,6}".prop_map(|n| format!("/zport/dmd/Devices/CiscoUCS/devices/{}", n)),
        "[a-z]{1,6}".prop_map(|n| format!("/zport/dmd/Devices/Network/Cisco/devices/{}", n)),
        "[a-z]{1,6}".prop_map(|n| format!("/zport/dmd/Devices/Storage/NetApp/devices/{}", n)),
    ]
}

fn device_strategy() -> impl Strategy<Value = MonitoredDevice> {
    (uid_strategy(), optional_uuid_strategy(), any::<bool>()).prop_map(|(uid, uuid, ignore)| {
        let mut device = MonitoredDevice::top_level(uid.clone(), uid);
        device.hardware_uuid = uuid;
        device.ignore = ignore;
        device
    })
}

// =============================================================================
// Reconciliation Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: every discovered UUID ends up matched or unmatched, never both.
    #[test]
    fn prop_matched_and_unmatched_partition_discovered(
        servers in prop::collection::vec(server_strategy(), 0..12),
        uuids in prop::collection::vec(uuid_strategy(), 0..12),
    ) {
        let discovered: Vec<DiscoveredUuid> = uuids.into_iter().map(DiscoveredUuid::from).collect();
        let expected: HashSet<String> = collapse_discovered(&discovered)
            .into_iter()
            .map(|d| d.uuid)
            .collect();

        let result = Reconciler::default().reconcile(&servers, &discovered);
        let matched: HashSet<String> = result.matched_uuids().into_iter().collect();
        let unmatched: HashSet<String> = result.unmatched.iter().cloned().collect();

        prop_assert_eq!(matched.len() + unmatched.len(), expected.len());
        prop_assert!(matched.is_disjoint(&unmatched));
        let union: HashSet<String> = matched.union(&unmatched).cloned().collect();
        prop_assert_eq!(union, expected);
    }

    /// Property: servers whose UUIDs are absent or the sentinel match nothing.
    #[test]
    fn prop_sentinel_servers_never_match(
        count in 1usize..6,
        uuids in prop::collection::vec(uuid_strategy(), 0..12),
        absent in any::<bool>(),
    ) {
        let value = if absent { None } else { Some("unknown".to_string()) };
        let servers: Vec<ServerRecord> = (0..count)
            .map(|i| ServerRecord {
                dn: format!("sys/chassis-1/blade-{}", i),
                name: None,
                model: None,
                part_number: None,
                serial: None,
                uuid: value.clone(),
                original_uuid: value.clone(),
                position: None,
                description: None,
                domain_name: "UCS".to_string(),
                domain_version: "4.0".to_string(),
            })
            .collect();

        let mut discovered: Vec<DiscoveredUuid> = uuids.into_iter().map(DiscoveredUuid::from).collect();
        discovered.push(DiscoveredUuid::from("unknown"));

        let result = Reconciler::default().reconcile(&servers, &discovered);
        prop_assert_eq!(result.managed_count(), 0);
    }
}

// =============================================================================
// Device Arena Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: dedup twice retains exactly what dedup once retained.
    #[test]
    fn prop_deduplicate_idempotent(
        devices in prop::collection::vec(device_strategy(), 0..20),
    ) {
        let mut once = devices;
        deduplicate(&mut once);
        let mut twice = once.clone();

        prop_assert_eq!(deduplicate(&mut twice), 0);
        prop_assert_eq!(twice, once);
    }

    /// Property: retained UUIDs are unique after dedup.
    #[test]
    fn prop_retained_uuids_unique(
        devices in prop::collection::vec(device_strategy(), 0..20),
    ) {
        let mut devices = devices;
        deduplicate(&mut devices);

        let uuids: Vec<String> = discovered_uuids(&devices).into_iter().map(|d| d.uuid).collect();
        let unique: HashSet<&String> = uuids.iter().collect();
        prop_assert_eq!(unique.len(), uuids.len());
    }

    /// Property: ignored device classes never reach matched or unmatched output.
    #[test]
    fn prop_ignored_categories_never_reported(
        devices in prop::collection::vec(device_strategy(), 0..20),
        servers in prop::collection::vec(server_strategy(), 0..8),
    ) {
        let mut devices = devices;
        apply_ignore_policy(&mut devices);
        deduplicate(&mut devices);

        let result = Reconciler::default().reconcile(&servers, &discovered_uuids(&devices));

        for record in &result.records {
            if let Some(device) = &record.device {
                prop_assert!(!device.uid.contains("/Devices/CiscoUCS/"));
                prop_assert!(!device.uid.contains("/Devices/Network/"));
                prop_assert!(!device.uid.contains("/Devices/Storage/"));
            }
        }

        let reported: HashSet<&str> = result
            .unmatched
            .iter()
            .map(String::as_str)
            .chain(result.records.iter().map(|r| r.uuid.as_str()))
            .collect();
        for device in devices.iter().filter(|d| d.ignore) {
            if let Some(uuid) = device.correlation_uuid() {
                let claimed_by_retained = devices
                    .iter()
                    .any(|d| !d.ignore && d.correlation_uuid() == Some(uuid));
                prop_assert!(claimed_by_retained || !reported.contains(uuid));
            }
        }
    }
}
