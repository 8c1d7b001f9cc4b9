//! Integration tests against mock UCS Manager and Performance Manager servers.
//!
//! - UCS Manager XML sessions and multi-domain collection
//! - Performance Manager router calls and device inventory
//! - End-to-end runs writing reports to a temporary directory

use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ucs_reconcile::domain::{Credential, DeviceInventory, HardwareInventory};
use ucs_reconcile::monitor::{self, CollectorConfig, ReportPeriod, Router};
use ucs_reconcile::report::{parse_uuid_list, OutputConfig};
use ucs_reconcile::ucs::{DomainSession, FleetConfig, SessionConfig, SessionState};
use ucs_reconcile::{
    DeviceCollector, Error, PerformanceExporter, Pipeline, Reconciler, ReportWriter,
    RouterClient, UcsFleet,
};

// =============================================================================
// Test Helpers
// =============================================================================

const VC_UID: &str = "/zport/dmd/Devices/vSphere/devices/vc1";
const UCS_UID: &str = "/zport/dmd/Devices/CiscoUCS/devices/ucs-a";

fn host_uid(name: &str) -> String {
    format!("{}/datacenters/dc1/hosts/{}", VC_UID, name)
}

fn login_ok(cookie: &str) -> String {
    format!(
        r#"<aaaLogin cookie="" response="yes" outCookie="{}" outRefreshPeriod="600" outPriv="admin" outVersion="4.0(1c)" outName="admin"> </aaaLogin>"#,
        cookie
    )
}

fn dn_list(dns: &[&str]) -> String {
    let entries: String = dns
        .iter()
        .map(|dn| format!(r#"<dn value="{}"/>"#, dn))
        .collect();
    format!(
        r#"<configFindDnsByClassId cookie="c" response="yes" classId="computeItem"><outDns>{}</outDns></configFindDnsByClassId>"#,
        entries
    )
}

fn rack_unit(dn: &str, uuid: &str, serial: &str) -> String {
    format!(
        r#"<configResolveDn dn="{dn}" cookie="c" response="yes"><outConfig><computeRackUnit dn="{dn}" name="" model="UCSC-C220-M4S" partNumber="" serial="{serial}" uuid="{uuid}" originalUuid="{uuid}" serverId="{id}" descr=""/></outConfig></configResolveDn>"#,
        dn = dn,
        uuid = uuid,
        serial = serial,
        id = dn.rsplit('-').next().unwrap_or("1"),
    )
}

fn top_system(name: &str) -> String {
    format!(
        r#"<configResolveClass cookie="c" response="yes" classId="topSystem"><outConfigs><topSystem dn="sys" name="{}" address="10.0.0.10"/></outConfigs></configResolveClass>"#,
        name
    )
}

async fn xml_reply(server: &MockServer, request: &str, body: String) {
    Mock::given(method("POST"))
        .and(path("/nuova"))
        .and(body_string_contains(request))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// A UCS domain with one rack unit per UUID.
async fn ucs_domain(system: &str, uuids: &[&str]) -> MockServer {
    let server = MockServer::start().await;
    let dns: Vec<String> = (1..=uuids.len())
        .map(|i| format!("sys/rack-unit-{}", i))
        .collect();
    let dn_refs: Vec<&str> = dns.iter().map(String::as_str).collect();

    xml_reply(&server, "aaaLogin", login_ok("1510000000/cookie")).await;
    xml_reply(&server, "configResolveClass", top_system(system)).await;
    xml_reply(&server, "configFindDnsByClassId", dn_list(&dn_refs)).await;
    for (dn, uuid) in dns.iter().zip(uuids) {
        xml_reply(
            &server,
            &format!(r#"dn="{}""#, dn),
            rack_unit(dn, uuid, &format!("SN-{}", uuid)),
        )
        .await;
    }
    xml_reply(
        &server,
        "aaaLogout",
        r#"<aaaLogout cookie="" response="yes" outStatus="success"> </aaaLogout>"#.to_string(),
    )
    .await;
    server
}

fn fleet(servers: &[&MockServer]) -> UcsFleet {
    let credentials = servers
        .iter()
        .map(|s| Credential::new(s.uri(), "admin", "password"))
        .collect();
    UcsFleet::new(credentials, FleetConfig::default()).unwrap()
}

async fn router_reply(server: &MockServer, at: &str, needle: &str, result: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(at))
        .and(body_string_contains(needle))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "tid": 1, "type": "rpc", "result": result })),
        )
        .mount(server)
        .await;
}

/// A Performance Manager with one vCenter, one hardware-uuid per host, and
/// a UCS compute fabric device that must never be queried.
async fn performance_manager(hosts: &[(&str, &str)]) -> MockServer {
    let server = MockServer::start().await;

    router_reply(
        &server,
        "/zport/dmd/device_router",
        "getDevices",
        json!({
            "devices": [
                { "uid": "/zport/dmd/Devices/ControlCenter/devices/cc", "name": "cc",
                  "pythonClass": "ZenPacks.zenoss.ControlCenter.ControlCenter" },
                { "uid": UCS_UID, "name": "ucs-a", "pythonClass": "ZenPacks.zenoss.UCS.UCSDevice" },
                { "uid": VC_UID, "name": "vc1", "pythonClass": "Products.ZenModel.Device",
                  "osModel": { "name": "VMware vCenter Server 6.5.0" } }
            ],
            "totalCount": 3
        }),
    )
    .await;

    let components: Vec<serde_json::Value> = hosts
        .iter()
        .map(|(name, _)| json!({ "uid": host_uid(name), "name": name, "hypervisorVersion": "6.5.0" }))
        .collect();
    router_reply(
        &server,
        &format!("{}/device_router", VC_UID),
        "getComponents",
        json!({ "data": components, "totalCount": hosts.len() }),
    )
    .await;

    for (name, uuid) in hosts {
        router_reply(
            &server,
            "/zport/dmd/device_router",
            &format!(r#""uid":"{}""#, host_uid(name)),
            json!({ "data": {
                "hardwareUUID": uuid,
                "hardwareModel": "UCSC-C220-M4S",
                "hostname": format!("{}.lab", name)
            }}),
        )
        .await;
    }
    server
}

fn collector(server: &MockServer) -> DeviceCollector {
    let client = monitor::build_client(std::time::Duration::from_secs(5)).unwrap();
    let router = RouterClient::new(client, &Credential::new(server.uri(), "admin", "zenoss"));
    DeviceCollector::new(Arc::new(router), CollectorConfig::default())
}

fn writer(dir: &TempDir) -> ReportWriter {
    ReportWriter::new(OutputConfig {
        directory: dir.path().to_path_buf(),
        ..Default::default()
    })
}

// =============================================================================
// UCS Manager Session Tests
// =============================================================================

mod session_tests {
    use super::*;

    #[tokio::test]
    async fn test_session_lifecycle() {
        let server = ucs_domain("UCS-LAB", &["A"]).await;
        let client = SessionConfig::default().build_client().unwrap();
        let mut session = DomainSession::new(client, Credential::new(server.uri(), "admin", "pw"));

        session.connect().await.unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(session.version(), "4.0(1c)");

        assert_eq!(session.fetch_server_name().await, "UCS-LAB");
        let dns = session.enumerate_servers().await.unwrap();
        assert_eq!(dns, vec!["sys/rack-unit-1"]);

        let record = session.describe_server(&dns[0]).await.unwrap().unwrap();
        assert_eq!(record.uuid.as_deref(), Some("A"));
        assert_eq!(record.serial.as_deref(), Some("SN-A"));
        assert_eq!(record.domain_name, "UCS-LAB");
        assert_eq!(record.domain_version, "4.0(1c)");

        assert!(session.disconnect().await);
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!session.has_cookie());
    }

    #[tokio::test]
    async fn test_login_refused() {
        let server = MockServer::start().await;
        xml_reply(
            &server,
            "aaaLogin",
            r#"<aaaLogin cookie="" response="yes" errorCode="551" errorDescr="Authentication failed"> </aaaLogin>"#
                .to_string(),
        )
        .await;

        let client = SessionConfig::default().build_client().unwrap();
        let mut session = DomainSession::new(client, Credential::new(server.uri(), "admin", "bad"));

        let err = session.connect().await.unwrap_err();
        assert_matches!(err, Error::Login { ref reason, .. } if reason == "Authentication failed");
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    /// Three rack units where the second answers with `second`.
    async fn domain_with_bad_second_unit(second: &str) -> MockServer {
        let server = MockServer::start().await;
        xml_reply(&server, "aaaLogin", login_ok("c1")).await;
        xml_reply(&server, "configResolveClass", top_system("UCS-T")).await;
        xml_reply(
            &server,
            "configFindDnsByClassId",
            dn_list(&["sys/rack-unit-1", "sys/rack-unit-2", "sys/rack-unit-3"]),
        )
        .await;
        xml_reply(&server, r#"dn="sys/rack-unit-1""#, rack_unit("sys/rack-unit-1", "U1", "S1")).await;
        xml_reply(&server, r#"dn="sys/rack-unit-2""#, second.to_string()).await;
        xml_reply(&server, r#"dn="sys/rack-unit-3""#, rack_unit("sys/rack-unit-3", "U3", "S3")).await;
        server
    }

    async fn collect(server: &MockServer) -> Vec<ucs_reconcile::ServerRecord> {
        let client = SessionConfig::default().build_client().unwrap();
        let mut session = DomainSession::new(client, Credential::new(server.uri(), "admin", "pw"));
        session.connect().await.unwrap();
        let records = session.collect_servers(&CancellationToken::new()).await.unwrap();
        assert_eq!(session.state(), SessionState::Active);
        records
    }

    #[tokio::test]
    async fn test_malformed_detail_skips_only_that_server() {
        let server = domain_with_bad_second_unit(
            r#"<configResolveDn dn="sys/rack-unit-2" cookie="c" response="yes"><outConfig><computeRackUnit uuid="U2""#,
        )
        .await;

        let records = collect(&server).await;
        let dns: Vec<_> = records.iter().map(|r| r.dn.as_str()).collect();
        assert_eq!(dns, vec!["sys/rack-unit-1", "sys/rack-unit-3"]);
        for record in &records {
            assert_eq!(record.domain_name, "UCS-T");
            assert_eq!(record.domain_version, "4.0(1c)");
        }
    }

    #[tokio::test]
    async fn test_refused_detail_is_reported_and_skipped() {
        let refused = r#"<configResolveDn dn="sys/rack-unit-2" cookie="c" response="yes" errorCode="552" invocationResult="unidentified-fail" errorDescr="Authorization required"> </configResolveDn>"#;
        let server = domain_with_bad_second_unit(refused).await;

        let records = collect(&server).await;
        let uuids: Vec<_> = records.iter().filter_map(|r| r.uuid.as_deref()).collect();
        assert_eq!(uuids, vec!["U1", "U3"]);

        let client = SessionConfig::default().build_client().unwrap();
        let mut session = DomainSession::new(client, Credential::new(server.uri(), "admin", "pw"));
        session.connect().await.unwrap();
        let err = session.describe_server("sys/rack-unit-2").await.unwrap_err();
        assert_matches!(
            err,
            Error::Protocol { ref code, ref reason, .. } if code == "552" && reason == "Authorization required"
        );
    }

    #[tokio::test]
    async fn test_http_error_fails_session() {
        let server = MockServer::start().await;
        xml_reply(&server, "aaaLogin", login_ok("c1")).await;
        Mock::given(method("POST"))
            .and(path("/nuova"))
            .and(body_string_contains("configFindDnsByClassId"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = SessionConfig::default().build_client().unwrap();
        let mut session = DomainSession::new(client, Credential::new(server.uri(), "admin", "pw"));
        session.connect().await.unwrap();

        let err = session.enumerate_servers().await.unwrap_err();
        assert_matches!(err, Error::HttpStatus { status: 503, .. });
        assert_eq!(session.state(), SessionState::Failed);
    }
}

// =============================================================================
// Fleet Tests
// =============================================================================

mod fleet_tests {
    use super::*;

    #[tokio::test]
    async fn test_failed_domain_does_not_block_others() {
        let refused = MockServer::start().await;
        xml_reply(
            &refused,
            "aaaLogin",
            r#"<aaaLogin cookie="" response="yes" errorCode="551" errorDescr="Authentication failed"> </aaaLogin>"#
                .to_string(),
        )
        .await;
        let healthy = ucs_domain("UCS-B", &["B1", "B2"]).await;

        let credentials = vec![
            Credential::new("http://127.0.0.1:1", "admin", "pw"),
            Credential::new(refused.uri(), "admin", "pw"),
            Credential::new(healthy.uri(), "admin", "pw"),
        ];
        let fleet = UcsFleet::new(credentials, FleetConfig::default()).unwrap();

        let collection = fleet.collect_servers(&CancellationToken::new()).await;
        assert_eq!(collection.domains_attempted, 3);
        assert_eq!(collection.domains_connected, 1);

        let uuids: Vec<_> = collection
            .records
            .iter()
            .filter_map(|r| r.uuid.as_deref())
            .collect();
        assert_eq!(uuids, vec!["B1", "B2"]);
        assert!(collection.records.iter().all(|r| r.domain_name == "UCS-B"));
    }

    #[tokio::test]
    async fn test_records_follow_configuration_order() {
        let a = ucs_domain("UCS-A", &["A"]).await;
        let b = ucs_domain("UCS-B", &["B"]).await;

        let collection = fleet(&[&b, &a]).collect_servers(&CancellationToken::new()).await;
        let systems: Vec<_> = collection.records.iter().map(|r| r.domain_name.as_str()).collect();
        assert_eq!(systems, vec!["UCS-B", "UCS-A"]);
    }

    #[tokio::test]
    async fn test_cancelled_run_collects_nothing() {
        let a = ucs_domain("UCS-A", &["A"]).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let collection = fleet(&[&a]).collect_servers(&cancel).await;
        assert!(collection.records.is_empty());
    }
}

// =============================================================================
// Performance Manager Tests
// =============================================================================

mod monitor_tests {
    use super::*;

    #[tokio::test]
    async fn test_tid_advances_on_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/zport/dmd/device_router"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = monitor::build_client(std::time::Duration::from_secs(5)).unwrap();
        let router = RouterClient::new(client, &Credential::new(server.uri(), "admin", "zenoss"));

        for expected in 1..=3u64 {
            let result: Option<serde_json::Value> = router
                .call("zport/dmd", Router::Device, "getDevices", json!([{}]))
                .await
                .unwrap();
            assert!(result.is_none());
            assert_eq!(router.last_tid(), expected);
        }
        assert!(router.is_healthy());
    }

    #[tokio::test]
    async fn test_router_sends_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/zport/dmd/device_router"))
            .and(header("authorization", "Basic YWRtaW46emVub3Nz"))
            .and(body_string_contains(r#""action":"DeviceRouter""#))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": { "devices": [] } })))
            .expect(1)
            .mount(&server)
            .await;

        let devices = collector(&server).discover_devices().await.unwrap();
        assert!(devices.is_empty());
    }

    #[tokio::test]
    async fn test_timed_out_identity_marks_router_unhealthy() {
        let server = MockServer::start().await;
        router_reply(
            &server,
            "/zport/dmd/device_router",
            "getDevices",
            json!({ "devices": [
                { "uid": "/zport/dmd/Devices/vSphere/devices/esx1", "name": "esx1" }
            ]}),
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/zport/dmd/Devices/vSphere/devices/esx1/device_router"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "result": { "data": { "hardwareUUID": "E1" } } }))
                    .set_delay(std::time::Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let client = monitor::build_client(std::time::Duration::from_millis(300)).unwrap();
        let router = Arc::new(RouterClient::new(
            client,
            &Credential::new(server.uri(), "admin", "zenoss"),
        ));
        let collector = DeviceCollector::new(router.clone(), CollectorConfig::default());

        let devices = collector.discover_devices().await.unwrap();
        assert!(devices[0].ignore);
        assert!(!router.is_healthy());
        assert_eq!(router.last_tid(), 2);
    }

    #[tokio::test]
    async fn test_compute_fabric_never_queried() {
        let server = performance_manager(&[("h1", "A")]).await;
        let devices = collector(&server).discover_devices().await.unwrap();

        let fabric = devices.iter().find(|d| d.uid == UCS_UID).unwrap();
        assert!(fabric.ignore);
        assert!(!devices.iter().any(|d| d.uid.contains("ControlCenter")));

        let requests = server.received_requests().await.unwrap();
        for request in requests {
            assert!(!request.url.path().contains("CiscoUCS"));
            assert!(!String::from_utf8_lossy(&request.body).contains("CiscoUCS"));
        }
    }

    #[tokio::test]
    async fn test_guest_host_identity() {
        let server = performance_manager(&[("h1", "A")]).await;
        let devices = collector(&server).discover_devices().await.unwrap();

        let vcenter = devices.iter().find(|d| d.uid == VC_UID).unwrap();
        assert!(vcenter.ignore);

        let host = devices.iter().find(|d| d.uid == host_uid("h1")).unwrap();
        assert!(!host.ignore);
        assert!(host.has_parent_hypervisor);
        assert_eq!(host.hardware_uuid.as_deref(), Some("A"));
        assert_eq!(host.name, "h1.lab");
        assert!(host.metric_name.starts_with("CPU_Utilization_-_-vSphere-vCenter_-_"));
    }

    #[tokio::test]
    async fn test_shared_uuid_keeps_first_device() {
        let server = performance_manager(&[("h1", "X"), ("h2", "X"), ("h3", "Y")]).await;
        let devices = collector(&server).discover_devices().await.unwrap();

        let holders: Vec<_> = devices
            .iter()
            .filter(|d| !d.ignore && d.hardware_uuid.as_deref() == Some("X"))
            .collect();
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].uid, host_uid("h1"));

        let second = devices.iter().find(|d| d.uid == host_uid("h2")).unwrap();
        assert!(second.ignore);
    }

    #[tokio::test]
    async fn test_standalone_hosts() {
        let server = MockServer::start().await;
        router_reply(
            &server,
            "/zport/dmd/device_router",
            "getDevices",
            json!({ "devices": [
                { "uid": "/zport/dmd/Devices/vSphere/devices/esx1", "name": "10.0.0.21",
                  "osModel": { "name": "VMware ESXi 6.5.0" } },
                { "uid": "/zport/dmd/Devices/vSphere/devices/esx2", "name": "10.0.0.22",
                  "osModel": { "name": "VMware ESXi 6.5.0" } }
            ]}),
        )
        .await;
        // esx2 has no mock and answers 404
        router_reply(
            &server,
            "/zport/dmd/Devices/vSphere/devices/esx1/device_router",
            "getInfo",
            json!({ "data": {
                "hardwareUUID": "E1",
                "hardwareModel": "UCSB-B200-M4",
                "name": "esx1.lab",
                "hypervisorVersion": "6.5.0",
                "device": { "name": "esx1" }
            }}),
        )
        .await;

        let devices = collector(&server).discover_devices().await.unwrap();

        let esx1 = &devices[0];
        assert!(!esx1.ignore);
        assert_eq!(esx1.hardware_uuid.as_deref(), Some("E1"));
        assert_eq!(esx1.name, "esx1");
        assert_eq!(esx1.hypervisor_name, "esx1.lab");

        let esx2 = &devices[1];
        assert!(esx2.ignore);
        assert!(esx2.hardware_uuid.is_none());
    }
}

// =============================================================================
// End-to-End Tests
// =============================================================================

mod pipeline_tests {
    use super::*;

    #[tokio::test]
    async fn test_reconcile_against_live_mocks() {
        let domain = ucs_domain("UCS-A", &["A", "B"]).await;
        let pm = performance_manager(&[("h1", "A"), ("h3", "C")]).await;
        let dir = TempDir::new().unwrap();

        let pipeline = Pipeline::new(Reconciler::default(), writer(&dir), CancellationToken::new());
        let summary = pipeline
            .run_full(&collector(&pm), &fleet(&[&domain]))
            .await
            .unwrap();

        assert_eq!(summary.servers, 2);
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.unmatched, 1);
        assert_eq!(summary.domains_connected, 1);

        let csv = std::fs::read_to_string(dir.path().join("output.csv")).unwrap();
        let rows: Vec<&str> = csv.lines().collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[1].contains(",A,SN-A,UCS-A,4.0(1c),"));

        let unmatched = std::fs::read_to_string(dir.path().join("unmatcheduuid.json")).unwrap();
        assert_eq!(parse_uuid_list(&unmatched).unwrap(), vec!["C"]);

        let discovered = std::fs::read_to_string(dir.path().join("matcheduuid.json")).unwrap();
        assert_eq!(parse_uuid_list(&discovered).unwrap(), vec!["A", "C"]);
    }

    #[tokio::test]
    async fn test_performance_export_for_managed_hosts() {
        let domain = ucs_domain("UCS-A", &["A"]).await;
        let pm = performance_manager(&[("h1", "A"), ("h2", "Z")]).await;
        Mock::given(method("POST"))
            .and(path("/api/performance/query/"))
            .and(body_string_contains("Devices/vCenter/datacenters/dc1/hosts/h1"))
            .and(body_string_contains(r#""start":1509494400"#))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{ "datapoints": [
                    { "timestamp": 1509501600.0, "value": 12.5 },
                    { "timestamp": 1509498000.0, "value": 10.0 },
                    { "timestamp": 1509505200.0, "value": null }
                ]}]
            })))
            .expect(1)
            .mount(&pm)
            .await;
        let dir = TempDir::new().unwrap();

        let client = monitor::build_client(std::time::Duration::from_secs(5)).unwrap();
        let router = RouterClient::new(client, &Credential::new(pm.uri(), "admin", "zenoss"));
        let exporter = PerformanceExporter::new(
            Arc::new(router),
            ReportPeriod::parse("November", Some(2017)).unwrap(),
        );

        let pipeline = Pipeline::new(Reconciler::default(), writer(&dir), CancellationToken::new())
            .with_performance(exporter);
        let summary = pipeline
            .run_full(&collector(&pm), &fleet(&[&domain]))
            .await
            .unwrap();
        assert_eq!(summary.performance_reports, 1);

        let report = std::fs::read_to_string(dir.path().join("h1.lab-SN-A-November-2017.csv")).unwrap();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(lines, vec!["timestamp,value", "1509498000,10", "1509501600,12.5"]);
    }

    #[tokio::test]
    async fn test_host_matching_two_servers_exported_once() {
        let domain = ucs_domain("UCS-A", &["A", "A"]).await;
        let pm = performance_manager(&[("h1", "A")]).await;
        Mock::given(method("POST"))
            .and(path("/api/performance/query/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{ "datapoints": [{ "timestamp": 1509498000.0, "value": 1.0 }] }]
            })))
            .expect(1)
            .mount(&pm)
            .await;
        let dir = TempDir::new().unwrap();

        let client = monitor::build_client(std::time::Duration::from_secs(5)).unwrap();
        let router = RouterClient::new(client, &Credential::new(pm.uri(), "admin", "zenoss"));
        let exporter = PerformanceExporter::new(
            Arc::new(router),
            ReportPeriod::parse("11", Some(2017)).unwrap(),
        );

        let pipeline = Pipeline::new(Reconciler::default(), writer(&dir), CancellationToken::new())
            .with_performance(exporter);
        let summary = pipeline
            .run_full(&collector(&pm), &fleet(&[&domain]))
            .await
            .unwrap();

        assert_eq!(summary.servers, 2);
        assert_eq!(summary.performance_reports, 1);
    }

    #[tokio::test]
    async fn test_hardware_run_reuses_device_inventory() {
        let pm = performance_manager(&[("h1", "A")]).await;
        let domain = ucs_domain("UCS-A", &["A"]).await;
        let dir = TempDir::new().unwrap();

        let pipeline = Pipeline::new(Reconciler::default(), writer(&dir), CancellationToken::new());
        pipeline.run_devices_only(&collector(&pm)).await.unwrap();
        drop(pm);

        let summary = pipeline.run_hardware_only(&fleet(&[&domain])).await.unwrap();
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.unmatched, 0);
        assert!(!dir.path().join("unmatcheduuid.json").exists());
    }

    #[tokio::test]
    async fn test_failed_device_run_keeps_previous_inventory() {
        let pm = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&pm)
            .await;
        let domain = ucs_domain("UCS-A", &["A"]).await;
        let dir = TempDir::new().unwrap();
        let saved = dir.path().join("matcheduuid.json");
        std::fs::write(&saved, r#"{"uuids": ["A"]}"#).unwrap();

        let pipeline = Pipeline::new(Reconciler::default(), writer(&dir), CancellationToken::new());
        let summary = pipeline.run_devices_only(&collector(&pm)).await.unwrap();
        assert_eq!(summary.devices_discovered, 0);
        assert_eq!(std::fs::read_to_string(&saved).unwrap(), r#"{"uuids": ["A"]}"#);

        let summary = pipeline.run_hardware_only(&fleet(&[&domain])).await.unwrap();
        assert_eq!(summary.matched, 1);
    }
}
