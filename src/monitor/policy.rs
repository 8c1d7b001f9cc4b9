//! Device classification rules.
//!
//! Fixed path and product-name matches deciding which devices are walked,
//! which endpoint answers for their identity and what their CPU metric is
//! called.

/// Root of the device tree
pub const DEVICE_ROOT: &str = "/zport/dmd/Devices";

/// Path of the router serving device-tree-wide calls
pub const ROUTER_ROOT: &str = "zport/dmd";

/// Class name of the control-plane appliance, never a hardware host
pub const CONTROL_PLANE_CLASS: &str = "ZenPacks.zenoss.ControlCenter.ControlCenter";

/// Lowercased product name identifying a hypervisor manager
pub const HYPERVISOR_MANAGER_PRODUCT: &str = "vmware vcenter server";

/// Device class of the vSphere tree
pub const VSPHERE_TREE: &str = "/zport/dmd/Devices/vSphere";

const VSPHERE_DEVICES: &str = "/zport/dmd/Devices/vSphere/devices";
const METRIC_KEY_PREFIX: &str = "/zport/dmd/Devices/vSphere/d";

/// Child object of a standalone ESXi device holding its identity
pub const STANDALONE_HOST_SUFFIX: &str =
    "/datacenters/Datacenter_ha-datacenter/hosts/HostSystem_ha-host";

/// Meta type of hosts under a vCenter
pub const HOST_META_TYPE: &str = "vSphereHostSystem";

pub const METRIC_PREFIX: &str = "CPU_Utilization_-_-";

/// Uid fragments of device classes that are never identity candidates.
pub const IGNORED_CATEGORIES: [(&str, &str); 3] = [
    ("compute fabric", "zport/dmd/Devices/CiscoUCS/"),
    ("network", "/zport/dmd/Devices/Network/"),
    ("storage", "/zport/dmd/Devices/Storage/"),
];

/// Category label when `uid` falls in an ignored device class.
pub fn ignored_category(uid: &str) -> Option<&'static str> {
    IGNORED_CATEGORIES
        .iter()
        .find(|(_, fragment)| uid.contains(fragment))
        .map(|(label, _)| *label)
}

pub fn is_control_plane(python_class: &str) -> bool {
    python_class.contains(CONTROL_PLANE_CLASS)
}

pub fn is_hypervisor_manager(product_name: &str) -> bool {
    product_name.to_lowercase().contains(HYPERVISOR_MANAGER_PRODUCT)
}

/// Lives under the vSphere device class and answers the standalone query.
pub fn is_vsphere_device(uid: &str) -> bool {
    uid.contains(VSPHERE_TREE)
}

/// CPU utilisation metric name for a device.
pub fn metric_name(uid: &str, name: &str, hypervisor_name: &str) -> String {
    if uid.contains(VSPHERE_DEVICES) && uid.contains("datacenters") {
        format!("{}vSphere-vCenter_-_{}", METRIC_PREFIX, name)
    } else {
        format!("{}vSphere-{}_-_{}", METRIC_PREFIX, name, hypervisor_name)
    }
}

/// Tag key the performance API files a vSphere host's series under.
///
/// `/zport/dmd/Devices/vSphere/devices/vc01/datacenters/dc/hosts/h1`
/// becomes `Devices/vCenter/datacenters/dc/hosts/h1`. `None` outside the
/// vSphere tree.
pub fn metric_key(uid: &str) -> Option<String> {
    let rest = uid.strip_prefix(METRIC_KEY_PREFIX)?;
    let key = format!("D{}", rest);

    let mut segments: Vec<&str> = key.split('/').collect();
    if segments.len() > 2 {
        segments[1] = "vCenter";
    }
    Some(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignored_categories() {
        assert_eq!(
            ignored_category("/zport/dmd/Devices/CiscoUCS/devices/ucs-a"),
            Some("compute fabric")
        );
        assert_eq!(
            ignored_category("/zport/dmd/Devices/Network/Cisco/devices/sw1"),
            Some("network")
        );
        assert_eq!(
            ignored_category("/zport/dmd/Devices/Storage/NetApp/devices/fas1"),
            Some("storage")
        );
        assert_eq!(ignored_category("/zport/dmd/Devices/vSphere/devices/vc01"), None);
        assert_eq!(ignored_category("/zport/dmd/Devices/Network"), None);
    }

    #[test]
    fn test_classification() {
        assert!(is_control_plane("ZenPacks.zenoss.ControlCenter.ControlCenter"));
        assert!(!is_control_plane("Products.ZenModel.Device"));

        assert!(is_hypervisor_manager("VMware vCenter Server 6.5.0 build-7312210"));
        assert!(!is_hypervisor_manager("VMware ESXi 6.5.0"));
        assert!(!is_hypervisor_manager(""));

        assert!(is_vsphere_device("/zport/dmd/Devices/vSphere/devices/esx-1"));
        assert!(!is_vsphere_device("/zport/dmd/Devices/Server/Linux/devices/db1"));
    }

    #[test]
    fn test_metric_name_vcenter_scoped() {
        let uid = "/zport/dmd/Devices/vSphere/devices/vc01/datacenters/dc1/hosts/host-12";
        assert_eq!(
            metric_name(uid, "esx-12.lab", "ignored"),
            "CPU_Utilization_-_-vSphere-vCenter_-_esx-12.lab"
        );
    }

    #[test]
    fn test_metric_name_standalone() {
        let uid = "/zport/dmd/Devices/vSphere/devices/esx-standalone";
        assert_eq!(
            metric_name(uid, "esx-standalone", "ha-host"),
            "CPU_Utilization_-_-vSphere-esx-standalone_-_ha-host"
        );
    }

    #[test]
    fn test_metric_key() {
        assert_eq!(
            metric_key("/zport/dmd/Devices/vSphere/devices/vc01/datacenters/dc1/hosts/host-12")
                .as_deref(),
            Some("Devices/vCenter/datacenters/dc1/hosts/host-12")
        );
        assert_eq!(
            metric_key("/zport/dmd/Devices/vSphere/devices").as_deref(),
            Some("Devices")
        );
        assert_eq!(metric_key("/zport/dmd/Devices/Server/Linux/devices/db1"), None);
    }
}
