//! Unattended-install descriptor (kickstart) rendering.
//!
//! The descriptor is consumed by the installer's early-boot loader, which
//! resolves its path case-sensitively against a case-normalized
//! filesystem. [`DESCRIPTOR_FILENAME`] must therefore keep this exact
//! casing in the rebuilt image while everything else is lowercased.

use anvil_common::{Credentials, HostSpec, NetworkProfile};

use crate::error::{BuildError, Result};

/// Fixed-case descriptor filename at the image root.
pub const DESCRIPTOR_FILENAME: &str = "KS.CFG";

/// Kernel option appended to the installer boot config so early boot
/// picks the descriptor up from the install media.
pub const KERNEL_OPTION: &str = "ks=cdrom:/KS.CFG";

/// Render the per-host descriptor.
///
/// Output is a pure function of its inputs: building twice from the same
/// host, profile and credentials yields byte-identical content.
pub fn render_descriptor(
    host: &HostSpec,
    profile: &NetworkProfile,
    credentials: &Credentials,
) -> Result<String> {
    if credentials.root_password.is_empty() {
        return Err(BuildError::MissingField("root_password"));
    }
    if profile.dns_servers.is_empty() {
        return Err(BuildError::MissingField("dns_servers"));
    }
    if profile.ntp_servers.is_empty() {
        return Err(BuildError::MissingField("ntp_servers"));
    }

    let nameservers = profile
        .dns_servers
        .iter()
        .map(|ip| ip.to_string())
        .collect::<Vec<_>>()
        .join(",");

    let mut network = format!(
        "network --bootproto=static --device=vmnic0 --ip={} --netmask={} --gateway={} --nameserver={} --hostname={}",
        host.mgmt_ip, profile.netmask, profile.gateway, nameservers, host.hostname
    );
    // A zero tag means untagged; emitting --vlanid=0 breaks post-install
    // networking on the target.
    if profile.vlan_id != 0 {
        network.push_str(&format!(" --vlanid={}", profile.vlan_id));
    }

    let mut out = String::new();
    out.push_str("vmaccepteula\n");
    out.push_str("clearpart --firstdisk --overwritevmfs\n");
    out.push_str("install --firstdisk --overwritevmfs\n");
    out.push_str(&format!("rootpw {}\n", credentials.root_password.expose()));
    out.push_str(&network);
    out.push('\n');
    // Media is virtual; waiting for a physical eject would hang the host.
    out.push_str("reboot --noeject\n");
    out.push('\n');
    out.push_str("%firstboot --interpreter=busybox\n");
    out.push_str("vim-cmd hostsvc/enable_ssh\n");
    out.push_str("vim-cmd hostsvc/start_ssh\n");
    out.push_str("esxcli network ip set --ipv6-enabled=false\n");
    for ntp in &profile.ntp_servers {
        out.push_str(&format!("esxcli system ntp set --server={}\n", ntp));
    }
    out.push_str("esxcli system ntp set --enabled=true\n");
    out.push_str("reboot\n");

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_common::{BmcVendor, Secret};
    use std::net::IpAddr;

    fn host(vlan: u16) -> (HostSpec, NetworkProfile, Credentials) {
        let host = HostSpec {
            hostname: "esxi01".into(),
            mgmt_ip: "192.168.1.10".parse().unwrap(),
            bmc_ip: "10.0.0.10".parse().unwrap(),
            vendor: BmcVendor::Redfish,
            network: None,
        };
        let profile = NetworkProfile {
            netmask: "255.255.255.0".parse::<IpAddr>().unwrap(),
            gateway: "192.168.1.1".parse().unwrap(),
            dns_servers: vec!["192.168.1.2".parse().unwrap(), "192.168.1.3".parse().unwrap()],
            ntp_servers: vec!["ntp1.lab".into(), "ntp2.lab".into()],
            vlan_id: vlan,
        };
        let credentials = Credentials {
            root_password: Secret::new("Sup3rSecret!"),
            bmc_username: "root".into(),
            bmc_password: Secret::new("calvin"),
        };
        (host, profile, credentials)
    }

    #[test]
    fn test_untagged_vlan_has_no_vlan_clause() {
        let (h, p, c) = host(0);
        let ks = render_descriptor(&h, &p, &c).unwrap();
        assert!(!ks.contains("--vlanid"));
    }

    #[test]
    fn test_tagged_vlan_emitted_exactly_once() {
        let (h, p, c) = host(120);
        let ks = render_descriptor(&h, &p, &c).unwrap();
        assert_eq!(ks.matches("--vlanid").count(), 1);
        assert!(ks.contains("--vlanid=120"));
    }

    #[test]
    fn test_scenario_esxi01() {
        let (h, p, c) = host(0);
        let ks = render_descriptor(&h, &p, &c).unwrap();
        assert!(ks.contains("--ip=192.168.1.10"));
        assert!(ks.contains("--hostname=esxi01"));
        assert!(ks.contains("--nameserver=192.168.1.2,192.168.1.3"));
        assert!(!ks.contains("--vlanid"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let (h, p, c) = host(7);
        let first = render_descriptor(&h, &p, &c).unwrap();
        let second = render_descriptor(&h, &p, &c).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_post_install_block() {
        let (h, p, c) = host(0);
        let ks = render_descriptor(&h, &p, &c).unwrap();
        assert!(ks.contains("reboot --noeject\n"));
        assert!(ks.contains("%firstboot"));
        assert!(ks.contains("enable_ssh"));
        assert!(ks.contains("--ipv6-enabled=false"));
        assert!(ks.contains("--server=ntp1.lab"));
        assert!(ks.contains("--server=ntp2.lab"));
        assert!(ks.ends_with("reboot\n"));
    }

    #[test]
    fn test_missing_fields_rejected() {
        let (h, mut p, mut c) = host(0);

        c.root_password = Secret::new("");
        assert!(matches!(
            render_descriptor(&h, &p, &c),
            Err(BuildError::MissingField("root_password"))
        ));

        c.root_password = Secret::new("pw");
        p.dns_servers.clear();
        assert!(matches!(
            render_descriptor(&h, &p, &c),
            Err(BuildError::MissingField("dns_servers"))
        ));
    }
}
