//! Core records shared between the image builder, the BMC adapters and
//! the provisioning driver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;

/// Which out-of-band management controller a host carries.
///
/// The orchestrator selects the adapter implementation from this field;
/// nothing else in the pipeline is vendor-aware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BmcVendor {
    /// Redfish REST BMC (Dell iDRAC class hardware)
    Redfish,
    /// HPE iLO with the proprietary RIBCL XML protocol
    Ilo,
}

impl fmt::Display for BmcVendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BmcVendor::Redfish => write!(f, "redfish"),
            BmcVendor::Ilo => write!(f, "ilo"),
        }
    }
}

/// One physical host to be installed.
///
/// Immutable for the duration of a pipeline run. The optional `network`
/// field overrides the fleet-wide profile for this host only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostSpec {
    pub hostname: String,
    /// Management IP the installed hypervisor will answer on
    pub mgmt_ip: IpAddr,
    /// Address of the host's BMC
    pub bmc_ip: IpAddr,
    pub vendor: BmcVendor,
    #[serde(default)]
    pub network: Option<NetworkProfile>,
}

impl HostSpec {
    /// Effective network profile: the per-host override when present,
    /// otherwise the fleet default.
    pub fn profile<'a>(&'a self, default: &'a NetworkProfile) -> &'a NetworkProfile {
        self.network.as_ref().unwrap_or(default)
    }
}

/// Static network configuration applied by the unattended installer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkProfile {
    pub netmask: IpAddr,
    pub gateway: IpAddr,
    pub dns_servers: Vec<IpAddr>,
    pub ntp_servers: Vec<String>,
    /// Management VLAN tag. 0 means untagged.
    #[serde(default)]
    pub vlan_id: u16,
}

/// A secret string whose Debug/Display output never leaks the value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the underlying value. Call sites are the audit trail for
    /// where secrets actually travel.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(<redacted>)")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Credential bundle for a run. Held in memory only; never logged.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Root password baked into the install descriptor
    pub root_password: Secret,
    pub bmc_username: String,
    pub bmc_password: Secret,
}

/// Build outcome for one host's installer image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BuildStatus {
    Pending,
    Built,
    Failed(String),
}

impl BuildStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildStatus::Pending => "Pending",
            BuildStatus::Built => "Built",
            BuildStatus::Failed(_) => "Failed",
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStatus::Failed(msg) => write!(f, "Failed: {}", msg),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// Per-host image produced by the builder and consumed read-only by the
/// provisioning driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildArtifact {
    pub hostname: String,
    /// Where the image landed on the distribution export
    pub image_path: PathBuf,
    /// Network location the BMC mounts (CIFS path or HTTP URL)
    pub image_uri: String,
    pub sha256: String,
    pub built_at: DateTime<Utc>,
    pub status: BuildStatus,
}

impl BuildArtifact {
    pub fn is_built(&self) -> bool {
        self.status == BuildStatus::Built
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn profile(vlan: u16) -> NetworkProfile {
        NetworkProfile {
            netmask: IpAddr::V4(Ipv4Addr::new(255, 255, 255, 0)),
            gateway: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 1)),
            dns_servers: vec![
                IpAddr::V4(Ipv4Addr::new(192, 168, 1, 2)),
                IpAddr::V4(Ipv4Addr::new(192, 168, 1, 3)),
            ],
            ntp_servers: vec!["ntp1.example.com".into(), "ntp2.example.com".into()],
            vlan_id: vlan,
        }
    }

    #[test]
    fn test_host_profile_override() {
        let default = profile(0);
        let mut host = HostSpec {
            hostname: "esxi01".into(),
            mgmt_ip: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)),
            bmc_ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 10)),
            vendor: BmcVendor::Redfish,
            network: None,
        };

        assert_eq!(host.profile(&default).vlan_id, 0);

        host.network = Some(profile(120));
        assert_eq!(host.profile(&default).vlan_id, 120);
    }

    #[test]
    fn test_secret_debug_redacts() {
        let secret = Secret::new("hunter2");
        let debug = format!("{:?}", secret);
        assert!(!debug.contains("hunter2"));
        assert_eq!(secret.expose(), "hunter2");

        let creds = Credentials {
            root_password: Secret::new("rootpw"),
            bmc_username: "admin".into(),
            bmc_password: Secret::new("bmcpw"),
        };
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("rootpw"));
        assert!(!debug.contains("bmcpw"));
        assert!(debug.contains("admin"));
    }

    #[test]
    fn test_host_spec_serde_roundtrip() {
        let host = HostSpec {
            hostname: "esxi02".into(),
            mgmt_ip: "192.168.1.11".parse().unwrap(),
            bmc_ip: "10.0.0.11".parse().unwrap(),
            vendor: BmcVendor::Ilo,
            network: Some(profile(42)),
        };

        let json = serde_json::to_string(&host).unwrap();
        let restored: HostSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.hostname, "esxi02");
        assert_eq!(restored.vendor, BmcVendor::Ilo);
        assert_eq!(restored.network.unwrap().vlan_id, 42);
    }

    #[test]
    fn test_vendor_deserialize_lowercase() {
        let vendor: BmcVendor = serde_json::from_str("\"redfish\"").unwrap();
        assert_eq!(vendor, BmcVendor::Redfish);
        let vendor: BmcVendor = serde_json::from_str("\"ilo\"").unwrap();
        assert_eq!(vendor, BmcVendor::Ilo);
    }

    #[test]
    fn test_build_status_display() {
        assert_eq!(BuildStatus::Built.to_string(), "Built");
        assert_eq!(BuildStatus::Pending.as_str(), "Pending");
        assert_eq!(
            BuildStatus::Failed("no source".into()).to_string(),
            "Failed: no source"
        );
    }
}
