//! Inventory configuration.
//!
//! One TOML file describes the fleet: host records, the fleet-default
//! network profile, the image distribution share and the provisioning
//! tunables. Secrets are not stored in the file; credential fields name
//! environment variables that hold the actual values.

use color_eyre::eyre::{eyre, Result, WrapErr};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anvil_bmc::BootMode;
use anvil_common::{Credentials, HostSpec, NetworkProfile, Secret};
use anvil_image::BuilderConfig;
use anvil_provision::DriverConfig;

#[derive(Debug, Deserialize)]
pub struct Inventory {
    /// Vendor installer ISO (read-only input)
    pub source_iso: PathBuf,
    pub share: ShareConfig,
    /// Fleet-wide network profile; hosts may override
    pub defaults: NetworkProfile,
    pub credentials: CredentialRefs,
    #[serde(default)]
    pub bmc: BmcSettings,
    #[serde(default)]
    pub provision: ProvisionSettings,
    pub hosts: Vec<HostSpec>,
}

#[derive(Debug, Deserialize)]
pub struct ShareConfig {
    /// Base URI under which every BMC reaches the export
    pub base_uri: String,
    /// Local directory the share serves
    pub export_dir: PathBuf,
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("/var/tmp/anvil")
}

/// Names of the environment variables carrying the secrets.
#[derive(Debug, Deserialize)]
pub struct CredentialRefs {
    pub root_password_env: String,
    pub bmc_username: String,
    pub bmc_password_env: String,
}

#[derive(Debug, Deserialize)]
pub struct BmcSettings {
    /// Tolerate self-signed BMC certificates
    #[serde(default = "default_true")]
    pub insecure_tls: bool,
}

impl Default for BmcSettings {
    fn default() -> Self {
        Self { insecure_tls: true }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ProvisionSettings {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_install_timeout")]
    pub install_timeout_secs: u64,
    #[serde(default = "default_verify_timeout")]
    pub verify_timeout_secs: u64,
    #[serde(default = "default_boot_mode")]
    pub boot_mode: String,
    /// Port probed on the management IP to detect install completion
    #[serde(default = "default_probe_port")]
    pub probe_port: u16,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            max_attempts: default_max_attempts(),
            retry_backoff_secs: default_retry_backoff(),
            poll_interval_secs: default_poll_interval(),
            install_timeout_secs: default_install_timeout(),
            verify_timeout_secs: default_verify_timeout(),
            boot_mode: default_boot_mode(),
            probe_port: default_probe_port(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_backoff() -> u64 {
    30
}
fn default_poll_interval() -> u64 {
    20
}
fn default_install_timeout() -> u64 {
    30 * 60
}
fn default_verify_timeout() -> u64 {
    2 * 60
}
fn default_boot_mode() -> String {
    "uefi".to_string()
}
fn default_probe_port() -> u16 {
    22
}

impl Inventory {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("cannot read inventory {}", path.display()))?;
        let inventory: Inventory = toml::from_str(&contents)
            .wrap_err_with(|| format!("invalid inventory {}", path.display()))?;
        Ok(inventory)
    }

    /// Resolve the credential bundle from the environment.
    pub fn credentials(&self) -> Result<Credentials> {
        Ok(Credentials {
            root_password: Secret::new(read_env(&self.credentials.root_password_env)?),
            bmc_username: self.credentials.bmc_username.clone(),
            bmc_password: Secret::new(read_env(&self.credentials.bmc_password_env)?),
        })
    }

    pub fn builder_config(&self) -> BuilderConfig {
        BuilderConfig {
            source_iso: self.source_iso.clone(),
            staging_dir: self.share.staging_dir.clone(),
            output_dir: self.share.export_dir.clone(),
            share_base_uri: self.share.base_uri.clone(),
        }
    }

    pub fn driver_config(&self) -> Result<DriverConfig> {
        let boot_mode = match self.provision.boot_mode.as_str() {
            "uefi" => BootMode::Uefi,
            "legacy" => BootMode::Legacy,
            other => return Err(eyre!("unknown boot_mode '{}' (uefi|legacy)", other)),
        };
        Ok(DriverConfig {
            max_attempts: self.provision.max_attempts,
            retry_backoff: Duration::from_secs(self.provision.retry_backoff_secs),
            poll_interval: Duration::from_secs(self.provision.poll_interval_secs),
            install_timeout: Duration::from_secs(self.provision.install_timeout_secs),
            verify_timeout: Duration::from_secs(self.provision.verify_timeout_secs),
            boot_mode,
            probe_port: self.provision.probe_port,
            ..DriverConfig::default()
        })
    }
}

fn read_env(name: &str) -> Result<String> {
    std::env::var(name).wrap_err_with(|| format!("environment variable {} not set", name))
}
