//! The image build pipeline.
//!
//! External tooling: `xorriso` for extraction and repacking, `isohybrid`
//! for the hybrid BIOS/UEFI transformation. Tool failures surface as
//! [`BuildError::Tool`] with captured stderr.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use anvil_common::{BuildArtifact, BuildStatus, Credentials, HostSpec, NetworkProfile};

use crate::bootcfg::append_kernel_option;
use crate::descriptor::{render_descriptor, DESCRIPTOR_FILENAME, KERNEL_OPTION};
use crate::error::{BuildError, Result};
use crate::staging::{lowercase_tree, make_writable, StagingArea};

/// Relative locations of the installer boot configuration. Both the BIOS
/// and the UEFI copy must carry the kickstart kernel option.
const BOOT_CONFIG_PATHS: &[&str] = &["boot.cfg", "efi/boot/boot.cfg"];

/// Builder configuration, shared across all hosts in a run.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Vendor installer ISO, opened read-only
    pub source_iso: PathBuf,
    /// Parent directory for per-host staging trees
    pub staging_dir: PathBuf,
    /// Where finished images land (the distribution export)
    pub output_dir: PathBuf,
    /// Base URI under which BMCs reach the export
    pub share_base_uri: String,
}

/// Builds one unattended-install image per host.
#[derive(Debug)]
pub struct ImageBuilder {
    config: BuilderConfig,
}

impl ImageBuilder {
    pub fn new(config: BuilderConfig) -> Self {
        Self { config }
    }

    /// Build the per-host image. The source ISO is never mutated; the
    /// staging tree is removed on success and failure alike.
    pub async fn build(
        &self,
        host: &HostSpec,
        profile: &NetworkProfile,
        credentials: &Credentials,
    ) -> Result<BuildArtifact> {
        let source = &self.config.source_iso;
        let meta = fs::metadata(source).map_err(|e| BuildError::SourceUnreadable {
            path: source.clone(),
            source: e,
        })?;
        if !meta.is_file() {
            return Err(BuildError::SourceUnreadable {
                path: source.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a file"),
            });
        }

        info!(host = %host.hostname, source = %source.display(), "building installer image");

        let staging = StagingArea::create(&self.config.staging_dir, &host.hostname)?;
        let result = self
            .build_in_staging(staging.path(), host, profile, credentials)
            .await;
        // Cleanup happens regardless of outcome; a cleanup failure must
        // not mask the build error.
        if let Err(e) = staging.cleanup() {
            debug!(host = %host.hostname, error = %e, "staging cleanup failed");
        }
        let image_path = result?;

        let sha256 = sha256_file(&image_path)?;
        info!(host = %host.hostname, image = %image_path.display(), sha256 = %sha256, "image built");

        Ok(BuildArtifact {
            hostname: host.hostname.clone(),
            image_uri: artifact_uri(&self.config.share_base_uri, &host.hostname),
            image_path,
            sha256,
            built_at: Utc::now(),
            status: BuildStatus::Built,
        })
    }

    async fn build_in_staging(
        &self,
        stage: &Path,
        host: &HostSpec,
        profile: &NetworkProfile,
        credentials: &Credentials,
    ) -> Result<PathBuf> {
        // Render first: a descriptor failure should not cost an extraction.
        let descriptor = render_descriptor(host, profile, credentials)?;

        let source = self.config.source_iso.to_string_lossy().to_string();
        let stage_str = stage.to_string_lossy().to_string();

        run_tool(
            "xorriso",
            &["-osirrox", "on", "-indev", &source, "-extract", "/", &stage_str],
        )
        .await?;
        make_writable(stage)?;
        lowercase_tree(stage, &[DESCRIPTOR_FILENAME])?;

        let mut patched = false;
        for rel in BOOT_CONFIG_PATHS {
            let path = stage.join(rel);
            if !path.exists() {
                continue;
            }
            let contents = fs::read_to_string(&path)?;
            let updated = append_kernel_option(&contents, KERNEL_OPTION, &path)?;
            fs::write(&path, updated)?;
            patched = true;
            debug!(host = %host.hostname, file = %rel, "boot config patched");
        }
        if !patched {
            return Err(BuildError::BootConfigNotFound(stage.to_path_buf()));
        }

        fs::write(stage.join(DESCRIPTOR_FILENAME), descriptor)?;

        fs::create_dir_all(&self.config.output_dir)?;
        let output = self.config.output_dir.join(image_filename(&host.hostname));
        let output_str = output.to_string_lossy().to_string();

        run_tool(
            "xorriso",
            &[
                "-as",
                "mkisofs",
                "-relaxed-filenames",
                "-J",
                "-R",
                "-o",
                &output_str,
                "-b",
                "isolinux.bin",
                "-c",
                "boot.cat",
                "-no-emul-boot",
                "-boot-load-size",
                "4",
                "-boot-info-table",
                "-eltorito-alt-boot",
                "-e",
                "efiboot.img",
                "-no-emul-boot",
                &stage_str,
            ],
        )
        .await?;

        // Hybrid transformation: bootable from both legacy BIOS and UEFI.
        run_tool("isohybrid", &["--uefi", &output_str]).await?;

        Ok(output)
    }
}

/// File name of the per-host image on the distribution export.
pub fn image_filename(hostname: &str) -> String {
    format!("{}.iso", hostname)
}

/// Network URI the BMC will mount for this host's image.
pub fn artifact_uri(base_uri: &str, hostname: &str) -> String {
    format!(
        "{}/{}",
        base_uri.trim_end_matches('/'),
        image_filename(hostname)
    )
}

async fn run_tool(tool: &str, args: &[&str]) -> Result<()> {
    debug!(tool = %tool, args = ?args, "running external tool");
    let output = Command::new(tool)
        .args(args)
        .output()
        .await
        .map_err(|e| BuildError::ToolSpawn {
            tool: tool.to_string(),
            source: e,
        })?;

    if !output.status.success() {
        return Err(BuildError::Tool {
            tool: tool.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

fn sha256_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_common::{BmcVendor, Secret};

    fn inputs() -> (HostSpec, NetworkProfile, Credentials) {
        (
            HostSpec {
                hostname: "esxi01".into(),
                mgmt_ip: "192.168.1.10".parse().unwrap(),
                bmc_ip: "10.0.0.10".parse().unwrap(),
                vendor: BmcVendor::Redfish,
                network: None,
            },
            NetworkProfile {
                netmask: "255.255.255.0".parse().unwrap(),
                gateway: "192.168.1.1".parse().unwrap(),
                dns_servers: vec!["192.168.1.2".parse().unwrap()],
                ntp_servers: vec!["ntp1.lab".into()],
                vlan_id: 0,
            },
            Credentials {
                root_password: Secret::new("pw"),
                bmc_username: "root".into(),
                bmc_password: Secret::new("pw"),
            },
        )
    }

    #[test]
    fn test_artifact_uri_join() {
        assert_eq!(
            artifact_uri("http://images.lab/export/", "esxi01"),
            "http://images.lab/export/esxi01.iso"
        );
        assert_eq!(
            artifact_uri("http://images.lab/export", "esxi01"),
            "http://images.lab/export/esxi01.iso"
        );
    }

    #[tokio::test]
    async fn test_missing_source_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let builder = ImageBuilder::new(BuilderConfig {
            source_iso: dir.path().join("does-not-exist.iso"),
            staging_dir: dir.path().join("staging"),
            output_dir: dir.path().join("out"),
            share_base_uri: "http://images.lab".into(),
        });

        let (host, profile, creds) = inputs();
        let err = builder.build(&host, &profile, &creds).await.unwrap_err();
        assert!(matches!(err, BuildError::SourceUnreadable { .. }));
    }

    #[tokio::test]
    async fn test_descriptor_failure_before_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let iso = dir.path().join("src.iso");
        fs::write(&iso, "not really an iso").unwrap();

        let builder = ImageBuilder::new(BuilderConfig {
            source_iso: iso,
            staging_dir: dir.path().join("staging"),
            output_dir: dir.path().join("out"),
            share_base_uri: "http://images.lab".into(),
        });

        let (host, mut profile, creds) = inputs();
        profile.dns_servers.clear();
        let err = builder.build(&host, &profile, &creds).await.unwrap_err();
        assert!(matches!(err, BuildError::MissingField("dns_servers")));

        // Staging cleaned up even though the build failed
        assert!(!dir.path().join("staging").join("esxi01").exists());
    }
}
