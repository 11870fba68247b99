//! `anvil provision` — drive BMCs against images already on the export.

use chrono::Utc;
use color_eyre::eyre::{eyre, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use anvil_common::{BuildArtifact, BuildStatus};
use anvil_image::{artifact_uri, image_filename};
use anvil_provision::summarize;

use crate::config::Inventory;

pub async fn run(inventory: &Inventory) -> Result<()> {
    let credentials = inventory.credentials()?;
    let orchestrator = Arc::new(super::orchestrator(inventory)?);
    super::install_cancel_handler(&orchestrator);

    // Rebuild the artifact map from what is already on the export.
    let mut artifacts = HashMap::new();
    for host in &inventory.hosts {
        let image_path = inventory
            .share
            .export_dir
            .join(image_filename(&host.hostname));
        if !image_path.is_file() {
            return Err(eyre!(
                "no image for {} at {} (run `anvil build` first)",
                host.hostname,
                image_path.display()
            ));
        }
        artifacts.insert(
            host.hostname.clone(),
            BuildArtifact {
                hostname: host.hostname.clone(),
                image_uri: artifact_uri(&inventory.share.base_uri, &host.hostname),
                image_path,
                sha256: String::new(),
                built_at: Utc::now(),
                status: BuildStatus::Built,
            },
        );
    }

    info!(hosts = inventory.hosts.len(), "starting provisioning");
    let sessions = orchestrator
        .provision_phase(&inventory.hosts, &artifacts, &credentials)
        .await;

    let summary = summarize(&inventory.hosts, &artifacts, &sessions);
    print!("{}", summary.render_table());

    if !summary.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}
