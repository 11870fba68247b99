//! `anvil status` — passive fleet check: image on the export, host
//! answering on its management IP. No BMC calls are made.

use color_eyre::eyre::Result;
use std::time::Duration;

use anvil_common::{HostProbe, TcpProbe};
use anvil_image::image_filename;

use crate::config::Inventory;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

pub async fn run(inventory: &Inventory) -> Result<()> {
    let probe = TcpProbe;
    // Same completion signal the provisioning driver polls for.
    let port = inventory.driver_config()?.probe_port;

    let width = inventory
        .hosts
        .iter()
        .map(|h| h.hostname.len())
        .max()
        .unwrap_or(4)
        .max(4);

    println!("{:<w$}  {:<5}  REACHABLE", "HOST", "IMAGE", w = width);
    for host in &inventory.hosts {
        let image = inventory
            .share
            .export_dir
            .join(image_filename(&host.hostname))
            .is_file();
        let up = probe.reachable(host.mgmt_ip, port, PROBE_TIMEOUT).await;
        println!(
            "{:<w$}  {:<5}  {}",
            host.hostname,
            if image { "yes" } else { "no" },
            if up { "yes" } else { "no" },
            w = width
        );
    }
    Ok(())
}
