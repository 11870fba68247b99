//! `anvil build` — image build phase only.

use color_eyre::eyre::Result;
use tracing::info;

use anvil_common::BuildStatus;

use crate::config::Inventory;

pub async fn run(inventory: &Inventory) -> Result<()> {
    let credentials = inventory.credentials()?;
    let orchestrator = super::orchestrator(inventory)?;

    info!(hosts = inventory.hosts.len(), "starting image builds");
    let artifacts = orchestrator
        .build_phase(&inventory.hosts, &inventory.defaults, &credentials)
        .await;

    let mut failed = 0;
    for host in &inventory.hosts {
        match artifacts.get(&host.hostname).map(|a| &a.status) {
            Some(BuildStatus::Built) => {
                let artifact = &artifacts[&host.hostname];
                println!(
                    "{}  built  {}  sha256={}",
                    host.hostname,
                    artifact.image_path.display(),
                    artifact.sha256
                );
            }
            Some(BuildStatus::Failed(msg)) => {
                failed += 1;
                println!("{}  failed  {}", host.hostname, msg);
            }
            _ => {
                failed += 1;
                println!("{}  failed  no artifact produced", host.hostname);
            }
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
