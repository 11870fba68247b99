//! `anvil run` — full pipeline: build every image, then provision.

use color_eyre::eyre::Result;
use std::sync::Arc;
use tracing::info;

use crate::config::Inventory;

pub async fn run(inventory: &Inventory) -> Result<()> {
    let credentials = inventory.credentials()?;
    let orchestrator = Arc::new(super::orchestrator(inventory)?);
    super::install_cancel_handler(&orchestrator);

    info!(hosts = inventory.hosts.len(), "starting full run");
    let summary = orchestrator
        .run(&inventory.hosts, &inventory.defaults, &credentials)
        .await?;

    print!("{}", summary.render_table());

    if !summary.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}
