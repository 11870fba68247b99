pub mod build;
pub mod provision;
pub mod run;
pub mod status;

use std::sync::Arc;
use tracing::warn;

use anvil_provision::{DefaultAdapterFactory, Orchestrator};

use crate::config::Inventory;

/// Assemble the orchestrator from the inventory.
pub fn orchestrator(inventory: &Inventory) -> color_eyre::Result<Orchestrator> {
    let builder = anvil_image::ImageBuilder::new(inventory.builder_config());
    let factory = Arc::new(DefaultAdapterFactory {
        insecure_tls: inventory.bmc.insecure_tls,
    });
    Ok(Orchestrator::new(
        builder,
        factory,
        inventory.driver_config()?,
        inventory.provision.concurrency,
    ))
}

/// Forward Ctrl-C to the orchestrator so in-flight sessions wind down
/// cleanly (defensive media eject) instead of being killed mid-call.
pub fn install_cancel_handler(orchestrator: &Arc<Orchestrator>) {
    let orchestrator = orchestrator.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling in-flight sessions");
            orchestrator.cancel();
        }
    });
}
