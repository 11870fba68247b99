//! Anvil provisioning
//!
//! Drives a host's BMC through the virtual-media boot sequence
//! (eject → insert → one-time boot → power → poll → verify) with
//! full-sequence retries and defensive media cleanup, and fans that work
//! out across the fleet with bounded concurrency.

pub mod driver;
pub mod error;
pub mod orchestrator;
pub mod session;

pub use driver::{DriverConfig, ProvisioningDriver};
pub use error::{ProvisionError, Result};
pub use orchestrator::{
    summarize, AdapterFactory, DefaultAdapterFactory, HostOutcome, Orchestrator, RunSummary,
};
pub use session::{ProvisioningSession, SessionState};
