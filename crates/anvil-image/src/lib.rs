//! Anvil image builder
//!
//! Turns a vendor-supplied hypervisor installer ISO into a per-host
//! unattended-install image:
//!
//! 1. extract the source ISO into a per-host staging tree
//! 2. append the kickstart kernel option to the existing boot config
//!    (the module list is never regenerated)
//! 3. render the kickstart descriptor from host + network + credentials
//! 4. lowercase the tree, preserving the descriptor's fixed-case name
//! 5. repack as a hybrid (BIOS + UEFI) bootable ISO
//!
//! Build failures are deterministic given identical inputs, so nothing
//! here retries; the orchestrator surfaces failures to the operator.

pub mod bootcfg;
pub mod builder;
pub mod descriptor;
pub mod error;
pub mod staging;

pub use builder::{artifact_uri, image_filename, BuilderConfig, ImageBuilder};
pub use descriptor::{render_descriptor, DESCRIPTOR_FILENAME};
pub use error::{BuildError, Result};
