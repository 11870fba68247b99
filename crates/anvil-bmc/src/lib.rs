//! Anvil BMC control
//!
//! Vendor-abstracted virtual media and power operations against
//! out-of-band management controllers.
//!
//! # Supported protocols
//!
//! - **Redfish**: HTTPS JSON REST, Dell iDRAC resource layout
//! - **RIBCL**: HPE iLO's proprietary XML protocol over HTTPS
//!
//! Every call fails with either [`BmcError::Transport`] (network/auth,
//! worth retrying) or [`BmcError::Rejected`] (the BMC understood the
//! request and refused it), so callers can decide recovery without
//! knowing the vendor.
//!
//! # Example
//!
//! ```no_run
//! use anvil_bmc::{RedfishAdapter, RedfishConfig, VendorAdapter, BootMode};
//!
//! # async fn example() -> anvil_bmc::error::Result<()> {
//! let config = RedfishConfig::new("https://10.0.0.10", "root", "calvin")
//!     .with_insecure(true);
//! let adapter = RedfishAdapter::new(config)?;
//!
//! adapter.eject_media().await?;
//! adapter
//!     .insert_media("http://images.lab/esxi01.iso", true)
//!     .await?;
//! adapter.set_one_time_boot(BootMode::Uefi).await?;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod error;
pub mod ilo;
pub mod redfish;
pub mod types;

pub use adapter::VendorAdapter;
pub use error::{BmcError, Result};
pub use ilo::{IloAdapter, IloConfig};
pub use redfish::{RedfishAdapter, RedfishConfig};
pub use types::{BootMode, PowerState, ResetKind};
