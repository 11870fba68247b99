//! Vendor adapter trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{BootMode, PowerState, ResetKind};

/// Abstract capability set of a BMC, implemented per vendor.
///
/// The provisioning driver only ever talks through this trait; the
/// orchestrator picks the implementation from the host's vendor field.
#[async_trait]
pub trait VendorAdapter: Send + Sync {
    /// Short vendor tag for logging ("redfish", "ilo")
    fn vendor_name(&self) -> &'static str;

    /// Unmount virtual media. Idempotent: a no-op when nothing is
    /// mounted must return Ok.
    async fn eject_media(&self) -> Result<()>;

    /// Mount a network-served image as a virtual CD.
    ///
    /// The URI is opaque to the caller; the adapter (and the BMC behind
    /// it) decides whether a CIFS share path or an HTTP URL is usable.
    async fn insert_media(&self, image_uri: &str, write_protected: bool) -> Result<()>;

    /// Arrange for the next (and only the next) boot to come from the
    /// virtual CD.
    async fn set_one_time_boot(&self, mode: BootMode) -> Result<()>;

    /// Issue a power action.
    async fn reset(&self, kind: ResetKind) -> Result<()>;

    /// Current chassis power state.
    async fn power_state(&self) -> Result<PowerState>;

    /// Whether the BMC considers virtual media actually attached.
    ///
    /// Used to catch the inserted-but-not-attached misconfiguration
    /// class before wasting a boot cycle on it.
    async fn media_attached(&self) -> Result<bool>;
}
