//! Shared data model for the anvil provisioning pipeline.
//!
//! Everything that crosses a crate boundary lives here: host records,
//! network profiles, credentials, build artifacts, and the reachability
//! probe used to detect installation completion.

pub mod models;
pub mod probe;

pub use models::{
    BmcVendor, BuildArtifact, BuildStatus, Credentials, HostSpec, NetworkProfile, Secret,
};
pub use probe::{HostProbe, TcpProbe};
