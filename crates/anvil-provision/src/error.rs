//! Error types for provisioning.

use anvil_bmc::BmcError;
use std::time::Duration;
use thiserror::Error;

/// Error type for provisioning sessions
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// BMC call failed; retryability comes from the BMC taxonomy
    #[error(transparent)]
    Bmc(#[from] BmcError),

    /// Install did not complete detectably within the ceiling
    #[error("installation not verified within {0:?}")]
    VerificationTimeout(Duration),

    /// Operator abort
    #[error("provisioning cancelled")]
    Cancelled,

    /// Same hostname appears more than once in the inventory
    #[error("duplicate hostname in inventory: {0}")]
    DuplicateHost(String),
}

impl ProvisionError {
    /// Whether another full-sequence attempt makes sense.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProvisionError::Bmc(e) => e.is_retryable(),
            ProvisionError::VerificationTimeout(_) => true,
            ProvisionError::Cancelled => false,
            ProvisionError::DuplicateHost(_) => false,
        }
    }
}

/// Result type for provisioning operations
pub type Result<T> = std::result::Result<T, ProvisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability() {
        assert!(ProvisionError::Bmc(BmcError::Transport("t".into())).is_retryable());
        assert!(!ProvisionError::Bmc(BmcError::Rejected("r".into())).is_retryable());
        assert!(ProvisionError::VerificationTimeout(Duration::from_secs(1)).is_retryable());
        assert!(!ProvisionError::Cancelled.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = ProvisionError::VerificationTimeout(Duration::from_secs(600));
        assert_eq!(err.to_string(), "installation not verified within 600s");

        let err = ProvisionError::DuplicateHost("esxi01".into());
        assert!(err.to_string().contains("esxi01"));
    }
}
