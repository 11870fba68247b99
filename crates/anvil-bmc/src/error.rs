//! Error taxonomy for BMC operations.
//!
//! The provisioning driver's retry decision hangs entirely on the
//! distinction between [`BmcError::Transport`] and [`BmcError::Rejected`].

use thiserror::Error;

/// Error type for BMC operations
#[derive(Debug, Error)]
pub enum BmcError {
    /// Network, TLS, timeout or authentication failure reaching the BMC.
    /// Retryable: the request may never have arrived.
    #[error("transport error: {0}")]
    Transport(String),

    /// The BMC received a valid request and refused it (for example the
    /// virtual media subsystem is disabled). Not retryable within a run.
    #[error("bmc rejected request: {0}")]
    Rejected(String),

    /// Adapter misconfiguration caught before any wire call
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BmcError {
    /// Whether the driver should retry the full sequence after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BmcError::Transport(_))
    }
}

impl From<reqwest::Error> for BmcError {
    fn from(err: reqwest::Error) -> Self {
        // Everything reqwest surfaces (connect, TLS, timeout, body read)
        // means the exchange did not complete cleanly.
        BmcError::Transport(err.to_string())
    }
}

/// Result type for BMC operations
pub type Result<T> = std::result::Result<T, BmcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BmcError::Transport("connection refused".to_string());
        assert_eq!(err.to_string(), "transport error: connection refused");

        let err = BmcError::Rejected("virtual media disabled".to_string());
        assert_eq!(err.to_string(), "bmc rejected request: virtual media disabled");
    }

    #[test]
    fn test_retryability() {
        assert!(BmcError::Transport("timeout".into()).is_retryable());
        assert!(!BmcError::Rejected("no".into()).is_retryable());
        assert!(!BmcError::InvalidConfig("bad url".into()).is_retryable());
    }
}
