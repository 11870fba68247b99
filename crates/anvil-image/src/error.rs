//! Error types for image building.
//!
//! Every variant is fatal for the host being built: a build failure is
//! deterministic given identical inputs, so there is no retry taxonomy
//! here.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for image builds
#[derive(Debug, Error)]
pub enum BuildError {
    /// Source ISO missing or unreadable
    #[error("source image unreadable: {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The installer's boot configuration is not where this media
    /// family puts it
    #[error("boot configuration not found under {0}")]
    BootConfigNotFound(PathBuf),

    /// Boot configuration exists but has no kernel-option line to append to
    #[error("no kernel option line in {0}")]
    MissingKernelOptLine(PathBuf),

    /// Descriptor render failed (missing required field)
    #[error("descriptor field missing: {0}")]
    MissingField(&'static str),

    /// Two names in the same directory lowercase to the same string
    #[error("filename case collision under {dir}: {name}")]
    CaseCollision { dir: PathBuf, name: String },

    /// External tool exited nonzero
    #[error("{tool} failed ({status}): {stderr}")]
    Tool {
        tool: String,
        status: String,
        stderr: String,
    },

    /// External tool could not be spawned at all
    #[error("failed to run {tool}: {source}")]
    ToolSpawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem error in the staging tree
    #[error("staging I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for image builds
pub type Result<T> = std::result::Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BuildError::MissingField("gateway");
        assert_eq!(err.to_string(), "descriptor field missing: gateway");

        let err = BuildError::Tool {
            tool: "xorriso".into(),
            status: "exit status: 1".into(),
            stderr: "cannot open".into(),
        };
        assert!(err.to_string().contains("xorriso"));
        assert!(err.to_string().contains("cannot open"));
    }
}
