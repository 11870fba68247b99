//! Per-host staging areas for image rebuilds.
//!
//! Each build extracts into `<staging>/<hostname>/`, so concurrent builds
//! for different hosts never touch the same tree. Cleanup is guaranteed:
//! callers get an explicit `cleanup()`, and Drop sweeps up anything left
//! behind on an error path.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{BuildError, Result};

/// An isolated working directory keyed by hostname.
#[derive(Debug)]
pub struct StagingArea {
    path: PathBuf,
    cleaned: bool,
}

impl StagingArea {
    /// Create (or re-create, empty) the staging tree for a host.
    pub fn create(base: &Path, hostname: &str) -> Result<Self> {
        let path = base.join(hostname);
        if path.exists() {
            fs::remove_dir_all(&path)?;
        }
        fs::create_dir_all(&path)?;
        Ok(Self {
            path,
            cleaned: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the staging tree. Safe to call once; Drop covers the rest.
    pub fn cleanup(mut self) -> Result<()> {
        self.cleaned = true;
        if self.path.exists() {
            fs::remove_dir_all(&self.path)?;
        }
        Ok(())
    }
}

impl Drop for StagingArea {
    fn drop(&mut self) {
        if !self.cleaned && self.path.exists() {
            if let Err(e) = fs::remove_dir_all(&self.path) {
                warn!(path = %self.path.display(), error = %e, "failed to clean staging area");
            }
        }
    }
}

/// Strip the read-only bit everywhere under `root`. ISO extraction
/// preserves the media's read-only permissions, which would otherwise
/// block patching.
pub fn make_writable(root: &Path) -> Result<()> {
    let mut perms = fs::metadata(root)?.permissions();
    if perms.readonly() {
        perms.set_readonly(false);
        fs::set_permissions(root, perms)?;
    }
    if root.is_dir() {
        for entry in fs::read_dir(root)? {
            make_writable(&entry?.path())?;
        }
    }
    Ok(())
}

/// Lowercase every file and directory name under `root` except names
/// listed in `preserve` (exact match, any depth).
pub fn lowercase_tree(root: &Path, preserve: &[&str]) -> Result<()> {
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            lowercase_tree(&path, preserve)?;
        }

        let name = entry.file_name();
        let name = name.to_string_lossy();
        if preserve.contains(&name.as_ref()) {
            continue;
        }

        let lower = name.to_lowercase();
        if lower != name {
            let target = root.join(&lower);
            // Renaming over a sibling would silently drop one of the two.
            if target.exists() {
                return Err(BuildError::CaseCollision {
                    dir: root.to_path_buf(),
                    name: lower,
                });
            }
            fs::rename(&path, target)?;
        }
    }
    Ok(())
}
