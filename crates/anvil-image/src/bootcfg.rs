//! Boot configuration patching.
//!
//! The installer's `boot.cfg` enumerates the boot modules shipped with
//! that exact installer version. The module list must match the files on
//! the media or the firmware fails with a module-not-found error, so this
//! code treats the file as an opaque append-only document: it locates the
//! existing kernel-option line and appends to it, never regenerating
//! anything.

use crate::error::{BuildError, Result};
use std::path::Path;

const KERNEL_OPT_PREFIX: &str = "kernelopt=";

/// Append `option` to the kernel-option line, leaving every other byte of
/// the document untouched. Re-applying the same option is a no-op.
pub fn append_kernel_option(contents: &str, option: &str, path: &Path) -> Result<String> {
    let mut found = false;
    let mut lines = Vec::new();

    for line in contents.lines() {
        if let Some(existing) = line.strip_prefix(KERNEL_OPT_PREFIX) {
            found = true;
            if existing.split_whitespace().any(|opt| opt == option) {
                lines.push(line.to_string());
            } else if existing.trim().is_empty() {
                lines.push(format!("{}{}", KERNEL_OPT_PREFIX, option));
            } else {
                lines.push(format!("{} {}", line, option));
            }
        } else {
            lines.push(line.to_string());
        }
    }

    if !found {
        return Err(BuildError::MissingKernelOptLine(path.to_path_buf()));
    }

    let mut out = lines.join("\n");
    if contents.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}
