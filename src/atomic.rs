//! Crash-safe document writes.
//!
//! Every document this tool produces is written to a temporary file next to
//! the target, flushed, then renamed over the target. A process killed
//! mid-write leaves the previous version intact.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Result, ResultExt};

/// Path of the temporary file used while writing `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    with_suffix(path, "tmp")
}

/// Path of the backup copy kept for `path`.
pub fn backup_path(path: &Path) -> PathBuf {
    with_suffix(path, "bak")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Write `contents` to `path` atomically.
///
/// With `keep_backup`, an existing file is first copied to `<path>.bak`.
pub fn write_atomic(path: &Path, contents: &str, keep_backup: bool) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(format!("Failed to create directory {}", parent.display()))?;
    }

    if keep_backup && path.exists() {
        let backup = backup_path(path);
        fs::copy(path, &backup)
            .with_context(format!("Failed to back up {} to {}", path.display(), backup.display()))?;
        tracing::debug!(target: "atomic", backup = %backup.display(), "Created backup");
    }

    let tmp = temp_path(path);
    let write_result = (|| -> std::io::Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()
    })();
    if let Err(e) = write_result {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(format!("Failed to write {}", tmp.display()));
    }

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(format!(
            "Failed to rename {} to {}",
            tmp.display(),
            path.display()
        ));
    }

    tracing::debug!(target: "atomic", path = %path.display(), bytes = contents.len(), "Wrote file");
    Ok(())
}
