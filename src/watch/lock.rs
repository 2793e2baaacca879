//! Lock file marking a running watcher.
//!
//! `<base>/.lyrics-keeper.lock` holds a small JSON record. It is created
//! with `create_new`, so only one watcher per archive can hold it. Removing
//! the file is how `watch stop` asks the running watcher to exit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result, ResultExt};

pub const LOCK_FILE_NAME: &str = ".lyrics-keeper.lock";

/// Contents of the lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub base_dir: PathBuf,
}

pub fn lock_path(base: &Path) -> PathBuf {
    base.join(LOCK_FILE_NAME)
}

/// Read the lock file, if there is one.
pub fn read(base: &Path) -> Result<Option<LockInfo>> {
    let path = lock_path(base);
    match fs::read_to_string(&path) {
        Ok(text) => {
            let info = serde_json::from_str(&text)
                .map_err(Error::from)
                .with_context(format!("Unreadable lock file {}", path.display()))?;
            Ok(Some(info))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(format!("Failed to read {}", path.display())),
    }
}

/// Delete the lock file. Returns whether there was one.
pub fn remove(base: &Path) -> Result<bool> {
    let path = lock_path(base);
    match fs::remove_file(&path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(format!("Failed to remove {}", path.display())),
    }
}

/// A held lock. Dropping it removes the file if it is still ours.
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
    info: LockInfo,
}

impl LockFile {
    /// Take the lock for `base`, failing if another watcher holds it.
    pub fn acquire(base: &Path) -> Result<Self> {
        let path = lock_path(base);
        let info = LockInfo {
            pid: std::process::id(),
            started_at: Utc::now(),
            base_dir: base.to_path_buf(),
        };

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let holder = read(base).ok().flatten();
                let detail = holder.map_or_else(
                    || "unknown holder".to_string(),
                    |h| format!("pid {} since {}", h.pid, h.started_at.to_rfc3339()),
                );
                return Err(Error::watch(format!(
                    "a watcher is already running for {} ({detail}); run `watch stop` to clear a stale lock",
                    base.display()
                )));
            }
            Err(e) => return Err(e).with_context(format!("Failed to create {}", path.display())),
        };

        let json = serde_json::to_string_pretty(&info)?;
        if let Err(e) = file.write_all(json.as_bytes()).and_then(|()| file.sync_all()) {
            let _ = fs::remove_file(&path);
            return Err(e).with_context(format!("Failed to write {}", path.display()));
        }

        tracing::info!(target: "watch::lock", path = %path.display(), pid = info.pid, "Lock acquired");
        Ok(Self { path, info })
    }

    pub fn info(&self) -> &LockInfo {
        &self.info
    }

    /// Whether the file on disk is still the one we wrote.
    pub fn is_held(&self) -> bool {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|text| serde_json::from_str::<LockInfo>(&text).ok())
            .is_some_and(|on_disk| on_disk == self.info)
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if self.is_held() {
            let _ = fs::remove_file(&self.path);
            tracing::debug!(target: "watch::lock", path = %self.path.display(), "Lock released");
        }
    }
}
