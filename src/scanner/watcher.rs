//! File system watcher for the lyrics archive.
//!
//! Uses the `notify` crate to watch the archive root recursively and emit
//! events when song folders or lyrics files change.
//!
//! # Design
//!
//! - **Debounced events**: Multiple rapid changes coalesce into single events
//! - **Lyrics only**: [`WatchFilter`] drops the tool's own output files,
//!   hidden paths and anything that is not a song folder or lyrics file
//! - **Non-blocking**: Runs on the debouncer's thread, sends events via channel
//! - **Graceful shutdown**: Stop watching by dropping the handle
//!
//! # Usage
//!
//! ```rust,ignore
//! let filter = WatchFilter::new(&base).ignore("song_metadata.yml");
//! let (watcher, rx) = FileWatcher::new(&base, filter, Duration::from_millis(500))?;
//!
//! while let Ok(event) = rx.recv() {
//!     match event {
//!         WatchEvent::SongFolderChanged(path) => println!("Folder: {:?}", path),
//!         WatchEvent::LyricsChanged(path) => println!("Lyrics: {:?}", path),
//!         WatchEvent::Error(e) => eprintln!("{e}"),
//!     }
//! }
//!
//! drop(watcher);
//! ```

use crossbeam_channel::{Receiver, Sender, bounded};
use notify::{EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{DebounceEventResult, Debouncer, RecommendedCache, new_debouncer};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::is_lyrics_file;

/// Events emitted by the file watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A directory directly under the archive root appeared, moved or vanished
    SongFolderChanged(PathBuf),
    /// A lyrics file inside a song folder was written, created or removed
    LyricsChanged(PathBuf),
    /// An error occurred while watching
    Error(String),
}

impl WatchEvent {
    pub fn path(&self) -> Option<&Path> {
        match self {
            WatchEvent::SongFolderChanged(p) | WatchEvent::LyricsChanged(p) => Some(p),
            WatchEvent::Error(_) => None,
        }
    }
}

/// Decides which paths under the archive root are worth reacting to.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    base: PathBuf,
    ignored: BTreeSet<OsString>,
}

impl WatchFilter {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            ignored: BTreeSet::new(),
        }
    }

    /// Ignore a file directly under the root, plus its `.tmp` and `.bak` siblings.
    pub fn ignore(mut self, name: impl Into<OsString>) -> Self {
        let name = name.into();
        for suffix in [".tmp", ".bak"] {
            let mut sibling = name.clone();
            sibling.push(suffix);
            self.ignored.insert(sibling);
        }
        self.ignored.insert(name);
        self
    }

    /// Ignore a path if it sits directly under the root.
    pub fn ignore_path(self, path: &Path) -> Self {
        match (path.parent(), path.file_name()) {
            (Some(parent), Some(name)) if parent == self.base => self.ignore(name),
            _ => self,
        }
    }

    /// Map a changed path to an event, or `None` if it does not matter.
    pub fn classify(&self, path: &Path) -> Option<WatchEvent> {
        let relative = path.strip_prefix(&self.base).ok()?;
        let parts: Vec<&std::ffi::OsStr> = relative
            .components()
            .map(|c| match c {
                Component::Normal(name) => Some(name),
                _ => None,
            })
            .collect::<Option<_>>()?;

        let first = parts.first()?;
        if parts
            .iter()
            .any(|p| p.to_string_lossy().starts_with('.'))
        {
            return None;
        }

        if parts.len() == 1 {
            if self.ignored.contains(*first) {
                return None;
            }
            // Removed or renamed entries cannot be stat'ed; only rule out live files
            if path.is_file() {
                return None;
            }
            return Some(WatchEvent::SongFolderChanged(path.to_path_buf()));
        }

        if is_lyrics_file(path) {
            Some(WatchEvent::LyricsChanged(path.to_path_buf()))
        } else {
            None
        }
    }
}

/// Handle to a running file watcher.
///
/// Dropping this handle will stop the watcher.
pub struct FileWatcher {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    running: Arc<AtomicBool>,
    root: PathBuf,
}

impl FileWatcher {
    /// Watch `root` recursively.
    ///
    /// Returns the watcher handle and a receiver for watch events.
    pub fn new(
        root: &Path,
        filter: WatchFilter,
        debounce: Duration,
    ) -> Result<(Self, Receiver<WatchEvent>), WatchError> {
        let (tx, rx) = bounded(256);
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&running);

        let mut debouncer = new_debouncer(
            debounce,
            None, // No tick rate limit
            move |result: DebounceEventResult| {
                if !running_clone.load(Ordering::Relaxed) {
                    return;
                }
                handle_debounced_events(result, &filter, &tx);
            },
        )
        .map_err(|e| WatchError::Init(e.to_string()))?;

        tracing::info!(target: "scanner::watcher", path = %root.display(), "Watching directory");
        debouncer
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| WatchError::Watch(e.to_string()))?;

        Ok((
            Self {
                _debouncer: debouncer,
                running,
                root: root.to_path_buf(),
            },
            rx,
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Handle debounced events from notify.
fn handle_debounced_events(result: DebounceEventResult, filter: &WatchFilter, tx: &Sender<WatchEvent>) {
    match result {
        Ok(events) => {
            for event in events {
                // Reads by our own scans show up as access events
                if !matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                ) {
                    continue;
                }
                for path in &event.paths {
                    if let Some(evt) = filter.classify(path) {
                        tracing::debug!(target: "scanner::watcher", path = %path.display(), kind = ?event.kind, "Change detected");
                        let _ = tx.try_send(evt);
                    }
                }
            }
        }
        Err(errors) => {
            for error in errors {
                tracing::warn!(target: "scanner::watcher", error = %error, "Watch error");
                let _ = tx.try_send(WatchEvent::Error(error.to_string()));
            }
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        tracing::debug!(target: "scanner::watcher", "File watcher stopped");
    }
}

/// Errors that can occur during file watching.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WatchError {
    #[error("Failed to initialize watcher: {0}")]
    Init(String),
    #[error("Failed to watch path: {0}")]
    Watch(String),
}
