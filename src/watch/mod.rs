//! Long-running watch mode.
//!
//! Watches the archive and re-runs a pipeline (reconcile, then consolidate)
//! whenever song folders or lyrics files change. The running process holds
//! a [`LockFile`] in the archive root; [`status`] and [`stop`] work from
//! that file alone, so they can be called from any other process.
//!
//! # Coalescing
//!
//! Events never queue up runs. Any number of events seen before the channel
//! goes quiet set one pending flag, and a pending flag yields exactly one
//! run. Events caused by a run (folder renames) produce at most one more,
//! which finds nothing to do.

pub mod lock;

use chrono::{DateTime, Utc};
use crossbeam_channel::RecvTimeoutError;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::scanner::{FileWatcher, WatchEvent, WatchFilter};

pub use lock::{LOCK_FILE_NAME, LockFile, LockInfo};

/// Whether a watcher is running for an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchState {
    Stopped,
    Running { pid: u32, started_at: DateTime<Utc> },
}

/// Current state, read from the lock file.
pub fn status(base: &Path) -> Result<WatchState> {
    Ok(match lock::read(base)? {
        Some(info) => WatchState::Running {
            pid: info.pid,
            started_at: info.started_at,
        },
        None => WatchState::Stopped,
    })
}

/// Ask the running watcher to exit by removing its lock.
///
/// Returns the state before the call. The watcher notices on its next tick.
pub fn stop(base: &Path) -> Result<WatchState> {
    // An unreadable lock is still removed
    let previous = status(base).unwrap_or(WatchState::Stopped);
    if lock::remove(base)? {
        tracing::info!(target: "watch", base = %base.display(), "Stop requested");
    }
    Ok(previous)
}

/// Set a flag when Ctrl+C is pressed.
///
/// The signal is awaited on a helper thread with its own small runtime.
pub fn shutdown_on_ctrl_c() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let setter = Arc::clone(&flag);

    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::warn!(target: "watch", error = %e, "Cannot listen for Ctrl+C");
                return;
            }
        };
        runtime.block_on(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!(target: "watch", "Interrupted");
                setter.store(true, Ordering::Relaxed);
            }
        });
    });

    flag
}

/// Pending-run bookkeeping for the watch loop.
#[derive(Debug, Default)]
pub struct Coalescer {
    pending: bool,
    events: usize,
}

impl Coalescer {
    /// Record one change.
    pub fn note(&mut self) {
        self.pending = true;
        self.events += 1;
    }

    /// If a run is due, clear the flag and return how many events it covers.
    pub fn take(&mut self) -> Option<usize> {
        if !self.pending {
            return None;
        }
        self.pending = false;
        Some(std::mem::take(&mut self.events))
    }
}

#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Debounce window handed to the file watcher
    pub debounce: Duration,
    /// How often the loop checks for stop requests and quiet periods
    pub tick: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            tick: Duration::from_millis(250),
        }
    }
}

/// Why the watch loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The lock file was removed (`watch stop`)
    Stopped,
    /// The shutdown flag was set (Ctrl+C)
    Interrupted,
    /// The file watcher went away
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSummary {
    /// Pipeline runs, including the initial one
    pub runs: usize,
    /// Runs that returned an error
    pub failures: usize,
    pub exit: ExitReason,
}

/// Hold the lock, run `pipeline` once, then again after each burst of changes.
///
/// Pipeline errors are logged and the loop keeps going.
pub fn run<F>(
    base: &Path,
    filter: WatchFilter,
    options: &WatchOptions,
    shutdown: &AtomicBool,
    mut pipeline: F,
) -> Result<WatchSummary>
where
    F: FnMut() -> Result<()>,
{
    let lock = LockFile::acquire(base)?;
    let filter = filter.ignore(LOCK_FILE_NAME);
    let (_watcher, rx) = FileWatcher::new(base, filter, options.debounce)
        .map_err(|e| Error::watch(e.to_string()))?;

    let mut runs = 0;
    let mut failures = 0;
    let mut run_once = |reason: &str| {
        runs += 1;
        tracing::info!(target: "watch", run = runs, reason, "Running pipeline");
        if let Err(e) = pipeline() {
            failures += 1;
            tracing::error!(target: "watch", error = %e, "Pipeline failed");
        }
    };

    run_once("startup");

    let mut coalescer = Coalescer::default();
    let exit = loop {
        if shutdown.load(Ordering::Relaxed) {
            break ExitReason::Interrupted;
        }
        if !lock.is_held() {
            break ExitReason::Stopped;
        }

        match rx.recv_timeout(options.tick) {
            Ok(WatchEvent::Error(e)) => {
                tracing::warn!(target: "watch", error = %e, "Watcher reported an error");
            }
            Ok(event) => {
                tracing::debug!(target: "watch", path = ?event.path(), "Change queued");
                coalescer.note();
            }
            Err(RecvTimeoutError::Timeout) => {
                if let Some(events) = coalescer.take() {
                    tracing::debug!(target: "watch", events, "Quiet period reached");
                    run_once("change");
                }
            }
            Err(RecvTimeoutError::Disconnected) => break ExitReason::Disconnected,
        }
    };

    tracing::info!(target: "watch", ?exit, runs, failures, "Watcher stopped");
    Ok(WatchSummary {
        runs,
        failures,
        exit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::temp_archive;
    use std::thread;

    fn fast() -> WatchOptions {
        WatchOptions {
            debounce: Duration::from_millis(50),
            tick: Duration::from_millis(20),
        }
    }

    #[test]
    fn test_coalescer_yields_one_run_per_burst() {
        let mut c = Coalescer::default();
        assert_eq!(c.take(), None);

        for _ in 0..5 {
            c.note();
        }
        assert_eq!(c.take(), Some(5));
        assert_eq!(c.take(), None);

        c.note();
        assert_eq!(c.take(), Some(1));
    }

    #[test]
    fn test_status_and_stop() {
        let (_dir, base) = temp_archive();
        assert_eq!(status(&base).unwrap(), WatchState::Stopped);

        let lock = LockFile::acquire(&base).unwrap();
        match status(&base).unwrap() {
            WatchState::Running { pid, started_at } => {
                assert_eq!(pid, std::process::id());
                assert_eq!(started_at, lock.info().started_at);
            }
            other => panic!("expected running, got {other:?}"),
        }

        assert!(matches!(stop(&base).unwrap(), WatchState::Running { .. }));
        assert_eq!(status(&base).unwrap(), WatchState::Stopped);
        assert_eq!(stop(&base).unwrap(), WatchState::Stopped);
    }

    #[test]
    fn test_run_exits_when_stopped() {
        let (_dir, base) = temp_archive();
        let shutdown = AtomicBool::new(false);

        let stopper = {
            let base = base.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(300));
                stop(&base).unwrap();
            })
        };

        let summary = run(&base, WatchFilter::new(&base), &fast(), &shutdown, || Ok(())).unwrap();
        stopper.join().unwrap();

        assert_eq!(summary.exit, ExitReason::Stopped);
        assert!(summary.runs >= 1);
        assert_eq!(status(&base).unwrap(), WatchState::Stopped);
    }

    #[test]
    fn test_run_exits_on_shutdown_flag_and_releases_lock() {
        let (_dir, base) = temp_archive();
        let shutdown = AtomicBool::new(true);

        let summary = run(&base, WatchFilter::new(&base), &fast(), &shutdown, || {
            Err(Error::watch("boom"))
        })
        .unwrap();

        assert_eq!(summary.exit, ExitReason::Interrupted);
        assert_eq!(summary.runs, 1);
        assert_eq!(summary.failures, 1);
        assert_eq!(status(&base).unwrap(), WatchState::Stopped);
    }

    #[test]
    fn test_run_refuses_second_watcher() {
        let (_dir, base) = temp_archive();
        let _held = LockFile::acquire(&base).unwrap();
        let shutdown = AtomicBool::new(true);

        let err = run(&base, WatchFilter::new(&base), &fast(), &shutdown, || Ok(())).unwrap_err();

        assert!(matches!(err, Error::Watch(_)));
    }
}
