//! Watch mode commands.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::config::Settings;
use crate::consolidator::{self, ConsolidateOptions};
use crate::reconciler::{self, ReconcileOptions};
use crate::scanner::WatchFilter;
use crate::store::StoreFile;
use crate::watch::{self, WatchOptions, WatchState};

use super::WatchAction;

/// Run, start, stop or query the archive watcher
pub fn cmd_watch(settings: &Settings, config: Option<&Path>, action: WatchAction) -> anyhow::Result<()> {
    let settings = absolute_settings(settings)?;
    match action {
        WatchAction::Run => run_foreground(&settings),
        WatchAction::Start => start_background(&settings, config),
        WatchAction::Stop => {
            match watch::stop(&settings.base_dir)? {
                WatchState::Running { pid, .. } => println!("Stop requested for watcher (pid {pid})"),
                WatchState::Stopped => println!("No watcher running"),
            }
            Ok(())
        }
        WatchAction::Status => {
            print_state(&watch::status(&settings.base_dir)?);
            Ok(())
        }
    }
}

/// Reconcile, then consolidate.
pub fn run_pipeline(settings: &Settings) -> crate::error::Result<()> {
    let file = StoreFile::new(&settings.metadata).with_backup(settings.keep_backups);
    let report = reconciler::reconcile_file(&settings.base_dir, &file, &ReconcileOptions::default())?;
    for issue in &report.issues {
        tracing::warn!(target: "watch", %issue, "Unresolved");
    }

    consolidator::consolidate(
        &settings.base_dir,
        &settings.output,
        &ConsolidateOptions {
            dry_run: false,
            keep_backup: settings.keep_backups,
        },
    )?;
    Ok(())
}

fn run_foreground(settings: &Settings) -> anyhow::Result<()> {
    let filter = WatchFilter::new(&settings.base_dir)
        .ignore_path(&settings.metadata)
        .ignore_path(&settings.output);
    let options = WatchOptions {
        debounce: settings.debounce,
        ..Default::default()
    };
    let shutdown = watch::shutdown_on_ctrl_c();

    println!("Watching for changes in: {}", settings.base_dir.display());
    println!("Press Ctrl+C or run `watch stop` to stop.\n");

    let summary = watch::run(&settings.base_dir, filter, &options, &shutdown, || {
        run_pipeline(settings)
    })?;

    println!(
        "Watcher stopped ({:?}): {} runs, {} failed",
        summary.exit, summary.runs, summary.failures
    );
    Ok(())
}

fn start_background(settings: &Settings, config: Option<&Path>) -> anyhow::Result<()> {
    if let state @ WatchState::Running { .. } = watch::status(&settings.base_dir)? {
        print_state(&state);
        return Ok(());
    }

    let mut command = Command::new(std::env::current_exe()?);
    command
        .arg("watch")
        .arg("run")
        .arg("--base-dir")
        .arg(&settings.base_dir)
        .arg("--metadata")
        .arg(&settings.metadata)
        .arg("--output")
        .arg(&settings.output);
    if let Some(config) = config {
        command.arg("--config").arg(std::path::absolute(config)?);
    }
    let child = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    tracing::info!(target: "watch", pid = child.id(), "Spawned background watcher");

    // Wait for the child to take the lock
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if let state @ WatchState::Running { .. } = watch::status(&settings.base_dir)? {
            print_state(&state);
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    anyhow::bail!(
        "background watcher (pid {}) did not start; run `watch run` to see why",
        child.id()
    )
}

fn print_state(state: &WatchState) {
    match state {
        WatchState::Running { pid, started_at } => {
            println!("Watcher running (pid {pid}, since {})", started_at.to_rfc3339())
        }
        WatchState::Stopped => println!("No watcher running"),
    }
}

/// Absolute paths, so events (always absolute) match the filter and a
/// spawned watcher sees the same files regardless of its working directory.
fn absolute_settings(settings: &Settings) -> anyhow::Result<Settings> {
    let base_dir = settings.base_dir.canonicalize().map_err(|e| {
        anyhow::anyhow!("Cannot read base directory {}: {e}", settings.base_dir.display())
    })?;
    Ok(Settings {
        metadata: resolve_parent(&settings.metadata)?,
        output: resolve_parent(&settings.output)?,
        base_dir,
        ..settings.clone()
    })
}

/// Canonicalize the parent of a file that may not exist yet.
fn resolve_parent(path: &Path) -> std::io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    Ok(match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => match parent.canonicalize() {
            Ok(parent) => parent.join(name),
            Err(_) => absolute.clone(),
        },
        _ => absolute.clone(),
    })
}
