//! Folder and metadata reconciliation command.

use crate::config::Settings;
use crate::reconciler::{self, ReconcileOptions, ReconcileReport};
use crate::store::StoreFile;

/// Normalize folder names and bring the metadata document in line
pub fn cmd_reconcile(
    settings: &Settings,
    dry_run: bool,
    strict: bool,
    json: bool,
) -> anyhow::Result<()> {
    let file = StoreFile::new(&settings.metadata).with_backup(settings.keep_backups);
    let report = reconciler::reconcile_file(&settings.base_dir, &file, &ReconcileOptions { dry_run })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, dry_run);
    }

    if strict {
        report.into_result()?;
    }
    Ok(())
}

fn print_report(report: &ReconcileReport, dry_run: bool) {
    if dry_run {
        println!("\n[DRY RUN MODE - No folders will be renamed]\n");
    }

    let verb = if dry_run { "WOULD RENAME" } else { "RENAMED" };
    for rename in &report.renamed {
        println!("{verb}: {} -> {}", rename.from.display(), rename.to.display());
    }
    for (old, new) in &report.rekeyed {
        println!("REKEYED: {old} -> {new}");
    }
    for key in &report.created {
        println!("NEW: {key}");
    }
    for retitle in &report.retitled {
        println!("RETITLED: {}: '{}' -> '{}'", retitle.key, retitle.from, retitle.to);
    }
    for key in &report.orphans {
        println!("ORPHAN: {key} (no folder, record kept)");
    }
    for issue in &report.issues {
        eprintln!("ISSUE: {issue}");
    }

    let store = if report.store_written {
        "metadata written"
    } else if report.store_changed {
        "metadata not written"
    } else {
        "metadata unchanged"
    };
    println!(
        "\nCompleted: {} renamed, {} new, {} retitled, {} orphans, {} issues; {}",
        report.renamed.len(),
        report.created.len(),
        report.retitled.len(),
        report.orphans.len(),
        report.issues.len(),
        store
    );
}
