//! Consolidated lyrics document command.

use crate::config::Settings;
use crate::consolidator::{self, ConsolidateOptions, ConsolidateReport};

/// Rebuild the consolidated lyrics document
pub fn cmd_consolidate(settings: &Settings, dry_run: bool, json: bool) -> anyhow::Result<()> {
    let options = ConsolidateOptions {
        dry_run,
        keep_backup: settings.keep_backups,
    };
    let report = consolidator::consolidate(&settings.base_dir, &settings.output, &options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(settings, &report, dry_run);
    }
    Ok(())
}

fn print_report(settings: &Settings, report: &ConsolidateReport, dry_run: bool) {
    if dry_run {
        println!("\n[DRY RUN MODE - Nothing will be written]\n");
    }

    for dup in &report.duplicates {
        eprintln!(
            "DUPLICATE: '{}' from {} ignored, keeping {}",
            dup.key,
            dup.skipped.display(),
            dup.kept.display()
        );
    }
    for (folder, error) in &report.errors {
        eprintln!("ERROR: {}: {}", folder.display(), error);
    }
    for folder in &report.skipped {
        println!("SKIPPED: {} (no lyrics file)", folder.display());
    }

    let outcome = if dry_run {
        "would write"
    } else if report.written {
        "wrote"
    } else {
        "unchanged"
    };
    println!(
        "\nConsolidated {} songs ({} variants): {} {}",
        report.songs,
        report.variants,
        outcome,
        settings.output.display()
    );
}
