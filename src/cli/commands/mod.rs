//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `consolidate`: Rebuild the consolidated lyrics document
//! - `reconcile`: Normalize folder names and metadata keys
//! - `watch`: Watch mode and its process control
//! - `songs`: Listing and slug preview
//! - `menu`: Interactive song editor

mod consolidate;
mod menu;
mod reconcile;
mod songs;
mod watch;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{self, Overrides, Settings};

pub use consolidate::cmd_consolidate;
pub use menu::cmd_menu;
pub use reconcile::cmd_reconcile;
pub use songs::{cmd_list, cmd_slug};
pub use watch::cmd_watch;

/// Lyrics archive toolkit
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Archive root holding one folder per song (default: current directory)
    #[arg(long, global = true, env = "LYRICS_KEEPER_BASE_DIR")]
    pub base_dir: Option<PathBuf>,

    /// Metadata document, relative to the base directory
    #[arg(long, global = true)]
    pub metadata: Option<PathBuf>,

    /// Consolidated lyrics document, relative to the base directory
    #[arg(long, global = true)]
    pub output: Option<PathBuf>,

    /// TOML config file
    #[arg(long, global = true, env = "LYRICS_KEEPER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Rebuild the consolidated lyrics document from the song folders
    Consolidate {
        /// Show what would be written without writing
        #[arg(long)]
        dry_run: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rename folders to their keys and bring the metadata in line
    Reconcile {
        /// Show what would change without touching disk
        #[arg(long)]
        dry_run: bool,
        /// Exit with an error on key collisions or filesystem conflicts
        #[arg(long)]
        strict: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Watch the archive and re-run reconcile + consolidate on changes
    Watch {
        #[command(subcommand)]
        action: WatchAction,
    },
    /// Interactive song editor
    Menu,
    /// List songs in the metadata document
    List {
        /// Only songs with this status
        #[arg(long)]
        status: Option<String>,
        /// Only songs with this tag
        #[arg(long)]
        tag: Option<String>,
    },
    /// Print the key a title maps to
    Slug {
        /// Song title
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
    },
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchAction {
    /// Watch in the foreground until stopped or Ctrl+C
    Run,
    /// Start a background watcher
    Start,
    /// Ask a running watcher to exit
    Stop,
    /// Show whether a watcher is running
    Status,
}

impl Cli {
    /// Load the config file (if any) and apply command-line overrides.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let config = config::load(self.config.as_deref())?;
        Ok(config.resolve(Overrides {
            base_dir: self.base_dir.clone(),
            metadata: self.metadata.clone(),
            output: self.output.clone(),
        }))
    }
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    if let Commands::Slug { title } = &cli.command {
        return cmd_slug(&title.join(" "));
    }

    let settings = cli.settings()?;
    tracing::debug!(target: "cli", ?settings, "Resolved settings");

    match &cli.command {
        Commands::Consolidate { dry_run, json } => cmd_consolidate(&settings, *dry_run, *json),
        Commands::Reconcile {
            dry_run,
            strict,
            json,
        } => cmd_reconcile(&settings, *dry_run, *strict, *json),
        Commands::Watch { action } => cmd_watch(&settings, cli.config.as_deref(), *action),
        Commands::Menu => cmd_menu(&settings),
        Commands::List { status, tag } => cmd_list(&settings, status.as_deref(), tag.as_deref()),
        Commands::Slug { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "lyrics-keeper",
            "reconcile",
            "--dry-run",
            "--base-dir",
            "/songs",
            "-v",
        ])
        .unwrap();

        assert_eq!(cli.base_dir, Some(PathBuf::from("/songs")));
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Reconcile {
                dry_run: true,
                strict: false,
                json: false
            }
        ));
    }

    #[test]
    fn test_parse_watch_actions() {
        for (arg, action) in [
            ("run", WatchAction::Run),
            ("start", WatchAction::Start),
            ("stop", WatchAction::Stop),
            ("status", WatchAction::Status),
        ] {
            let cli = Cli::try_parse_from(["lyrics-keeper", "watch", arg]).unwrap();
            assert!(matches!(cli.command, Commands::Watch { action: a } if a == action));
        }
        assert!(Cli::try_parse_from(["lyrics-keeper", "watch"]).is_err());
    }

    #[test]
    fn test_slug_joins_words() {
        let cli = Cli::try_parse_from(["lyrics-keeper", "slug", "Madre", "y", "Padre"]).unwrap();
        match cli.command {
            Commands::Slug { title } => assert_eq!(title.join(" "), "Madre y Padre"),
            _ => panic!("expected slug"),
        }
    }

    #[test]
    fn test_settings_from_flags() {
        let cli = Cli::try_parse_from([
            "lyrics-keeper",
            "list",
            "--base-dir",
            "/songs",
            "--metadata",
            "meta.yml",
        ])
        .unwrap();

        let settings = cli.settings().unwrap();

        assert_eq!(settings.metadata, PathBuf::from("/songs/meta.yml"));
        assert_eq!(settings.output, PathBuf::from("/songs/consolidated_songs.yml"));
    }
}
