//! Lyrics Keeper - A toolkit for a folder-per-song lyrics archive.
//!
//! Consolidates scattered lyrics files into one YAML database, keeps song
//! folder names normalized, and maintains a metadata file (tags, notes,
//! status) keyed by each song's canonical key. Can watch the archive and
//! keep everything in sync as files change.

pub mod atomic;
pub mod cli;
pub mod config;
pub mod consolidator;
pub mod error;
pub mod library;
pub mod model;
pub mod organizer;
pub mod reconciler;
pub mod scanner;
pub mod slug;
pub mod store;
#[cfg(test)]
pub mod test_utils;
pub mod watch;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging; RUST_LOG wins over -v
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    cli::run_command(&args)
}
