//! Command-line interface for lyrics-keeper.
//!
//! Subcommands for consolidating, reconciling and watching a lyrics
//! archive, plus an interactive menu for editing song metadata.

mod commands;

pub use commands::{Cli, Commands, WatchAction, run_command};
