use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// imgsweep: remove stale product image files, cache directories and gallery rows.
#[derive(Debug, Parser)]
#[command(name = "imgsweep", version, about, long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v = DEBUG, -vv = TRACE)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Show what would be removed without removing anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Remove empty or unreadable resized images (they are regenerated on demand)
    RemoveCorruptResizedFiles(CleanupArgs),

    /// Remove product image files that no gallery entry references
    RemoveUnusedFiles(CleanupArgs),

    /// Remove cache/<hash> directories no active theme renders into
    RemoveUnusedHashDirectories(CleanupArgs),

    /// Remove gallery rows that are not linked to any product
    RemoveObsoleteDbEntries(ConfirmArgs),

    /// Create a default config file with inline comments
    Init(InitArgs),
}

#[derive(Debug, Args)]
pub struct CleanupArgs {
    /// Skip calculating file counts and sizes (faster on large trees)
    #[arg(long)]
    pub no_stats: bool,

    #[command(flatten)]
    pub confirm: ConfirmArgs,
}

#[derive(Debug, Args)]
pub struct ConfirmArgs {
    /// Skip confirmation prompt
    #[arg(long)]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Overwrite existing config file
    #[arg(long)]
    pub force: bool,
}
