use anyhow::Result;
use owo_colors::OwoColorize;
use std::{
    fmt::Display,
    io::{self, IsTerminal, Write},
    path::PathBuf,
};
use tracing::{info, warn};

use crate::deleter::{GalleryDeleter, MediaDeleter};
use crate::stats::{FileStats, format_bytes};

/// Print `text` in the given style when stdout is a terminal, plain otherwise.
fn say(text: &str, style: fn(&str) -> String) {
    if io::stdout().is_terminal() {
        println!("{}", style(text));
    } else {
        println!("{text}");
    }
}

fn bold(s: &str) -> String {
    s.bold().to_string()
}

fn green(s: &str) -> String {
    s.green().to_string()
}

fn red(s: &str) -> String {
    s.red().to_string()
}

fn yellow(s: &str) -> String {
    s.yellow().to_string()
}

/// Reported when a finder comes back empty.
pub fn show_nothing_found(what: &str) {
    say(&format!("No {what} found to cleanup, all is good!"), green);
    info!("Nothing found to cleanup, all is good!");
}

/// List candidate paths, followed by their total size when `stats` is enabled.
pub fn show_paths_to_delete(paths: &[PathBuf], stats: &mut FileStats) {
    say("We found the following paths to delete:", bold);
    for path in paths {
        say(&format!("- {}", path.display()), yellow);
    }
    println!();

    if stats.is_enabled() {
        stats.reset();
        stats.add_paths(paths);
        println!("Total files: {}", stats.files());
        println!("Filesize: {}", format_bytes(stats.bytes()));
        println!();
    }
}

/// List candidate database rows.
pub fn show_values_to_delete<T: Display>(values: &[T], table: &str) {
    say(
        &format!("We found the following values in {table} to delete:"),
        bold,
    );
    for value in values {
        say(&format!("- {value}"), yellow);
    }
    println!();
    println!("Total rows: {}", values.len());
    println!();
}

/// Ask `question` on stderr and wait for `y`/`yes`.
///
/// `assume_yes` skips the prompt. Without it, a non-interactive stdin counts
/// as "no" so nothing is ever deleted unattended by accident.
pub fn confirm(question: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    if !io::stdin().is_terminal() {
        warn!("Not running interactively; pass --yes to delete without a prompt. Skipping.");
        return Ok(false);
    }

    eprint!("{question} [y/N] ");
    io::stderr().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let accepted = matches!(input.trim().to_lowercase().as_str(), "y" | "yes");
    if accepted {
        eprintln!();
    }
    Ok(accepted)
}

/// Report what a [`MediaDeleter`] run did.
pub fn show_final_info(deleter: &MediaDeleter<'_>, stats_enabled: bool) {
    let skipped = deleter.skipped_paths();
    if !skipped.is_empty() {
        say("Skipped these paths:", red);
        for path in skipped {
            say(&format!("- {}", path.display()), red);
        }
        println!();
    }

    let deleted = deleter.deleted_paths();
    if deleted.is_empty() {
        return;
    }

    say("Deleted these paths:", green);
    for path in deleted {
        say(&format!("- {}", path.display()), green);
    }
    println!();

    if stats_enabled {
        let size = format_bytes(deleter.bytes_deleted());
        say(
            &format!(
                "Cleaned up {} files, was able to cleanup {}!",
                deleter.files_deleted(),
                size
            ),
            green,
        );
        info!(
            "-- Summary: removed {} files in total which cleared up {} of diskspace",
            deleter.files_deleted(),
            size
        );
    }
}

/// Report what a [`GalleryDeleter`] run did.
pub fn show_final_db_info(deleter: &GalleryDeleter<'_>, table: &str) {
    if deleter.deleted_values().is_empty() {
        return;
    }

    say("Deleted these values:", green);
    for value in deleter.deleted_values() {
        say(&format!("- {value}"), green);
    }
    println!();

    say(
        &format!("Removed {} rows from {}!", deleter.rows_affected(), table),
        green,
    );
    info!(
        "-- Summary: removed {} rows in the {} database table",
        deleter.rows_affected(),
        table
    );
}
