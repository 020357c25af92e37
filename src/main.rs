use anyhow::{Context, Result};
use clap::Parser;
use tracing::warn;

use imgsweep::cli::{CleanupArgs, Cli, Commands};
use imgsweep::config::Config;
use imgsweep::{
    AppContext, CleanupOptions, cmd_init, cmd_remove_corrupt_resized_files,
    cmd_remove_obsolete_db_entries, cmd_remove_unused_files, cmd_remove_unused_hash_directories,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbosity flags
    init_tracing(cli.verbose, cli.quiet);

    // CLI --config overrides the default path
    let mut ctx = AppContext::production();
    if let Some(config_path) = &cli.config {
        ctx.config_path = config_path.clone();
    }

    let (config, config_found) = Config::load(&ctx.config_path)
        .with_context(|| format!("loading config from {}", ctx.config_path.display()))?;
    if !config_found && !matches!(&cli.command, Commands::Init(_)) {
        warn!(
            "No config file found at {}, using defaults. Run `imgsweep init` to create one.",
            ctx.config_path.display()
        );
    }

    let dry_run = cli.dry_run;
    let cleanup = |args: &CleanupArgs| CleanupOptions {
        yes: args.confirm.yes,
        stats: !args.no_stats,
        dry_run,
    };

    match &cli.command {
        Commands::RemoveCorruptResizedFiles(args) => {
            cmd_remove_corrupt_resized_files(&ctx, &config, cleanup(args))
        }
        Commands::RemoveUnusedFiles(args) => cmd_remove_unused_files(&ctx, &config, cleanup(args)),
        Commands::RemoveUnusedHashDirectories(args) => {
            cmd_remove_unused_hash_directories(&ctx, &config, cleanup(args))
        }
        Commands::RemoveObsoleteDbEntries(args) => cmd_remove_obsolete_db_entries(
            &ctx,
            &config,
            CleanupOptions {
                yes: args.yes,
                stats: false,
                dry_run,
            },
        ),
        Commands::Init(args) => cmd_init(&ctx, args.force),
    }
}

// ─── Logging setup ────────────────────────────────────────────────────────────

/// Configure the global `tracing` subscriber based on CLI verbosity flags.
///
/// | flags          | effective level |
/// |----------------|-----------------|
/// | `--quiet`      | `ERROR`         |
/// | *(default)*    | `INFO`          |
/// | `-v`           | `DEBUG`         |
/// | `-vv`          | `TRACE`         |
///
/// The `RUST_LOG` environment variable takes precedence over all flags.
fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("imgsweep={level}")));

    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
