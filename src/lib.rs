pub mod cli;
pub mod config;
pub mod corrupt;
pub mod deleter;
pub mod gallery;
pub mod interaction;
pub mod layout;
pub mod obsolete;
pub mod render_key;
pub mod stats;
pub mod unused_cache;
pub mod unused_files;
pub mod view_config;

use anyhow::{Context, Result};
use directories::BaseDirs;
use fd_lock::RwLock as FdRwLock;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::{debug, info, warn};

use config::{Config, expand_tilde};
use deleter::{GalleryDeleter, MediaDeleter};
use gallery::{GalleryStore, SqliteGalleryStore};
use layout::MediaRoot;
use stats::FileStats;

// ─── AppContext ───────────────────────────────────────────────────────────────

/// Paths shared by every command handler.
///
/// Owned here so that tests can point the config and lock file at temporary
/// directories.
pub struct AppContext {
    /// Path to the TOML configuration file.
    pub config_path: PathBuf,
    /// Path to the advisory lock file used to prevent concurrent cleanups.
    pub lock_path: PathBuf,
}

impl AppContext {
    /// Creates the default production context using standard user paths.
    pub fn production() -> Self {
        AppContext {
            config_path: default_config_path(),
            lock_path: default_lock_path(),
        }
    }
}

fn default_config_path() -> PathBuf {
    expand_tilde("~/.config/imgsweep/config.toml")
}

fn default_lock_path() -> PathBuf {
    if let Some(base) = BaseDirs::new() {
        base.cache_dir().join("imgsweep/imgsweep.lock")
    } else {
        expand_tilde("~/.cache/imgsweep/imgsweep.lock")
    }
}

/// Options shared by the cleanup commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupOptions {
    /// Skip the confirmation prompt.
    pub yes: bool,
    /// Collect file counts and sizes.
    pub stats: bool,
    /// Report candidates, delete nothing.
    pub dry_run: bool,
}

// ─── file cleanup commands ────────────────────────────────────────────────────

/// Execute `remove-corrupt-resized-files`.
pub fn cmd_remove_corrupt_resized_files(
    ctx: &AppContext,
    config: &Config,
    opts: CleanupOptions,
) -> Result<()> {
    run_path_cleanup(ctx, config, opts, "corrupt resized files", |media| {
        corrupt::find_corrupt_resized_files(media)
    })
}

/// Execute `remove-unused-files`: compare gallery values with files on disk.
pub fn cmd_remove_unused_files(
    ctx: &AppContext,
    config: &Config,
    opts: CleanupOptions,
) -> Result<()> {
    let gallery = open_gallery(config)?;
    let extensions = config.alternative_extensions();
    if !extensions.is_empty() {
        debug!("Alternative extensions: {}", extensions.join(", "));
    }
    run_path_cleanup(ctx, config, opts, "unused files", |media| {
        unused_files::find_unused_files(media, &gallery, &extensions)
    })
}

/// Execute `remove-unused-hash-directories`.
pub fn cmd_remove_unused_hash_directories(
    ctx: &AppContext,
    config: &Config,
    opts: CleanupOptions,
) -> Result<()> {
    run_path_cleanup(ctx, config, opts, "unused hash directories", |media| {
        unused_cache::find_unused_cache_dirs(media, &config.view)
    })
}

/// Find → show → confirm → delete → report, for any path finder.
///
/// The media root is resolved first; failing to resolve it aborts the run.
fn run_path_cleanup<F>(
    ctx: &AppContext,
    config: &Config,
    opts: CleanupOptions,
    what: &str,
    find: F,
) -> Result<()>
where
    F: FnOnce(&MediaRoot) -> Result<Vec<PathBuf>>,
{
    let start = Instant::now();
    let media = MediaRoot::resolve(&config.resolved_media_root())?;
    debug!("Media directory: {}", media.path().display());

    info!("Searching for {}…", what);
    let paths = find(&media)?;
    debug!(
        "Found {} path(s) in {:.2}s",
        paths.len(),
        start.elapsed().as_secs_f64()
    );

    if paths.is_empty() {
        interaction::show_nothing_found(what);
        return Ok(());
    }

    let mut preview = FileStats::new(opts.stats);
    interaction::show_paths_to_delete(&paths, &mut preview);

    if opts.dry_run {
        info!("[dry-run] {} path(s) would be removed", paths.len());
        return Ok(());
    }

    if !interaction::confirm("Continue with the deletion of these paths?", opts.yes)? {
        info!("Aborted.");
        return Ok(());
    }

    let mut lock = open_lock_file(&ctx.lock_path)?;
    let Ok(_guard) = lock.try_write() else {
        warn!("Another imgsweep instance is running. Skipping.");
        return Ok(());
    };

    let mut deleter = MediaDeleter::new(&media, opts.stats);
    deleter.delete_paths(&paths)?;
    interaction::show_final_info(&deleter, opts.stats);

    info!(
        "Done in {:.2}s: removed {}, skipped {}",
        start.elapsed().as_secs_f64(),
        deleter.deleted_paths().len(),
        deleter.skipped_paths().len(),
    );
    Ok(())
}

// ─── `remove-obsolete-db-entries` command ─────────────────────────────────────

/// Execute `remove-obsolete-db-entries`: drop gallery rows no product uses.
pub fn cmd_remove_obsolete_db_entries(
    ctx: &AppContext,
    config: &Config,
    opts: CleanupOptions,
) -> Result<()> {
    let gallery = open_gallery(config)?;
    remove_obsolete_db_entries(ctx, &gallery, opts)
}

/// Body of [`cmd_remove_obsolete_db_entries`], against any [`GalleryStore`].
pub fn remove_obsolete_db_entries(
    ctx: &AppContext,
    gallery: &dyn GalleryStore,
    opts: CleanupOptions,
) -> Result<()> {
    let table = gallery.gallery_table();

    info!("Searching for obsolete gallery values…");
    let values = obsolete::find_obsolete_values(gallery)?;
    if values.is_empty() {
        interaction::show_nothing_found("obsolete database values");
        return Ok(());
    }

    interaction::show_values_to_delete(&values, &table);

    if opts.dry_run {
        info!("[dry-run] {} row(s) would be removed from {}", values.len(), table);
        return Ok(());
    }

    if !interaction::confirm("Continue with the deletion of these values?", opts.yes)? {
        info!("Aborted.");
        return Ok(());
    }

    let mut lock = open_lock_file(&ctx.lock_path)?;
    let Ok(_guard) = lock.try_write() else {
        warn!("Another imgsweep instance is running. Skipping.");
        return Ok(());
    };

    let mut deleter = GalleryDeleter::new(gallery);
    deleter.delete_gallery_values(&values)?;
    interaction::show_final_db_info(&deleter, &table);
    Ok(())
}

/// Open the configured catalog database.
pub fn open_gallery(config: &Config) -> Result<SqliteGalleryStore> {
    let Some(path) = config.resolved_database_path() else {
        anyhow::bail!("no catalog database configured; set `path` in the [database] section");
    };
    SqliteGalleryStore::open(&path, &config.database.table_prefix)
}

// ─── `init` command ───────────────────────────────────────────────────────────

/// Execute the `init` command: write a default config file with inline comments.
///
/// Does nothing if the file already exists, unless `force` is `true`.
pub fn cmd_init(ctx: &AppContext, force: bool) -> Result<()> {
    if ctx.config_path.exists() && !force {
        info!(
            "Config file already exists at {}. Use --force to overwrite.",
            ctx.config_path.display()
        );
        return Ok(());
    }

    if let Some(parent) = ctx.config_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config dir: {}", parent.display()))?;
    }

    fs::write(&ctx.config_path, config::DEFAULT_CONFIG)
        .with_context(|| format!("writing config: {}", ctx.config_path.display()))?;

    info!("Config written to {}", ctx.config_path.display());
    Ok(())
}

// ─── Lockfile ─────────────────────────────────────────────────────────────────

/// Open (or create) the lockfile and return it wrapped in an `RwLock`.
///
/// The caller keeps the guard from [`try_write()`](FdRwLock::try_write) alive
/// while deleting. The OS releases the lock on process exit, even on `SIGKILL`.
fn open_lock_file(lock_path: &Path) -> Result<FdRwLock<fs::File>> {
    use std::fs::OpenOptions;

    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating lockfile dir: {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(lock_path)
        .with_context(|| format!("opening lockfile: {}", lock_path.display()))?;

    Ok(FdRwLock::new(file))
}
