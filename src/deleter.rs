use anyhow::{Context, Result};
use path_clean::PathClean;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

use crate::gallery::{GalleryStore, GalleryValue};
use crate::layout::MediaRoot;
use crate::stats::FileStats;

/// Maximum number of ids per `DELETE ... IN (...)` statement.
pub const DELETE_BATCH_SIZE: usize = 5000;

/// Deletes files and directories, but only below the media root.
///
/// State is reset on every [`delete_paths`](Self::delete_paths) call.
pub struct MediaDeleter<'a> {
    media: &'a MediaRoot,
    stats: FileStats,
    deleted: Vec<PathBuf>,
    skipped: Vec<PathBuf>,
}

impl<'a> MediaDeleter<'a> {
    pub fn new(media: &'a MediaRoot, collect_stats: bool) -> Self {
        MediaDeleter {
            media,
            stats: FileStats::new(collect_stats),
            deleted: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Delete every path that lies strictly below the media root; record the
    /// rest as skipped.
    ///
    /// Stats are collected before each removal. An I/O error aborts the call;
    /// removals done up to that point stay done.
    pub fn delete_paths(&mut self, paths: &[PathBuf]) -> Result<()> {
        self.deleted.clear();
        self.skipped.clear();
        self.stats.reset();

        for path in paths {
            let Some(relative) = self.contained(path) else {
                warn!("Skipping path outside media directory: {}", path.display());
                self.skipped.push(path.clone());
                continue;
            };
            debug!("Deleting {} (media/{})", path.display(), relative.display());

            self.stats.add_path(path);
            remove(path)?;
            info!("Removed path \"{}\"", path.display());
            self.deleted.push(path.clone());
        }

        Ok(())
    }

    /// Path relative to the media root, if `path` lies strictly below it.
    fn contained(&self, path: &Path) -> Option<PathBuf> {
        if !path.is_absolute() {
            return None;
        }
        let rel = path.clean().strip_prefix(self.media.path()).ok()?.to_path_buf();
        (!rel.as_os_str().is_empty()).then_some(rel)
    }

    pub fn deleted_paths(&self) -> &[PathBuf] {
        &self.deleted
    }

    pub fn skipped_paths(&self) -> &[PathBuf] {
        &self.skipped
    }

    pub fn files_deleted(&self) -> u64 {
        self.stats.files()
    }

    pub fn bytes_deleted(&self) -> u64 {
        self.stats.bytes()
    }
}

fn remove(path: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(path)
        .with_context(|| format!("reading metadata of {}", path.display()))?;
    if meta.is_dir() {
        fs::remove_dir_all(path).with_context(|| format!("removing directory {}", path.display()))
    } else {
        fs::remove_file(path).with_context(|| format!("removing file {}", path.display()))
    }
}

/// Deletes gallery rows by primary key in batches of [`DELETE_BATCH_SIZE`].
pub struct GalleryDeleter<'a> {
    gallery: &'a dyn GalleryStore,
    batch_size: usize,
    deleted: Vec<GalleryValue>,
    rows_affected: usize,
}

impl<'a> GalleryDeleter<'a> {
    pub fn new(gallery: &'a dyn GalleryStore) -> Self {
        Self::with_batch_size(gallery, DELETE_BATCH_SIZE)
    }

    pub fn with_batch_size(gallery: &'a dyn GalleryStore, batch_size: usize) -> Self {
        GalleryDeleter {
            gallery,
            batch_size: batch_size.max(1),
            deleted: Vec::new(),
            rows_affected: 0,
        }
    }

    /// Delete `values`, summing the row counts the database reports.
    pub fn delete_gallery_values(&mut self, values: &[GalleryValue]) -> Result<()> {
        self.deleted.clear();
        self.rows_affected = 0;

        let table = self.gallery.gallery_table();
        let chunks: Vec<&[GalleryValue]> = values.chunks(self.batch_size).collect();
        let total = chunks.len();

        for (i, chunk) in chunks.into_iter().enumerate() {
            debug!("{}: delete batch {}/{} ({} row(s))", table, i + 1, total, chunk.len());
            let ids: Vec<i64> = chunk.iter().map(|v| v.value_id).collect();
            self.rows_affected += self.gallery.delete_values(&ids)?;

            for value in chunk {
                info!("Removed db value \"{}\" from table {}", value, table);
            }
            self.deleted.extend_from_slice(chunk);
        }

        Ok(())
    }

    pub fn deleted_values(&self) -> &[GalleryValue] {
        &self.deleted
    }

    /// Rows the database actually removed; may be below the candidate count.
    pub fn rows_affected(&self) -> usize {
        self.rows_affected
    }
}
