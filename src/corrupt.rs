use anyhow::Result;
use image::error::ImageFormatHint;
use image::{ImageError, ImageReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::layout::{MediaRoot, resized_bucket_dirs};

/// Find resized images that are empty or have no readable image header.
///
/// Only files inside `catalog/product/cache/<hash>/<c>/` are considered. The
/// renderer regenerates them on the next request, so removal is cheap.
pub fn find_corrupt_resized_files(media: &MediaRoot) -> Result<Vec<PathBuf>> {
    let dirs = resized_bucket_dirs(media)?;
    debug!("Checking {} resized bucket director(ies)", dirs.len());

    let mut corrupt = Vec::new();
    for dir in &dirs {
        for entry in WalkDir::new(dir).follow_links(false) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Walk error in {}: {}", dir.display(), e);
                    continue;
                }
            };
            if entry.file_type().is_file() && is_corrupt(entry.path()) {
                debug!("Corrupt: {}", entry.path().display());
                corrupt.push(entry.into_path());
            }
        }
    }

    Ok(corrupt)
}

/// Returns `true` for zero-byte files and files whose header can't be parsed.
///
/// A file we can't stat or open is *not* reported; only positive evidence of
/// corruption counts. Neither is a file whose content identifies a format
/// this build can't decode (AVIF, for one). Truncated images with an intact
/// header pass.
pub fn is_corrupt(path: &Path) -> bool {
    let size = match path.metadata() {
        Ok(meta) => meta.len(),
        Err(e) => {
            warn!("Can't read size of {}: {}", path.display(), e);
            return false;
        }
    };
    if size == 0 {
        return true;
    }

    let mut reader = match ImageReader::open(path) {
        Ok(reader) => reader,
        Err(e) => {
            warn!("Can't open {}: {}", path.display(), e);
            return false;
        }
    };
    // the format must come from the content, not the file name
    reader.clear_format();

    let dimensions = reader
        .with_guessed_format()
        .map_err(ImageError::from)
        .and_then(|r| r.into_dimensions());
    match dimensions {
        Ok(_) => false,
        Err(ImageError::Unsupported(e)) => match e.format_hint() {
            ImageFormatHint::Exact(format) => {
                warn!(
                    "Can't decode {:?} image {}, keeping it",
                    format,
                    path.display()
                );
                false
            }
            _ => true,
        },
        Err(ImageError::Limits(e)) => {
            warn!("Skipping {}: {}", path.display(), e);
            false
        }
        Err(_) => true,
    }
}
