use anyhow::Result;
use std::{
    collections::{BTreeMap, HashSet},
    path::PathBuf,
};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::gallery::GalleryStore;
use crate::layout::{MediaRoot, bucket_dirs_in, normalize, resized_bucket_dirs};

/// Find image files on disk that no gallery value references.
///
/// Originals (`catalog/product/<c>/...`) and their resized copies
/// (`catalog/product/cache/<hash>/<c>/...`) are compared by relative key, so a
/// referenced image keeps every copy of itself. Files sharing a referenced
/// key's name with one of `alternative_extensions` are kept too.
pub fn find_unused_files(
    media: &MediaRoot,
    gallery: &dyn GalleryStore,
    alternative_extensions: &[String],
) -> Result<Vec<PathBuf>> {
    let referenced = referenced_keys(gallery)?;
    let referenced = extend_with_alternatives(referenced, alternative_extensions);
    debug!("{} referenced key(s) incl. alternatives", referenced.len());

    let on_disk = files_on_disk(media)?;
    debug!("{} distinct key(s) on disk", on_disk.len());

    Ok(on_disk
        .into_iter()
        .filter(|(key, _)| !referenced.contains(key))
        .flat_map(|(_, paths)| paths)
        .collect())
}

/// Gallery values as relative keys: `/f/o/foo.jpg` → `f/o/foo.jpg`.
fn referenced_keys(gallery: &dyn GalleryStore) -> Result<HashSet<String>> {
    Ok(gallery
        .referenced_files()?
        .into_iter()
        .map(|value| value.trim_start_matches('/').to_string())
        .collect())
}

/// Add, for every key and extension, the key with its extension replaced and
/// the key with the extension appended.
///
/// `f/o/foo.jpg` + `webp` → `f/o/foo.webp`, `f/o/foo.jpg.webp`
pub fn extend_with_alternatives(keys: HashSet<String>, extensions: &[String]) -> HashSet<String> {
    if extensions.is_empty() {
        return keys;
    }

    let mut extended = keys.clone();
    for key in &keys {
        let stem = without_extension(key);
        for ext in extensions {
            extended.insert(format!("{stem}.{ext}"));
            extended.insert(format!("{key}.{ext}"));
        }
    }
    extended
}

/// `dir/name.ext` → `dir/name`. Everything after the last dot of the file
/// name is the extension, so `dir/.hidden` → `dir/`.
fn without_extension(key: &str) -> &str {
    let base_start = key.rfind('/').map_or(0, |i| i + 1);
    match key[base_start..].rfind('.') {
        Some(dot) => &key[..base_start + dot],
        None => key,
    }
}

/// Regular files below every product bucket directory, grouped by relative
/// key. One key maps to several paths when resized copies exist.
fn files_on_disk(media: &MediaRoot) -> Result<BTreeMap<String, Vec<PathBuf>>> {
    let mut dirs = bucket_dirs_in(&media.product_dir())?;
    dirs.extend(resized_bucket_dirs(media)?);
    debug!("Scanning {} bucket director(ies)", dirs.len());

    let mut mapping: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for dir in &dirs {
        for entry in WalkDir::new(dir).follow_links(false) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Walk error in {}: {}", dir.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            match normalize(entry.path(), media.path()) {
                Some(key) => mapping.entry(key).or_default().push(entry.into_path()),
                None => debug!("Not comparable, skipped: {}", entry.path().display()),
            }
        }
    }

    Ok(mapping)
}
