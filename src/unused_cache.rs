use anyhow::{Context, Result};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

use crate::layout::{MediaRoot, is_cache_hash_name};
use crate::render_key::render_key;
use crate::view_config::{ViewConfigSource, build_params};

/// Find cache hash directories no active theme/store combination renders into.
///
/// Each returned path is the resolved real path of a whole directory. A
/// directory that can't be resolved aborts the search rather than being
/// reported. A hash-named symlink whose target is not itself an entry of the
/// cache directory is left alone.
pub fn find_unused_cache_dirs(
    media: &MediaRoot,
    view: &dyn ViewConfigSource,
) -> Result<Vec<PathBuf>> {
    let used = used_cache_hashes(view);
    debug!("{} cache hash(es) in use", used.len());

    let cache_dir = media.cache_dir();
    let present = cache_hash_dirs_on_disk(&cache_dir)?;
    debug!("{} cache hash director(ies) on disk", present.len());
    if present.is_empty() {
        return Ok(Vec::new());
    }

    let cache_dir = fs::canonicalize(&cache_dir)
        .with_context(|| format!("Can't resolve cache directory path: {}", cache_dir.display()))?;

    let mut unused = Vec::new();
    for (name, path) in present {
        if used.contains(&name) {
            continue;
        }
        let resolved = fs::canonicalize(&path)
            .with_context(|| format!("Can't resolve cache directory path: {}", path.display()))?;
        if resolved.parent() != Some(cache_dir.as_path()) {
            warn!(
                "Skipping {}: resolves to {}, outside the cache directory",
                path.display(),
                resolved.display()
            );
            continue;
        }
        if !unused.contains(&resolved) {
            unused.push(resolved);
        }
    }
    Ok(unused)
}

/// Cache hash names produced by every declared image view of every theme in
/// use, in every store.
pub fn used_cache_hashes(view: &dyn ViewConfigSource) -> BTreeSet<String> {
    let stores = view.store_ids();
    let mut used = BTreeSet::new();

    for theme in view.themes_in_use() {
        for (image_id, image) in &theme.images {
            for &store_id in &stores {
                let params = build_params(view, theme, image, store_id);
                let key = render_key(&params);
                debug!(
                    "theme {} / image {} / store {} -> {}",
                    theme.code, image_id, store_id, key
                );
                used.insert(key);
            }
        }
    }

    used
}

/// Hash-named entries directly below the cache root, keyed by name.
fn cache_hash_dirs_on_disk(cache_dir: &Path) -> Result<BTreeMap<String, PathBuf>> {
    let entries = match fs::read_dir(cache_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Cache directory does not exist: {}", cache_dir.display());
            return Ok(BTreeMap::new());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("reading {}", cache_dir.display()));
        }
    };

    let mut dirs = BTreeMap::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("reading {}", cache_dir.display()))?;
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if !is_cache_hash_name(&name) {
            debug!("Not a cache hash entry: {}", entry.path().display());
            continue;
        }
        let file_type = entry
            .file_type()
            .with_context(|| format!("reading file type of {}", entry.path().display()))?;
        // symlinks are kept so a dangling one fails resolution loudly
        if file_type.is_dir() || file_type.is_symlink() {
            dirs.insert(name, entry.path());
        }
    }
    Ok(dirs)
}
