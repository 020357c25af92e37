use anyhow::{Context, Result};
use std::{
    fs,
    path::{Component, Path, PathBuf},
};
use tracing::warn;

/// Original product images, relative to the media root.
pub const PRODUCT_DIR: &str = "catalog/product";

/// Resized image cache, relative to the media root.
pub const CACHE_DIR: &str = "catalog/product/cache";

/// Length (in bytes) of the terminal segment of a bucket directory.
///
/// Product images are stored as `catalog/product/<f>/<o>/foo.jpg`, nested one
/// level per character of the file name. The first segment of that length
/// marks where the comparable part of a path starts.
pub const BUCKET_SEGMENT_LEN: usize = 1;

/// Length of a cache hash directory name (hex MD5 digest).
pub const CACHE_HASH_LEN: usize = 32;

/// The writable media tree. Every path proposed for deletion must lie below it.
///
/// The root is canonicalized once on construction; failing to do so is fatal
/// since the containment boundary would be unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRoot {
    root: PathBuf,
}

impl MediaRoot {
    pub fn resolve(path: &Path) -> Result<Self> {
        let root = fs::canonicalize(path)
            .with_context(|| format!("Can't find media directory path: {}", path.display()))?;
        Ok(MediaRoot { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn product_dir(&self) -> PathBuf {
        self.root.join(PRODUCT_DIR)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(CACHE_DIR)
    }
}

/// Returns `true` if `name` is a bucket marker segment.
pub fn is_bucket_segment(name: &str) -> bool {
    name.len() == BUCKET_SEGMENT_LEN
}

/// Returns `true` if `name` looks like a cache hash directory name.
pub fn is_cache_hash_name(name: &str) -> bool {
    name.len() == CACHE_HASH_LEN && name.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Map an absolute path to its comparable relative key.
///
/// Strips `root`, then returns the suffix starting at the first bucket
/// segment, joined with `/`. `None` means the path does not follow the
/// bucket convention (or is not below `root`) and can't be compared.
///
/// `<root>/catalog/product/cache/<hash>/f/o/foo.jpg` → `f/o/foo.jpg`
pub fn normalize(path: &Path, root: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;

    let parts: Vec<&str> = rel
        .components()
        .map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect::<Option<_>>()?;

    let start = parts.iter().position(|p| is_bucket_segment(p))?;
    Some(parts[start..].join("/"))
}

/// List bucket directories directly below `dir`, sorted by path.
///
/// A missing `dir` yields an empty list.
pub fn bucket_dirs_in(dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(subdirectories(dir)?
        .into_iter()
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(is_bucket_segment)
        })
        .collect())
}

/// Bucket directories inside every cache hash directory:
/// `catalog/product/cache/*/<c>`.
pub fn resized_bucket_dirs(media: &MediaRoot) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for hash_dir in subdirectories(&media.cache_dir())? {
        dirs.extend(bucket_dirs_in(&hash_dir)?);
    }
    Ok(dirs)
}

/// Real (non-symlink) directories directly below `dir`, sorted.
fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Directory does not exist: {}", dir.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e).with_context(|| format!("reading directory {}", dir.display())),
    };

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("reading directory {}", dir.display()))?;
        let file_type = entry
            .file_type()
            .with_context(|| format!("reading file type of {}", entry.path().display()))?;
        if file_type.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}
