use std::path::Path;
use tracing::warn;
use walkdir::WalkDir;

/// Running file count and byte total for a set of paths.
///
/// Collection can be switched off (`--no-stats`) since walking large cache
/// directories is slow; the counters then stay at zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileStats {
    enabled: bool,
    files: u64,
    bytes: u64,
}

impl FileStats {
    pub fn new(enabled: bool) -> Self {
        FileStats {
            enabled,
            ..Default::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn reset(&mut self) {
        self.files = 0;
        self.bytes = 0;
    }

    /// Count `path`: a file counts once, a directory counts every file below
    /// it. Symlinks are neither followed nor counted.
    pub fn add_path(&mut self, path: &Path) {
        if !self.enabled {
            return;
        }

        for entry in WalkDir::new(path).follow_links(false) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Can't read {} for stats: {}", path.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            match entry.metadata() {
                Ok(meta) => {
                    self.files += 1;
                    self.bytes += meta.len();
                }
                Err(e) => warn!("Can't read size of {}: {}", entry.path().display(), e),
            }
        }
    }

    pub fn add_paths<P: AsRef<Path>>(&mut self, paths: &[P]) {
        for path in paths {
            self.add_path(path.as_ref());
        }
    }

    pub fn files(&self) -> u64 {
        self.files
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

/// Human-readable size in binary units, two decimals at most.
///
/// `1536` → `1.5 KiB`, `0` → `0 Bytes`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["Bytes", "KiB", "MiB", "GiB", "TiB"];

    let mut pow = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && pow < UNITS.len() - 1 {
        value /= 1024.0;
        pow += 1;
    }

    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[pow])
}
