use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::view_config::ViewConfig;

/// The default config file contents, written by `imgsweep init`.
pub const DEFAULT_CONFIG: &str = r#"# imgsweep configuration
# Location: ~/.config/imgsweep/config.toml

# Root of the media tree (contains catalog/product/...).
# Nothing outside this directory is ever deleted.
media_root = "/var/www/html/pub/media"

# Extra extensions a converted copy of a referenced image may carry,
# comma-separated. With "webp", catalog/product/f/o/foo.webp and
# catalog/product/f/o/foo.jpg.webp are kept when foo.jpg is referenced.
alternative_extensions = ""

[database]
# SQLite copy of the catalog database
path = "/var/lib/imgsweep/catalog.sqlite"
table_prefix = ""

# Frontend image rendering settings, used to recognise which
# catalog/product/cache/<hash> directories are still in use.
[view]
jpeg_quality = 80

# [view.watermarks.small_image]
# file = "stores/1/watermark.png"
# size = "100x100"
# image_opacity = "50"
# position = "stretch"

[[view.stores]]
id = 1
code = "default"
theme = "Magento/luma"

[[view.themes]]
code = "Magento/luma"

[view.themes.images.product_thumbnail_image]
type = "thumbnail"
width = 75
height = 75
"#;

/// Connection settings for the catalog database.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Path to the SQLite database (supports `~`).
    pub path: Option<String>,

    /// Prefix prepended to every table name.
    #[serde(default)]
    pub table_prefix: String,
}

/// Runtime configuration loaded from `~/.config/imgsweep/config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Media directory (supports `~`).
    #[serde(default = "default_media_root")]
    pub media_root: String,

    /// Raw comma-separated list, see [`Config::alternative_extensions`].
    #[serde(default)]
    pub alternative_extensions: String,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub view: ViewConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            media_root: default_media_root(),
            alternative_extensions: String::new(),
            database: DatabaseConfig::default(),
            view: ViewConfig::default(),
        }
    }
}

fn default_media_root() -> String {
    "pub/media".to_string()
}

impl Config {
    /// Load config from `path`. Returns `(Config, found)`; if the file does
    /// not exist, returns the default config and `found = false`.
    pub fn load(path: &Path) -> Result<(Self, bool)> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let config: Config = toml::from_str(&text)
                    .with_context(|| format!("parsing config file: {}", path.display()))?;
                Ok((config, true))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok((Config::default(), false)),
            Err(e) => {
                Err(e).with_context(|| format!("reading config file: {}", path.display()))
            }
        }
    }

    /// Media directory with `~` expanded.
    pub fn resolved_media_root(&self) -> PathBuf {
        expand_tilde(&self.media_root)
    }

    /// Database path with `~` expanded, if configured.
    pub fn resolved_database_path(&self) -> Option<PathBuf> {
        self.database.path.as_deref().map(expand_tilde)
    }

    /// Alternative extensions: split on `,`, trimmed, empty entries dropped,
    /// surrounding dots removed (`" .webp, ,avif."` → `["webp", "avif"]`).
    pub fn alternative_extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = Vec::new();
        for ext in self.alternative_extensions.split(',') {
            let ext = ext.trim().trim_matches('.');
            if !ext.is_empty() && !extensions.iter().any(|e| e == ext) {
                extensions.push(ext.to_string());
            }
        }
        extensions
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_home() {
            return home.join(rest);
        }
    } else if path == "~"
        && let Some(home) = dirs_home()
    {
        return home;
    }
    PathBuf::from(path)
}

fn dirs_home() -> Option<PathBuf> {
    directories::UserDirs::new().map(|u| u.home_dir().to_path_buf())
}
