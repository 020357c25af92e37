use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OpenFlags, params, params_from_iter};
use std::{fmt, path::Path};

pub const GALLERY_TABLE: &str = "catalog_product_entity_media_gallery";
pub const GALLERY_TO_ENTITY_TABLE: &str = "catalog_product_entity_media_gallery_value_to_entity";
pub const ATTRIBUTE_TABLE: &str = "eav_attribute";
pub const ENTITY_TYPE_TABLE: &str = "eav_entity_type";

/// Attribute code of the product image gallery.
pub const MEDIA_GALLERY_ATTRIBUTE: &str = "media_gallery";

/// One image reference in the gallery table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryValue {
    pub value_id: i64,
    /// Stored file path, e.g. `/f/o/foo.jpg`.
    pub value: String,
}

impl fmt::Display for GalleryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[valueId {}] {}", self.value_id, self.value)
    }
}

/// Queries and deletions the cleanup needs from the catalog database.
///
/// The production implementation is [`SqliteGalleryStore`]; tests can use
/// [`mock::MockGalleryStore`] to observe delete batches.
pub trait GalleryStore {
    /// Name of the gallery table, prefix included.
    fn gallery_table(&self) -> String;

    /// Distinct gallery values following the bucket convention (`/<c>/...`).
    fn referenced_files(&self) -> Result<Vec<String>>;

    /// Id of the `media_gallery` product attribute.
    fn media_gallery_attribute_id(&self) -> Result<i64>;

    /// Image rows of `attribute_id` not linked to any entity.
    fn unlinked_values(&self, attribute_id: i64) -> Result<Vec<GalleryValue>>;

    /// Delete gallery rows by id in a single statement; returns affected rows.
    fn delete_values(&self, value_ids: &[i64]) -> Result<usize>;
}

/// Catalog database backed by SQLite.
pub struct SqliteGalleryStore {
    conn: Connection,
    table_prefix: String,
}

impl SqliteGalleryStore {
    /// Open an existing database. Never creates one: an empty reference set
    /// would mark every image as unused.
    pub fn open(path: &Path, table_prefix: &str) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("opening catalog database: {}", path.display()))?;
        Ok(Self::from_connection(conn, table_prefix))
    }

    pub fn from_connection(conn: Connection, table_prefix: &str) -> Self {
        SqliteGalleryStore {
            conn,
            table_prefix: table_prefix.to_string(),
        }
    }

    fn table(&self, name: &str) -> String {
        format!("{}{}", self.table_prefix, name)
    }
}

impl GalleryStore for SqliteGalleryStore {
    fn gallery_table(&self) -> String {
        self.table(GALLERY_TABLE)
    }

    fn referenced_files(&self) -> Result<Vec<String>> {
        let sql = format!(
            "SELECT DISTINCT value FROM {} WHERE value LIKE '/_/%'",
            self.gallery_table()
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("preparing gallery value query")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("reading gallery values")
    }

    fn media_gallery_attribute_id(&self) -> Result<i64> {
        let sql = format!(
            "SELECT a.attribute_id FROM {} AS a
             INNER JOIN {} AS t ON t.entity_type_id = a.entity_type_id
             WHERE a.attribute_code = ?1 AND t.entity_type_code = 'catalog_product'",
            self.table(ATTRIBUTE_TABLE),
            self.table(ENTITY_TYPE_TABLE),
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("preparing attribute query")?;
        let mut rows = stmt.query(params![MEDIA_GALLERY_ATTRIBUTE])?;
        match rows.next()? {
            Some(row) => Ok(row.get(0)?),
            None => bail!(
                "product attribute `{}` not found in {}",
                MEDIA_GALLERY_ATTRIBUTE,
                self.table(ATTRIBUTE_TABLE)
            ),
        }
    }

    fn unlinked_values(&self, attribute_id: i64) -> Result<Vec<GalleryValue>> {
        // LEFT JOIN ... IS NULL is much faster than NOT IN (SELECT ...) on
        // large gallery tables.
        let sql = format!(
            "SELECT g.value_id, g.value FROM {} AS g
             LEFT JOIN {} AS e ON g.value_id = e.value_id
             WHERE e.value_id IS NULL AND g.media_type = 'image' AND g.attribute_id = ?1
             ORDER BY g.value_id",
            self.gallery_table(),
            self.table(GALLERY_TO_ENTITY_TABLE),
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("preparing obsolete gallery query")?;
        let rows = stmt.query_map(params![attribute_id], |row| {
            Ok(GalleryValue {
                value_id: row.get(0)?,
                value: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("reading obsolete gallery values")
    }

    fn delete_values(&self, value_ids: &[i64]) -> Result<usize> {
        if value_ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; value_ids.len()].join(",");
        let sql = format!(
            "DELETE FROM {} WHERE value_id IN ({placeholders})",
            self.gallery_table()
        );
        self.conn
            .execute(&sql, params_from_iter(value_ids.iter()))
            .with_context(|| format!("deleting rows from {}", self.gallery_table()))
    }
}

// ─── Mock implementation (for testing) ───────────────────────────────────────

pub mod mock {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    /// In-memory gallery; records every delete batch it receives.
    #[derive(Debug, Default)]
    pub struct MockGalleryStore {
        pub rows: Mutex<BTreeSet<i64>>,
        pub delete_batches: Mutex<Vec<Vec<i64>>>,
    }

    impl MockGalleryStore {
        pub fn with_rows(ids: impl IntoIterator<Item = i64>) -> Self {
            MockGalleryStore {
                rows: Mutex::new(ids.into_iter().collect()),
                delete_batches: Mutex::new(Vec::new()),
            }
        }

        /// Snapshot of the batches passed to [`delete_values`](GalleryStore::delete_values).
        pub fn batches(&self) -> Vec<Vec<i64>> {
            self.delete_batches.lock().unwrap().clone()
        }
    }

    impl GalleryStore for MockGalleryStore {
        fn gallery_table(&self) -> String {
            GALLERY_TABLE.to_string()
        }

        fn referenced_files(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn media_gallery_attribute_id(&self) -> Result<i64> {
            Ok(90)
        }

        fn unlinked_values(&self, _attribute_id: i64) -> Result<Vec<GalleryValue>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .map(|&value_id| GalleryValue {
                    value_id,
                    value: format!("/m/o/mock-{value_id}.jpg"),
                })
                .collect())
        }

        fn delete_values(&self, value_ids: &[i64]) -> Result<usize> {
            self.delete_batches.lock().unwrap().push(value_ids.to_vec());
            let mut rows = self.rows.lock().unwrap();
            Ok(value_ids.iter().filter(|&&id| rows.remove(&id)).count())
        }
    }
}
