use imgsweep::config::{Config, DatabaseConfig};
use imgsweep::deleter::MediaDeleter;
use imgsweep::gallery::mock::MockGalleryStore;
use imgsweep::layout::{CACHE_DIR, MediaRoot};
use imgsweep::unused_cache::used_cache_hashes;
use imgsweep::{
    AppContext, CleanupOptions, cmd_init, cmd_remove_corrupt_resized_files,
    cmd_remove_obsolete_db_entries, cmd_remove_unused_files, cmd_remove_unused_hash_directories,
    remove_obsolete_db_entries,
};
use rusqlite::{Connection, params};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const SCHEMA: &str = "
    CREATE TABLE eav_entity_type (entity_type_id INTEGER PRIMARY KEY, entity_type_code TEXT);
    CREATE TABLE eav_attribute (
        attribute_id INTEGER PRIMARY KEY, entity_type_id INTEGER, attribute_code TEXT
    );
    CREATE TABLE catalog_product_entity_media_gallery (
        value_id INTEGER PRIMARY KEY,
        attribute_id INTEGER NOT NULL,
        value TEXT,
        media_type TEXT NOT NULL DEFAULT 'image',
        disabled INTEGER NOT NULL DEFAULT 0
    );
    CREATE TABLE catalog_product_entity_media_gallery_value_to_entity (
        value_id INTEGER NOT NULL, entity_id INTEGER NOT NULL
    );
    INSERT INTO eav_entity_type VALUES (4, 'catalog_product');
    INSERT INTO eav_attribute VALUES (90, 4, 'media_gallery');
";

const STALE_HASH: &str = "bb2bb2bb2bb2bb2bb2bb2bb2bb2bb2bb";

const VIEW: &str = r#"
    [[stores]]
    id = 1
    code = "default"
    theme = "Magento/luma"

    [[themes]]
    code = "Magento/luma"

    [themes.images.category_page_grid]
    type = "small_image"
    width = 240
    height = 300
"#;

fn make_ctx(tmp: &Path) -> AppContext {
    AppContext {
        config_path: tmp.join("config.toml"),
        lock_path: tmp.join("imgsweep.lock"),
    }
}

fn media_root(tmp: &Path) -> PathBuf {
    let media = tmp.join("media");
    fs::create_dir_all(media.join("catalog/product")).unwrap();
    fs::canonicalize(media).unwrap()
}

/// Create the catalog database; `rows` are `(value_id, value, linked)`.
fn make_db(tmp: &Path, rows: &[(i64, &str, bool)]) -> PathBuf {
    let path = tmp.join("catalog.sqlite");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    for (id, value, linked) in rows {
        conn.execute(
            "INSERT INTO catalog_product_entity_media_gallery (value_id, attribute_id, value)
             VALUES (?1, 90, ?2)",
            params![id, value],
        )
        .unwrap();
        if *linked {
            conn.execute(
                "INSERT INTO catalog_product_entity_media_gallery_value_to_entity VALUES (?1, 7)",
                params![id],
            )
            .unwrap();
        }
    }
    path
}

fn make_config(media: &Path, db: Option<&Path>, alternative_extensions: &str) -> Config {
    Config {
        media_root: media.to_string_lossy().to_string(),
        alternative_extensions: alternative_extensions.to_string(),
        database: DatabaseConfig {
            path: db.map(|p| p.to_string_lossy().to_string()),
            table_prefix: String::new(),
        },
        view: toml::from_str(VIEW).unwrap(),
    }
}

fn touch(path: &Path, content: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn delete_opts() -> CleanupOptions {
    CleanupOptions {
        yes: true,
        stats: true,
        dry_run: false,
    }
}

fn gallery_ids(db: &Path) -> Vec<i64> {
    let conn = Connection::open(db).unwrap();
    let mut stmt = conn
        .prepare("SELECT value_id FROM catalog_product_entity_media_gallery ORDER BY value_id")
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .map(|r| r.unwrap())
        .collect()
}

#[test]
fn test_unused_files_end_to_end() {
    let tmp = tempdir().unwrap();
    let media = media_root(tmp.path());
    let product = media.join("catalog/product");
    let hash_dir = media.join(CACHE_DIR).join(STALE_HASH);
    touch(&product.join("a/foo.jpg"), b"foo");
    touch(&product.join("a/bar.jpg"), b"bar");
    touch(&hash_dir.join("a/foo.jpg"), b"foo");
    touch(&hash_dir.join("a/bar.jpg"), b"bar");
    touch(&product.join("placeholder/default.jpg"), b"keep");

    let db = make_db(tmp.path(), &[(1, "/a/foo.jpg", true)]);
    let ctx = make_ctx(tmp.path());
    let config = make_config(&media, Some(&db), "");

    cmd_remove_unused_files(&ctx, &config, delete_opts()).unwrap();

    assert!(product.join("a/foo.jpg").exists());
    assert!(hash_dir.join("a/foo.jpg").exists());
    assert!(!product.join("a/bar.jpg").exists());
    assert!(!hash_dir.join("a/bar.jpg").exists());
    assert!(product.join("placeholder/default.jpg").exists());
}

#[test]
fn test_unused_files_respects_alternative_extensions() {
    let tmp = tempdir().unwrap();
    let media = media_root(tmp.path());
    let product = media.join("catalog/product");
    touch(&product.join("a/myfile.jpg"), b"jpg");
    touch(&product.join("a/myfile.webp"), b"webp");
    touch(&product.join("a/myfile.jpg.avif"), b"avif");

    let db = make_db(tmp.path(), &[(1, "/a/myfile.jpg", true)]);
    let ctx = make_ctx(tmp.path());

    // without alternatives, the converted copies are unused
    let dry = CleanupOptions {
        dry_run: true,
        ..delete_opts()
    };
    cmd_remove_unused_files(&ctx, &make_config(&media, Some(&db), ""), dry).unwrap();
    assert!(product.join("a/myfile.webp").exists(), "dry-run deletes nothing");

    let config = make_config(&media, Some(&db), " .webp, avif");
    cmd_remove_unused_files(&ctx, &config, delete_opts()).unwrap();
    assert!(product.join("a/myfile.jpg").exists());
    assert!(product.join("a/myfile.webp").exists());
    assert!(product.join("a/myfile.jpg.avif").exists());
}

#[test]
fn test_unused_files_requires_database() {
    let tmp = tempdir().unwrap();
    let media = media_root(tmp.path());
    touch(&media.join("catalog/product/a/foo.jpg"), b"foo");

    let ctx = make_ctx(tmp.path());
    let config = make_config(&media, None, "");
    assert!(cmd_remove_unused_files(&ctx, &config, delete_opts()).is_err());

    // a database path that doesn't exist is never created
    let missing = tmp.path().join("missing.sqlite");
    let config = make_config(&media, Some(&missing), "");
    assert!(cmd_remove_unused_files(&ctx, &config, delete_opts()).is_err());
    assert!(!missing.exists());
    assert!(media.join("catalog/product/a/foo.jpg").exists());
}

#[test]
fn test_unresolvable_media_root_aborts() {
    let tmp = tempdir().unwrap();
    let ctx = make_ctx(tmp.path());
    let config = make_config(&tmp.path().join("no-such-media"), None, "");
    assert!(cmd_remove_corrupt_resized_files(&ctx, &config, delete_opts()).is_err());
}

#[test]
fn test_corrupt_resized_files_removed() {
    let tmp = tempdir().unwrap();
    let media = media_root(tmp.path());
    let hash_dir = media.join(CACHE_DIR).join(STALE_HASH);
    touch(&hash_dir.join("a/b/empty.jpg"), b"");
    touch(&hash_dir.join("a/b/junk.jpg"), b"garbage");
    fs::create_dir_all(hash_dir.join("a/b")).unwrap();
    image::RgbImage::new(3, 3)
        .save(hash_dir.join("a/b/fine.png"))
        .unwrap();
    touch(&media.join("catalog/product/a/b/empty.jpg"), b"");

    let ctx = make_ctx(tmp.path());
    let config = make_config(&media, None, "");
    cmd_remove_corrupt_resized_files(&ctx, &config, delete_opts()).unwrap();

    assert!(!hash_dir.join("a/b/empty.jpg").exists());
    assert!(!hash_dir.join("a/b/junk.jpg").exists());
    assert!(hash_dir.join("a/b/fine.png").exists());
    assert!(media.join("catalog/product/a/b/empty.jpg").exists());
}

#[test]
fn test_unused_hash_directories_removed() {
    let tmp = tempdir().unwrap();
    let media = media_root(tmp.path());
    let config = make_config(&media, None, "");
    let used: Vec<String> = used_cache_hashes(&config.view).into_iter().collect();
    assert_eq!(used.len(), 1);

    let cache = media.join(CACHE_DIR);
    touch(&cache.join(&used[0]).join("a/foo.jpg"), b"in use");
    touch(&cache.join(STALE_HASH).join("a/foo.jpg"), b"stale");

    let ctx = make_ctx(tmp.path());
    cmd_remove_unused_hash_directories(&ctx, &config, delete_opts()).unwrap();

    assert!(cache.join(&used[0]).exists());
    assert!(!cache.join(STALE_HASH).exists());
}

#[cfg(unix)]
#[test]
fn test_hash_symlink_out_of_media_root_survives() {
    let tmp = tempdir().unwrap();
    let outside = tempdir().unwrap();
    touch(&outside.path().join("keep.jpg"), b"precious");

    let media = media_root(tmp.path());
    let cache = media.join(CACHE_DIR);
    fs::create_dir_all(&cache).unwrap();
    let link = cache.join(STALE_HASH);
    std::os::unix::fs::symlink(outside.path(), &link).unwrap();

    let ctx = make_ctx(tmp.path());
    let config = make_config(&media, None, "");
    cmd_remove_unused_hash_directories(&ctx, &config, delete_opts()).unwrap();
    assert!(outside.path().join("keep.jpg").exists());

    // the deleter refuses the resolved target as well
    let root = MediaRoot::resolve(&media).unwrap();
    let resolved = fs::canonicalize(&link).unwrap();
    let mut deleter = MediaDeleter::new(&root, true);
    deleter.delete_paths(std::slice::from_ref(&resolved)).unwrap();

    assert_eq!(deleter.skipped_paths(), &[resolved]);
    assert!(deleter.deleted_paths().is_empty());
    assert!(outside.path().join("keep.jpg").exists());
}

#[test]
fn test_obsolete_db_entries_removed() {
    let tmp = tempdir().unwrap();
    let media = media_root(tmp.path());
    let db = make_db(
        tmp.path(),
        &[
            (1, "/a/linked.jpg", true),
            (2, "/b/orphan.jpg", false),
            (3, "/c/orphan.jpg", false),
        ],
    );
    let ctx = make_ctx(tmp.path());
    let config = make_config(&media, Some(&db), "");

    cmd_remove_obsolete_db_entries(&ctx, &config, delete_opts()).unwrap();
    assert_eq!(gallery_ids(&db), vec![1]);

    // second run finds nothing and changes nothing
    cmd_remove_obsolete_db_entries(&ctx, &config, delete_opts()).unwrap();
    assert_eq!(gallery_ids(&db), vec![1]);
}

#[test]
fn test_obsolete_db_entries_in_batches() {
    let tmp = tempdir().unwrap();
    let ctx = make_ctx(tmp.path());
    let store = MockGalleryStore::with_rows(1..=12_000);

    remove_obsolete_db_entries(&ctx, &store, delete_opts()).unwrap();

    let sizes: Vec<usize> = store.batches().iter().map(Vec::len).collect();
    assert_eq!(sizes, vec![5000, 5000, 2000]);
}

#[test]
fn test_dry_run_keeps_everything() {
    let tmp = tempdir().unwrap();
    let media = media_root(tmp.path());
    let db = make_db(tmp.path(), &[(1, "/b/orphan.jpg", false)]);
    touch(&media.join("catalog/product/z/unused.jpg"), b"z");

    let ctx = make_ctx(tmp.path());
    let config = make_config(&media, Some(&db), "");
    let opts = CleanupOptions {
        dry_run: true,
        ..delete_opts()
    };

    cmd_remove_unused_files(&ctx, &config, opts).unwrap();
    cmd_remove_obsolete_db_entries(&ctx, &config, opts).unwrap();

    assert!(media.join("catalog/product/z/unused.jpg").exists());
    assert_eq!(gallery_ids(&db), vec![1]);
}

#[test]
fn test_init_creates_config() {
    let tmp = tempdir().unwrap();
    let mut ctx = make_ctx(tmp.path());
    ctx.config_path = tmp.path().join("sub/config.toml");

    cmd_init(&ctx, false).unwrap();

    let content = fs::read_to_string(&ctx.config_path).unwrap();
    assert!(content.contains("media_root"));
    let (config, found) = Config::load(&ctx.config_path).unwrap();
    assert!(found);
    assert_eq!(config.view.themes.len(), 1);
}

#[test]
fn test_init_no_overwrite_without_force() {
    let tmp = tempdir().unwrap();
    let ctx = make_ctx(tmp.path());
    fs::write(&ctx.config_path, "original").unwrap();

    cmd_init(&ctx, false).unwrap();
    assert_eq!(fs::read_to_string(&ctx.config_path).unwrap(), "original");

    cmd_init(&ctx, true).unwrap();
    assert!(fs::read_to_string(&ctx.config_path).unwrap().contains("media_root"));
}
