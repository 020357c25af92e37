use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// Store id of the admin store, always present in addition to configured stores.
pub const ADMIN_STORE_ID: i64 = 0;

/// Default jpeg quality when neither store nor default scope configure one.
pub const DEFAULT_JPEG_QUALITY: i64 = 80;

/// Declared image views of a theme, keyed by image id (e.g. `product_base_image`).
pub type ImageViews = BTreeMap<String, Map<String, Value>>;

/// Watermark settings for one image type. Every field falls back to the
/// default scope individually when a store leaves it unset.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Watermark {
    pub file: Option<String>,
    /// `<width>x<height>`
    pub size: Option<String>,
    pub image_opacity: Option<String>,
    pub position: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StoreConfig {
    pub id: i64,
    #[serde(default)]
    pub code: String,
    /// Code of the theme assigned to this store.
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub jpeg_quality: Option<i64>,
    #[serde(default)]
    pub watermarks: BTreeMap<String, Watermark>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ThemeConfig {
    pub code: String,
    /// Whether images are framed by default when a view doesn't say.
    #[serde(default = "default_white_borders")]
    pub white_borders: bool,
    #[serde(default)]
    pub images: ImageViews,
}

fn default_white_borders() -> bool {
    true
}

/// Frontend rendering configuration: stores, themes and their image views.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ViewConfig {
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: i64,
    #[serde(default)]
    pub watermarks: BTreeMap<String, Watermark>,
    #[serde(default)]
    pub stores: Vec<StoreConfig>,
    #[serde(default)]
    pub themes: Vec<ThemeConfig>,
}

fn default_jpeg_quality() -> i64 {
    DEFAULT_JPEG_QUALITY
}

impl Default for ViewConfig {
    fn default() -> Self {
        ViewConfig {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            watermarks: BTreeMap::new(),
            stores: Vec::new(),
            themes: Vec::new(),
        }
    }
}

/// Source of the rendering configuration the image renderer resizes with.
pub trait ViewConfigSource {
    /// Themes assigned to at least one store.
    fn themes_in_use(&self) -> Vec<&ThemeConfig>;

    /// Ids of every store, the admin store included.
    fn store_ids(&self) -> Vec<i64>;

    /// Jpeg quality in effect for `store_id`.
    fn jpeg_quality(&self, store_id: i64) -> i64;

    /// Watermark in effect for `image_type` in `store_id`, if a file is set.
    fn watermark(&self, image_type: &str, store_id: i64) -> Option<Watermark>;
}

impl ViewConfig {
    fn store(&self, store_id: i64) -> Option<&StoreConfig> {
        self.stores.iter().find(|s| s.id == store_id)
    }
}

impl ViewConfigSource for ViewConfig {
    fn themes_in_use(&self) -> Vec<&ThemeConfig> {
        self.themes
            .iter()
            .filter(|theme| {
                self.stores
                    .iter()
                    .any(|s| s.theme.as_deref() == Some(theme.code.as_str()))
            })
            .collect()
    }

    fn store_ids(&self) -> Vec<i64> {
        let mut ids = vec![ADMIN_STORE_ID];
        for store in &self.stores {
            if !ids.contains(&store.id) {
                ids.push(store.id);
            }
        }
        ids
    }

    fn jpeg_quality(&self, store_id: i64) -> i64 {
        self.store(store_id)
            .and_then(|s| s.jpeg_quality)
            .unwrap_or(self.jpeg_quality)
    }

    fn watermark(&self, image_type: &str, store_id: i64) -> Option<Watermark> {
        let default = self.watermarks.get(image_type);
        let scoped = self
            .store(store_id)
            .and_then(|s| s.watermarks.get(image_type));

        let pick = |f: fn(&Watermark) -> &Option<String>| {
            scoped
                .and_then(|w| f(w).clone())
                .or_else(|| default.and_then(|w| f(w).clone()))
        };

        let file = pick(|w| &w.file).filter(|f| !f.is_empty())?;
        Some(Watermark {
            file: Some(file),
            size: pick(|w| &w.size),
            image_opacity: pick(|w| &w.image_opacity),
            position: pick(|w| &w.position),
        })
    }
}

/// Build the effective render parameter set for one declared image view in
/// one store, the way the renderer resolves it before resizing.
pub fn build_params(
    source: &dyn ViewConfigSource,
    theme: &ThemeConfig,
    image: &Map<String, Value>,
    store_id: i64,
) -> Map<String, Value> {
    let arg = |key: &str| image.get(key).cloned().unwrap_or(Value::Null);
    let flag = |key: &str, default: bool| match image.get(key) {
        Some(Value::Null) | None => default,
        Some(v) => is_truthy(v),
    };

    let image_type = arg("type");
    let background = match image.get("background") {
        None | Some(Value::Null) => json!([255, 255, 255]),
        Some(v) => as_array(v),
    };

    let mut params = Map::new();
    params.insert("image_type".into(), image_type.clone());
    params.insert("image_height".into(), arg("height"));
    params.insert("image_width".into(), arg("width"));
    params.insert("background".into(), background);
    params.insert("angle".into(), arg("angle"));
    params.insert("quality".into(), json!(source.jpeg_quality(store_id)));
    params.insert("keep_aspect_ratio".into(), json!(flag("aspect_ratio", true)));
    params.insert("keep_frame".into(), json!(flag("frame", theme.white_borders)));
    params.insert("keep_transparency".into(), json!(flag("transparency", true)));
    params.insert("constrain_only".into(), json!(flag("constrain", true)));

    if let Value::String(image_type) = &image_type
        && let Some(watermark) = source.watermark(image_type, store_id)
    {
        let size = watermark.size.unwrap_or_default();
        let mut dims = size.split('x');
        let dim = |d: Option<&str>| match d {
            Some(d) if !d.is_empty() && d != "0" => json!(d),
            _ => Value::Null,
        };
        params.insert("watermark_file".into(), json!(watermark.file));
        params.insert("watermark_image_opacity".into(), json!(watermark.image_opacity));
        params.insert("watermark_position".into(), json!(watermark.position));
        params.insert("watermark_width".into(), dim(dims.next()));
        params.insert("watermark_height".into(), dim(dims.next()));
    }

    params
}

/// Loose truthiness: null, false, 0, "", "0" and empty collections are false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Cast a value to a list: lists stay as-is, maps keep their values,
/// scalars become a one-element list.
fn as_array(value: &Value) -> Value {
    match value {
        Value::Array(_) => value.clone(),
        Value::Object(o) => Value::Array(o.values().cloned().collect()),
        Value::Null => Value::Array(Vec::new()),
        scalar => Value::Array(vec![scalar.clone()]),
    }
}
