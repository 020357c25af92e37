//! Cache directory naming shared with the image renderer.
//!
//! The renderer names each `catalog/product/cache/<hash>` directory after a
//! digest of the parameters it resized with. A directory is only recognised
//! as in use if the digest computed here is byte-for-byte the same, so this
//! module pins the renderer's current scheme:
//!
//! 1. drop the keys that are not part of the identity (`type`, `id`),
//! 2. sort the remaining keys,
//! 3. encode as compact JSON the way the renderer's serializer does
//!    (`/` escaped, non-ASCII as lowercase `\uXXXX`, empty map as `[]`),
//! 4. hex-encoded MD5 of that string.

use md5::{Digest, Md5};
use serde_json::{Map, Value};
use std::fmt::Write;

/// Keys that never contribute to the render key.
pub const NON_IDENTITY_KEYS: &[&str] = &["type", "id"];

/// Compute the cache hash directory name for a render parameter set.
pub fn render_key(params: &Map<String, Value>) -> String {
    let identity: Map<String, Value> = params
        .iter()
        .filter(|(k, _)| !NON_IDENTITY_KEYS.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let encoded = canonical_json(&Value::Object(identity));
    hex::encode(Md5::digest(encoded.as_bytes()))
}

/// Encode `value` as the renderer's JSON serializer would.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => {
            let _ = write!(out, "{n}");
        }
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        // an empty associative array has no keys to tell it from a list
        Value::Object(map) if map.is_empty() => out.push_str("[]"),
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, &map[key]);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '/' => out.push_str("\\/"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ' '..='\u{7f}' => out.push(c),
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(out, "\\u{unit:04x}");
                }
            }
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_known_digest() {
        let params = map(json!({
            "image_type": "small_image",
            "image_height": 300,
            "image_width": 240,
            "background": [255, 255, 255],
            "angle": null,
            "quality": 80,
            "keep_aspect_ratio": true,
            "keep_frame": true,
            "keep_transparency": true,
            "constrain_only": true,
        }));
        assert_eq!(render_key(&params), "f35343533b5152469dc349f075684883");
    }

    #[test]
    fn test_type_and_id_are_not_identity() {
        let with = map(json!({"a": 1, "type": "thumbnail", "id": "product_thumbnail_image"}));
        let without = map(json!({"a": 1}));
        assert_eq!(render_key(&with), render_key(&without));
        assert_eq!(render_key(&without), "bb6cb5c68df4652941caf652a366f2d8");
    }

    #[test]
    fn test_empty_params_encode_as_list() {
        assert_eq!(canonical_json(&json!({})), "[]");
        assert_eq!(render_key(&Map::new()), "d751713988987e9331980363e24189ce");
    }

    #[test]
    fn test_slashes_are_escaped() {
        let params = map(json!({"file": "a/b"}));
        assert_eq!(canonical_json(&Value::Object(params.clone())), r#"{"file":"a\/b"}"#);
        assert_eq!(render_key(&params), "d83c161dab51bbb981bfc635b9af1705");
    }

    #[test]
    fn test_non_ascii_and_control_escapes() {
        assert_eq!(canonical_json(&json!("é")), r#""\u00e9""#);
        assert_eq!(canonical_json(&json!("😀")), r#""\ud83d\ude00""#);
        assert_eq!(canonical_json(&json!("a\tb\u{1}")), r#""a\tb\u0001""#);
        assert_eq!(canonical_json(&json!("say \"hi\"")), r#""say \"hi\"""#);
    }

    #[test]
    fn test_nested_keys_sorted() {
        let value = json!({"b": {"z": 1, "y": [true, null]}, "a": 1.5});
        assert_eq!(canonical_json(&value), r#"{"a":1.5,"b":{"y":[true,null],"z":1}}"#);
    }
}
