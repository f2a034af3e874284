//! File decoding for config files.
//!
//! The engine never parses file bytes itself. Each format is handled by a
//! [`FileDecoder`] that turns a file into an untyped [`Map`]; decoders are kept
//! in a [`Decoders`] registry keyed by file extension. TOML (`.toml`) and JSON
//! (`.json`) are registered by default, and callers may add or replace entries
//! through [`BindfigBuilder::file_decoder`](crate::BindfigBuilder::file_decoder).
//!
//! # Key lookup
//!
//! Field keys for files are dotted paths (`database.url`). A decoded file keeps
//! its tables nested, so a key that is not found at the top level is looked up
//! by [`find_nested`], which flattens the enclosing tables into dotted entries
//! of the top-level map. Whatever is left in the map after every field has
//! taken its key is unknown to the schema.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::DecodeError;
use crate::value::{Map, Value};

/// Decodes one file format into an untyped map.
pub trait FileDecoder {
    /// The tag namespace this format's keys are declared under (`toml`, `json`).
    fn format(&self) -> &str;

    fn decode_file(&self, path: &Path) -> Result<Map, DecodeError>;
}

/// Decoder for `.toml` files.
#[derive(Debug, Default, Clone, Copy)]
pub struct TomlDecoder;

impl FileDecoder for TomlDecoder {
    fn format(&self) -> &str {
        "toml"
    }

    fn decode_file(&self, path: &Path) -> Result<Map, DecodeError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

/// Decoder for `.json` files.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonDecoder;

impl FileDecoder for JsonDecoder {
    fn format(&self) -> &str {
        "json"
    }

    fn decode_file(&self, path: &Path) -> Result<Map, DecodeError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// File decoders by lowercase extension, dot included (`.toml`).
pub struct Decoders {
    by_ext: BTreeMap<String, Box<dyn FileDecoder>>,
}

impl Default for Decoders {
    fn default() -> Self {
        let mut decoders = Decoders::empty();
        decoders.insert(".toml", TomlDecoder);
        decoders.insert(".json", JsonDecoder);
        decoders
    }
}

impl Decoders {
    pub fn empty() -> Self {
        Decoders {
            by_ext: BTreeMap::new(),
        }
    }

    /// Register `decoder` for `ext`, replacing any previous one. A missing
    /// leading dot is added.
    pub fn insert(&mut self, ext: &str, decoder: impl FileDecoder + 'static) {
        self.by_ext.insert(normalize_ext(ext), Box::new(decoder));
    }

    /// The decoder for `path`'s extension.
    pub fn for_path(&self, path: &Path) -> Option<&dyn FileDecoder> {
        self.by_ext.get(&extension_of(path)).map(|d| d.as_ref())
    }

    /// Distinct format namespaces of all registered decoders.
    pub fn formats(&self) -> Vec<String> {
        let mut formats: Vec<String> = self.by_ext.values().map(|d| d.format().to_string()).collect();
        formats.sort();
        formats.dedup();
        formats
    }
}

fn normalize_ext(ext: &str) -> String {
    let ext = ext.to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

/// Lowercase extension of `path` with its leading dot, or an empty string.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Make `name` (a dotted key) addressable at the top level of `map` by
/// flattening the tables that enclose it.
///
/// For `a.b.c`, the table under `a` is replaced by entries `a.<k>`; then the
/// table under `a.b` is replaced by entries `a.b.<k>`. Non-table values are left
/// alone. Lookups of keys without a dot change nothing.
pub fn find_nested(map: &mut Map, name: &str) {
    let Some((parent, _)) = name.rsplit_once('.') else {
        return;
    };
    if !map.contains_key(parent) {
        find_nested(map, parent);
    }
    if !matches!(map.get(parent), Some(Value::Map(_))) {
        return;
    }
    if let Some(Value::Map(table)) = map.remove(parent) {
        for (k, v) in table {
            map.insert(format!("{parent}.{k}"), v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn toml_decoder_reads_tables() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "app.toml",
            indoc! {r#"
                port = 3000

                [database]
                url = "pg://"
            "#},
        );
        let map = TomlDecoder.decode_file(&path).unwrap();
        assert_eq!(map["port"], Value::from("3000"));
        assert!(matches!(map["database"], Value::Map(_)));
    }

    #[test]
    fn json_decoder_reads_objects() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "app.json", r#"{"port": 3000, "hosts": ["a", "b"]}"#);
        let map = JsonDecoder.decode_file(&path).unwrap();
        assert_eq!(map["port"], Value::from("3000"));
        assert_eq!(map["hosts"], Value::from(vec!["a", "b"]));
    }

    #[test]
    fn malformed_file_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.toml", "port = = 1\n");
        assert!(TomlDecoder.decode_file(&path).is_err());
        let path = write(&dir, "bad.json", "{");
        assert!(JsonDecoder.decode_file(&path).is_err());
    }

    #[test]
    fn json_top_level_must_be_object() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "list.json", "[1, 2]");
        assert!(JsonDecoder.decode_file(&path).is_err());
    }

    #[test]
    fn registry_matches_extension_case_insensitively() {
        let decoders = Decoders::default();
        assert_eq!(
            decoders.for_path(Path::new("/etc/app/CONFIG.TOML")).unwrap().format(),
            "toml"
        );
        assert_eq!(decoders.for_path(Path::new("app.json")).unwrap().format(), "json");
        assert!(decoders.for_path(Path::new("app.yaml")).is_none());
        assert!(decoders.for_path(Path::new("Makefile")).is_none());
    }

    #[test]
    fn registry_accepts_custom_decoders() {
        struct Ini;
        impl FileDecoder for Ini {
            fn format(&self) -> &str {
                "ini"
            }
            fn decode_file(&self, _path: &Path) -> Result<Map, DecodeError> {
                Ok(Map::new())
            }
        }

        let mut decoders = Decoders::default();
        decoders.insert("ini", Ini);
        assert_eq!(decoders.for_path(Path::new("a.ini")).unwrap().format(), "ini");
        assert_eq!(decoders.formats(), ["ini", "json", "toml"]);
    }

    #[test]
    fn extension_includes_dot() {
        assert_eq!(extension_of(Path::new("a/b.Json")), ".json");
        assert_eq!(extension_of(Path::new("noext")), "");
    }

    fn table(entries: &[(&str, Value)]) -> Value {
        Value::Map(entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    #[test]
    fn find_nested_flattens_enclosing_tables() {
        let mut map = Map::new();
        map.insert(
            "a".into(),
            table(&[("b", table(&[("c", Value::from("1"))])), ("x", Value::from("2"))]),
        );

        find_nested(&mut map, "a.b.c");
        assert_eq!(map.get("a.b.c"), Some(&Value::from("1")));
        assert_eq!(map.get("a.x"), Some(&Value::from("2")));
        assert!(!map.contains_key("a"));
        assert!(!map.contains_key("a.b"));
    }

    #[test]
    fn find_nested_leaves_missing_paths_alone() {
        let mut map = Map::new();
        map.insert("port".into(), Value::from("1"));
        find_nested(&mut map, "database.url");
        find_nested(&mut map, "port");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn find_nested_ignores_non_table_parent() {
        let mut map = Map::new();
        map.insert("a".into(), Value::from("scalar"));
        find_nested(&mut map, "a.b");
        assert_eq!(map["a"], Value::from("scalar"));
    }
}
