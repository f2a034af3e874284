//! Post-pass checks: required fields and keys that match no field.
//!
//! Unknown file keys are reported with their file path and, for TOML files, a
//! best-effort line number.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::error::BindfigError;
use crate::file;
use crate::schema::Schema;
use crate::value::Map;

/// Fail with every unset field that is required, individually or through
/// `all_required`, in field order.
pub fn check_required(schema: &Schema, all_required: bool) -> Result<(), BindfigError> {
    let missing: Vec<String> = schema
        .fields()
        .filter(|f| !f.is_set() && (all_required || f.is_required()))
        .map(|f| f.name().to_string())
        .collect();

    if missing.is_empty() {
        return Ok(());
    }
    Err(BindfigError::MissingRequired(missing))
}

/// Fail on the first key left over in a decoded file after every field has
/// taken its own.
pub fn reject_unknown_file_keys(leftover: &Map, path: &Path) -> Result<(), BindfigError> {
    let Some(key) = leftover.keys().next() else {
        return Ok(());
    };
    let line = if file::extension_of(path) == ".toml" {
        std::fs::read_to_string(path)
            .map(|content| find_key_line(&content, key))
            .unwrap_or(0)
    } else {
        0
    };
    Err(BindfigError::UnknownField {
        key: key.clone(),
        path: path.to_path_buf(),
        line,
    })
}

/// The first flat-source name that starts with `prefix` but was consumed by no
/// field. `exempt` names are never reported.
pub fn first_unknown<'a>(
    values: &'a BTreeMap<String, String>,
    consumed: &BTreeSet<String>,
    prefix: &str,
    exempt: Option<&str>,
) -> Option<&'a str> {
    values
        .keys()
        .filter(|name| name.starts_with(prefix))
        .filter(|name| !consumed.contains(*name))
        .find(|name| Some(name.as_str()) != exempt)
        .map(String::as_str)
}

/// 1-based line of `dotted_key` in TOML `content`, or 0 when not found.
///
/// Tracks `[table]` headers while scanning, so `database.typo` matches
/// `typo = ...` under `[database]` as well as `database.typo = ...` at the
/// top level. Quoted keys and inline tables are not recognized.
fn find_key_line(content: &str, dotted_key: &str) -> usize {
    let mut table = String::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if let Some(header) = line.strip_prefix('[') {
            if header.starts_with('[') {
                continue;
            }
            table = header
                .trim_end_matches(']')
                .split('.')
                .map(str::trim)
                .collect::<Vec<_>>()
                .join(".");
            continue;
        }
        let Some((key, _)) = line.split_once('=') else {
            continue;
        };
        let key: Vec<&str> = key.split('.').map(str::trim).collect();
        let key = key.join(".");
        let full = if table.is_empty() {
            key
        } else {
            format!("{table}.{key}")
        };
        if full == dotted_key {
            return number + 1;
        }
    }
    0
}
