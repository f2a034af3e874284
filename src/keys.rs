//! Key resolution: turning a field into the key a source looks it up by.
//!
//! Each field carries one tag per namespace (`env`, `flag`, and one per
//! registered file format). A tag is either declared explicitly or generated
//! from the field identifier:
//!
//! | Identifier   | `env`         | `flag` / files |
//! |--------------|---------------|----------------|
//! | `port`       | `PORT`        | `port`         |
//! | `maxConns`   | `MAX_CONNS`   | `max_conns`    |
//! | `HTTPServer` | `HTTP_SERVER` | `http_server`  |
//!
//! The full key is the field's tag prefixed by its ancestors' tags, joined
//! with the namespace delimiter, then prefixed by the namespace prefix. A tag
//! of `-` excludes the field (or drops the ancestor's segment). A tag ending
//! in `,exact` or `,omitempty` is used verbatim.

use crate::schema::{Field, tag};

/// Delimiter between env key segments. Not configurable.
pub const ENV_DELIMITER: &str = "_";

/// Delimiter between file key segments, and the default flag delimiter.
pub const DEFAULT_DELIMITER: &str = ".";

const EXCLUDE: &str = "-";
const VERBATIM_MARKERS: [&str; 2] = [",exact", ",omitempty"];

/// Split an identifier into words on `_` and case boundaries.
///
/// Runs of capitals stay together as one word (`HTTPServer` → `HTTP`,
/// `Server`); digits stick to the word they follow.
pub fn split_words(ident: &str) -> Vec<String> {
    let chars: Vec<char> = ident.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower);
            if boundary {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// The tag a namespace gets when the field declares none.
pub fn generated_tag(namespace: &str, ident: &str, generate: bool) -> String {
    if !generate {
        return ident.to_string();
    }
    let words = split_words(ident);
    if namespace == tag::ENV {
        words.join("_").to_uppercase()
    } else {
        words.join("_").to_lowercase()
    }
}

/// Prefixes and delimiters per namespace.
#[derive(Debug, Clone)]
pub struct KeyResolver {
    env_prefix: String,
    flag_prefix: String,
    flag_delimiter: String,
}

impl Default for KeyResolver {
    fn default() -> Self {
        KeyResolver::new("", "", DEFAULT_DELIMITER)
    }
}

impl KeyResolver {
    /// Non-empty prefixes get their namespace delimiter appended
    /// (`APP` → `APP_`, `app` → `app.`).
    pub fn new(env_prefix: &str, flag_prefix: &str, flag_delimiter: &str) -> Self {
        let flag_delimiter = if flag_delimiter.is_empty() {
            DEFAULT_DELIMITER
        } else {
            flag_delimiter
        };
        KeyResolver {
            env_prefix: with_delimiter(env_prefix, ENV_DELIMITER),
            flag_prefix: with_delimiter(flag_prefix, flag_delimiter),
            flag_delimiter: flag_delimiter.to_string(),
        }
    }

    pub fn env_prefix(&self) -> &str {
        &self.env_prefix
    }

    pub fn flag_prefix(&self) -> &str {
        &self.flag_prefix
    }

    pub fn flag_delimiter(&self) -> &str {
        &self.flag_delimiter
    }

    /// The fully qualified key of `field` under `namespace`, or an empty
    /// string when the field is excluded from it.
    pub fn resolve(&self, field: &Field<'_>, namespace: &str) -> String {
        match namespace {
            tag::ENV => full_key(field, namespace, &self.env_prefix, ENV_DELIMITER),
            tag::FLAG => full_key(field, namespace, &self.flag_prefix, &self.flag_delimiter),
            _ => full_key(field, namespace, "", DEFAULT_DELIMITER),
        }
    }
}

fn with_delimiter(prefix: &str, delimiter: &str) -> String {
    if prefix.is_empty() {
        String::new()
    } else {
        format!("{prefix}{delimiter}")
    }
}

/// Qualify the field's `namespace` tag with its ancestors' tags and `prefix`.
pub fn full_key(field: &Field<'_>, namespace: &str, prefix: &str, delimiter: &str) -> String {
    let own = field.tag(namespace);
    if own == EXCLUDE {
        return String::new();
    }
    for marker in VERBATIM_MARKERS {
        if let Some((before, _)) = own.split_once(marker) {
            return before.to_string();
        }
    }

    let mut key = own.to_string();
    let mut ancestor = field.parent();
    while let Some(parent) = ancestor {
        let segment = parent.tag(namespace);
        if segment != EXCLUDE {
            key = format!("{}{delimiter}{key}", strip_marker(segment));
        }
        ancestor = parent.parent();
    }
    format!("{prefix}{key}")
}

fn strip_marker(segment: &str) -> &str {
    VERBATIM_MARKERS
        .iter()
        .find_map(|m| segment.split_once(m).map(|(before, _)| before))
        .unwrap_or(segment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{Database, Renamed, Service};
    use crate::schema::{Schema, WalkOptions};

    fn words(ident: &str) -> Vec<String> {
        split_words(ident)
    }

    #[test]
    fn splits_snake_and_camel_case() {
        assert_eq!(words("max_conns"), ["max", "conns"]);
        assert_eq!(words("maxConns"), ["max", "Conns"]);
        assert_eq!(words("MaxConns"), ["Max", "Conns"]);
        assert_eq!(words("port"), ["port"]);
    }

    #[test]
    fn keeps_acronyms_together() {
        assert_eq!(words("HTTPServer"), ["HTTP", "Server"]);
        assert_eq!(words("APIKey"), ["API", "Key"]);
        assert_eq!(words("ID"), ["ID"]);
        assert_eq!(words("userID"), ["user", "ID"]);
    }

    #[test]
    fn digits_stay_with_previous_word() {
        assert_eq!(words("ipv4_addr"), ["ipv4", "addr"]);
        assert_eq!(words("Http2Port"), ["Http2", "Port"]);
    }

    #[test]
    fn generated_tags_per_namespace() {
        assert_eq!(generated_tag("env", "maxConns", true), "MAX_CONNS");
        assert_eq!(generated_tag("flag", "maxConns", true), "max_conns");
        assert_eq!(generated_tag("toml", "HTTPServer", true), "http_server");
        assert_eq!(generated_tag("env", "maxConns", false), "maxConns");
    }

    fn schema_for<R: crate::Record>(record: &mut R) -> Schema {
        Schema::walk(record, &WalkOptions::default()).unwrap()
    }

    fn key_of(schema: &Schema, name: &str, resolver: &KeyResolver, ns: &str) -> String {
        let field = schema
            .fields()
            .find(|f| f.name() == name)
            .unwrap_or_else(|| panic!("no field {name}"));
        resolver.resolve(&field, ns)
    }

    #[test]
    fn nested_keys_inherit_parent_segments() {
        let mut svc = Service::default();
        let schema = schema_for(&mut svc);
        let resolver = KeyResolver::new("APP", "", ".");

        assert_eq!(key_of(&schema, "database.url", &resolver, "env"), "APP_DATABASE_URL");
        assert_eq!(key_of(&schema, "database.url", &resolver, "flag"), "database.url");
        assert_eq!(key_of(&schema, "database.url", &resolver, "toml"), "database.url");
        assert_eq!(key_of(&schema, "port", &resolver, "env"), "APP_PORT");
    }

    #[test]
    fn flag_prefix_and_delimiter() {
        let mut svc = Service::default();
        let schema = schema_for(&mut svc);
        let resolver = KeyResolver::new("", "app", "-");

        assert_eq!(key_of(&schema, "database.pool_size", &resolver, "flag"), "app-database-pool_size");
        assert_eq!(key_of(&schema, "host", &resolver, "flag"), "app-host");
    }

    #[test]
    fn explicit_tags_and_markers() {
        let mut r = Renamed::default();
        let schema = schema_for(&mut r);
        let resolver = KeyResolver::new("APP", "", ".");

        // Explicit tag still gets the prefix.
        assert_eq!(key_of(&schema, "listen", &resolver, "env"), "APP_BIND_ADDR");
        // Excluded namespace resolves to nothing.
        assert_eq!(key_of(&schema, "listen", &resolver, "flag"), "");
        // Verbatim tags skip both inheritance and prefix.
        assert_eq!(key_of(&schema, "inner.token", &resolver, "env"), "SECRET_TOKEN");
        // An excluded ancestor contributes no segment.
        assert_eq!(key_of(&schema, "inner.logLevel", &resolver, "env"), "APP_LOG_LEVEL");
        assert_eq!(key_of(&schema, "inner.logLevel", &resolver, "flag"), "inner.log_level");
    }

    #[test]
    fn embedded_members_flatten_out_of_path() {
        let mut db = Database::default();
        let schema = schema_for(&mut db);
        let resolver = KeyResolver::default();

        assert_eq!(key_of(&schema, "timeout", &resolver, "toml"), "timeout");
        assert_eq!(key_of(&schema, "timeout", &resolver, "env"), "TIMEOUT");
    }

    #[test]
    fn resolution_is_idempotent() {
        let mut svc = Service::default();
        let schema = schema_for(&mut svc);
        let resolver = KeyResolver::new("APP", "", ".");
        let first = key_of(&schema, "database.url", &resolver, "env");
        let second = key_of(&schema, "database.url", &resolver, "env");
        assert_eq!(first, second);
    }
}
