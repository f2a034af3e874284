//! Documentation operations over a walked schema: env templates and key
//! listings.

use std::fmt;

use crate::keys::KeyResolver;
use crate::schema::{Schema, tag};

/// Field name → resolved key under one namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyListing {
    pub namespace: String,
    pub entries: Vec<(String, String)>,
}

impl fmt::Display for KeyListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, key)) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{name} = {key}")?;
        }
        Ok(())
    }
}

/// List the key of every field under `namespace`, skipping excluded fields.
pub fn key_listing(schema: &Schema, keys: &KeyResolver, namespace: &str) -> KeyListing {
    let entries = schema
        .fields()
        .filter_map(|field| {
            let key = keys.resolve(&field, namespace);
            (!key.is_empty()).then(|| (field.name().to_string(), key))
        })
        .collect();
    KeyListing {
        namespace: namespace.to_string(),
        entries,
    }
}

/// Generate a dotenv-style template: one `KEY=default` line per env-bound
/// field, preceded by its usage as a comment.
pub fn env_template(schema: &Schema, keys: &KeyResolver) -> String {
    let mut out = String::new();
    for field in schema.fields() {
        let key = keys.resolve(&field, tag::ENV);
        if key.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        for line in field.tag(tag::USAGE).lines() {
            out.push_str(&format!("# {line}\n"));
        }
        if field.is_required() {
            out.push_str("# (required)\n");
        }
        out.push_str(&format!("{key}={}\n", field.tag(tag::DEFAULT)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{Renamed, Service};
    use crate::schema::WalkOptions;

    fn schema() -> Schema {
        Schema::walk(&mut Service::default(), &WalkOptions::default()).unwrap()
    }

    #[test]
    fn env_template_lists_usage_and_defaults() {
        let template = env_template(&schema(), &KeyResolver::new("APP", "", "."));
        assert!(template.starts_with("# The application host.\n# (required)\nAPP_HOST=\n"));
        assert!(template.contains("# The port number.\nAPP_PORT=8080\n"));
        assert!(template.contains("# Connection pool size.\nAPP_DATABASE_POOL_SIZE=5\n"));
        assert!(template.contains("\nAPP_TAGS=\n"));
    }

    #[test]
    fn env_template_skips_excluded_fields() {
        let mut r = Renamed::default();
        let schema = Schema::walk(&mut r, &WalkOptions::default()).unwrap();
        let template = env_template(&schema, &KeyResolver::default());
        assert!(template.contains("BIND_ADDR="));
        assert!(template.contains("SECRET_TOKEN="));
        assert!(template.contains("LOG_LEVEL="));
    }

    #[test]
    fn key_listing_formats_pairs() {
        let listing = key_listing(&schema(), &KeyResolver::new("", "", "."), "toml");
        assert_eq!(listing.entries.len(), 7);
        let text = listing.to_string();
        assert!(text.starts_with("host = host\nport = port\n"));
        assert!(text.ends_with("database.timeout = database.timeout"));
    }

    #[test]
    fn key_listing_drops_excluded_fields() {
        let mut r = Renamed::default();
        let schema = Schema::walk(&mut r, &WalkOptions::default()).unwrap();
        let listing = key_listing(&schema, &KeyResolver::default(), "flag");
        let names: Vec<&str> = listing.entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["inner.token", "inner.logLevel"]);
    }

    #[test]
    fn empty_listing_displays_nothing() {
        let listing = KeyListing {
            namespace: "env".into(),
            entries: vec![],
        };
        assert_eq!(listing.to_string(), "");
    }
}
