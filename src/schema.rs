//! Schema walking: from a record type to an ordered set of addressable fields.
//!
//! A [`Record`] describes itself to a [`Visitor`]: one [`Visitor::leaf`] call
//! per value-holding field and one [`Visitor::record`] call per nested record,
//! in declaration order. `#[derive(Record)]` writes that impl; it can also be
//! written by hand:
//!
//! ```
//! use bindfig::{BindfigError, Decl, Record, Visitor};
//!
//! #[derive(Default)]
//! struct Server {
//!     host: String,
//!     port: u16,
//! }
//!
//! impl Record for Server {
//!     fn visit(&mut self, visitor: &mut dyn Visitor) -> Result<(), BindfigError> {
//!         visitor.leaf(&Decl::new("host").tag("default", "localhost"), &mut self.host)?;
//!         visitor.leaf(&Decl::new("port").tag("default", "8080"), &mut self.port)?;
//!         Ok(())
//!     }
//! }
//! ```
//!
//! [`Schema::walk`] runs one such visit and records a node per field: its
//! dotted name, its parent, its resolved tags and (for leaves) its [`Kind`].
//! Leaves are addressed by ordinal in visit order; values are written back by
//! visiting the record again with a writer that counts leaves the same way.

use std::collections::BTreeMap;

use crate::error::BindfigError;
use crate::keys;
use crate::slot::{Kind, Slot, Typed, assign};

/// Well-known tag namespaces.
pub mod tag {
    pub const DEFAULT: &str = "default";
    pub const USAGE: &str = "usage";
    pub const REQUIRED: &str = "required";
    pub const ENV: &str = "env";
    pub const FLAG: &str = "flag";
}

/// Declaration metadata for one field: its identifier and raw tags.
#[derive(Debug, Clone, PartialEq)]
pub struct Decl {
    ident: &'static str,
    tags: Vec<(&'static str, &'static str)>,
    embedded: bool,
}

impl Decl {
    pub fn new(ident: &'static str) -> Self {
        Decl {
            ident,
            tags: Vec::new(),
            embedded: false,
        }
    }

    /// Attach a raw tag, e.g. `.tag("env", "DATABASE_URL")`.
    pub fn tag(mut self, namespace: &'static str, raw: &'static str) -> Self {
        self.tags.push((namespace, raw));
        self
    }

    /// Mark a nested record whose members belong to the enclosing record.
    pub fn embedded(mut self) -> Self {
        self.embedded = true;
        self
    }

    pub fn ident(&self) -> &'static str {
        self.ident
    }

    pub fn is_embedded(&self) -> bool {
        self.embedded
    }

    /// The raw tag declared for `namespace`, if any. The last one wins.
    pub fn raw_tag(&self, namespace: &str) -> Option<&'static str> {
        self.tags
            .iter()
            .rev()
            .find(|(ns, _)| *ns == namespace)
            .map(|(_, raw)| *raw)
    }
}

/// Receives the fields of a [`Record`].
pub trait Visitor {
    /// A field that holds a value.
    fn leaf(&mut self, decl: &Decl, slot: &mut dyn Slot) -> Result<(), BindfigError>;

    /// A nested record. Implementations decide whether to descend.
    fn record(&mut self, decl: &Decl, record: &mut dyn Record) -> Result<(), BindfigError>;
}

/// A type whose fields can be bound to configuration sources.
pub trait Record {
    /// Present every field to `visitor` in declaration order.
    ///
    /// Optional nested records must be allocated before being presented, so
    /// that their fields are always reachable.
    fn visit(&mut self, visitor: &mut dyn Visitor) -> Result<(), BindfigError>;
}

/// Settings that shape the tags computed during a walk.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Namespaces that get a generated tag when none is declared, besides
    /// `env` and `flag`. One per registered file format.
    pub formats: Vec<String>,
    /// Generate tags from the identifier's words. When off, the raw
    /// identifier is used.
    pub generate_tags: bool,
}

impl Default for WalkOptions {
    fn default() -> Self {
        WalkOptions {
            formats: vec!["toml".into(), "json".into()],
            generate_tags: true,
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    ident: &'static str,
    parent: Option<usize>,
    tags: BTreeMap<String, String>,
    /// `None` for record branches.
    kind: Option<Kind>,
    required: bool,
    is_set: bool,
}

/// The flattened field set of one record.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    nodes: Vec<Node>,
    leaves: Vec<usize>,
}

impl Schema {
    /// Walk `record` once and build its field set.
    ///
    /// Fails on a malformed `required` tag.
    pub fn walk<R: Record + ?Sized>(
        record: &mut R,
        options: &WalkOptions,
    ) -> Result<Schema, BindfigError> {
        let mut walker = Walker {
            schema: Schema::default(),
            parent: None,
            options,
        };
        record.visit(&mut walker)?;
        log::debug!(
            "schema walk found {} fields ({} nodes)",
            walker.schema.leaves.len(),
            walker.schema.nodes.len()
        );
        Ok(walker.schema)
    }

    /// Leaf fields in visit order.
    pub fn fields(&self) -> impl Iterator<Item = Field<'_>> {
        (0..self.leaves.len()).map(move |ordinal| self.field(ordinal))
    }

    /// The leaf at `ordinal`.
    ///
    /// # Panics
    ///
    /// If `ordinal` is not below [`len`](Self::len).
    pub fn field(&self, ordinal: usize) -> Field<'_> {
        Field {
            schema: self,
            index: self.leaves[ordinal],
        }
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub(crate) fn mark_set(&mut self, ordinal: usize) {
        let index = self.leaves[ordinal];
        self.nodes[index].is_set = true;
    }

    pub(crate) fn reset(&mut self) {
        for node in &mut self.nodes {
            node.is_set = false;
        }
    }
}

/// A read-only view of one field.
#[derive(Clone, Copy)]
pub struct Field<'a> {
    schema: &'a Schema,
    index: usize,
}

impl<'a> Field<'a> {
    fn node(&self) -> &'a Node {
        &self.schema.nodes[self.index]
    }

    /// Dotted path of identifiers from the root, e.g. `database.url`.
    pub fn name(&self) -> &'a str {
        &self.node().name
    }

    pub fn ident(&self) -> &'static str {
        self.node().ident
    }

    /// The tag for `namespace`: resolved (`default`, `usage`, `env`, `flag`,
    /// file formats) or any other raw declaration. Empty when absent.
    pub fn tag(&self, namespace: &str) -> &'a str {
        self.node()
            .tags
            .get(namespace)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// The enclosing record field, if any.
    pub fn parent(&self) -> Option<Field<'a>> {
        self.node().parent.map(|index| Field {
            schema: self.schema,
            index,
        })
    }

    pub fn is_required(&self) -> bool {
        self.node().required
    }

    pub fn is_set(&self) -> bool {
        self.node().is_set
    }

    /// The declared kind; `None` for record branches.
    pub fn kind(&self) -> Option<&'a Kind> {
        self.node().kind.as_ref()
    }
}

impl std::fmt::Debug for Field<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("required", &self.is_required())
            .field("set", &self.is_set())
            .finish()
    }
}

struct Walker<'o> {
    schema: Schema,
    parent: Option<usize>,
    options: &'o WalkOptions,
}

impl Walker<'_> {
    fn push(&mut self, decl: &Decl, kind: Option<Kind>) -> Result<usize, BindfigError> {
        let name = match self.parent {
            Some(p) => format!("{}.{}", self.schema.nodes[p].name, decl.ident()),
            None => decl.ident().to_string(),
        };
        let required = required(decl, &name)?;

        let mut tags: BTreeMap<String, String> = decl
            .tags
            .iter()
            .map(|(ns, raw)| (ns.to_string(), raw.to_string()))
            .collect();
        tags.entry(tag::DEFAULT.into()).or_default();
        tags.entry(tag::USAGE.into()).or_default();
        let generated = [tag::ENV, tag::FLAG]
            .into_iter()
            .chain(self.options.formats.iter().map(String::as_str));
        for namespace in generated {
            let declared = decl.raw_tag(namespace).filter(|raw| !raw.is_empty());
            let value = match declared {
                Some(raw) => raw.to_string(),
                None => keys::generated_tag(namespace, decl.ident(), self.options.generate_tags),
            };
            tags.insert(namespace.to_string(), value);
        }

        let index = self.schema.nodes.len();
        self.schema.nodes.push(Node {
            name,
            ident: decl.ident(),
            parent: self.parent,
            tags,
            kind,
            required,
            is_set: false,
        });
        Ok(index)
    }
}

fn required(decl: &Decl, name: &str) -> Result<bool, BindfigError> {
    match decl.raw_tag(tag::REQUIRED) {
        None | Some("") => Ok(false),
        Some("true") => Ok(true),
        Some(other) => Err(BindfigError::Schema {
            field: name.to_string(),
            reason: format!("incorrect value for '{}' tag: {other}", tag::REQUIRED),
        }),
    }
}

impl Visitor for Walker<'_> {
    fn leaf(&mut self, decl: &Decl, slot: &mut dyn Slot) -> Result<(), BindfigError> {
        let index = self.push(decl, Some(slot.kind()))?;
        self.schema.leaves.push(index);
        Ok(())
    }

    fn record(&mut self, decl: &Decl, record: &mut dyn Record) -> Result<(), BindfigError> {
        if decl.is_embedded() {
            required(decl, decl.ident())?;
            return record.visit(self);
        }
        let index = self.push(decl, None)?;
        let outer = self.parent.replace(index);
        let result = record.visit(self);
        self.parent = outer;
        result
    }
}

/// A coerced value waiting to be stored, with the key it came from.
#[derive(Debug)]
pub(crate) struct Pending {
    pub value: Typed,
    pub key: String,
}

/// Stores pending values into a record by re-walking it.
///
/// Leaf ordinals line up with the schema built by [`Schema::walk`] because
/// both walks see the same record type in the same order.
pub(crate) struct Writer<'s> {
    schema: &'s Schema,
    pending: Vec<Option<Pending>>,
    next: usize,
}

impl<'s> Writer<'s> {
    pub(crate) fn new(schema: &'s Schema, pending: Vec<Option<Pending>>) -> Self {
        Writer {
            schema,
            pending,
            next: 0,
        }
    }

    /// Write every pending value into `record`.
    pub(crate) fn apply<R: Record + ?Sized>(mut self, record: &mut R) -> Result<(), BindfigError> {
        if self.pending.iter().all(Option::is_none) {
            return Ok(());
        }
        record.visit(&mut self)
    }
}

impl Visitor for Writer<'_> {
    fn leaf(&mut self, _decl: &Decl, slot: &mut dyn Slot) -> Result<(), BindfigError> {
        let ordinal = self.next;
        self.next += 1;
        let Some(Pending { value, key }) = self.pending.get_mut(ordinal).and_then(Option::take)
        else {
            return Ok(());
        };
        let field = self.schema.field(ordinal);
        log::trace!("assign {} from {key}", field.name());
        assign(slot, value).map_err(|source| BindfigError::Coerce {
            field: field.name().to_string(),
            key,
            source,
        })
    }

    fn record(&mut self, _decl: &Decl, record: &mut dyn Record) -> Result<(), BindfigError> {
        record.visit(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{Database, Renamed, Service, Sparse};

    fn walk<R: Record>(record: &mut R) -> Schema {
        Schema::walk(record, &WalkOptions::default()).unwrap()
    }

    fn names(schema: &Schema) -> Vec<&str> {
        schema.fields().map(|f| f.name()).collect()
    }

    #[test]
    fn leaves_in_declaration_order() {
        let mut svc = Service::default();
        let schema = walk(&mut svc);
        assert_eq!(
            names(&schema),
            [
                "host",
                "port",
                "debug",
                "tags",
                "database.url",
                "database.pool_size",
                "database.timeout",
            ]
        );
    }

    #[test]
    fn nested_fields_link_to_parent() {
        let mut svc = Service::default();
        let schema = walk(&mut svc);
        let url = schema.fields().find(|f| f.name() == "database.url").unwrap();
        let parent = url.parent().unwrap();
        assert_eq!(parent.name(), "database");
        assert!(parent.kind().is_none());
        assert!(parent.parent().is_none());
    }

    #[test]
    fn embedded_members_take_grandparent() {
        let mut svc = Service::default();
        let schema = walk(&mut svc);
        let timeout = schema.fields().find(|f| f.ident() == "timeout").unwrap();
        assert_eq!(timeout.parent().unwrap().name(), "database");

        let mut db = Database::default();
        let schema = walk(&mut db);
        let timeout = schema.fields().find(|f| f.ident() == "timeout").unwrap();
        assert_eq!(timeout.name(), "timeout");
        assert!(timeout.parent().is_none());
    }

    #[test]
    fn tags_resolved_once_at_walk() {
        let mut svc = Service::default();
        let schema = walk(&mut svc);
        let pool = schema.field(5);
        assert_eq!(pool.tag("env"), "POOL_SIZE");
        assert_eq!(pool.tag("flag"), "pool_size");
        assert_eq!(pool.tag("toml"), "pool_size");
        assert_eq!(pool.tag("json"), "pool_size");
        assert_eq!(pool.tag("default"), "5");
        assert_eq!(pool.tag("yaml"), "");
        assert_eq!(pool.kind(), Some(&Kind::Uint { bits: 32 }));
    }

    #[test]
    fn raw_tags_are_retrievable() {
        let mut svc = Service::default();
        let schema = walk(&mut svc);
        let host = schema.field(0);
        assert_eq!(host.tag("required"), "true");
        assert!(host.is_required());
        assert!(!host.is_set());
    }

    #[test]
    fn explicit_tags_beat_generated_ones() {
        let mut r = Renamed::default();
        let schema = walk(&mut r);
        let listen = schema.field(0);
        assert_eq!(listen.tag("env"), "BIND_ADDR");
        assert_eq!(listen.tag("flag"), "-");
        assert_eq!(listen.tag("toml"), "listen");
    }

    #[test]
    fn tag_generation_can_be_disabled() {
        let mut r = Renamed::default();
        let options = WalkOptions {
            generate_tags: false,
            ..WalkOptions::default()
        };
        let schema = Schema::walk(&mut r, &options).unwrap();
        let level = schema.fields().find(|f| f.ident() == "logLevel").unwrap();
        assert_eq!(level.tag("env"), "logLevel");
        assert_eq!(level.tag("toml"), "logLevel");
    }

    #[test]
    fn optional_records_are_allocated() {
        let mut sparse = Sparse::default();
        assert!(sparse.proxy.is_none());
        let schema = walk(&mut sparse);
        assert!(sparse.proxy.is_some());
        assert!(names(&schema).contains(&"proxy.url"));
    }

    #[test]
    fn malformed_required_tag_is_schema_error() {
        struct Bad {
            value: u8,
        }
        impl Record for Bad {
            fn visit(&mut self, visitor: &mut dyn Visitor) -> Result<(), BindfigError> {
                visitor.leaf(&Decl::new("value").tag("required", "yes"), &mut self.value)
            }
        }
        let err = Schema::walk(&mut Bad { value: 0 }, &WalkOptions::default()).unwrap_err();
        match err {
            BindfigError::Schema { field, reason } => {
                assert_eq!(field, "value");
                assert!(reason.contains("yes"));
            }
            other => panic!("Expected Schema, got {other:?}"),
        }
    }

    #[test]
    fn writer_stores_by_ordinal() {
        let mut svc = Service::default();
        let schema = walk(&mut svc);
        let mut pending: Vec<Option<Pending>> = (0..schema.len()).map(|_| None).collect();
        pending[1] = Some(Pending {
            value: Typed::Uint(9000),
            key: "PORT".into(),
        });
        pending[4] = Some(Pending {
            value: Typed::Str("pg://db".into()),
            key: "DATABASE_URL".into(),
        });
        Writer::new(&schema, pending).apply(&mut svc).unwrap();
        assert_eq!(svc.port, 9000);
        assert_eq!(svc.database.url, "pg://db");
        assert_eq!(svc.host, "");
    }

    #[test]
    fn writer_wraps_store_errors_with_field_and_key() {
        let mut svc = Service::default();
        let schema = walk(&mut svc);
        let mut pending: Vec<Option<Pending>> = (0..schema.len()).map(|_| None).collect();
        pending[1] = Some(Pending {
            value: Typed::Str("oops".into()),
            key: "PORT".into(),
        });
        let err = Writer::new(&schema, pending).apply(&mut svc).unwrap_err();
        assert!(matches!(
            err,
            BindfigError::Coerce { ref field, ref key, .. } if field == "port" && key == "PORT"
        ));
    }
}
