//! Writable cells and their declared kinds.
//!
//! A [`Slot`] is anything a source value can be written into: a `u16` port, a
//! `Vec<String>` of hosts, a `HashMap<String, Duration>`, a nested record. Each
//! slot reports its [`Kind`], the coercion engine turns an untyped
//! [`Value`](crate::Value) into a [`Typed`] value of that kind, and the slot
//! stores it.
//!
//! Custom types that parse from text join in through [`text_slot!`](crate::text_slot).

use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoerceError;
use crate::value::Value;

/// The declared type of a cell, as seen by the coercion engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    Bool,
    Int { bits: u32 },
    Uint { bits: u32 },
    Float { bits: u32 },
    Str,
    Duration,
    /// `Vec<u8>`: receives the raw bytes of a string.
    Bytes,
    Seq(Box<Kind>),
    Map(Box<Kind>, Box<Kind>),
    Record(Vec<Member>),
    /// A type that decodes itself from its textual form.
    Text,
    Optional(Box<Kind>),
    /// Takes the untyped source value as is.
    Any,
}

impl Kind {
    /// Whether a scalar source string can be coerced into this kind directly.
    /// Sequences of scalar kinds split their string source.
    pub fn is_scalar(&self) -> bool {
        match self {
            Kind::Bool
            | Kind::Int { .. }
            | Kind::Uint { .. }
            | Kind::Float { .. }
            | Kind::Str
            | Kind::Duration
            | Kind::Text => true,
            Kind::Optional(inner) => inner.is_scalar(),
            Kind::Bytes | Kind::Seq(_) | Kind::Map(..) | Kind::Record(_) | Kind::Any => false,
        }
    }

    /// Short name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Kind::Bool => "boolean",
            Kind::Int { .. } => "integer",
            Kind::Uint { .. } => "unsigned integer",
            Kind::Float { .. } => "float",
            Kind::Str => "string",
            Kind::Duration => "duration",
            Kind::Bytes => "bytes",
            Kind::Seq(_) => "sequence",
            Kind::Map(..) => "map",
            Kind::Record(_) => "record",
            Kind::Text => "text",
            Kind::Optional(_) => "optional",
            Kind::Any => "any",
        }
    }
}

/// A named member of a record kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: &'static str,
    pub kind: Kind,
}

impl Member {
    pub fn new(name: &'static str, kind: Kind) -> Self {
        Member { name, kind }
    }
}

/// A source value after coercion into a specific [`Kind`].
#[derive(Debug, Clone, PartialEq)]
pub enum Typed {
    /// No value was supplied; the cell is left untouched.
    Unset,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Duration(Duration),
    Bytes(Vec<u8>),
    Seq(Vec<Typed>),
    Map(Vec<(Typed, Typed)>),
    Record(Vec<(&'static str, Typed)>),
    Text(String),
    /// Allocate an optional cell, then store the inner value (if any).
    Some(Box<Typed>),
    Raw(Value),
}

impl Typed {
    pub fn variant_name(&self) -> &'static str {
        match self {
            Typed::Unset => "unset",
            Typed::Bool(_) => "bool",
            Typed::Int(_) => "int",
            Typed::Uint(_) => "uint",
            Typed::Float(_) => "float",
            Typed::Str(_) => "string",
            Typed::Duration(_) => "duration",
            Typed::Bytes(_) => "bytes",
            Typed::Seq(_) => "sequence",
            Typed::Map(_) => "map",
            Typed::Record(_) => "record",
            Typed::Text(_) => "text",
            Typed::Some(_) => "optional",
            Typed::Raw(_) => "raw",
        }
    }
}

/// A writable configuration cell.
pub trait Slot {
    fn kind(&self) -> Kind;

    /// Overwrite the cell with `value`. Never called with [`Typed::Unset`] by
    /// the engine; use [`assign`] to get that behavior.
    fn store(&mut self, value: Typed) -> Result<(), CoerceError>;
}

/// Store `value` into `slot` unless it is [`Typed::Unset`].
pub fn assign<S: Slot + ?Sized>(slot: &mut S, value: Typed) -> Result<(), CoerceError> {
    match value {
        Typed::Unset => Ok(()),
        value => slot.store(value),
    }
}

impl Slot for bool {
    fn kind(&self) -> Kind {
        Kind::Bool
    }

    fn store(&mut self, value: Typed) -> Result<(), CoerceError> {
        match value {
            Typed::Bool(b) => {
                *self = b;
                Ok(())
            }
            other => Err(CoerceError::unsupported("bool", &other)),
        }
    }
}

macro_rules! int_slot {
    ($($ty:ty),*) => {$(
        impl Slot for $ty {
            fn kind(&self) -> Kind {
                Kind::Int { bits: <$ty>::BITS }
            }

            fn store(&mut self, value: Typed) -> Result<(), CoerceError> {
                match value {
                    Typed::Int(v) => {
                        *self = <$ty>::try_from(v).map_err(|_| CoerceError::IntRange {
                            value: v.to_string(),
                            bits: <$ty>::BITS,
                        })?;
                        Ok(())
                    }
                    other => Err(CoerceError::unsupported(stringify!($ty), &other)),
                }
            }
        }
    )*};
}

macro_rules! uint_slot {
    ($($ty:ty),*) => {$(
        impl Slot for $ty {
            fn kind(&self) -> Kind {
                Kind::Uint { bits: <$ty>::BITS }
            }

            fn store(&mut self, value: Typed) -> Result<(), CoerceError> {
                match value {
                    Typed::Uint(v) => {
                        *self = <$ty>::try_from(v).map_err(|_| CoerceError::IntRange {
                            value: v.to_string(),
                            bits: <$ty>::BITS,
                        })?;
                        Ok(())
                    }
                    other => Err(CoerceError::unsupported(stringify!($ty), &other)),
                }
            }
        }
    )*};
}

int_slot!(i8, i16, i32, i64, isize);
uint_slot!(u8, u16, u32, u64, usize);

impl Slot for f32 {
    fn kind(&self) -> Kind {
        Kind::Float { bits: 32 }
    }

    fn store(&mut self, value: Typed) -> Result<(), CoerceError> {
        match value {
            Typed::Float(v) => {
                *self = v as f32;
                Ok(())
            }
            other => Err(CoerceError::unsupported("f32", &other)),
        }
    }
}

impl Slot for f64 {
    fn kind(&self) -> Kind {
        Kind::Float { bits: 64 }
    }

    fn store(&mut self, value: Typed) -> Result<(), CoerceError> {
        match value {
            Typed::Float(v) => {
                *self = v;
                Ok(())
            }
            other => Err(CoerceError::unsupported("f64", &other)),
        }
    }
}

impl Slot for String {
    fn kind(&self) -> Kind {
        Kind::Str
    }

    fn store(&mut self, value: Typed) -> Result<(), CoerceError> {
        match value {
            Typed::Str(s) => {
                *self = s;
                Ok(())
            }
            other => Err(CoerceError::unsupported("String", &other)),
        }
    }
}

impl Slot for Duration {
    fn kind(&self) -> Kind {
        Kind::Duration
    }

    fn store(&mut self, value: Typed) -> Result<(), CoerceError> {
        match value {
            Typed::Duration(d) => {
                *self = d;
                Ok(())
            }
            other => Err(CoerceError::unsupported("Duration", &other)),
        }
    }
}

impl Slot for Value {
    fn kind(&self) -> Kind {
        Kind::Any
    }

    fn store(&mut self, value: Typed) -> Result<(), CoerceError> {
        match value {
            Typed::Raw(v) => {
                *self = v;
                Ok(())
            }
            other => Err(CoerceError::unsupported("Value", &other)),
        }
    }
}

impl<T: Slot + Default> Slot for Option<T> {
    fn kind(&self) -> Kind {
        Kind::Optional(Box::new(T::default().kind()))
    }

    fn store(&mut self, value: Typed) -> Result<(), CoerceError> {
        let cell = self.get_or_insert_with(T::default);
        match value {
            Typed::Some(inner) => assign(cell, *inner),
            other => assign(cell, other),
        }
    }
}

impl<T: Slot + Default> Slot for Vec<T> {
    fn kind(&self) -> Kind {
        match T::default().kind() {
            Kind::Uint { bits: 8 } => Kind::Bytes,
            elem => Kind::Seq(Box::new(elem)),
        }
    }

    fn store(&mut self, value: Typed) -> Result<(), CoerceError> {
        let mut items = Vec::new();
        match value {
            Typed::Bytes(bytes) => {
                for byte in bytes {
                    let mut item = T::default();
                    item.store(Typed::Uint(u64::from(byte)))?;
                    items.push(item);
                }
            }
            Typed::Seq(values) => {
                items.reserve(values.len());
                for value in values {
                    let mut item = T::default();
                    assign(&mut item, value)?;
                    items.push(item);
                }
            }
            other => return Err(CoerceError::unsupported("Vec", &other)),
        }
        *self = items;
        Ok(())
    }
}

fn store_entries<K, V>(
    entries: Vec<(Typed, Typed)>,
    mut insert: impl FnMut(K, V),
) -> Result<(), CoerceError>
where
    K: Slot + Default,
    V: Slot + Default,
{
    for (k, v) in entries {
        let mut key = K::default();
        assign(&mut key, k)?;
        let mut value = V::default();
        assign(&mut value, v)?;
        insert(key, value);
    }
    Ok(())
}

impl<K, V, S> Slot for HashMap<K, V, S>
where
    K: Slot + Default + Eq + Hash,
    V: Slot + Default,
    S: BuildHasher + Default,
{
    fn kind(&self) -> Kind {
        Kind::Map(Box::new(K::default().kind()), Box::new(V::default().kind()))
    }

    fn store(&mut self, value: Typed) -> Result<(), CoerceError> {
        match value {
            Typed::Map(entries) => {
                let mut map = HashMap::with_capacity_and_hasher(entries.len(), S::default());
                store_entries(entries, |k, v| {
                    map.insert(k, v);
                })?;
                *self = map;
                Ok(())
            }
            other => Err(CoerceError::unsupported("HashMap", &other)),
        }
    }
}

impl<K, V> Slot for BTreeMap<K, V>
where
    K: Slot + Default + Ord,
    V: Slot + Default,
{
    fn kind(&self) -> Kind {
        Kind::Map(Box::new(K::default().kind()), Box::new(V::default().kind()))
    }

    fn store(&mut self, value: Typed) -> Result<(), CoerceError> {
        match value {
            Typed::Map(entries) => {
                let mut map = BTreeMap::new();
                store_entries(entries, |k, v| {
                    map.insert(k, v);
                })?;
                *self = map;
                Ok(())
            }
            other => Err(CoerceError::unsupported("BTreeMap", &other)),
        }
    }
}

/// Implement [`Slot`] for types that decode themselves from text via
/// [`FromStr`](std::str::FromStr).
///
/// ```ignore
/// #[derive(Default)]
/// struct Level(u8);
///
/// impl std::str::FromStr for Level { /* ... */ }
///
/// bindfig::text_slot!(Level);
/// ```
///
/// Text decoding takes precedence over every built-in kind: the cell receives
/// the raw string form of the source value.
#[macro_export]
macro_rules! text_slot {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::Slot for $ty {
            fn kind(&self) -> $crate::Kind {
                $crate::Kind::Text
            }

            fn store(&mut self, value: $crate::Typed) -> ::core::result::Result<(), $crate::CoerceError> {
                match value {
                    $crate::Typed::Text(text) => {
                        *self = <$ty as ::core::str::FromStr>::from_str(&text)
                            .map_err(|e| $crate::CoerceError::text(&text, e))?;
                        ::core::result::Result::Ok(())
                    }
                    other => ::core::result::Result::Err(
                        $crate::CoerceError::unsupported(stringify!($ty), &other),
                    ),
                }
            }
        }
    )+};
}

text_slot!(PathBuf, IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, char);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_vectors_are_bytes() {
        assert_eq!(Vec::<u8>::new().kind(), Kind::Bytes);
        assert_eq!(
            Vec::<i8>::new().kind(),
            Kind::Seq(Box::new(Kind::Int { bits: 8 }))
        );
    }

    #[test]
    fn int_kinds_carry_bit_width() {
        assert_eq!(0u16.kind(), Kind::Uint { bits: 16 });
        assert_eq!(0i32.kind(), Kind::Int { bits: 32 });
        assert_eq!(0.0f32.kind(), Kind::Float { bits: 32 });
    }

    #[test]
    fn narrowing_store_rejects_out_of_range() {
        let mut port = 0u16;
        assert!(port.store(Typed::Uint(70_000)).is_err());
        port.store(Typed::Uint(8080)).unwrap();
        assert_eq!(port, 8080);
    }

    #[test]
    fn option_allocates_even_without_inner_value() {
        let mut cell: Option<u32> = None;
        cell.store(Typed::Some(Box::new(Typed::Unset))).unwrap();
        assert_eq!(cell, Some(0));
        cell.store(Typed::Some(Box::new(Typed::Uint(7)))).unwrap();
        assert_eq!(cell, Some(7));
    }

    #[test]
    fn assign_skips_unset() {
        let mut name = String::from("keep");
        assign(&mut name, Typed::Unset).unwrap();
        assert_eq!(name, "keep");
    }

    #[test]
    fn vec_store_replaces_previous_contents() {
        let mut hosts = vec!["old".to_string()];
        hosts
            .store(Typed::Seq(vec![Typed::Str("a".into()), Typed::Unset]))
            .unwrap();
        assert_eq!(hosts, vec!["a".to_string(), String::new()]);
    }

    #[test]
    fn map_store_builds_fresh_map() {
        let mut labels: HashMap<String, u8> = HashMap::new();
        labels.insert("stale".into(), 1);
        labels
            .store(Typed::Map(vec![(Typed::Str("k".into()), Typed::Uint(2))]))
            .unwrap();
        assert_eq!(labels.len(), 1);
        assert_eq!(labels["k"], 2);
    }

    #[test]
    fn text_slot_parses_from_str() {
        let mut addr: IpAddr = Ipv4Addr::UNSPECIFIED.into();
        assert_eq!(addr.kind(), Kind::Text);
        addr.store(Typed::Text("10.0.0.1".into())).unwrap();
        assert_eq!(addr, IpAddr::from([10, 0, 0, 1]));
        assert!(addr.store(Typed::Text("not-an-ip".into())).is_err());
    }

    #[test]
    fn wrong_typed_value_is_unsupported() {
        let mut flag = false;
        let err = flag.store(Typed::Str("yes".into())).unwrap_err();
        assert!(matches!(err, CoerceError::Unsupported { target: "bool", .. }));
    }
}
