//! Value coercion: untyped source values into a cell's declared [`Kind`].
//!
//! [`Coercer::coerce`] is the single dispatch point. It never touches the cell
//! itself; it produces a [`Typed`] value that the cell's [`Slot`](crate::Slot)
//! impl stores. Dispatch order:
//!
//! 1. Self-decoding (`Kind::Text`) cells get the string form.
//! 2. Optional cells are allocated, then the inner kind is dispatched.
//! 3. An empty string means "no value supplied" for every other cell.
//! 4. Scalars: bool, integers (bit-width bounded), floats, durations, strings.
//! 5. Composites: bytes, sequences, maps, records.

use std::time::Duration;

use crate::error::CoerceError;
use crate::slot::{Kind, Member, Typed};
use crate::value::{Map, Value};

/// Separator used to split scalar strings into sequences unless configured.
pub const DEFAULT_SEPARATOR: &str = ",";

/// Converts untyped source values into typed ones.
#[derive(Debug, Clone)]
pub struct Coercer {
    separator: String,
}

impl Default for Coercer {
    fn default() -> Self {
        Coercer::new(DEFAULT_SEPARATOR)
    }
}

impl Coercer {
    /// An empty `separator` falls back to [`DEFAULT_SEPARATOR`].
    pub fn new(separator: &str) -> Self {
        let separator = if separator.is_empty() {
            DEFAULT_SEPARATOR
        } else {
            separator
        };
        Coercer {
            separator: separator.to_string(),
        }
    }

    /// Coerce `value` into `kind`. Returns [`Typed::Unset`] when the source
    /// supplied nothing (null, or an empty string for a non-optional cell).
    pub fn coerce(&self, kind: &Kind, value: &Value) -> Result<Typed, CoerceError> {
        if value.is_null() {
            return Ok(Typed::Unset);
        }
        if let Kind::Optional(inner) = kind {
            let inner = self.coerce(inner, value)?;
            return Ok(Typed::Some(Box::new(inner)));
        }
        if value.as_str() == Some("") {
            return Ok(Typed::Unset);
        }

        match kind {
            Kind::Text => Ok(Typed::Text(scalar(kind, value)?.to_string())),
            Kind::Bool => parse_bool(scalar(kind, value)?).map(Typed::Bool),
            Kind::Int { bits } => parse_int(scalar(kind, value)?, *bits).map(Typed::Int),
            Kind::Uint { bits } => parse_uint(scalar(kind, value)?, *bits).map(Typed::Uint),
            Kind::Float { bits } => parse_float(scalar(kind, value)?, *bits).map(Typed::Float),
            Kind::Duration => parse_duration(scalar(kind, value)?).map(Typed::Duration),
            Kind::Str => Ok(Typed::Str(scalar(kind, value)?.to_string())),
            Kind::Bytes => match value {
                Value::Str(s) => Ok(Typed::Bytes(s.as_bytes().to_vec())),
                Value::Seq(items) => self.coerce_items(&Kind::Uint { bits: 8 }, items),
                other => Err(mismatch(kind, other)),
            },
            Kind::Seq(elem) => match value {
                Value::Seq(items) => self.coerce_items(elem, items),
                Value::Str(s) if elem.is_scalar() => self.split_items(elem, s),
                other => Err(mismatch(kind, other)),
            },
            Kind::Map(key, val) => match value {
                Value::Map(map) => self.coerce_map(key, val, map),
                Value::Str(s) => self.split_map(key, val, s),
                other => Err(mismatch(kind, other)),
            },
            Kind::Record(members) => match value {
                Value::Map(map) => self.coerce_record(members, map),
                other => Err(mismatch(kind, other)),
            },
            Kind::Any => Ok(Typed::Raw(value.clone())),
            // Unwrapped above.
            Kind::Optional(_) => Err(mismatch(kind, value)),
        }
    }

    fn coerce_items(&self, elem: &Kind, items: &[Value]) -> Result<Typed, CoerceError> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let typed = self.coerce(elem, item).map_err(|e| CoerceError::SeqItem {
                item: describe(item),
                source: Box::new(e),
            })?;
            out.push(typed);
        }
        Ok(Typed::Seq(out))
    }

    fn split_items(&self, elem: &Kind, source: &str) -> Result<Typed, CoerceError> {
        let mut out = Vec::new();
        for item in source.split(self.separator.as_str()) {
            let item = item.trim();
            let typed = self
                .coerce(elem, &Value::from(item))
                .map_err(|e| CoerceError::SeqItem {
                    item: item.to_string(),
                    source: Box::new(e),
                })?;
            out.push(typed);
        }
        Ok(Typed::Seq(out))
    }

    fn coerce_map(&self, key: &Kind, val: &Kind, map: &Map) -> Result<Typed, CoerceError> {
        let mut entries = Vec::with_capacity(map.len());
        for (k, v) in map {
            entries.push(self.coerce_entry(key, val, k, v)?);
        }
        Ok(Typed::Map(entries))
    }

    fn split_map(&self, key: &Kind, val: &Kind, source: &str) -> Result<Typed, CoerceError> {
        let mut entries = Vec::new();
        for item in source.split(',') {
            let Some((k, v)) = item.split_once(':') else {
                return Err(CoerceError::MapItem(item.to_string()));
            };
            entries.push(self.coerce_entry(key, val, k.trim(), &Value::from(v.trim()))?);
        }
        Ok(Typed::Map(entries))
    }

    fn coerce_entry(
        &self,
        key: &Kind,
        val: &Kind,
        k: &str,
        v: &Value,
    ) -> Result<(Typed, Typed), CoerceError> {
        let typed_key = self
            .coerce(key, &Value::from(k))
            .map_err(|e| CoerceError::MapKey {
                key: k.to_string(),
                source: Box::new(e),
            })?;
        let typed_val = self.coerce(val, v).map_err(|e| CoerceError::MapValue {
            key: k.to_string(),
            source: Box::new(e),
        })?;
        Ok((typed_key, typed_val))
    }

    /// Structural assignment of a generic map onto a record: a key matches the
    /// member identifier exactly once its first letter is lowercased
    /// (`Host` → `host`). Declaration tags play no part.
    fn coerce_record(&self, members: &[Member], map: &Map) -> Result<Typed, CoerceError> {
        let mut entries = Vec::with_capacity(map.len());
        for (name, value) in map {
            let member = members
                .iter()
                .find(|m| m.name == member_ident(name))
                .ok_or_else(|| CoerceError::NoSuchField(name.clone()))?;
            let typed = self
                .coerce(&member.kind, value)
                .map_err(|e| CoerceError::Member {
                    field: member.name.to_string(),
                    source: Box::new(e),
                })?;
            entries.push((member.name, typed));
        }
        Ok(Typed::Record(entries))
    }
}

fn member_ident(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn scalar<'v>(kind: &Kind, value: &'v Value) -> Result<&'v str, CoerceError> {
    value.as_str().ok_or_else(|| mismatch(kind, value))
}

fn mismatch(kind: &Kind, value: &Value) -> CoerceError {
    CoerceError::Mismatch {
        expected: kind.name(),
        found: value.shape(),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Str(s) => s.clone(),
        other => other.shape().to_string(),
    }
}

/// Parse the boolean literals accepted on the command line and in env vars.
pub fn parse_bool(s: &str) -> Result<bool, CoerceError> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(CoerceError::Bool(s.to_string())),
    }
}

/// Split an integer literal into sign, radix and digits. Accepts `0x`, `0o`
/// and `0b` prefixes and `_` separators.
fn int_parts(s: &str) -> (bool, u32, String) {
    let (negative, rest) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let (radix, digits) = match rest.get(..2) {
        Some("0x") | Some("0X") => (16, &rest[2..]),
        Some("0o") | Some("0O") => (8, &rest[2..]),
        Some("0b") | Some("0B") => (2, &rest[2..]),
        _ => (10, rest),
    };
    (negative, radix, digits.replace('_', ""))
}

fn invalid_int(s: &str, reason: impl ToString) -> CoerceError {
    CoerceError::Int {
        value: s.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse a signed integer that must fit in `bits` bits.
pub fn parse_int(s: &str, bits: u32) -> Result<i64, CoerceError> {
    let (negative, radix, digits) = int_parts(s);
    if digits.starts_with(['+', '-']) {
        return Err(invalid_int(s, "misplaced sign"));
    }
    let magnitude = i128::from_str_radix(&digits, radix).map_err(|e| invalid_int(s, e))?;
    let value = if negative { -magnitude } else { magnitude };
    let max = (1i128 << (bits - 1)) - 1;
    let min = -(1i128 << (bits - 1));
    if value < min || value > max {
        return Err(CoerceError::IntRange {
            value: s.to_string(),
            bits,
        });
    }
    i64::try_from(value).map_err(|_| CoerceError::IntRange {
        value: s.to_string(),
        bits,
    })
}

/// Parse an unsigned integer that must fit in `bits` bits.
pub fn parse_uint(s: &str, bits: u32) -> Result<u64, CoerceError> {
    let (negative, radix, digits) = int_parts(s);
    if negative || digits.starts_with(['+', '-']) {
        return Err(invalid_int(s, "unsigned value cannot carry a sign"));
    }
    let value = u128::from_str_radix(&digits, radix).map_err(|e| invalid_int(s, e))?;
    if bits < 128 && value >> bits != 0 {
        return Err(CoerceError::IntRange {
            value: s.to_string(),
            bits,
        });
    }
    u64::try_from(value).map_err(|_| CoerceError::IntRange {
        value: s.to_string(),
        bits,
    })
}

/// Parse a float; 32-bit cells reject finite values beyond `f32` range.
pub fn parse_float(s: &str, bits: u32) -> Result<f64, CoerceError> {
    let value: f64 = s.parse().map_err(|e: std::num::ParseFloatError| CoerceError::Float {
        value: s.to_string(),
        reason: e.to_string(),
    })?;
    if bits == 32 && value.is_finite() && value.abs() > f64::from(f32::MAX) {
        return Err(CoerceError::Float {
            value: s.to_string(),
            reason: "out of range for a 32-bit float".into(),
        });
    }
    Ok(value)
}

const NANOS_PER_UNIT: &[(&str, u128)] = &[
    ("ns", 1),
    ("us", 1_000),
    ("µs", 1_000),
    ("μs", 1_000),
    ("ms", 1_000_000),
    ("s", 1_000_000_000),
    ("m", 60 * 1_000_000_000),
    ("h", 3_600 * 1_000_000_000),
];

fn invalid_duration(s: &str, reason: &str) -> CoerceError {
    CoerceError::Duration {
        value: s.to_string(),
        reason: reason.to_string(),
    }
}

/// Parse a duration literal such as `300ms`, `1.5h` or `2h45m30s`.
///
/// A bare `0` is accepted; any other number needs a unit. Negative durations
/// are rejected.
pub fn parse_duration(s: &str) -> Result<Duration, CoerceError> {
    let mut rest = s.strip_prefix('+').unwrap_or(s);
    if rest.starts_with('-') {
        return Err(invalid_duration(s, "negative durations are not supported"));
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid_duration(s, "empty duration"));
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_len = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let (int_part, after) = rest.split_at(int_len);
        let (frac_part, after) = match after.strip_prefix('.') {
            Some(tail) => {
                let frac_len = tail.find(|c: char| !c.is_ascii_digit()).unwrap_or(tail.len());
                tail.split_at(frac_len)
            }
            None => ("", after),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid_duration(s, "expected a number"));
        }

        let unit_len = after
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(after.len());
        let (unit, tail) = after.split_at(unit_len);
        if unit.is_empty() {
            return Err(invalid_duration(s, "missing unit"));
        }
        let &(_, scale) = NANOS_PER_UNIT
            .iter()
            .find(|(name, _)| *name == unit)
            .ok_or_else(|| invalid_duration(s, &format!("unknown unit {unit:?}")))?;

        let whole: u128 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| invalid_duration(s, "number too large"))?
        };
        let mut nanos = whole
            .checked_mul(scale)
            .ok_or_else(|| invalid_duration(s, "overflow"))?;
        if !frac_part.is_empty() {
            // Digits past nanosecond precision cannot change the result.
            let digits = &frac_part[..frac_part.len().min(18)];
            let frac: u128 = digits
                .parse()
                .map_err(|_| invalid_duration(s, "invalid fraction"))?;
            nanos += frac * scale / 10u128.pow(digits.len() as u32);
        }
        total = total
            .checked_add(nanos)
            .ok_or_else(|| invalid_duration(s, "overflow"))?;
        rest = tail;
    }

    let nanos = u64::try_from(total).map_err(|_| invalid_duration(s, "overflow"))?;
    Ok(Duration::from_nanos(nanos))
}
