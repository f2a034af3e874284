use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Error type returned by file decoders.
pub type DecodeError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum BindfigError {
    #[error("Invalid declaration on field '{field}': {reason}")]
    Schema { field: String, reason: String },

    #[error("Invalid value for field '{field}' (key '{key}'): {source}")]
    Coerce {
        field: String,
        key: String,
        source: CoerceError,
    },

    #[error("File format '{0}' is not supported")]
    UnsupportedFormat(String),

    #[error("Config file {0} does not exist")]
    FileNotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to decode {path}: {source}")]
    Decode { path: PathBuf, source: DecodeError },

    #[error("Unknown field '{key}' in {path} (line {line})")]
    UnknownField {
        key: String,
        path: PathBuf,
        line: usize,
    },

    #[error("Unknown environment variable {0} (see allow_unknown_envs)")]
    UnknownEnv(String),

    #[error("Unknown flag {0} (see allow_unknown_flags)")]
    UnknownFlag(String),

    #[error("Key '{0}' is bound to more than one field (see allow_duplicates)")]
    Duplicate(String),

    #[error("Flag '{0}' is declared more than once (see allow_duplicates)")]
    DuplicateFlag(String),

    #[error("Flag '{0}' should not be empty")]
    EmptyFileFlag(String),

    #[error("Fields required but not set: {}", .0.join(","))]
    MissingRequired(Vec<String>),

    #[cfg(feature = "clap")]
    #[error("Failed to parse flags: {0}")]
    Flags(#[from] clap::Error),

    #[error("{pass}: {source}")]
    Pass {
        pass: Pass,
        source: Box<BindfigError>,
    },
}

impl BindfigError {
    /// Wrap `self` with the name of the pass it aborted.
    pub(crate) fn in_pass(self, pass: Pass) -> Self {
        BindfigError::Pass {
            pass,
            source: Box::new(self),
        }
    }

    /// The innermost error, with pass wrappers peeled off.
    pub fn root(&self) -> &BindfigError {
        match self {
            BindfigError::Pass { source, .. } => source.root(),
            other => other,
        }
    }
}

/// One ordered application of a source onto the field set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Defaults,
    Files,
    Environment,
    Flags,
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Pass::Defaults => "load defaults",
            Pass::Files => "load files",
            Pass::Environment => "load environment",
            Pass::Flags => "load flags",
        };
        f.write_str(name)
    }
}

/// Failure to turn a source value into a cell's declared type.
#[derive(Debug, Error)]
pub enum CoerceError {
    #[error("invalid boolean {0:?}")]
    Bool(String),

    #[error("invalid integer {value:?}: {reason}")]
    Int { value: String, reason: String },

    #[error("{value} is out of range for a {bits}-bit integer")]
    IntRange { value: String, bits: u32 },

    #[error("invalid float {value:?}: {reason}")]
    Float { value: String, reason: String },

    #[error("invalid duration {value:?}: {reason}")]
    Duration { value: String, reason: String },

    #[error("cannot decode {value:?}: {reason}")]
    Text { value: String, reason: String },

    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("incorrect map item {0:?}")]
    MapItem(String),

    #[error("incorrect sequence item {item:?}: {source}")]
    SeqItem {
        item: String,
        source: Box<CoerceError>,
    },

    #[error("incorrect map key {key:?}: {source}")]
    MapKey {
        key: String,
        source: Box<CoerceError>,
    },

    #[error("incorrect map value for key {key:?}: {source}")]
    MapValue {
        key: String,
        source: Box<CoerceError>,
    },

    #[error("no such field {0:?} in record")]
    NoSuchField(String),

    #[error("field {field:?}: {source}")]
    Member {
        field: String,
        source: Box<CoerceError>,
    },

    #[error("unsupported value kind {found} for {target}")]
    Unsupported {
        target: &'static str,
        found: &'static str,
    },
}

impl CoerceError {
    /// A typed value reached a cell that cannot hold it.
    pub fn unsupported(target: &'static str, found: &crate::slot::Typed) -> Self {
        CoerceError::Unsupported {
            target,
            found: found.variant_name(),
        }
    }

    /// A self-decoding type rejected its input.
    pub fn text(value: &str, reason: impl fmt::Display) -> Self {
        CoerceError::Text {
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}
