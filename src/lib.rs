//! Bind a nested Rust struct to defaults, config files, environment variables
//! and command-line flags in one pass.
//!
//! Bindfig walks your config struct once, works out which key every field is
//! looked up by in each source, and fills the struct from all of them with a
//! fixed precedence, type coercion and required-field checks applied:
//!
//! ```ignore
//! #[derive(Record, Default)]
//! struct Config {
//!     /// Address to listen on.
//!     #[bind(default = "0.0.0.0:8080")]
//!     listen: SocketAddr,
//!
//!     #[bind(required)]
//!     token: String,
//!
//!     #[bind(nested)]
//!     database: Database,
//! }
//!
//! let mut config = Config::default();
//! Bindfig::builder()
//!     .env_prefix("APP")
//!     .file("/etc/app/config.toml")
//!     .load(&mut config)?;
//! ```
//!
//! That call applies the `default` tags, reads `/etc/app/config.toml` if it
//! exists, then `APP_LISTEN`, `APP_TOKEN`, `APP_DATABASE_URL`… from the
//! environment, then `--listen`, `--token`, `--database.url`… from the command
//! line, and fails if `token` was supplied by none of them.
//!
//! # Design: struct as schema
//!
//! The struct is the only schema. [`Record`] presents its fields to a
//! [`Visitor`] in declaration order; `#[derive(Record)]` writes that impl from
//! `#[bind(...)]` attributes:
//!
//! - **`default = "..."`**: the lowest layer, coerced like any other source.
//! - **`usage = "..."`**: help text for flags and env templates. `///` doc
//!   comments are used when absent.
//! - **`required`**: fail the load if no source sets the field.
//! - **`env`, `flag`, `toml`, `json`, …**: override the generated key for one
//!   namespace. `-` excludes the field; a `,exact` suffix uses the key as is.
//! - **`nested`**: expand a nested record (also `Option<Record>`, which is
//!   allocated before loading). **`embed`** lifts the nested record's fields
//!   into the parent's key space.
//! - **`skip`**: never bind the field.
//!
//! # Layer precedence
//!
//! ```text
//! Defaults              #[bind(default = "...")]
//!        ↑ overridden by
//! Config files          listed order, first existing only unless merging
//!        ↑ overridden by
//! Environment vars      PREFIX_DATABASE_URL
//!        ↑ overridden by
//! Flags                 --prefix.database.url
//! ```
//!
//! Every layer is **sparse**: a source that does not mention a field leaves
//! it as the layer below set it. An empty value (`APP_PORT=`) also leaves the
//! field untouched but counts as set.
//!
//! # Keys
//!
//! Undeclared keys are generated from the identifier: env keys are upper
//! snake case, flag and file keys lower snake case (`maxConns` → `MAX_CONNS`,
//! `max_conns`). Nested fields are prefixed by their parents' keys, joined
//! with `_` for env, `.` for files and the configurable flag delimiter (`.`
//! by default) for flags. See the [`keys`] module.
//!
//! # Coercion
//!
//! Every source hands over untyped [`Value`]s; the [`coerce`] module turns them
//! into the field's [`Kind`]: booleans, bounded integers (`0x`/`0o`/`0b`
//! prefixes allowed), floats, durations (`1h30m`), strings, byte vectors,
//! sequences (`"a, b, c"`), maps (`"k1:v1, k2:v2"`), nested records from
//! structured files, and any [`FromStr`](std::str::FromStr) type registered
//! with [`text_slot!`].
//!
//! # Unknown keys and duplicates
//!
//! Strict by default. A file key that matches no field fails the load with
//! the file path, key and (for TOML) line number:
//!
//! ```text
//! load files: Unknown field 'databse.url' in /etc/app/config.toml (line 7)
//! ```
//!
//! With a non-empty env prefix, any `PREFIX_*` variable that matches no field
//! is an error too; the same holds for prefixed flags. Two fields resolving to
//! the same env or flag key are rejected unless duplicates are allowed.
//!
//! # Clap adapter
//!
//! Flags are parsed with [clap](https://docs.rs/clap) behind the `clap`
//! feature (on by default); [`Loader::command()`] exposes the generated
//! command for help output. Without the feature, or with your own parser,
//! hand the engine the given flags through
//! [`flag_values()`](BindfigBuilder::flag_values).
//!
//! # Error handling
//!
//! All fallible operations return [`BindfigError`]. Source errors are wrapped
//! with the pass that raised them (`load files: …`); coercion errors name the
//! field and the key the value came from. See the [`error`] module.

extern crate self as bindfig;

pub mod coerce;
pub mod error;
pub mod keys;
pub mod schema;
pub mod slot;
pub mod types;
pub mod value;

mod builder;
#[cfg(feature = "clap")]
pub mod cli;
mod env;
pub mod file;
mod ops;
mod resolve;
mod validate;

#[cfg(test)]
mod fixtures;

pub use builder::{Bindfig, BindfigBuilder};
#[cfg(feature = "derive")]
pub use bindfig_derive::Record;
pub use coerce::Coercer;
pub use error::{BindfigError, CoerceError, DecodeError, Pass};
pub use file::{FileDecoder, JsonDecoder, TomlDecoder};
pub use ops::KeyListing;
pub use resolve::Loader;
pub use schema::{Decl, Field, Record, Schema, Visitor};
pub use slot::{Kind, Member, Slot, Typed, assign};
pub use types::Options;
pub use value::{Map, Value};
