//! The source merge pipeline.
//!
//! A [`Loader`] owns an exclusive borrow of the destination record and the
//! schema walked from it. [`Loader::load`] applies every source in order:
//!
//! 1. Parse flags (so the config-file flag is known before files load)
//! 2. Defaults: every non-empty `default` tag; optional cells are allocated
//! 3. Files: each listed file through its decoder, later files win
//! 4. Environment: one lookup per field in the `NAME=VALUE` snapshot
//! 5. Flags: one lookup per field in the explicitly given flags
//! 6. Required fields are checked once all sources are in
//!
//! Each pass coerces the values it finds, then writes them in one re-walk of
//! the record. An error aborts the pass and is wrapped with the pass name.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::coerce::Coercer;
use crate::env;
use crate::error::{BindfigError, Pass};
use crate::file::{self, Decoders};
use crate::keys::KeyResolver;
use crate::ops::{self, KeyListing};
use crate::schema::{Field, Pending, Record, Schema, WalkOptions, Writer, tag};
use crate::slot::Kind;
use crate::types::Options;
use crate::validate;
use crate::value::Value;

#[cfg(feature = "clap")]
use crate::cli::{self, FlagSet};

/// Binds sources onto one record. Built by
/// [`BindfigBuilder::build`](crate::BindfigBuilder::build).
pub struct Loader<'a, R: Record + ?Sized> {
    record: &'a mut R,
    schema: Schema,
    options: Options,
    keys: KeyResolver,
    coercer: Coercer,
    decoders: Decoders,
    #[cfg(feature = "clap")]
    flags: FlagSet,
}

/// A flat source (environment or flags) and its policies.
struct Flat<'v> {
    namespace: &'static str,
    values: &'v BTreeMap<String, String>,
    prefix: &'v str,
    allow_unknown: bool,
    exempt: Option<&'v str>,
}

impl<'a, R: Record + ?Sized> Loader<'a, R> {
    pub(crate) fn new(
        record: &'a mut R,
        options: Options,
        decoders: Decoders,
    ) -> Result<Self, BindfigError> {
        let walk = WalkOptions {
            formats: decoders.formats(),
            generate_tags: options.generate_tags,
        };
        let schema = Schema::walk(record, &walk)?;
        let keys = KeyResolver::new(
            &options.env_prefix,
            &options.flag_prefix,
            &options.flag_delimiter,
        );
        let coercer = Coercer::new(&options.slice_separator);

        if !options.skip_flags && !options.allow_duplicates {
            let mut seen = BTreeSet::new();
            for field in schema.fields() {
                let name = keys.resolve(&field, tag::FLAG);
                if !name.is_empty() && !seen.insert(name.clone()) {
                    return Err(BindfigError::DuplicateFlag(name));
                }
            }
        }

        #[cfg(feature = "clap")]
        let flags = register_flags(&schema, &keys, &options)?;

        Ok(Loader {
            record,
            schema,
            options,
            keys,
            coercer,
            decoders,
            #[cfg(feature = "clap")]
            flags,
        })
    }

    /// Load every source into the record and check required fields.
    ///
    /// May be called again; set-state is reset first and the record is
    /// written over.
    pub fn load(&mut self) -> Result<(), BindfigError> {
        self.schema.reset();

        let flags = if self.options.skip_flags {
            BTreeMap::new()
        } else {
            self.given_flags().map_err(|e| e.in_pass(Pass::Flags))?
        };

        if !self.options.skip_defaults {
            self.load_defaults()
                .map_err(|e| e.in_pass(Pass::Defaults))?;
        }
        if !self.options.skip_files {
            self.load_files(&flags).map_err(|e| e.in_pass(Pass::Files))?;
        }
        if !self.options.skip_env {
            self.load_env().map_err(|e| e.in_pass(Pass::Environment))?;
        }
        if !self.options.skip_flags {
            self.load_flags(&flags).map_err(|e| e.in_pass(Pass::Flags))?;
        }

        validate::check_required(&self.schema, self.options.all_fields_required)
    }

    /// Leaf fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = Field<'_>> {
        self.schema.fields()
    }

    /// Visit fields in order until `visit` returns `false`.
    pub fn walk_fields(&self, mut visit: impl FnMut(Field<'_>) -> bool) {
        for field in self.schema.fields() {
            if !visit(field) {
                return;
            }
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The key `field` is looked up by under `namespace` (`env`, `flag`, or a
    /// file format); empty when excluded.
    pub fn key(&self, field: &Field<'_>, namespace: &str) -> String {
        self.keys.resolve(field, namespace)
    }

    /// Field name → key under `namespace`, for every field not excluded.
    pub fn keys(&self, namespace: &str) -> KeyListing {
        ops::key_listing(&self.schema, &self.keys, namespace)
    }

    /// A `NAME=default` listing of every env-bound field, usage as comments.
    pub fn env_template(&self) -> String {
        ops::env_template(&self.schema, &self.keys)
    }

    /// The clap command holding every registered flag, e.g. to render help.
    #[cfg(feature = "clap")]
    pub fn command(&self) -> &clap::Command {
        self.flags.command()
    }

    #[cfg(feature = "clap")]
    fn given_flags(&self) -> Result<BTreeMap<String, String>, BindfigError> {
        if let Some(values) = &self.options.flag_values {
            return Ok(values.clone());
        }
        match &self.options.args {
            Some(args) => self.flags.parse(args),
            None => self.flags.parse(std::env::args_os().skip(1)),
        }
    }

    #[cfg(not(feature = "clap"))]
    fn given_flags(&self) -> Result<BTreeMap<String, String>, BindfigError> {
        Ok(self.options.flag_values.clone().unwrap_or_default())
    }

    /// An empty default still allocates optional cells, but only a non-empty
    /// one marks the field set.
    fn load_defaults(&mut self) -> Result<(), BindfigError> {
        let mut pending = self.empty_pending();
        let mut hits = Vec::new();
        for (ordinal, field) in self.schema.fields().enumerate() {
            let Some(kind) = field.kind() else { continue };
            let raw = field.tag(tag::DEFAULT);
            if raw.is_empty() && !matches!(kind, Kind::Optional(_)) {
                continue;
            }
            pending[ordinal] = Some(self.coerce(&field, kind, &Value::from(raw), tag::DEFAULT)?);
            if !raw.is_empty() {
                hits.push(ordinal);
            }
        }
        self.write(pending)?;
        for ordinal in hits {
            self.schema.mark_set(ordinal);
        }
        Ok(())
    }

    fn load_files(&mut self, flags: &BTreeMap<String, String>) -> Result<(), BindfigError> {
        let mut files = self.options.files.clone();
        if let Some(name) = &self.options.file_flag
            && let Some(given) = flags.get(name)
        {
            if given.is_empty() {
                return Err(BindfigError::EmptyFileFlag(name.clone()));
            }
            if self.options.merge_files {
                files.push(PathBuf::from(given));
            } else {
                files = vec![PathBuf::from(given)];
            }
        }

        for path in &files {
            match std::fs::metadata(path) {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    if self.options.fail_on_file_not_found {
                        return Err(BindfigError::FileNotFound(path.clone()));
                    }
                    log::debug!("skipping missing config file {}", path.display());
                    continue;
                }
                Err(source) => {
                    return Err(BindfigError::IoError {
                        path: path.clone(),
                        source,
                    });
                }
            }
            self.load_file(path)?;
            if !self.options.merge_files {
                break;
            }
        }
        Ok(())
    }

    fn load_file(&mut self, path: &Path) -> Result<(), BindfigError> {
        let decoder = self
            .decoders
            .for_path(path)
            .ok_or_else(|| BindfigError::UnsupportedFormat(file::extension_of(path)))?;
        let format = decoder.format().to_string();
        let mut map = decoder
            .decode_file(path)
            .map_err(|source| BindfigError::Decode {
                path: path.to_path_buf(),
                source,
            })?;
        log::debug!("loading config file {} as {format}", path.display());

        let mut pending = self.empty_pending();
        for (ordinal, field) in self.schema.fields().enumerate() {
            let key = self.keys.resolve(&field, &format);
            if key.is_empty() {
                continue;
            }
            if !map.contains_key(&key) {
                file::find_nested(&mut map, &key);
            }
            let Some(value) = map.remove(&key) else {
                continue;
            };
            let Some(kind) = field.kind() else { continue };
            pending[ordinal] = Some(self.coerce(&field, kind, &value, &key)?);
        }

        if !self.options.allow_unknown_fields {
            validate::reject_unknown_file_keys(&map, path)?;
        }
        self.apply(pending)
    }

    fn load_env(&mut self) -> Result<(), BindfigError> {
        let values = match &self.options.envs {
            Some(envs) => env::env_to_map(envs),
            None => env::env_to_map(env::process_envs()),
        };
        let prefix = self.keys.env_prefix().to_string();
        self.load_flat(Flat {
            namespace: tag::ENV,
            values: &values,
            prefix: &prefix,
            allow_unknown: self.options.allow_unknown_envs,
            exempt: None,
        })
    }

    fn load_flags(&mut self, values: &BTreeMap<String, String>) -> Result<(), BindfigError> {
        let prefix = self.keys.flag_prefix().to_string();
        let file_flag = self.options.file_flag.clone();
        self.load_flat(Flat {
            namespace: tag::FLAG,
            values,
            prefix: &prefix,
            allow_unknown: self.options.allow_unknown_flags,
            exempt: file_flag.as_deref(),
        })
    }

    fn load_flat(&mut self, source: Flat<'_>) -> Result<(), BindfigError> {
        let mut seen = BTreeSet::new();
        let mut consumed = BTreeSet::new();
        let mut pending = self.empty_pending();

        for (ordinal, field) in self.schema.fields().enumerate() {
            let key = self.keys.resolve(&field, source.namespace);
            if key.is_empty() {
                continue;
            }
            if !self.options.allow_duplicates && !seen.insert(key.clone()) {
                return Err(BindfigError::Duplicate(key));
            }
            let Some(raw) = source.values.get(&key) else {
                continue;
            };
            let Some(kind) = field.kind() else { continue };
            pending[ordinal] = Some(self.coerce(&field, kind, &Value::from(raw.as_str()), &key)?);
            consumed.insert(key);
        }
        self.apply(pending)?;

        if source.allow_unknown || source.prefix.is_empty() {
            return Ok(());
        }
        match validate::first_unknown(source.values, &consumed, source.prefix, source.exempt) {
            Some(name) if source.namespace == tag::ENV => {
                Err(BindfigError::UnknownEnv(name.to_string()))
            }
            Some(name) => Err(BindfigError::UnknownFlag(name.to_string())),
            None => Ok(()),
        }
    }

    fn empty_pending(&self) -> Vec<Option<Pending>> {
        (0..self.schema.len()).map(|_| None).collect()
    }

    fn coerce(
        &self,
        field: &Field<'_>,
        kind: &Kind,
        value: &Value,
        key: &str,
    ) -> Result<Pending, BindfigError> {
        log::trace!("coerce {} from {key}", field.name());
        let value = self
            .coercer
            .coerce(kind, value)
            .map_err(|source| BindfigError::Coerce {
                field: field.name().to_string(),
                key: key.to_string(),
                source,
            })?;
        Ok(Pending {
            value,
            key: key.to_string(),
        })
    }

    /// Write `pending` into the record and mark those fields set.
    fn apply(&mut self, pending: Vec<Option<Pending>>) -> Result<(), BindfigError> {
        let hits: Vec<usize> = pending
            .iter()
            .enumerate()
            .filter_map(|(ordinal, p)| p.as_ref().map(|_| ordinal))
            .collect();
        self.write(pending)?;
        for ordinal in hits {
            self.schema.mark_set(ordinal);
        }
        Ok(())
    }

    fn write(&mut self, pending: Vec<Option<Pending>>) -> Result<(), BindfigError> {
        Writer::new(&self.schema, pending).apply(&mut *self.record)
    }
}

#[cfg(feature = "clap")]
fn register_flags(
    schema: &Schema,
    keys: &KeyResolver,
    options: &Options,
) -> Result<FlagSet, BindfigError> {
    let name = if options.command_name.is_empty() {
        executable_name()
    } else {
        options.command_name.clone()
    };
    let mut flags = FlagSet::new(&name);
    if !options.skip_flags {
        for field in schema.fields() {
            let flag = keys.resolve(&field, tag::FLAG);
            if flag.is_empty() {
                continue;
            }
            flags.add(
                &flag,
                field.tag(tag::DEFAULT),
                field.tag(tag::USAGE),
                options.allow_duplicates,
            )?;
        }
    }
    if let Some(file_flag) = &options.file_flag
        && !flags.contains(file_flag)
    {
        flags.add(file_flag, "", cli::FILE_FLAG_USAGE, false)?;
    }
    flags.add_help();
    Ok(flags)
}

#[cfg(feature = "clap")]
fn executable_name() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.file_stem().map(|s| s.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "app".to_string())
}
