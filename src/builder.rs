use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::BindfigError;
use crate::file::{Decoders, FileDecoder};
use crate::resolve::Loader;
use crate::schema::Record;
use crate::types::Options;

/// Entry point for building a bindfig loader.
pub struct Bindfig;

impl Bindfig {
    pub fn builder() -> BindfigBuilder {
        BindfigBuilder::new()
    }
}

/// Builder for configuring and running the binding engine.
///
/// Controls three groups of settings (see [`Options`] for the full list):
///
/// - **Sources**: [`file()`](Self::file), [`envs()`](Self::envs),
///   [`args()`](Self::args) and the `skip_*` switches.
/// - **Keys**: [`env_prefix()`](Self::env_prefix),
///   [`flag_prefix()`](Self::flag_prefix), [`flag_delimiter()`](Self::flag_delimiter),
///   [`generate_tags()`](Self::generate_tags).
/// - **Policies**: required fields, duplicates and unknown keys.
pub struct BindfigBuilder {
    options: Options,
    decoders: Decoders,
}

impl Default for BindfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BindfigBuilder {
    fn new() -> Self {
        Self {
            options: Options::default(),
            decoders: Decoders::default(),
        }
    }

    /// Start from a full set of options.
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Do not apply `default` tags.
    pub fn skip_defaults(mut self, skip: bool) -> Self {
        self.options.skip_defaults = skip;
        self
    }

    /// Do not load config files.
    pub fn skip_files(mut self, skip: bool) -> Self {
        self.options.skip_files = skip;
        self
    }

    /// Do not read environment variables.
    pub fn skip_env(mut self, skip: bool) -> Self {
        self.options.skip_env = skip;
        self
    }

    /// Do not register or read flags. The config-file flag is ignored too.
    pub fn skip_flags(mut self, skip: bool) -> Self {
        self.options.skip_flags = skip;
        self
    }

    /// Prefix every env key: `"APP"` makes `port` look for `APP_PORT`.
    pub fn env_prefix(mut self, prefix: &str) -> Self {
        self.options.env_prefix = prefix.to_string();
        self
    }

    /// Prefix every flag key: `"app"` makes `port` look for `--app.port`.
    pub fn flag_prefix(mut self, prefix: &str) -> Self {
        self.options.flag_prefix = prefix.to_string();
        self
    }

    /// Delimiter between flag key segments (default `.`).
    pub fn flag_delimiter(mut self, delimiter: &str) -> Self {
        self.options.flag_delimiter = delimiter.to_string();
        self
    }

    /// Fail the load if any field is left unset.
    pub fn all_fields_required(mut self, required: bool) -> Self {
        self.options.all_fields_required = required;
        self
    }

    /// Let several fields share one env or flag key; each receives the value.
    pub fn allow_duplicates(mut self, allow: bool) -> Self {
        self.options.allow_duplicates = allow;
        self
    }

    /// Ignore file keys that match no field.
    pub fn allow_unknown_fields(mut self, allow: bool) -> Self {
        self.options.allow_unknown_fields = allow;
        self
    }

    /// Ignore env vars that carry the env prefix but match no field.
    pub fn allow_unknown_envs(mut self, allow: bool) -> Self {
        self.options.allow_unknown_envs = allow;
        self
    }

    /// Ignore flags that carry the flag prefix but match no field.
    pub fn allow_unknown_flags(mut self, allow: bool) -> Self {
        self.options.allow_unknown_flags = allow;
        self
    }

    /// Derive undeclared tags from identifier words (default `true`).
    pub fn generate_tags(mut self, generate: bool) -> Self {
        self.options.generate_tags = generate;
        self
    }

    /// Fail when a listed file does not exist instead of skipping it.
    pub fn fail_on_file_not_found(mut self, fail: bool) -> Self {
        self.options.fail_on_file_not_found = fail;
        self
    }

    /// Load every existing file, later ones overriding earlier ones. When off
    /// (the default), only the first existing file is loaded.
    pub fn merge_files(mut self, merge: bool) -> Self {
        self.options.merge_files = merge;
        self
    }

    /// Register a flag whose value names a config file. With merging it is
    /// appended to the file list, otherwise it replaces it.
    pub fn file_flag(mut self, name: &str) -> Self {
        self.options.file_flag = Some(name.to_string());
        self
    }

    /// Append a config file.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.files.push(path.into());
        self
    }

    /// Replace the config file list.
    pub fn files<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.options.files = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Use these `NAME=VALUE` strings instead of the process environment.
    pub fn envs<I, S>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.envs = Some(envs.into_iter().map(Into::into).collect());
        self
    }

    /// Parse these arguments (binary name excluded) instead of the process
    /// arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.args = Some(args.into_iter().map(Into::into).collect());
        self
    }

    /// Supply already-parsed flags, keyed by full flag name. Arguments are
    /// then not parsed.
    pub fn flag_values(mut self, values: BTreeMap<String, String>) -> Self {
        self.options.flag_values = Some(values);
        self
    }

    /// Register `decoder` for files with extension `ext`, replacing any
    /// built-in decoder for it.
    pub fn file_decoder(mut self, ext: &str, decoder: impl FileDecoder + 'static) -> Self {
        self.decoders.insert(ext, decoder);
        self
    }

    /// Separator used to split strings into sequences (default `,`).
    pub fn slice_separator(mut self, separator: &str) -> Self {
        self.options.slice_separator = separator.to_string();
        self
    }

    /// Name shown in flag help output.
    pub fn command_name(mut self, name: &str) -> Self {
        self.options.command_name = name.to_string();
        self
    }

    /// Walk `record` and prepare a loader for it.
    ///
    /// Fails on malformed declarations and, unless duplicates are allowed, on
    /// two fields sharing a flag name.
    pub fn build<R: Record + ?Sized>(self, record: &mut R) -> Result<Loader<'_, R>, BindfigError> {
        Loader::new(record, self.options, self.decoders)
    }

    /// Build a loader for `record` and load all sources into it.
    pub fn load<R: Record + ?Sized>(self, record: &mut R) -> Result<(), BindfigError> {
        self.build(record)?.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::fixtures::test::{Renamed, Service};
    use crate::value::{Map, Value};
    use std::path::Path;

    #[test]
    fn defaults_match_options_default() {
        let builder = Bindfig::builder();
        assert_eq!(builder.options(), &Options::default());
        assert_eq!(builder.options().flag_delimiter, ".");
        assert_eq!(builder.options().slice_separator, ",");
        assert!(builder.options().generate_tags);
    }

    #[test]
    fn setters_update_options() {
        let builder = Bindfig::builder()
            .env_prefix("APP")
            .flag_prefix("app")
            .flag_delimiter("-")
            .merge_files(true)
            .file("a.toml")
            .file("b.json")
            .file_flag("config")
            .slice_separator(";");
        let options = builder.options();
        assert_eq!(options.env_prefix, "APP");
        assert_eq!(options.flag_prefix, "app");
        assert_eq!(options.flag_delimiter, "-");
        assert!(options.merge_files);
        assert_eq!(options.files, [PathBuf::from("a.toml"), PathBuf::from("b.json")]);
        assert_eq!(options.file_flag.as_deref(), Some("config"));
        assert_eq!(options.slice_separator, ";");
    }

    #[test]
    fn files_replaces_list() {
        let builder = Bindfig::builder().file("a.toml").files(["b.toml"]);
        assert_eq!(builder.options().files, [PathBuf::from("b.toml")]);
    }

    #[test]
    fn load_from_synthetic_sources() {
        let mut svc = Service::default();
        Bindfig::builder()
            .env_prefix("APP")
            .envs(["APP_HOST=0.0.0.0", "APP_DEBUG=true"])
            .args(["--port", "3000"])
            .load(&mut svc)
            .unwrap();
        assert_eq!(svc.host, "0.0.0.0");
        assert!(svc.debug);
        assert_eq!(svc.port, 3000);
    }

    #[test]
    fn build_exposes_fields_before_load() {
        let mut svc = Service::default();
        let loader = Bindfig::builder()
            .envs(Vec::<String>::new())
            .args(Vec::<String>::new())
            .build(&mut svc)
            .unwrap();
        let names: Vec<&str> = loader.fields().map(|f| f.name()).collect();
        assert_eq!(names.len(), 7);
        assert!(loader.fields().all(|f| !f.is_set()));

        let mut seen = 0;
        loader.walk_fields(|_| {
            seen += 1;
            seen < 2
        });
        assert_eq!(seen, 2);
    }

    #[test]
    fn generate_tags_off_uses_identifiers() {
        let mut r = Renamed::default();
        let loader = Bindfig::builder()
            .generate_tags(false)
            .args(Vec::<String>::new())
            .build(&mut r)
            .unwrap();
        let level = loader.fields().find(|f| f.ident() == "logLevel").unwrap();
        assert_eq!(loader.key(&level, "env"), "logLevel");
        assert_eq!(loader.key(&level, "flag"), "inner.logLevel");
    }

    #[test]
    fn custom_decoder_is_used_and_tags_generated_for_it() {
        struct Lines;
        impl FileDecoder for Lines {
            fn format(&self) -> &str {
                "lines"
            }
            fn decode_file(&self, path: &Path) -> Result<Map, DecodeError> {
                let content = std::fs::read_to_string(path)?;
                Ok(content
                    .lines()
                    .filter_map(|l| l.split_once(' '))
                    .map(|(k, v)| (k.to_string(), Value::from(v)))
                    .collect())
            }
        }

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("app.conf");
        std::fs::write(&path, "host example.com\ndatabase.pool_size 12\n").unwrap();

        let mut svc = Service::default();
        let loader = Bindfig::builder()
            .file_decoder(".conf", Lines)
            .file(&path)
            .envs(Vec::<String>::new())
            .args(Vec::<String>::new())
            .build(&mut svc)
            .unwrap();
        assert_eq!(loader.fields().next().unwrap().tag("lines"), "host");
        let mut loader = loader;
        loader.load().unwrap();
        drop(loader);
        assert_eq!(svc.host, "example.com");
        assert_eq!(svc.database.pool_size, 12);
    }

    #[cfg(feature = "clap")]
    #[test]
    fn command_renders_flag_help() {
        let mut svc = Service::default();
        let loader = Bindfig::builder()
            .command_name("myapp")
            .file_flag("config")
            .args(Vec::<String>::new())
            .build(&mut svc)
            .unwrap();
        let mut cmd = loader.command().clone();
        let help = cmd.render_help().to_string();
        assert!(help.contains("--database.pool_size"));
        assert!(help.contains("Connection pool size."));
        assert!(help.contains("--config"));
        assert_eq!(cmd.get_name(), "myapp");
    }
}
