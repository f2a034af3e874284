//! Clap adapter for bindfig.
//!
//! This module is the **optional integration layer** between the binding
//! engine and the [clap](https://docs.rs/clap) CLI parser. It is compiled only
//! when the `clap` Cargo feature is enabled (on by default).
//!
//! Every field with a flag key becomes one string-valued `--<key>` option whose
//! default and help text come from the field's `default` and `usage` tags. The
//! engine never sees clap types: parsing yields a flat map holding only the
//! flags that were given on the command line, which the flag pass consumes
//! like any other source.
//!
//! If you use a different CLI parser (or no CLI at all), you can skip this
//! module entirely and hand the engine that map yourself through
//! [`BindfigBuilder::flag_values`](crate::BindfigBuilder::flag_values).

use std::collections::{BTreeMap, BTreeSet};

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, Command};

use crate::error::BindfigError;

/// Help text of the config-file flag.
pub const FILE_FLAG_USAGE: &str = "config file param";

/// The set of flags registered for one record.
#[derive(Debug, Clone)]
pub struct FlagSet {
    command: Command,
    names: BTreeSet<String>,
}

impl FlagSet {
    /// An empty flag set for a command called `name`. Arguments are parsed
    /// without a leading binary name. There is no `--help` until
    /// [`add_help`](Self::add_help).
    pub fn new(name: &str) -> Self {
        FlagSet {
            command: Command::new(name.to_string())
                .no_binary_name(true)
                .disable_help_flag(true),
            names: BTreeSet::new(),
        }
    }

    /// Register `-h`/`--help` unless a field already took `help`.
    pub fn add_help(&mut self) {
        if self.command.get_arguments().any(|arg| arg.get_id() == "help") {
            return;
        }
        let help = Arg::new("help")
            .short('h')
            .long("help")
            .action(ArgAction::Help)
            .help("Print help");
        let command = std::mem::replace(&mut self.command, Command::new(""));
        self.command = command.arg(help);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Register `--name`. Registering a name twice is an error unless
    /// `allow_duplicates`; in that case the first registration is kept.
    pub fn add(
        &mut self,
        name: &str,
        default: &str,
        usage: &str,
        allow_duplicates: bool,
    ) -> Result<(), BindfigError> {
        if self.names.contains(name) {
            if allow_duplicates {
                return Ok(());
            }
            return Err(BindfigError::DuplicateFlag(name.to_string()));
        }

        let mut arg = Arg::new(name.to_string())
            .long(name.to_string())
            .action(ArgAction::Set)
            .num_args(1)
            .allow_hyphen_values(true)
            .help(usage.to_string());
        if !default.is_empty() {
            arg = arg.default_value(default.to_string());
        }

        let command = std::mem::replace(&mut self.command, Command::new(""));
        self.command = command.arg(arg);
        self.names.insert(name.to_string());
        Ok(())
    }

    /// Parse `args` and return the flags given explicitly. Defaults are not
    /// included; the defaults pass supplies them.
    pub fn parse<I, S>(&self, args: I) -> Result<BTreeMap<String, String>, BindfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<std::ffi::OsString> + Clone,
    {
        let matches = self.command.clone().try_get_matches_from(args)?;
        let mut given = BTreeMap::new();
        for name in &self.names {
            if matches.value_source(name) != Some(ValueSource::CommandLine) {
                continue;
            }
            if let Some(value) = matches.get_one::<String>(name) {
                given.insert(name.clone(), value.clone());
            }
        }
        log::debug!("parsed {} flags from the command line", given.len());
        Ok(given)
    }

    /// The underlying clap command, e.g. to render help.
    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags() -> FlagSet {
        let mut set = FlagSet::new("test");
        set.add("port", "8080", "The port number.", false).unwrap();
        set.add("database.url", "", "Connection string URL.", false)
            .unwrap();
        set.add_help();
        set
    }

    #[test]
    fn only_explicit_flags_are_returned() {
        let given = flags().parse(["--database.url", "pg://db"]).unwrap();
        assert_eq!(given.len(), 1);
        assert_eq!(given["database.url"], "pg://db");
    }

    #[test]
    fn equals_syntax() {
        let given = flags().parse(["--port=9000"]).unwrap();
        assert_eq!(given["port"], "9000");
    }

    #[test]
    fn empty_value_is_kept() {
        let given = flags().parse(["--port="]).unwrap();
        assert_eq!(given["port"], "");
    }

    #[test]
    fn negative_numbers_are_values() {
        let given = flags().parse(["--port", "-1"]).unwrap();
        assert_eq!(given["port"], "-1");
    }

    #[test]
    fn no_args_yields_nothing() {
        let given = flags().parse(Vec::<String>::new()).unwrap();
        assert!(given.is_empty());
    }

    #[test]
    fn undeclared_flag_is_parse_error() {
        let err = flags().parse(["--nope", "1"]).unwrap_err();
        assert!(matches!(err, BindfigError::Flags(_)));
    }

    #[test]
    fn duplicate_registration() {
        let mut set = flags();
        let err = set.add("port", "", "", false).unwrap_err();
        assert!(matches!(err, BindfigError::DuplicateFlag(name) if name == "port"));
        set.add("port", "", "", true).unwrap();
        assert!(set.contains("port"));
    }

    #[test]
    fn help_flag_displays_help() {
        let err = flags().parse(["--help"]).unwrap_err();
        match err {
            BindfigError::Flags(e) => assert_eq!(e.kind(), clap::error::ErrorKind::DisplayHelp),
            other => panic!("Expected Flags, got: {other:?}"),
        }
    }

    #[test]
    fn field_flag_named_help_takes_precedence() {
        let mut set = FlagSet::new("test");
        set.add("help", "", "Where to find docs.", false).unwrap();
        set.add_help();
        set.add_help();
        let given = set.parse(["--help", "see docs"]).unwrap();
        assert_eq!(given["help"], "see docs");
        assert_eq!(set.command().get_arguments().count(), 1);
    }

    #[test]
    fn help_lists_usage() {
        let mut cmd = flags().command().clone();
        let help = cmd.render_help().to_string();
        assert!(help.contains("--database.url"));
        assert!(help.contains("Connection string URL."));
    }
}
