use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::coerce::DEFAULT_SEPARATOR;
use crate::keys::DEFAULT_DELIMITER;

/// Engine options, set through [`BindfigBuilder`](crate::BindfigBuilder).
///
/// Four sources are applied in a fixed order, each overwriting the previous:
///
/// ```text
/// defaults   #[bind(default = "...")]
///    ↑ overridden by
/// files      in list order, later files win when merging
///    ↑ overridden by
/// env        PREFIX_KEY
///    ↑ overridden by
/// flags      --prefix.key
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    pub skip_defaults: bool,
    pub skip_files: bool,
    pub skip_env: bool,
    pub skip_flags: bool,

    /// Prefix for env keys. `"APP"` makes `port` look for `APP_PORT`.
    pub env_prefix: String,
    /// Prefix for flag keys. `"app"` makes `port` look for `--app.port`.
    pub flag_prefix: String,
    /// Delimiter between flag key segments (default `.`).
    pub flag_delimiter: String,

    /// Treat every field as required.
    pub all_fields_required: bool,
    /// Let several fields share one env or flag key.
    pub allow_duplicates: bool,
    /// Ignore file keys that match no field.
    pub allow_unknown_fields: bool,
    /// Ignore prefixed env vars that match no field.
    pub allow_unknown_envs: bool,
    /// Ignore prefixed flags that match no field.
    pub allow_unknown_flags: bool,
    /// Derive tags from identifiers (`maxConns` → `MAX_CONNS`/`max_conns`).
    /// When off, undeclared tags are the raw identifier.
    pub generate_tags: bool,

    /// Fail instead of skipping when a listed file does not exist.
    pub fail_on_file_not_found: bool,
    /// Load every existing file instead of only the first.
    pub merge_files: bool,
    /// Name of a flag whose value adds (or, without merging, replaces) the
    /// config file list.
    pub file_flag: Option<String>,
    pub files: Vec<PathBuf>,

    /// `NAME=VALUE` strings; the process environment when `None`.
    pub envs: Option<Vec<String>>,
    /// Command-line arguments without the binary name; the process arguments
    /// when `None`.
    pub args: Option<Vec<String>>,
    /// Already-parsed flags. When set, `args` are not parsed.
    pub flag_values: Option<BTreeMap<String, String>>,

    /// Separator used to split a string into a sequence (default `,`).
    pub slice_separator: String,
    /// Name shown in flag help output; the executable's name when empty.
    pub command_name: String,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            skip_defaults: false,
            skip_files: false,
            skip_env: false,
            skip_flags: false,
            env_prefix: String::new(),
            flag_prefix: String::new(),
            flag_delimiter: DEFAULT_DELIMITER.to_string(),
            all_fields_required: false,
            allow_duplicates: false,
            allow_unknown_fields: false,
            allow_unknown_envs: false,
            allow_unknown_flags: false,
            generate_tags: true,
            fail_on_file_not_found: false,
            merge_files: false,
            file_flag: None,
            files: Vec::new(),
            envs: None,
            args: None,
            flag_values: None,
            slice_separator: DEFAULT_SEPARATOR.to_string(),
            command_name: String::new(),
        }
    }
}
