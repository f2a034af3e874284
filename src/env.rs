use std::collections::BTreeMap;

/// Snapshot the process environment as `NAME=VALUE` strings.
pub fn process_envs() -> Vec<String> {
    std::env::vars().map(|(k, v)| format!("{k}={v}")).collect()
}

/// Build a flat name → value map from `NAME=VALUE` strings.
///
/// Each entry is split at the first `=`, so values may themselves contain
/// `=`. Entries without one are ignored. Later duplicates win.
///
/// Takes an iterator so tests can pass synthetic data instead of the process
/// environment.
pub fn env_to_map<I, S>(envs: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut map = BTreeMap::new();
    for entry in envs {
        let Some((name, value)) = entry.as_ref().split_once('=') else {
            continue;
        };
        if name.is_empty() {
            continue;
        }
        map.insert(name.to_string(), value.to_string());
    }
    map
}
