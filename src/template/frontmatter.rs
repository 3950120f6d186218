//! Front matter extraction and config merging.
//!
//! A page source may start with a YAML block between `---` lines. Keys are
//! normalized (lowercase, `-` and `_` removed) and scalar values are kept as
//! strings; nested values are ignored.

use super::{Vars, scanner::split_front_matter};
use crate::{config::ConfigError, log};
use rustc_hash::FxHashMap;
use serde_yaml::Value;
use std::collections::hash_map::Entry;

/// Normalize a config key: `Site_Title` and `site-title` both become `sitetitle`.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !matches!(c, '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Split `source` into its front matter and body.
///
/// A malformed block yields an empty map but is still removed from the body.
pub fn extract(source: &str) -> (Vars, &str) {
    let Some((block, body)) = split_front_matter(source) else {
        return (Vars::default(), source);
    };

    let vars = parse(block).unwrap_or_else(|e| {
        log!("page"; "{e}");
        Vars::default()
    });

    (vars, body)
}

/// Parse a front matter block. Anything but a mapping has no vars.
pub fn parse(block: &str) -> Result<Vars, ConfigError> {
    Ok(match serde_yaml::from_str::<Value>(block)? {
        Value::Mapping(map) => map
            .into_iter()
            .filter_map(|(key, value)| Some((normalize_key(&scalar(key)?), scalar(value)?)))
            .collect(),
        _ => Vars::default(),
    })
}

fn scalar(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Tagged(tagged) => scalar(tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

/// Effective config of one page, merged from every file that contributed.
///
/// Each value carries the rank of the scope it came from (the depth of the
/// directory the file was found in). A higher rank replaces a lower one;
/// on equal rank the value seen first is kept.
#[derive(Debug, Default, Clone)]
pub struct PageConfig {
    values: FxHashMap<String, (usize, String)>,
}

impl PageConfig {
    pub fn merge(&mut self, rank: usize, vars: Vars) {
        for (key, value) in vars {
            match self.values.entry(key) {
                Entry::Occupied(mut entry) => {
                    if rank > entry.get().0 {
                        entry.insert((rank, value));
                    }
                }
                Entry::Vacant(entry) => {
                    entry.insert((rank, value));
                }
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|(_, value)| value.as_str())
    }

    /// Per-page `csp` switch: `yes`/`true` forces nonce mode on, `no`/`false` off.
    pub fn csp_override(&self) -> Option<bool> {
        match self.get("csp")?.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" => Some(true),
            "no" | "false" => Some(false),
            _ => None,
        }
    }

    pub fn into_vars(self) -> Vars {
        self.values
            .into_iter()
            .map(|(key, (_, value))| (key, value))
            .collect()
    }
}
