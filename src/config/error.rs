//! Errors in site configuration sources.
//!
//! Covers `config.toml`, `pages/csp.toml`, page front matter and plugin
//! definitions. Only `config.toml` failures are fatal; the others are
//! logged and the offending source is treated as empty.

use std::{io, path::PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read `{}`", .0.display())]
    Io(PathBuf, #[source] io::Error),

    #[error("invalid config.toml: {}", .0.message())]
    Toml(#[from] toml::de::Error),

    #[error("ignoring `{}`: {}", .0.display(), .1.message())]
    Policy(PathBuf, #[source] toml::de::Error),

    #[error("ignoring front matter: {0}")]
    FrontMatter(#[from] serde_yaml::Error),

    #[error("[{section}] {reason}")]
    Invalid { section: &'static str, reason: String },

    #[error("plugin `{plugin}`: invalid {kind} name `{name}`")]
    PluginName {
        plugin: String,
        kind: &'static str,
        name: String,
    },
}
