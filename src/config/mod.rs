//! Site configuration management for `config.toml`.
//!
//! # Sections
//!
//! | Section     | Purpose                                        |
//! |-------------|------------------------------------------------|
//! | `[site]`    | Site identity (title, app title, description)  |
//! | `[build]`   | Directory layout, minify, compress, csp        |
//! | `[serve]`   | HTTP server (port, interface, watch, public)   |
//! | `[vars]`    | Global template variables                      |
//!
//! Unknown keys are ignored so older or foreign config files still load.
//!
//! # Example
//!
//! ```toml
//! [site]
//! title = "MySite"
//!
//! [build]
//! csp = true
//!
//! [serve]
//! port = 8080
//!
//! [vars]
//! support_email = "help@example.com"
//! ```

mod build;
pub mod defaults;
mod error;
mod serve;
mod site;

pub use error::ConfigError;

use build::BuildConfig;
use serve::ServeConfig;
use site::SiteInfo;

use crate::cli::{Cli, Commands};
use crate::template::{Vars, normalize_key};
use anyhow::{Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

/// Name of the CSP policy source inside the pages directory.
pub const CSP_FILE: &str = "csp.toml";

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing config.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
pub struct SiteConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Site identity
    #[serde(default)]
    pub site: SiteInfo,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// HTTP server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// Global template variables
    #[serde(default)]
    pub vars: HashMap<String, toml::Value>,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Load the config selected by the CLI, falling back to defaults when the
    /// file does not exist or a new site is being scaffolded, then apply CLI
    /// overrides.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config_path = Self::cli_root(cli).join(&cli.config);

        let mut config = if !cli.is_init() && config_path.is_file() {
            Self::from_path(&config_path)?
        } else {
            Self::default()
        };
        config.update_with_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// Defaults rooted at `root`, with every path made absolute.
    pub fn with_root(root: &Path) -> Self {
        let mut config = Self::default();
        config.config_path = root.join("config.toml");
        config.resolve_paths(root);
        config
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        self.build.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// Set the root directory path
    pub fn set_root(&mut self, path: &Path) {
        self.build.root = Some(path.to_path_buf())
    }

    /// Path of the CSP policy source.
    pub fn csp_path(&self) -> PathBuf {
        self.build.pages.join(CSP_FILE)
    }

    /// `[vars]` flattened into template variables.
    ///
    /// Keys are normalized like front-matter keys; strings are taken as-is and
    /// other scalars are stringified. Arrays and tables are skipped.
    pub fn global_vars(&self) -> Vars {
        self.vars
            .iter()
            .filter_map(|(key, value)| {
                let value = match value {
                    toml::Value::String(s) => s.clone(),
                    toml::Value::Integer(i) => i.to_string(),
                    toml::Value::Float(f) => f.to_string(),
                    toml::Value::Boolean(b) => b.to_string(),
                    toml::Value::Datetime(d) => d.to_string(),
                    toml::Value::Array(_) | toml::Value::Table(_) => return None,
                };
                Some((normalize_key(key), value))
            })
            .collect()
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli) {
        let root = match &cli.command {
            Commands::Init { name: Some(name) } => Self::cli_root(cli).join(name),
            _ => Self::cli_root(cli),
        };

        self.config_path = cli.config.clone();
        self.resolve_paths(&root);

        if let Some(args) = cli.build_args() {
            Self::update_option(&mut self.build.minify, args.minify.as_ref());
            Self::update_option(&mut self.build.compress, args.compress.as_ref());
        }

        if let Commands::Serve {
            interface,
            port,
            watch,
            ..
        } = &cli.command
        {
            Self::update_option(&mut self.serve.interface, interface.as_ref());
            Self::update_option(&mut self.serve.port, port.as_ref());
            Self::update_option(&mut self.serve.watch, watch.as_ref());
        }
    }

    fn cli_root(cli: &Cli) -> PathBuf {
        cli.root.clone().unwrap_or_else(|| PathBuf::from("./"))
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Make the root and every directory path absolute
    pub fn resolve_paths(&mut self, root: &Path) {
        let root = Self::normalize_path(root);
        self.set_root(&root);

        self.config_path = Self::normalize_path(&root.join(&self.config_path));
        self.build.pages = Self::normalize_path(&root.join(&self.build.pages));
        self.build.dist = Self::normalize_path(&root.join(&self.build.dist));
        self.build.theme = Self::normalize_path(&root.join(&self.build.theme));
        self.build.assets = Self::normalize_path(&root.join(&self.build.assets));
        self.build.db = Self::normalize_path(&root.join(&self.build.db));
        self.build.public = Self::normalize_path(&root.join(&self.build.public));
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            // For non-existent paths, manually make them absolute
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate configuration values that serde cannot check
    pub fn validate(&self) -> Result<()> {
        if self.build.pages == self.build.dist {
            bail!(ConfigError::Invalid {
                section: "build",
                reason: "`pages` and `dist` must be different directories".into(),
            });
        }

        if let Some(uri) = &self.serve.public_uri
            && (!uri.starts_with('/') || uri == "/")
        {
            bail!(ConfigError::Invalid {
                section: "serve.public_uri",
                reason: "must start with `/` and name a prefix".into(),
            });
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
