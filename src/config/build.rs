//! `[build]` section configuration.
//!
//! Contains the site directory layout and output switches.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[build]` section in config.toml - directory layout and output modes.
///
/// All directory paths are relative to the site root until
/// [`SiteConfig::resolve_paths`](super::SiteConfig::resolve_paths) makes them absolute.
///
/// # Example
/// ```toml
/// [build]
/// pages = "pages"     # Page sources
/// dist = "dist"       # Generated artifacts
/// minify = true
/// compress = true     # Gzip pages that carry no nonce
/// csp = true          # Nonce mode on by default (pages opt out with `csp: no`)
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(default)]
pub struct BuildConfig {
    /// Site root directory
    #[serde(default = "defaults::build::root")]
    #[educe(Default = defaults::build::root())]
    pub root: Option<PathBuf>,

    /// Page sources, including `csp.toml`, `@widget.*` and `@error.*`
    #[serde(default = "defaults::build::pages")]
    #[educe(Default = defaults::build::pages())]
    pub pages: PathBuf,

    /// Generated artifacts, recreated on every startup
    #[serde(default = "defaults::build::dist")]
    #[educe(Default = defaults::build::dist())]
    pub dist: PathBuf,

    /// Served under `/theme/*`
    #[serde(default = "defaults::build::theme")]
    #[educe(Default = defaults::build::theme())]
    pub theme: PathBuf,

    /// Served under `/assets/*`; core and plugin assets are written here
    #[serde(default = "defaults::build::assets")]
    #[educe(Default = defaults::build::assets())]
    pub assets: PathBuf,

    /// Application data directory
    #[serde(default = "defaults::build::db")]
    #[educe(Default = defaults::build::db())]
    pub db: PathBuf,

    /// Served under `[serve].public_uri` when set
    #[serde(default = "defaults::build::public")]
    #[educe(Default = defaults::build::public())]
    pub public: PathBuf,

    /// Minify pages and core assets
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub minify: bool,

    /// Gzip pages that do not carry a nonce
    #[serde(default = "defaults::r#true")]
    #[educe(Default = true)]
    pub compress: bool,

    /// Global default for CSP nonce mode; pages override with `csp: yes|no`
    #[serde(default = "defaults::r#false")]
    #[educe(Default = false)]
    pub csp: bool,
}
