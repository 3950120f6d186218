//! Plugin registry.
//!
//! A plugin bundles default vars, route hooks, page sources and assets.
//! The registry is built once in `main`, before the compiler runs, and
//! shared read-only by the compiler and the server.
//!
//! ```text
//! Plugin::new("forms")
//!     .var("form-action", "/submit")        beneath [vars]
//!     .route("/submit", handler)            served before dist/
//!     .page("@form.html", bytes)            pages/@form.html, if absent
//!     .asset("forms.js", bytes)             assets/forms.js, minified
//! ```

use crate::{
    config::{ConfigError, SiteConfig},
    log,
    render::Rendered,
    template::{Vars, normalize_key},
    utils::{
        minify::{MinifyType, minify},
        path::UriPath,
    },
};
use anyhow::{Context, Result, bail};
use std::{fmt, path::Path, sync::Arc};

/// Handles a request path under a route prefix.
///
/// Returning `None` passes the request on to the next route and then to
/// the compiled pages.
pub type RouteHandler = Arc<dyn Fn(&str) -> Option<Rendered> + Send + Sync>;

/// The stylesheet and script every layout links.
const CORE_CSS: &[u8] = include_bytes!("embed/core.css");
const CORE_JS: &[u8] = include_bytes!("embed/core.js");

#[derive(Clone)]
pub struct Plugin {
    name: String,
    vars: Vec<(String, String)>,
    routes: Vec<(String, RouteHandler)>,
    pages: Vec<(String, Vec<u8>)>,
    assets: Vec<(String, Vec<u8>)>,
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("vars", &self.vars)
            .field("routes", &self.routes.iter().map(|(p, _)| p).collect::<Vec<_>>())
            .field("pages", &self.pages.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("assets", &self.assets.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .finish()
    }
}

impl Plugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vars: Vec::new(),
            routes: Vec::new(),
            pages: Vec::new(),
            assets: Vec::new(),
        }
    }

    #[allow(dead_code)] // Reserved API
    pub fn var(mut self, key: &str, value: impl Into<String>) -> Self {
        self.vars.push((normalize_key(key), value.into()));
        self
    }

    /// Handle request paths equal to `prefix` or below it.
    #[allow(dead_code)] // Reserved API
    pub fn route<F>(mut self, prefix: &str, handler: F) -> Self
    where
        F: Fn(&str) -> Option<Rendered> + Send + Sync + 'static,
    {
        let prefix = format!("/{}", prefix.trim_matches('/'));
        self.routes.push((prefix, Arc::new(handler)));
        self
    }

    /// A page source, relative to `pages/`.
    #[allow(dead_code)] // Reserved API
    pub fn page(mut self, name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.pages.push((name.to_owned(), bytes.into()));
        self
    }

    /// A file written to `assets/`.
    pub fn asset(mut self, name: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.assets.push((name.to_owned(), bytes.into()));
        self
    }
}

/// Every plugin the site runs with, in registration order.
#[derive(Debug, Clone)]
pub struct PluginRegistry {
    plugins: Vec<Plugin>,
}

impl Default for PluginRegistry {
    /// The registry with only the built-in `core` plugin.
    fn default() -> Self {
        let core = Plugin::new("core")
            .asset("core.css", CORE_CSS)
            .asset("core.js", CORE_JS);
        Self {
            plugins: vec![core],
        }
    }
}

impl PluginRegistry {
    #[allow(dead_code)] // Reserved API
    pub fn with(mut self, plugin: Plugin) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Plugin default vars; a later plugin overrides an earlier one.
    pub fn vars(&self) -> Vars {
        self.plugins
            .iter()
            .flat_map(|p| p.vars.iter().cloned())
            .collect()
    }

    /// The first route hook that handles `path`.
    pub fn route(&self, path: &str) -> Option<Rendered> {
        self.plugins
            .iter()
            .flat_map(|p| p.routes.iter())
            .filter(|(prefix, _)| matches_prefix(path, prefix))
            .find_map(|(_, handler)| handler(path))
    }

    /// Copy plugin pages into `pages/`, keeping any file already there.
    pub fn install_pages(&self, pages: &Path) -> Result<()> {
        for plugin in &self.plugins {
            for (name, bytes) in &plugin.pages {
                let Some(rel) = UriPath::parse(name).filter(|u| !u.is_root()) else {
                    bail!(ConfigError::PluginName {
                        plugin: plugin.name.clone(),
                        kind: "page",
                        name: name.clone(),
                    });
                };
                let path = rel.to_path(pages);
                if path.exists() {
                    continue;
                }
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("Failed to create {}", parent.display()))?;
                }
                std::fs::write(&path, bytes)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                log!("plugin"; "{}: installed {name}", plugin.name);
            }
        }
        Ok(())
    }

    /// Write plugin assets into `assets/`, minified by extension.
    pub fn write_assets(&self, config: &SiteConfig) -> Result<()> {
        let assets = &config.build.assets;
        for plugin in &self.plugins {
            for (name, bytes) in &plugin.assets {
                let Some(rel) = UriPath::parse(name).filter(|u| !u.is_root()) else {
                    bail!(ConfigError::PluginName {
                        plugin: plugin.name.clone(),
                        kind: "asset",
                        name: name.clone(),
                    });
                };
                let content = match MinifyType::from_name(name, bytes) {
                    Some(kind) => minify(kind, config),
                    None => bytes.as_slice().into(),
                };
                let path = rel.to_path(assets);
                crate::compiler::output::write_atomic(&path, &content)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
        }
        Ok(())
    }
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    prefix == "/"
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}
