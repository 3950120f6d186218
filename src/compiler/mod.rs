//! Page compilation from `pages/` into `dist/`.
//!
//! - **csp**: policy loading and nonce tagging
//! - **dir**: recursive, parallel directory compilation
//! - **output**: artifact paths and exclusive writes
//!
//! # Startup Flow
//!
//! ```text
//! prepare() ──► write assets ──► install plugin pages ──► load_policy() ──► compile_all()
//!    │
//!    └─ create pages/ theme/ assets/ db/ [public/], recreate dist/
//! ```

pub mod csp;
mod dir;
pub mod output;

pub use csp::CspPolicy;
pub use dir::Report;

use crate::{
    config::SiteConfig,
    log,
    plugin::PluginRegistry,
    template::Vars,
    utils::path::UriPath,
};
use anyhow::{Context, Result};
use arc_swap::ArcSwap;
use output::Artifacts;
use std::{fs, io, sync::Arc, time::Instant};

/// Base layout every page is compiled from.
pub const LAYOUT: &str = include_str!("../embed/layout.html");

/// Compiles pages with one site config, one global var set and the current
/// CSP policy.
pub struct Compiler {
    config: Arc<SiteConfig>,
    globals: Vars,
    policy: ArcSwap<CspPolicy>,
}

impl Compiler {
    /// Plugin vars sit beneath `[vars]`.
    pub fn new(config: Arc<SiteConfig>, plugins: &PluginRegistry) -> Self {
        let mut globals = plugins.vars();
        globals.extend(config.global_vars());
        Self {
            config,
            globals,
            policy: ArcSwap::from_pointee(CspPolicy::default()),
        }
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn globals(&self) -> &Vars {
        &self.globals
    }

    pub fn policy(&self) -> Arc<CspPolicy> {
        self.policy.load_full()
    }

    /// Reload `csp.toml`. Readers keep the old policy until the swap.
    pub fn load_policy(&self) {
        let policy = CspPolicy::load(&self.config.csp_path());
        if !policy.is_empty() {
            log!("csp"; "{}", policy.header());
        }
        self.policy.store(Arc::new(policy));
    }

    pub fn reset_policy(&self) {
        self.policy.store(Arc::new(CspPolicy::default()));
    }

    /// Create the site directories and an empty `dist/`, then write plugin
    /// assets and install plugin pages.
    ///
    /// Failing to recreate `dist/` is fatal.
    pub fn prepare(&self, plugins: &PluginRegistry) -> Result<()> {
        let build = &self.config.build;
        let mut dirs = vec![&build.pages, &build.theme, &build.assets, &build.db];
        if self.config.serve.public_uri.is_some() {
            dirs.push(&build.public);
        }
        for dir in dirs {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        output::remove_dir_if_exists(&build.dist)
            .with_context(|| format!("Failed to remove {}", build.dist.display()))?;
        fs::create_dir_all(&build.dist)
            .with_context(|| format!("Failed to create {}", build.dist.display()))?;

        plugins.write_assets(&self.config)?;
        plugins.install_pages(&build.pages)?;
        Ok(())
    }

    /// Compile the whole tree.
    pub fn compile_all(&self) -> Report {
        let start = Instant::now();
        let report = self.compile_dir(&UriPath::root());
        log!(
            "compile";
            "{} pages, {} dynamic in {:.2?}{}",
            report.pages,
            report.dynamic,
            start.elapsed(),
            if report.failed > 0 { format!(" ({} failed)", report.failed) } else { String::new() }
        );
        report
    }

    /// Remove the artifacts of `uri` and its `dist/` directory.
    pub fn remove_artifacts(&self, uri: &UriPath) -> io::Result<()> {
        let dist = &self.config.build.dist;
        Artifacts::for_uri(dist, uri).remove()?;
        if !uri.is_root() {
            output::remove_dir_if_exists(&uri.to_path(dist))?;
        }
        Ok(())
    }

    /// Remove the precompiled dynamic page `name` of directory `dir`.
    pub fn remove_dynamic(&self, dir: &UriPath, name: &str) -> io::Result<()> {
        let path = dir.to_path(&self.config.build.dist).join(format!("{name}.html"));
        match fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Prepare the site, load the policy and compile every page.
pub fn startup(config: Arc<SiteConfig>, plugins: &PluginRegistry) -> Result<(Compiler, Report)> {
    let compiler = Compiler::new(config, plugins);
    compiler.prepare(plugins)?;
    compiler.load_policy();
    let report = compiler.compile_all();
    Ok((compiler, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::gzip;
    use tempfile::TempDir;

    pub(super) fn setup(dir: &TempDir) -> Compiler {
        let mut config = SiteConfig::with_root(dir.path());
        config.site.title = "MySite".into();
        config.build.minify = false;
        fs::create_dir_all(&config.build.pages).unwrap();
        fs::create_dir_all(&config.build.dist).unwrap();
        Compiler::new(Arc::new(config), &PluginRegistry::default())
    }

    pub(super) fn write(compiler: &Compiler, rel: &str, content: &str) {
        let path = compiler.config().build.pages.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub(super) fn read_page(compiler: &Compiler, uri: &str) -> String {
        let artifacts = Artifacts::for_uri(
            &compiler.config().build.dist,
            &UriPath::parse(uri).unwrap(),
        );
        if let Ok(bytes) = fs::read(&artifacts.compressed) {
            return String::from_utf8(gzip::decompress(&bytes).unwrap()).unwrap();
        }
        if let Ok(text) = fs::read_to_string(&artifacts.nonce) {
            return text;
        }
        fs::read_to_string(&artifacts.plain).unwrap()
    }

    #[test]
    fn test_startup_recreates_dist_and_writes_assets() {
        let dir = TempDir::new().unwrap();
        let config = SiteConfig::with_root(dir.path());
        fs::create_dir_all(&config.build.dist).unwrap();
        fs::write(config.build.dist.join("stale.html"), "old").unwrap();

        let (compiler, report) = startup(Arc::new(config), &PluginRegistry::default()).unwrap();
        assert!(report.is_ok());
        let build = &compiler.config().build;

        assert!(!build.dist.join("stale.html").exists());
        assert!(build.dist.join("index.html.gz").is_file());
        assert!(build.assets.join("core.js").is_file());
        assert!(build.assets.join("core.css").is_file());
        assert!(build.theme.is_dir());
        assert!(build.db.is_dir());
        assert!(!build.public.exists());
    }

    #[test]
    fn test_prepare_creates_public_when_enabled() {
        let dir = TempDir::new().unwrap();
        let mut config = SiteConfig::with_root(dir.path());
        config.serve.public_uri = Some("/files".into());

        let compiler = Compiler::new(Arc::new(config), &PluginRegistry::default());
        compiler.prepare(&PluginRegistry::default()).unwrap();
        assert!(compiler.config().build.public.is_dir());
    }

    #[test]
    fn test_globals_layering() {
        let dir = TempDir::new().unwrap();
        let mut config = SiteConfig::with_root(dir.path());
        config.vars.insert("greeting".into(), toml::Value::String("site".into()));

        let plugins = PluginRegistry::default().with(
            crate::plugin::Plugin::new("demo")
                .var("greeting", "plugin")
                .var("farewell", "bye"),
        );
        let compiler = Compiler::new(Arc::new(config), &plugins);

        assert_eq!(compiler.globals().get("greeting").map(String::as_str), Some("site"));
        assert_eq!(compiler.globals().get("farewell").map(String::as_str), Some("bye"));
    }

    #[test]
    fn test_load_and_reset_policy() {
        let dir = TempDir::new().unwrap();
        let compiler = setup(&dir);
        assert!(compiler.policy().is_empty());

        write(&compiler, "csp.toml", "default-src = \"'self'\"\n");
        compiler.load_policy();
        assert_eq!(compiler.policy().header(), "default-src 'self';");

        compiler.reset_policy();
        assert!(compiler.policy().is_empty());
    }

    #[test]
    fn test_remove_artifacts() {
        let dir = TempDir::new().unwrap();
        let compiler = setup(&dir);
        write(&compiler, "x/y/body.html", "<p>y</p>");
        write(&compiler, "x/y/@dyn.html", "<p>d</p>");
        compiler.compile_all();

        let dist = &compiler.config().build.dist;
        assert!(dist.join("x/y.html.gz").is_file());
        assert!(dist.join("x/y/@dyn.html").is_file());

        compiler.remove_artifacts(&UriPath::parse("x/y").unwrap()).unwrap();
        assert!(!dist.join("x/y.html.gz").exists());
        assert!(!dist.join("x/y").exists());
        assert!(dist.join("x.html.gz").is_file());
    }
}
