//! Site initialization module.
//!
//! Scaffolds an example site: config, CSP policy, layout fragments, two
//! pages, a widget, an error page and a theme stylesheet.

use crate::{config::SiteConfig, log};
use anyhow::{Context, Result, bail};
use std::{fs, path::Path};

/// Example sources, relative to the pages directory.
const EXAMPLE_PAGES: &[(&str, &str)] = &[
    ("csp.toml", include_str!("embed/example/csp.toml")),
    ("head.html", include_str!("embed/example/head.html")),
    ("header.html", include_str!("embed/example/header.html")),
    ("body.md", include_str!("embed/example/body.md")),
    ("about/body.md", include_str!("embed/example/about/body.md")),
    ("@widget.html", include_str!("embed/example/@widget.html")),
    ("@error.html", include_str!("embed/example/@error.html")),
];

const EXAMPLE_CONFIG: &str = include_str!("embed/example/config.toml");
const EXAMPLE_THEME: &str = include_str!("embed/example/config.css");

/// Create a new example site at the config root.
///
/// Without a site name the root must be empty.
pub fn new_site(config: &SiteConfig, has_name: bool) -> Result<()> {
    let root = config.get_root();

    if config.config_path.exists() {
        bail!(
            "Config file `{}` already exists. Remove it manually or init in a different path.",
            config.config_path.display()
        );
    }
    if !has_name && !is_dir_empty(root)? {
        bail!(
            "Current directory is not empty. Use `webpress init <SITE_NAME>` to create in a subdirectory."
        );
    }

    write_new(&config.config_path, EXAMPLE_CONFIG)?;
    for (rel, content) in EXAMPLE_PAGES {
        write_new(&config.build.pages.join(rel), content)?;
    }
    write_new(&config.build.theme.join("config.css"), EXAMPLE_THEME)?;

    log!("init"; "created site at {}", root.display());
    Ok(())
}

/// Check if a directory is completely empty
fn is_dir_empty(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    Ok(fs::read_dir(path)?.next().is_none())
}

/// Write a file that must not exist yet, creating parent directories.
fn write_new(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        bail!(
            "Path `{}` already exists. Try `webpress init <SITE_NAME>` instead.",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cli::Cli, compiler, plugin::PluginRegistry, render::Renderer};
    use clap::Parser;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn init_config(dir: &TempDir, name: Option<&str>) -> SiteConfig {
        let root = dir.path().to_string_lossy().into_owned();
        let mut args = vec!["webpress", "--root", root.as_str(), "init"];
        args.extend(name);
        SiteConfig::load(&Cli::parse_from(args)).unwrap()
    }

    #[test]
    fn test_example_site_compiles() {
        let dir = TempDir::new().unwrap();
        let config = init_config(&dir, Some("blog"));
        new_site(&config, true).unwrap();

        let root = dir.path().join("blog");
        assert!(root.join("config.toml").is_file());
        assert!(root.join("pages/about/body.md").is_file());
        assert!(root.join("theme/config.css").is_file());

        // the scaffolded config parses and drives a full compile
        let config = SiteConfig::from_path(&root.join("config.toml")).unwrap();
        assert!(config.build.csp);
        let mut config = config;
        config.resolve_paths(&root);

        let (compiler, report) =
            compiler::startup(Arc::new(config), &PluginRegistry::default()).unwrap();
        assert_eq!(report.failed, 0);
        assert_eq!(report.pages, 2);
        assert_eq!(report.dynamic, 2);
        let dist = &compiler.config().build.dist;
        assert!(dist.join("#index.html").is_file());
        assert!(dist.join("#about.html").is_file());
        assert!(dist.join("@error.html").is_file());

        let renderer = Renderer::new(&compiler);
        let about = renderer.render("/about", true).unwrap().unwrap();
        let body = String::from_utf8(about.body).unwrap();
        assert!(body.contains("<title>About this site</title>"), "{body}");
        assert!(about.csp.unwrap().contains("script-src 'self' 'nonce-"));

        let missing = renderer.render_error(404, "Page not found");
        let body = String::from_utf8(missing.body).unwrap();
        assert!(body.contains("Error 404"), "{body}");
        assert!(body.contains("Back to Example"), "{body}");
    }

    #[test]
    fn test_refuses_non_empty_root() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let config = init_config(&dir, None);
        assert!(new_site(&config, false).is_err());
    }

    #[test]
    fn test_refuses_existing_config() {
        let dir = TempDir::new().unwrap();
        let config = init_config(&dir, Some("site"));
        new_site(&config, true).unwrap();
        assert!(new_site(&config, true).is_err());
    }
}
