//! webpress - compile a tree of templated pages and serve it with per-request CSP nonces.

mod cli;
mod compiler;
mod config;
mod init;
mod logger;
mod plugin;
mod render;
mod serve;
mod template;
mod utils;
mod watch;

use anyhow::{Result, bail};
use clap::Parser;
use cli::{Cli, Commands};
use config::SiteConfig;
use init::new_site;
use plugin::PluginRegistry;
use serve::serve_site;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = SiteConfig::load(&cli)?;

    match &cli.command {
        Commands::Init { name } => new_site(&config, name.is_some()),
        Commands::Build { .. } => {
            let plugins = PluginRegistry::default();
            let (_, report) = startup(config, &plugins)?;
            if !report.is_ok() {
                bail!("{} pages failed to compile", report.failed);
            }
            Ok(())
        }
        Commands::Serve { .. } => {
            let plugins = Arc::new(PluginRegistry::default());
            let (compiler, _) = startup(config, &plugins)?;
            serve_site(Arc::new(compiler), plugins)
        }
    }
}

/// Compile the site once, refusing to run without a config file.
fn startup(
    config: SiteConfig,
    plugins: &PluginRegistry,
) -> Result<(compiler::Compiler, compiler::Report)> {
    if !config.config_path.is_file() {
        bail!(
            "Config file `{}` not found. Run `webpress init` first.",
            config.config_path.display()
        );
    }
    compiler::startup(Arc::new(config), plugins)
}
