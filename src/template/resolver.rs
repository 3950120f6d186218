//! Embed resolution.
//!
//! `{@name}` is replaced by the first file found for `name`:
//!
//! ```text
//! page a/b/c, embed foo:
//!
//!   pages/a/b/c/foo.{html,md}                  own level, regular file only
//!   pages/a/b/#foo.{html,md} -> a/b/foo.*      each ancestor, companion first
//!   pages/a/#foo.*           -> a/foo.*
//!   pages/#foo.*             -> foo.*
//!   pages/a/b/c/@foo.* .. pages/@foo.*         widgets, most specific first
//! ```
//!
//! A page file has its front matter merged into the page config and its
//! own embeds expanded in place. A widget is compiled on its own: its front
//! matter stays local and its variables are substituted before insertion.
//! Anything not found, unreadable, cyclic or nested too deep expands to
//! nothing.

use super::{
    PageConfig, Vars,
    frontmatter::extract,
    markdown,
    scanner::{Scanner, Segment},
    vars::{Pass, Scope},
};
use crate::{config::SiteConfig, utils::path::UriPath};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Deepest embed chain that is still expanded.
const MAX_DEPTH: usize = 16;

/// Marker for shared includes found in ancestor directories.
pub const COMPANION_MARKER: char = '#';

/// Marker for widgets and dynamic pages.
pub const WIDGET_MARKER: char = '@';

const EXTENSIONS: [(&str, bool); 2] = [("html", false), ("md", true)];

#[derive(Debug)]
enum Found {
    Page { path: PathBuf, markdown: bool, rank: usize },
    Widget { path: PathBuf, markdown: bool },
}

impl Found {
    fn path(&self) -> &Path {
        match self {
            Self::Page { path, .. } | Self::Widget { path, .. } => path,
        }
    }
}

/// Resolves embeds for one page URI.
pub struct Resolver<'a> {
    site: &'a SiteConfig,
    globals: &'a Vars,
    uri: &'a UriPath,
}

impl<'a> Resolver<'a> {
    pub const fn new(site: &'a SiteConfig, globals: &'a Vars, uri: &'a UriPath) -> Self {
        Self { site, globals, uri }
    }

    /// Expand every embed in `template`, returning the result and the
    /// config merged from every page file that contributed.
    pub fn resolve(&self, template: &str) -> (String, PageConfig) {
        self.resolve_with(template, PageConfig::default())
    }

    /// Like [`resolve`](Self::resolve), starting from an existing config.
    pub fn resolve_with(&self, template: &str, mut config: PageConfig) -> (String, PageConfig) {
        let mut stack = Vec::new();
        let html = self.expand(template, &mut config, &mut stack);
        (html, config)
    }

    fn expand(&self, input: &str, config: &mut PageConfig, stack: &mut Vec<PathBuf>) -> String {
        let mut out = String::with_capacity(input.len());
        for segment in Scanner::new(input) {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Var(token) => out.push_str(token.source),
                Segment::Embed(token) => out.push_str(&self.embed(token.name, config, stack)),
            }
        }
        out
    }

    fn embed(&self, name: &str, config: &mut PageConfig, stack: &mut Vec<PathBuf>) -> String {
        if !is_valid_name(name) || stack.len() >= MAX_DEPTH {
            return String::new();
        }

        let Some(found) = self.find(name) else {
            return String::new();
        };
        if stack.iter().any(|p| p == found.path()) {
            return String::new();
        }
        let Ok(source) = fs::read_to_string(found.path()) else {
            return String::new();
        };

        stack.push(found.path().to_path_buf());
        let html = match found {
            Found::Page { markdown, rank, .. } => {
                let (vars, body) = extract(&source);
                config.merge(rank, vars);
                self.expand(&render_body(body, markdown), config, stack)
            }
            Found::Widget { markdown, .. } => {
                let (vars, body) = extract(&source);
                let mut local = PageConfig::default();
                local.merge(0, vars);
                let html = self.expand(&render_body(body, markdown), &mut local, stack);
                let page = local.into_vars();
                Scope {
                    pass: Pass::Static,
                    uri: self.uri,
                    page: &page,
                    globals: self.globals,
                    site: self.site,
                }
                .substitute(&html)
            }
        };
        stack.pop();
        html
    }

    fn find(&self, name: &str) -> Option<Found> {
        let pages = &self.site.build.pages;
        let companion = format!("{COMPANION_MARKER}{name}");

        for level in self.uri.ancestors() {
            let dir = level.to_path(pages);
            let rank = level.len();
            let own = rank == self.uri.len();

            let hit = if own {
                probe(&dir, name)
            } else {
                probe(&dir, &companion).or_else(|| probe(&dir, name))
            };
            if let Some((path, markdown)) = hit {
                return Some(Found::Page { path, markdown, rank });
            }
        }

        let widget = format!("{WIDGET_MARKER}{name}");
        self.uri.ancestors().find_map(|level| {
            probe(&level.to_path(pages), &widget)
                .map(|(path, markdown)| Found::Widget { path, markdown })
        })
    }
}

/// First existing `<stem>.html` / `<stem>.md` in `dir`.
fn probe(dir: &Path, stem: &str) -> Option<(PathBuf, bool)> {
    EXTENSIONS.iter().find_map(|(ext, markdown)| {
        let path = dir.join(format!("{stem}.{ext}"));
        path.is_file().then_some((path, *markdown))
    })
}

fn render_body(body: &str, is_markdown: bool) -> String {
    if is_markdown {
        markdown::render(body)
    } else {
        body.to_string()
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('.') && !name.contains("..")
}
