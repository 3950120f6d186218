//! Recursive directory compilation.
//!
//! Each directory under `pages/` becomes one page, built from the layout
//! with its embeds resolved against the directory's search chain. Files
//! named `@name.html` / `@name.md` are dynamic pages, precompiled to
//! `dist/<dir>/@name.html` for the request-time pass.
//!
//! ```text
//! compile_dir(a)
//!   ├─ join ─┬─ children (parallel) ── compile_dir(a/x), compile_dir(a/y)
//!   │        └─ dynamic pages ──────── a/@widget.html, a/@form.md
//!   └─ own page ────────────────────── dist/a.html[.gz] or dist/#a.html
//! ```
//!
//! The own page is written only after every child returns.

use super::{
    Compiler, LAYOUT,
    output::{Artifacts, INDEX, Mode, shadows_root, write_atomic},
};
use crate::{
    log,
    template::{PageConfig, Pass, Resolver, Scope, WIDGET_MARKER, extract, markdown},
    utils::{
        minify::{MinifyType, minify},
        path::UriPath,
    },
};
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use std::{
    fs, io,
    iter::Sum,
    ops::Add,
    path::{Path, PathBuf},
};

/// Page counts of one compile run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub pages: usize,
    pub dynamic: usize,
    pub failed: usize,
}

impl Report {
    const fn failure() -> Self {
        Self {
            pages: 0,
            dynamic: 0,
            failed: 1,
        }
    }

    pub const fn is_ok(&self) -> bool {
        self.failed == 0
    }
}

impl Add for Report {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            pages: self.pages + rhs.pages,
            dynamic: self.dynamic + rhs.dynamic,
            failed: self.failed + rhs.failed,
        }
    }
}

impl Sum for Report {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

struct DynamicPage {
    source: PathBuf,
    markdown: bool,
    output: String,
}

impl Compiler {
    /// Compile the directory at `uri` and everything below it.
    pub fn compile_dir(&self, uri: &UriPath) -> Report {
        if shadows_root(uri) {
            log!("error"; "`{uri}` would overwrite the root page, skipped");
            return Report::failure();
        }

        let dir = uri.to_path(&self.config.build.pages);
        let Ok(entries) = fs::read_dir(&dir) else {
            return Report::default();
        };
        let mut entries: Vec<_> = entries.filter_map(Result::ok).collect();
        entries.sort_by_key(fs::DirEntry::file_name);

        let mut report = Report::default();
        let mut claimed = FxHashSet::default();
        if uri.is_root() {
            claimed.insert(format!("{INDEX}.html"));
        }

        let mut children = Vec::new();
        let mut dynamic = Vec::new();
        for entry in entries {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());

            let (output, page) = if is_dir {
                (format!("{name}.html"), None)
            } else if let Some((stem, markdown)) = dynamic_stem(&name) {
                let output = format!("{stem}.html");
                let page = DynamicPage {
                    source: entry.path(),
                    markdown,
                    output: output.clone(),
                };
                (output, Some(page))
            } else {
                continue;
            };

            if !claimed.insert(output.clone()) {
                log!("error"; "`{}` also produces `{output}`, skipped", dir.join(&name).display());
                report.failed += 1;
                continue;
            }

            match page {
                Some(page) => dynamic.push(page),
                None => children.push(uri.child(&name)),
            }
        }

        let (below, dynamic) = rayon::join(
            || children.par_iter().map(|child| self.compile_dir(child)).sum::<Report>(),
            || {
                dynamic
                    .iter()
                    .map(|page| self.compile_dynamic_logged(uri, page))
                    .sum::<Report>()
            },
        );
        report = report + below + dynamic;

        match self.compile_page(uri) {
            Ok(_) => report.pages += 1,
            Err(e) => {
                log!("error"; "failed to write `/{uri}`: {e}");
                report.failed += 1;
            }
        }
        report
    }

    /// Build and write the page of directory `uri`.
    fn compile_page(&self, uri: &UriPath) -> io::Result<Mode> {
        let (html, page) = Resolver::new(&self.config, &self.globals, uri).resolve(LAYOUT);
        let csp = page.csp_override();
        let vars = page.into_vars();

        let html = Scope {
            pass: Pass::Static,
            uri,
            page: &vars,
            globals: &self.globals,
            site: &self.config,
        }
        .substitute(&html);
        let html = minify(MinifyType::Html(html.as_bytes()), &self.config);

        let policy = self.policy.load();
        let artifacts = Artifacts::for_uri(&self.config.build.dist, uri);
        if policy.applies(self.config.build.csp, csp) {
            let html = policy.tag_nonces(&String::from_utf8_lossy(&html));
            artifacts.write(html.as_bytes(), Mode::Nonce)
        } else if self.config.build.compress {
            artifacts.write(&html, Mode::Compressed)
        } else {
            artifacts.write(&html, Mode::Plain)
        }
    }

    fn compile_dynamic_logged(&self, uri: &UriPath, page: &DynamicPage) -> Report {
        match self.compile_dynamic(uri, page) {
            Ok(()) => Report {
                dynamic: 1,
                ..Report::default()
            },
            Err(e) => {
                log!("error"; "failed to compile `{}`: {e}", page.source.display());
                Report::failure()
            }
        }
    }

    /// Precompile a dynamic page: the layout with the page as `{@body}`,
    /// embeds resolved, request-time placeholders kept.
    ///
    /// Written plain and unminified; the renderer minifies after its pass.
    fn compile_dynamic(&self, uri: &UriPath, page: &DynamicPage) -> io::Result<()> {
        let source = fs::read_to_string(&page.source)?;
        let (vars, body) = extract(&source);
        let body = if page.markdown {
            markdown::render(body)
        } else {
            body.to_string()
        };

        let mut config = PageConfig::default();
        config.merge(usize::MAX, vars);
        let template = LAYOUT.replace("{@body}", &body);
        let (html, config) =
            Resolver::new(&self.config, &self.globals, uri).resolve_with(&template, config);

        let csp = config.csp_override();
        let vars = config.into_vars();
        let html = Scope {
            pass: Pass::Dynamic,
            uri,
            page: &vars,
            globals: &self.globals,
            site: &self.config,
        }
        .substitute(&html);

        let policy = self.policy.load();
        let html = if policy.applies(self.config.build.csp, csp) {
            policy.tag_nonces(&html)
        } else {
            html
        };

        let out = uri.to_path(&self.config.build.dist).join(&page.output);
        write_atomic(&out, html.as_bytes())
    }
}

/// `@name.html` / `@name.md` to (`@name`, is markdown).
fn dynamic_stem(file_name: &str) -> Option<(&str, bool)> {
    if !file_name.starts_with(WIDGET_MARKER) {
        return None;
    }
    let path = Path::new(file_name);
    let markdown = match path.extension().and_then(|e| e.to_str()) {
        Some("html") => false,
        Some("md") => true,
        _ => return None,
    };
    let stem = path.file_stem().and_then(|s| s.to_str())?;
    (stem.len() > WIDGET_MARKER.len_utf8()).then_some((stem, markdown))
}

/// A top-level directory named `index` maps onto the root page.
#[cfg(test)]
mod tests {
    use super::super::tests::{read_page, setup, write};
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_dynamic_stem() {
        assert_eq!(dynamic_stem("@error.html"), Some(("@error", false)));
        assert_eq!(dynamic_stem("@form.md"), Some(("@form", true)));
        assert_eq!(dynamic_stem("@.html"), None);
        assert_eq!(dynamic_stem("page.html"), None);
        assert_eq!(dynamic_stem("@data.json"), None);
    }

    #[test]
    fn test_compile_tree() {
        let dir = TempDir::new().unwrap();
        let compiler = setup(&dir);
        write(&compiler, "head.html", "<meta name=\"x\">");
        write(&compiler, "body.md", "# Home\n");
        write(&compiler, "about/body.md", "About {page}\n");
        write(&compiler, "docs/guide/body.html", "<p>{uri}</p>");

        let report = compiler.compile_all();
        assert_eq!(report, Report { pages: 4, dynamic: 0, failed: 0 });

        let dist = &compiler.config().build.dist;
        assert!(dist.join("index.html.gz").is_file());
        assert!(dist.join("about.html.gz").is_file());
        assert!(dist.join("docs.html.gz").is_file());
        assert!(dist.join("docs/guide.html.gz").is_file());

        let home = read_page(&compiler, "");
        assert!(home.contains("<h1 id=\"h-home\">Home</h1>"), "{home}");
        assert!(home.contains("<title>MySite</title>"), "{home}");

        let about = read_page(&compiler, "about");
        assert!(about.contains("<p>About about</p>"), "{about}");
        assert!(about.contains("<title>About | MySite</title>"), "{about}");

        assert!(read_page(&compiler, "docs/guide").contains("<p>docs/guide</p>"));
    }

    #[test]
    fn test_compile_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let compiler = setup(&dir);
        write(&compiler, "body.md", "# Same {title}\n");
        write(&compiler, "a/body.html", "<p>{desc}</p>");

        compiler.compile_all();
        let first = (read_page(&compiler, ""), read_page(&compiler, "a"));
        compiler.compile_all();
        let second = (read_page(&compiler, ""), read_page(&compiler, "a"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_front_matter_title() {
        let dir = TempDir::new().unwrap();
        let compiler = setup(&dir);
        write(&compiler, "about/body.md", "---\ntitle: Custom\n---\nx\n");

        compiler.compile_all();
        assert!(read_page(&compiler, "about").contains("<title>Custom</title>"));
    }

    #[test]
    fn test_placeholders_and_generators_in_page() {
        let dir = TempDir::new().unwrap();
        let compiler = setup(&dir);
        write(
            &compiler,
            "docs/guide/body.html",
            "<p>{Page}|{parent}|{missing}|[{rand 6}]</p><em>{lorem s 3}</em>",
        );

        let report = compiler.compile_all();
        assert!(report.is_ok());

        let page = read_page(&compiler, "docs/guide");
        assert!(page.contains("<p>Guide|docs||["), "{page}");
        let token = page.split('[').nth(1).and_then(|rest| rest.split(']').next()).unwrap();
        assert_eq!(token.len(), 6);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));

        let words = page.split("<em>").nth(1).and_then(|rest| rest.split("</em>").next()).unwrap();
        assert_eq!(words.split(' ').count(), 3, "{words}");
    }

    #[test]
    fn test_nonce_mode() {
        let dir = TempDir::new().unwrap();
        let compiler = setup(&dir);
        write(&compiler, "csp.toml", "script-src = \"'self' 'nonce'\"\n");
        write(&compiler, "body.html", "<script>go()</script>");
        write(&compiler, "plain/body.html", "---\ncsp: no\n---\n<script>go()</script>");
        compiler.load_policy();

        // csp is off globally; pages opt in
        compiler.compile_all();
        let dist = &compiler.config().build.dist;
        assert!(dist.join("index.html.gz").is_file());

        write(&compiler, "body.html", "---\ncsp: yes\n---\n<script>go()</script>");
        compiler.compile_dir(&UriPath::root());

        assert!(!dist.join("index.html.gz").exists());
        let page = fs::read_to_string(dist.join("#index.html")).unwrap();
        assert!(page.contains("<script nonce=\"{nonce}\">go()</script>"), "{page}");
        assert!(dist.join("plain.html.gz").is_file());
        assert!(!dist.join("#plain.html").exists());
    }

    #[test]
    fn test_compress_disabled_writes_plain() {
        let dir = TempDir::new().unwrap();
        let mut config = (*setup(&dir).config).clone();
        config.build.compress = false;
        let compiler = Compiler::new(std::sync::Arc::new(config), &Default::default());

        compiler.compile_all();
        assert!(compiler.config().build.dist.join("index.html").is_file());
    }

    #[test]
    fn test_dynamic_page_keeps_request_placeholders() {
        let dir = TempDir::new().unwrap();
        let compiler = setup(&dir);
        write(&compiler, "header.html", "<nav>{sitetitle}</nav>");
        write(&compiler, "@error.html", "<h1>{error}</h1><p>{msg}</p><i>{page}</i>");

        let report = compiler.compile_all();
        assert_eq!(report.dynamic, 1);

        let page = fs::read_to_string(compiler.config().build.dist.join("@error.html")).unwrap();
        assert!(page.contains("<h1>{error}</h1><p>{msg}</p>"), "{page}");
        assert!(page.contains("<title>{title}</title>"), "{page}");
        // uri placeholders resolve at precompile
        assert!(page.contains("<i>WebServer</i>"), "{page}");
        // sitetitle is a request-time name; header.html is still embedded
        assert!(page.contains("<nav>{sitetitle}</nav>"), "{page}");
    }

    #[test]
    fn test_duplicate_dynamic_outputs_rejected() {
        let dir = TempDir::new().unwrap();
        let compiler = setup(&dir);
        write(&compiler, "@card.html", "html-version");
        write(&compiler, "@card.md", "md-version");

        let report = compiler.compile_all();
        assert_eq!(report.dynamic, 1);
        assert_eq!(report.failed, 1);

        let page = fs::read_to_string(compiler.config().build.dist.join("@card.html")).unwrap();
        assert!(page.contains("html-version"));
    }

    #[test]
    fn test_index_directory_rejected() {
        let dir = TempDir::new().unwrap();
        let compiler = setup(&dir);
        write(&compiler, "body.html", "<p>root</p>");
        write(&compiler, "index/body.html", "<p>imposter</p>");

        let report = compiler.compile_all();
        assert_eq!(report.failed, 1);
        assert!(read_page(&compiler, "").contains("<p>root</p>"));

        assert_eq!(compiler.compile_dir(&UriPath::parse("index").unwrap()), Report::failure());
        assert!(read_page(&compiler, "").contains("<p>root</p>"));
    }

    #[test]
    fn test_dot_entries_skipped() {
        let dir = TempDir::new().unwrap();
        let compiler = setup(&dir);
        write(&compiler, ".git/body.html", "x");
        write(&compiler, ".@hidden.html", "x");

        let report = compiler.compile_all();
        assert_eq!(report, Report { pages: 1, dynamic: 0, failed: 0 });
        assert!(!compiler.config().build.dist.join(".git.html.gz").exists());
    }

    #[test]
    fn test_missing_directory_is_empty_report() {
        let dir = TempDir::new().unwrap();
        let compiler = setup(&dir);
        assert_eq!(compiler.compile_dir(&UriPath::parse("gone").unwrap()), Report::default());
    }
}
