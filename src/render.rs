//! Request-time rendering of compiled pages.
//!
//! A request URI maps onto its artifacts under `dist/`, tried in order:
//!
//! 1. `.html.gz`: sent as is to gzip clients, decompressed for the rest
//! 2. `#name.html`: a fresh nonce bound into the body and the CSP header
//! 3. `.html`: sent as is
//!
//! Dynamic `@` pages get one more substitution pass against request vars.
//! They are never served by their own URI.

use crate::{
    compiler::{Compiler, output::Artifacts},
    log,
    template::{COMPANION_MARKER, NONCE, Pass, Scope, Vars, WIDGET_MARKER, html_escape},
    utils::{
        gzip,
        minify::{MinifyType, minify},
        path::UriPath,
        token::{DEFAULT_TOKEN_LEN, NONCES},
    },
};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub const HTML: &str = "text/html; charset=utf-8";

/// A response, independent of the HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub status: u16,
    pub body: Vec<u8>,
    pub content_type: &'static str,
    /// Body is gzip-encoded.
    pub gzip: bool,
    /// `Content-Security-Policy` header value.
    pub csp: Option<String>,
}

impl Rendered {
    pub const fn html(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            body,
            content_type: HTML,
            gzip: false,
            csp: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to read {0}: {1}")]
    Io(PathBuf, #[source] io::Error),

    #[error("failed to decompress {0}: {1}")]
    Decompress(PathBuf, #[source] io::Error),
}

pub struct Renderer<'a> {
    compiler: &'a Compiler,
}

impl<'a> Renderer<'a> {
    pub const fn new(compiler: &'a Compiler) -> Self {
        Self { compiler }
    }

    /// Render the page at `url`. `None` when no artifact exists.
    pub fn render(&self, url: &str, accept_gzip: bool) -> Result<Option<Rendered>, RenderError> {
        let Some(uri) = UriPath::parse(url) else {
            return Ok(None);
        };
        if is_hidden(&uri) {
            return Ok(None);
        }

        let artifacts = Artifacts::for_uri(&self.compiler.config().build.dist, &uri);

        if let Some(bytes) = read_optional(&artifacts.compressed)? {
            if accept_gzip {
                let mut page = Rendered::html(200, bytes);
                page.gzip = true;
                return Ok(Some(page));
            }
            let body = gzip::decompress(&bytes)
                .map_err(|e| RenderError::Decompress(artifacts.compressed.clone(), e))?;
            return Ok(Some(Rendered::html(200, body)));
        }

        if let Some(bytes) = read_optional(&artifacts.nonce)? {
            return Ok(Some(self.bind_nonce(200, &String::from_utf8_lossy(&bytes))));
        }

        Ok(read_optional(&artifacts.plain)?.map(|body| Rendered::html(200, body)))
    }

    /// Render the dynamic page `name` (`@`-prefixed) of directory `dir`
    /// with request `vars`. `None` when it was never compiled.
    pub fn render_dynamic(
        &self,
        dir: &UriPath,
        name: &str,
        vars: &Vars,
        status: u16,
    ) -> Result<Option<Rendered>, RenderError> {
        let config = self.compiler.config();
        let path = dir.to_path(&config.build.dist).join(format!("{name}.html"));
        let Some(bytes) = read_optional(&path)? else {
            return Ok(None);
        };

        let html = Scope {
            pass: Pass::Request,
            uri: dir,
            page: vars,
            globals: self.compiler.globals(),
            site: config,
        }
        .substitute(&String::from_utf8_lossy(&bytes));
        let html = minify(MinifyType::Html(html.as_bytes()), config);
        let html = String::from_utf8_lossy(&html);

        if html.contains(&format!("{{{NONCE}}}")) {
            Ok(Some(self.bind_nonce(status, &html)))
        } else {
            Ok(Some(Rendered::html(status, html.into_owned().into_bytes())))
        }
    }

    /// The error page for `status`: `@<status>`, then `@error`, then a
    /// built-in body. Never fails.
    pub fn render_error(&self, status: u16, msg: &str) -> Rendered {
        let mut vars = Vars::default();
        vars.insert("error".to_owned(), status.to_string());
        vars.insert("msg".to_owned(), msg.to_owned());

        let root = UriPath::root();
        for name in [format!("{WIDGET_MARKER}{status}"), format!("{WIDGET_MARKER}error")] {
            match self.render_dynamic(&root, &name, &vars, status) {
                Ok(Some(page)) => return page,
                Ok(None) => {}
                Err(e) => log!("error"; "{e}"),
            }
        }

        let body = format!("<h1>Error {status}</h1><h2>{}</h2>", html_escape(msg));
        Rendered::html(status, body.into_bytes())
    }

    /// Replace `{nonce}` with a fresh token and attach the matching header.
    fn bind_nonce(&self, status: u16, html: &str) -> Rendered {
        let nonce = NONCES.issue(DEFAULT_TOKEN_LEN);
        let body = html.replace(&format!("{{{NONCE}}}"), &nonce);
        let policy = self.compiler.policy();

        let mut page = Rendered::html(status, body.into_bytes());
        if !policy.is_empty() {
            page.csp = Some(policy.header_with_nonce(&nonce));
        }
        page
    }
}

/// `@` pages and `#` nonce templates are artifacts, not URLs.
fn is_hidden(uri: &UriPath) -> bool {
    uri.last().is_some_and(|name| name.starts_with(WIDGET_MARKER))
        || uri.segments().iter().any(|s| s.starts_with(COMPANION_MARKER))
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, RenderError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RenderError::Io(path.to_path_buf(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::SiteConfig, plugin::PluginRegistry};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn site(dir: &TempDir, compress: bool, files: &[(&str, &str)]) -> Compiler {
        let mut config = SiteConfig::with_root(dir.path());
        config.site.title = "MySite".into();
        config.build.minify = false;
        config.build.compress = compress;
        for (rel, content) in files {
            let path = config.build.pages.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        fs::create_dir_all(&config.build.dist).unwrap();

        let compiler = Compiler::new(Arc::new(config), &PluginRegistry::default());
        compiler.load_policy();
        compiler.compile_all();
        compiler
    }

    fn text(page: &Rendered) -> String {
        String::from_utf8(page.body.clone()).unwrap()
    }

    #[test]
    fn test_compressed_negotiation() {
        let dir = TempDir::new().unwrap();
        let compiler = site(&dir, true, &[("body.html", "<p>home</p>")]);
        let renderer = Renderer::new(&compiler);

        let gz = renderer.render("/", true).unwrap().unwrap();
        assert!(gz.gzip);
        assert!(String::from_utf8(gzip::decompress(&gz.body).unwrap()).unwrap().contains("<p>home</p>"));

        let plain = renderer.render("/", false).unwrap().unwrap();
        assert!(!plain.gzip);
        assert!(text(&plain).contains("<p>home</p>"));
        assert_eq!(plain.csp, None);
    }

    #[test]
    fn test_plain_variant() {
        let dir = TempDir::new().unwrap();
        let compiler = site(&dir, false, &[("a/b/body.html", "<p>b</p>")]);
        let page = Renderer::new(&compiler).render("/a/b/", true).unwrap().unwrap();
        assert!(!page.gzip);
        assert!(text(&page).contains("<p>b</p>"));
    }

    #[test]
    fn test_nonce_bound_per_request() {
        let dir = TempDir::new().unwrap();
        let compiler = site(
            &dir,
            true,
            &[
                ("csp.toml", "default-src = \"'self'\"\nscript-src = \"'self' 'nonce'\"\n"),
                ("body.html", "---\ncsp: yes\n---\n<script>go()</script>"),
            ],
        );
        let renderer = Renderer::new(&compiler);

        let first = renderer.render("/", true).unwrap().unwrap();
        let body = text(&first);
        assert!(!first.gzip);
        assert!(!body.contains("{nonce}"));

        let header = first.csp.clone().unwrap();
        let nonce = header
            .split("'nonce-")
            .nth(1)
            .and_then(|rest| rest.split('\'').next())
            .unwrap();
        assert!(body.contains(&format!("<script nonce=\"{nonce}\">go()</script>")), "{body}");
        assert!(header.starts_with("default-src 'self'; script-src 'self' 'nonce-"));

        let second = renderer.render("/", true).unwrap().unwrap();
        assert_ne!(first.csp, second.csp);
    }

    #[test]
    fn test_missing_and_hidden_urls() {
        let dir = TempDir::new().unwrap();
        let compiler = site(&dir, true, &[("@error.html", "<p>{msg}</p>")]);
        let renderer = Renderer::new(&compiler);

        assert_eq!(renderer.render("/nope", true).unwrap(), None);
        assert_eq!(renderer.render("/@error", true).unwrap(), None);
        assert_eq!(renderer.render("/../etc/passwd", true).unwrap(), None);
    }

    #[test]
    fn test_nonce_template_not_served_directly() {
        let dir = TempDir::new().unwrap();
        let compiler = site(
            &dir,
            true,
            &[
                ("csp.toml", "script-src = \"'self' 'nonce'\"\n"),
                ("body.html", "---\ncsp: yes\n---\n<script>go()</script>"),
                ("docs/body.html", "---\ncsp: yes\n---\n<p>docs</p>"),
            ],
        );
        let dist = &compiler.config().build.dist;
        assert!(dist.join("#index.html").is_file());
        assert!(dist.join("#docs.html").is_file());

        let renderer = Renderer::new(&compiler);
        assert_eq!(renderer.render("/#index", true).unwrap(), None);
        assert_eq!(renderer.render("/#docs", true).unwrap(), None);
        assert_eq!(renderer.render("/#docs/x", true).unwrap(), None);
        assert!(renderer.render("/docs", true).unwrap().unwrap().csp.is_some());
    }

    #[test]
    fn test_corrupt_artifact_is_an_error() {
        let dir = TempDir::new().unwrap();
        let compiler = site(&dir, true, &[]);
        fs::write(compiler.config().build.dist.join("index.html.gz"), "not gzip").unwrap();

        let renderer = Renderer::new(&compiler);
        assert!(matches!(renderer.render("/", false), Err(RenderError::Decompress(..))));
    }

    #[test]
    fn test_error_page_escapes_request_vars() {
        let dir = TempDir::new().unwrap();
        let compiler = site(
            &dir,
            true,
            &[("@error.html", "<h1>{error}</h1><p>{msg}</p><pre>{#msg}</pre><i>{title}</i>")],
        );

        let page = Renderer::new(&compiler).render_error(500, "<b>boom</b>");
        let body = text(&page);
        assert_eq!(page.status, 500);
        assert!(body.contains("<h1>500</h1>"), "{body}");
        assert!(body.contains("<p>&lt;b&gt;boom&lt;/b&gt;</p>"), "{body}");
        assert!(body.contains("<pre><b>boom</b></pre>"), "{body}");
        assert!(body.contains("<i>MySite</i>"), "{body}");
    }

    #[test]
    fn test_status_page_preferred() {
        let dir = TempDir::new().unwrap();
        let compiler = site(
            &dir,
            true,
            &[("@error.html", "<p>generic</p>"), ("@404.md", "Not here: {msg}\n")],
        );

        let page = Renderer::new(&compiler).render_error(404, "gone");
        assert_eq!(page.status, 404);
        assert!(text(&page).contains("<p>Not here: gone</p>"));
    }

    #[test]
    fn test_builtin_error_body() {
        let dir = TempDir::new().unwrap();
        let compiler = site(&dir, true, &[]);

        let page = Renderer::new(&compiler).render_error(404, "a<b");
        assert_eq!(text(&page), "<h1>Error 404</h1><h2>a&lt;b</h2>");
        assert_eq!(page.content_type, HTML);
    }

    #[test]
    fn test_dynamic_page_nonce() {
        let dir = TempDir::new().unwrap();
        let compiler = site(
            &dir,
            true,
            &[
                ("csp.toml", "script-src = \"'nonce'\"\n"),
                ("forms/@form.html", "---\ncsp: yes\n---\n<script>f()</script>{who}"),
            ],
        );
        let mut vars = Vars::default();
        vars.insert("who".into(), "me".into());

        let page = Renderer::new(&compiler)
            .render_dynamic(&UriPath::parse("forms").unwrap(), "@form", &vars, 200)
            .unwrap()
            .unwrap();
        let body = text(&page);
        assert!(page.csp.is_some());
        assert!(!body.contains("{nonce}"));
        assert!(body.contains("me"));
    }
}
