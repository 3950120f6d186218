//! HTTP server for compiled sites.
//!
//! Built on `tiny_http`:
//!
//! - Static files from `theme/`, `assets/` and the optional public directory
//! - Plugin route hooks
//! - Compiled pages through the request-time renderer
//! - Error pages for anything else
//! - Graceful shutdown on Ctrl+C
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐
//! │   Main Thread   │     │  Watcher Thread  │
//! │  (HTTP Server)  │     │  (File Monitor)  │
//! └────────┬────────┘     └────────┬─────────┘
//!          │                       │
//!          ▼                       ▼
//!    Render requests        Detect changes
//!    Serve files            Recompile dirs
//!          │                       │
//!          └───────────┬───────────┘
//!                      ▼
//!                    dist/
//! ```

use crate::{
    compiler::Compiler,
    log,
    plugin::PluginRegistry,
    render::{Rendered, Renderer},
    utils::{gzip, path::UriPath},
    watch::watch_for_changes_blocking,
};
use anyhow::{Context, Result};
use std::{
    fs, io,
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    sync::Arc,
};
use tiny_http::{Header, Request, Response, Server};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

// ============================================================================
// Server Entry Point
// ============================================================================

/// Start the server, and the live reload coordinator if enabled.
///
/// Blocks until Ctrl+C is received.
pub fn serve_site(compiler: Arc<Compiler>, plugins: Arc<PluginRegistry>) -> Result<()> {
    let c = compiler.config();
    let interface: IpAddr = c
        .serve
        .interface
        .parse()
        .with_context(|| format!("Invalid interface `{}`", c.serve.interface))?;

    let (server, addr) = try_bind_port(interface, c.serve.port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    // Set up Ctrl+C handler for graceful shutdown
    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{}", addr);

    if c.serve.watch {
        let compiler = Arc::clone(&compiler);
        std::thread::spawn(move || {
            if let Err(err) = watch_for_changes_blocking(&compiler) {
                log!("watch"; "{err}");
            }
        });
    }

    let site = Site {
        compiler: &compiler,
        plugins: &plugins,
    };
    for request in server.incoming_requests() {
        if let Err(e) = site.handle(request) {
            log!("serve"; "request error: {e}");
        }
    }

    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(Server, SocketAddr)> {
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(_) if offset + 1 < max_retries => continue,
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Failed to bind after {} attempts (ports {}-{}): {}",
                    max_retries,
                    base_port,
                    port,
                    e
                ));
            }
        }
    }
    anyhow::bail!("No port to bind: retry count is zero")
}

// ============================================================================
// Request Handling
// ============================================================================

struct Site<'a> {
    compiler: &'a Compiler,
    plugins: &'a PluginRegistry,
}

impl Site<'_> {
    fn handle(&self, request: Request) -> Result<()> {
        let accept_gzip = request
            .headers()
            .iter()
            .find(|h| h.field.equiv("Accept-Encoding"))
            .is_some_and(|h| gzip::accepts_gzip(h.value.as_str()));

        let page = self.respond(request.url(), accept_gzip);
        request.respond(into_response(page)?)?;
        Ok(())
    }

    /// Resolution order:
    /// 1. Static mounts (`/theme`, `/assets`, public)
    /// 2. Plugin routes
    /// 3. Compiled pages
    /// 4. 404 error page
    fn respond(&self, url: &str, accept_gzip: bool) -> Rendered {
        // Decode URL-encoded characters (e.g., %20 → space)
        let url_path = urlencoding::decode(url)
            .map(std::borrow::Cow::into_owned)
            .unwrap_or_default();

        // Strip query string (e.g., ?t=123456) before resolving path
        let path = url_path.split('?').next().unwrap_or(&url_path);
        let renderer = Renderer::new(self.compiler);

        let result = match self.static_file(path, accept_gzip) {
            Some(result) => result.map_err(anyhow::Error::from),
            None => match self.plugins.route(path) {
                Some(page) => Ok(Some(page)),
                None => renderer.render(path, accept_gzip).map_err(anyhow::Error::from),
            },
        };

        match result {
            Ok(Some(page)) => page,
            Ok(None) => renderer.render_error(404, "Page not found"),
            Err(e) => {
                log!("serve"; "{path}: {e}");
                renderer.render_error(500, "Internal server error")
            }
        }
    }

    fn mounts(&self) -> Vec<(&str, &Path)> {
        let config = self.compiler.config();
        let mut mounts = vec![
            ("/theme", config.build.theme.as_path()),
            ("/assets", config.build.assets.as_path()),
        ];
        if let Some(uri) = &config.serve.public_uri {
            mounts.push((uri.trim_end_matches('/'), config.build.public.as_path()));
        }
        mounts
    }

    /// `None` when `path` is outside every mount. A traversal attempt or a
    /// missing file under a mount is `Ok(None)`.
    fn static_file(&self, path: &str, accept_gzip: bool) -> Option<io::Result<Option<Rendered>>> {
        let (dir, rest) = self.mounts().into_iter().find_map(|(mount, dir)| {
            let rest = path.strip_prefix(mount)?;
            (rest.is_empty() || rest.starts_with('/')).then_some((dir, rest))
        })?;

        let Some(rel) = UriPath::parse(rest).filter(|u| !u.is_root()) else {
            return Some(Ok(None));
        };
        let file = rel.to_path(dir);
        if !file.is_file() {
            return Some(Ok(None));
        }
        Some(self.read_static(file, accept_gzip))
    }

    fn read_static(&self, file: PathBuf, accept_gzip: bool) -> io::Result<Option<Rendered>> {
        let content = fs::read(&file)?;
        let content_type = guess_content_type(&file);

        let mut page = Rendered::html(200, content);
        page.content_type = content_type;
        if accept_gzip && self.compiler.config().build.compress && is_text(content_type) {
            // Compression failure sends the body as is
            if let Ok(packed) = gzip::compress(&page.body) {
                page.body = packed;
                page.gzip = true;
            }
        }
        Ok(Some(page))
    }
}

// ============================================================================
// Response Helpers
// ============================================================================

fn header(name: &str, value: &str) -> Result<Header> {
    Header::from_bytes(name, value).map_err(|()| anyhow::anyhow!("Invalid header {name}: {value}"))
}

fn into_response(page: Rendered) -> Result<Response<io::Cursor<Vec<u8>>>> {
    let mut response = Response::from_data(page.body)
        .with_status_code(page.status)
        .with_header(header("Content-Type", page.content_type)?);
    if page.gzip {
        response.add_header(header("Content-Encoding", "gzip")?);
        response.add_header(header("Vary", "Accept-Encoding")?);
    }
    if let Some(csp) = &page.csp {
        response.add_header(header("Content-Security-Policy", csp)?);
    }
    Ok(response)
}

// ============================================================================
// Content Type Detection
// ============================================================================

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        // Web content
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",
        Some("wasm") => "application/wasm",

        // Images
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("ico") => "image/x-icon",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",

        // Documents
        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",
        Some("md") => "text/markdown; charset=utf-8",

        // Default binary
        _ => "application/octet-stream",
    }
}

/// Types worth compressing on the fly.
fn is_text(content_type: &str) -> bool {
    content_type.starts_with("text/")
        || content_type.starts_with("image/svg")
        || content_type.starts_with("application/javascript")
        || content_type.starts_with("application/json")
        || content_type.starts_with("application/xml")
        || content_type == "application/wasm"
}
