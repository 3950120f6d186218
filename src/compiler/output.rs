//! Writing compiled pages under `dist/`.
//!
//! Every page URI owns three possible artifact paths; exactly one exists
//! after a successful write:
//!
//! | Variant    | Root               | `a/b`               |
//! |------------|--------------------|---------------------|
//! | plain      | `dist/index.html`  | `dist/a/b.html`     |
//! | compressed | `index.html.gz`    | `dist/a/b.html.gz`  |
//! | nonce      | `dist/#index.html` | `dist/a/#b.html`    |

use crate::{
    template::COMPANION_MARKER,
    utils::{gzip, path::UriPath, token::random_token},
};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Output name of the root page.
pub const INDEX: &str = "index";

/// A top-level `index` shares its artifacts with the root page.
pub fn shadows_root(uri: &UriPath) -> bool {
    uri.len() == 1 && uri.last() == Some(INDEX)
}

/// How a page is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Uncompressed, `{nonce}` bound per request.
    Nonce,
    /// Gzip-compressed.
    Compressed,
    /// Uncompressed.
    Plain,
}

/// The artifact paths of one page URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub plain: PathBuf,
    pub compressed: PathBuf,
    pub nonce: PathBuf,
}

impl Artifacts {
    pub fn for_uri(dist: &Path, uri: &UriPath) -> Self {
        let (dir, name) = match uri.parent() {
            Some(parent) => (parent.to_path(dist), uri.last().unwrap_or(INDEX)),
            None => (dist.to_path_buf(), INDEX),
        };
        Self {
            plain: dir.join(format!("{name}.html")),
            compressed: dir.join(format!("{name}.html.gz")),
            nonce: dir.join(format!("{COMPANION_MARKER}{name}.html")),
        }
    }

    fn all(&self) -> [&Path; 3] {
        [&self.plain, &self.compressed, &self.nonce]
    }

    /// Write `html` in `mode`, removing the other variants first.
    ///
    /// Returns the mode actually used: a failed compression falls back to
    /// [`Mode::Plain`].
    pub fn write(&self, html: &[u8], mode: Mode) -> io::Result<Mode> {
        let (target, bytes, mode) = match mode {
            Mode::Nonce => (&self.nonce, html.to_vec(), Mode::Nonce),
            Mode::Plain => (&self.plain, html.to_vec(), Mode::Plain),
            Mode::Compressed => match gzip::compress(html) {
                Ok(bytes) => (&self.compressed, bytes, Mode::Compressed),
                Err(_) => (&self.plain, html.to_vec(), Mode::Plain),
            },
        };

        for path in self.all() {
            if path != target {
                remove_if_exists(path)?;
            }
        }
        write_atomic(target, &bytes)?;
        Ok(mode)
    }

    /// Remove every variant.
    pub fn remove(&self) -> io::Result<()> {
        for path in self.all() {
            remove_if_exists(path)?;
        }
        Ok(())
    }
}

/// Write through a sibling temp file and rename, creating parent dirs.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    fs::create_dir_all(dir)?;

    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("page");
    let temp = dir.join(format!(".{name}.{}.tmp", random_token(8)));
    fs::write(&temp, bytes)?;
    fs::rename(&temp, path).inspect_err(|_| {
        let _ = fs::remove_file(&temp);
    })
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Remove a directory tree under `dist/`, ignoring a missing one.
pub fn remove_dir_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
