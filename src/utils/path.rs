//! URI paths shared by the compiler, the watcher and the renderer.
//!
//! A [`UriPath`] is the ordered list of segments between the pages root and
//! a directory (or page). The root is the empty list. It is the single key
//! used both to walk the embed search chain and to map a request onto its
//! artifact under `dist/`.

use std::{
    fmt,
    path::{Component, Path, PathBuf},
};

/// Ordered path segments relative to the pages (or dist) root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UriPath(Vec<String>);

impl UriPath {
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse a `/`-separated URI. Empty and `.` segments are skipped,
    /// `..` or backslashes reject the whole path.
    pub fn parse(uri: &str) -> Option<Self> {
        let mut segments = Vec::new();
        for segment in uri.split('/') {
            match segment {
                "" | "." => {}
                ".." => return None,
                s if s.contains('\\') => return None,
                s => segments.push(s.to_owned()),
            }
        }
        Some(Self(segments))
    }

    /// Build from a path relative to a root directory.
    ///
    /// Only normal components are accepted, so `..` or absolute paths yield `None`.
    pub fn from_relative(path: &Path) -> Option<Self> {
        let mut segments = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(name) => segments.push(name.to_str()?.to_owned()),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(Self(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Last segment (the page or directory name).
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Enclosing path, `None` at the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.0.split_last()?;
        Some(Self(rest.to_vec()))
    }

    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.to_owned());
        Self(segments)
    }

    /// `self` then every ancestor up to and including the root.
    pub fn ancestors(&self) -> impl Iterator<Item = Self> + '_ {
        (0..=self.0.len()).rev().map(|n| Self(self.0[..n].to_vec()))
    }

    /// Whether `self` equals `other` or lies below it.
    pub fn starts_with(&self, other: &Self) -> bool {
        self.0.starts_with(&other.0)
    }

    /// Resolve against a filesystem root.
    pub fn to_path(&self, base: &Path) -> PathBuf {
        let mut path = base.to_path_buf();
        path.extend(&self.0);
        path
    }
}

impl fmt::Display for UriPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_empty_segments() {
        let uri = UriPath::parse("/docs//guide/").unwrap();
        assert_eq!(uri.segments(), ["docs", "guide"]);
        assert_eq!(uri.to_string(), "docs/guide");
    }

    #[test]
    fn test_parse_root() {
        assert!(UriPath::parse("/").unwrap().is_root());
        assert!(UriPath::parse("").unwrap().is_root());
    }

    #[test]
    fn test_parse_rejects_traversal() {
        assert!(UriPath::parse("/a/../etc").is_none());
        assert!(UriPath::parse("a\\b").is_none());
    }

    #[test]
    fn test_from_relative_rejects_parent_dir() {
        assert!(UriPath::from_relative(Path::new("../x")).is_none());
        assert_eq!(
            UriPath::from_relative(Path::new("a/b")).unwrap().segments(),
            ["a", "b"]
        );
    }

    #[test]
    fn test_ancestors_most_specific_first() {
        let uri = UriPath::parse("a/b").unwrap();
        let chain: Vec<String> = uri.ancestors().map(|u| u.to_string()).collect();
        assert_eq!(chain, ["a/b", "a", ""]);
    }

    #[test]
    fn test_parent_and_child() {
        let uri = UriPath::parse("a/b").unwrap();
        assert_eq!(uri.parent().unwrap().to_string(), "a");
        assert_eq!(uri.child("c").to_string(), "a/b/c");
        assert!(UriPath::root().parent().is_none());
    }

    #[test]
    fn test_starts_with() {
        let a = UriPath::parse("a").unwrap();
        let ab = UriPath::parse("a/b").unwrap();
        assert!(ab.starts_with(&a));
        assert!(ab.starts_with(&UriPath::root()));
        assert!(!a.starts_with(&ab));
    }
}
