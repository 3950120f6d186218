//! Content-Security-Policy loaded from `pages/csp.toml`.
//!
//! ```toml
//! default-src = "'self'"
//! script-src = "'self' 'nonce'"
//! style-src = "'self' 'nonce'"
//! object-src = "'none'"
//! ```
//!
//! A `'nonce'` (or `'nonce-…'`) source in `script-src` or `style-src` makes
//! the compiler tag the matching inline elements with `nonce="{nonce}"`;
//! the renderer replaces both with a fresh value on every request.

use crate::{config::ConfigError, template::NONCE};
use regex::{Captures, Regex};
use serde::Deserialize;
use std::{fs, io, path::Path, sync::LazyLock};

static NONCE_SOURCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'nonce(?:-[^']*)?'").unwrap());

static SCRIPT_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<script([ \t\r\n][^>]*)?>").unwrap());

static STYLE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<style([ \t\r\n][^>]*)?>").unwrap());

/// Directive values, one field per supported directive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CspPolicy {
    pub default_src: String,
    pub script_src: String,
    pub style_src: String,
    pub img_src: String,
    pub object_src: String,
    pub font_src: String,
    pub connect_src: String,
    pub base_uri: String,
    pub form_action: String,
    pub frame_ancestors: String,
    #[serde(alias = "trusted-types")]
    pub require_trusted_types_for: String,
    pub report_uri: String,

    #[serde(skip)]
    header: String,
}

impl CspPolicy {
    pub fn from_str(content: &str) -> Result<Self, toml::de::Error> {
        let mut policy: Self = toml::from_str(content)?;
        policy.header = policy.build_header();
        Ok(policy)
    }

    /// Read the policy source. A missing file is the empty policy.
    pub fn try_load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Io(path.to_path_buf(), e)),
        };
        Self::from_str(&content).map_err(|e| ConfigError::Policy(path.to_path_buf(), e))
    }

    /// Like [`Self::try_load`], but an unreadable or malformed file is
    /// logged and yields the empty policy, which disables CSP.
    pub fn load(path: &Path) -> Self {
        Self::try_load(path).unwrap_or_else(|e| {
            crate::log!("csp"; "{e}");
            Self::default()
        })
    }

    fn directives(&self) -> [(&'static str, &str); 12] {
        [
            ("default-src", self.default_src.as_str()),
            ("script-src", self.script_src.as_str()),
            ("style-src", self.style_src.as_str()),
            ("img-src", self.img_src.as_str()),
            ("object-src", self.object_src.as_str()),
            ("font-src", self.font_src.as_str()),
            ("connect-src", self.connect_src.as_str()),
            ("base-uri", self.base_uri.as_str()),
            ("form-action", self.form_action.as_str()),
            ("frame-ancestors", self.frame_ancestors.as_str()),
            ("require-trusted-types-for", self.require_trusted_types_for.as_str()),
            ("report-uri", self.report_uri.as_str()),
        ]
    }

    /// `name value;` for every non-empty directive, in fixed order.
    fn build_header(&self) -> String {
        self.directives()
            .iter()
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(name, value)| format!("{name} {};", value.trim()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Header value as configured, nonce sources unbound.
    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_empty()
    }

    /// Whether CSP applies to a page, given the global default and the
    /// page's own `csp` switch.
    pub fn applies(&self, global: bool, page: Option<bool>) -> bool {
        !self.is_empty() && page.unwrap_or(global)
    }

    pub fn script_nonce(&self) -> bool {
        NONCE_SOURCE.is_match(&self.script_src)
    }

    pub fn style_nonce(&self) -> bool {
        NONCE_SOURCE.is_match(&self.style_src)
    }

    /// Add `nonce="{nonce}"` to inline `<script>`/`<style>` opening tags for
    /// the directives that carry a nonce source.
    pub fn tag_nonces(&self, html: &str) -> String {
        let mut html = html.to_string();
        if self.script_nonce() {
            html = add_nonce_attr(&SCRIPT_TAG, "script", &html);
        }
        if self.style_nonce() {
            html = add_nonce_attr(&STYLE_TAG, "style", &html);
        }
        html
    }

    /// Header value for one response, every nonce source bound to `nonce`.
    pub fn header_with_nonce(&self, nonce: &str) -> String {
        NONCE_SOURCE
            .replace_all(&self.header, format!("'nonce-{nonce}'").as_str())
            .into_owned()
    }
}

fn add_nonce_attr(tag: &Regex, name: &str, html: &str) -> String {
    tag.replace_all(html, |caps: &Captures| {
        let attrs = caps.get(1).map_or("", |m| m.as_str());
        if attrs.contains("nonce=") {
            caps[0].to_string()
        } else {
            let attrs = attrs.strip_suffix('/').unwrap_or(attrs);
            format!(r#"<{name}{attrs} nonce="{{{NONCE}}}">"#)
        }
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLICY: &str = r#"
        default-src = "'self'"
        script-src = "'self' 'nonce'"
        style-src = "'self'"
        object-src = "'none'"
        trusted-types = "'script'"
        report-uri = "/csp-report"
    "#;

    #[test]
    fn test_header_order() {
        let policy = CspPolicy::from_str(POLICY).unwrap();
        assert_eq!(
            policy.header(),
            "default-src 'self'; script-src 'self' 'nonce'; style-src 'self'; \
             object-src 'none'; require-trusted-types-for 'script'; report-uri /csp-report;"
        );
    }

    #[test]
    fn test_empty_policy() {
        let policy = CspPolicy::from_str("").unwrap();
        assert!(policy.is_empty());
        assert!(!policy.applies(true, Some(true)));
    }

    #[test]
    fn test_load_missing_or_malformed() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CspPolicy::load(&dir.path().join("csp.toml")).is_empty());

        let path = dir.path().join("bad.toml");
        fs::write(&path, "script-src = ").unwrap();
        assert!(CspPolicy::load(&path).is_empty());
        assert!(matches!(CspPolicy::try_load(&path), Err(ConfigError::Policy(p, _)) if p == path));
        assert!(CspPolicy::try_load(&dir.path().join("csp.toml")).unwrap().is_empty());
    }

    #[test]
    fn test_applies() {
        let policy = CspPolicy::from_str(POLICY).unwrap();
        assert!(policy.applies(true, None));
        assert!(!policy.applies(false, None));
        assert!(policy.applies(false, Some(true)));
        assert!(!policy.applies(true, Some(false)));
    }

    #[test]
    fn test_nonce_detection() {
        let policy = CspPolicy::from_str(POLICY).unwrap();
        assert!(policy.script_nonce());
        assert!(!policy.style_nonce());

        let policy = CspPolicy::from_str("style-src = \"'nonce-abc'\"").unwrap();
        assert!(policy.style_nonce());
    }

    #[test]
    fn test_tag_nonces() {
        let policy = CspPolicy::from_str(POLICY).unwrap();
        let html = r#"<script>a()</script><script src="/x.js"></script><style>b{}</style><scripts>"#;
        assert_eq!(
            policy.tag_nonces(html),
            r#"<script nonce="{nonce}">a()</script><script src="/x.js" nonce="{nonce}"></script><style>b{}</style><scripts>"#
        );
    }

    #[test]
    fn test_tag_nonces_keeps_existing() {
        let policy = CspPolicy::from_str(POLICY).unwrap();
        let html = r#"<script nonce="{nonce}">a()</script>"#;
        assert_eq!(policy.tag_nonces(html), html);
    }

    #[test]
    fn test_header_with_nonce() {
        let policy = CspPolicy::from_str(POLICY).unwrap();
        let header = policy.header_with_nonce("abc123");
        assert!(header.contains("script-src 'self' 'nonce-abc123';"));
        assert!(!header.contains("'nonce'"));
    }
}
