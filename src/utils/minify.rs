//! Minification for pages and the stylesheets/scripts written to `assets/`.
//!
//! Provides a unified `minify` function over HTML, CSS and JS, with
//! automatic enable/disable based on `SiteConfig`. A failed minification
//! is never an error: the input bytes are returned unchanged.

use crate::config::SiteConfig;
use std::borrow::Cow;

// ============================================================================
// Types
// ============================================================================

/// Content type for minification.
pub enum MinifyType<'a> {
    /// Full page or page fragment
    Html(&'a [u8]),
    /// Stylesheet
    Css(&'a [u8]),
    /// Script
    Js(&'a [u8]),
}

impl<'a> MinifyType<'a> {
    /// Pick a type from an asset file name; `None` for anything not minifiable.
    pub fn from_name(name: &str, content: &'a [u8]) -> Option<Self> {
        let ext = name.rsplit_once('.').map(|(_, ext)| ext)?;
        match ext {
            "html" | "htm" => Some(Self::Html(content)),
            "css" => Some(Self::Css(content)),
            "js" | "mjs" => Some(Self::Js(content)),
            _ => None,
        }
    }

    const fn content(&self) -> &'a [u8] {
        match self {
            Self::Html(c) | Self::Css(c) | Self::Js(c) => c,
        }
    }
}

// ============================================================================
// Unified Minify Function
// ============================================================================

/// Minify content based on type and config.
///
/// Returns `Cow::Borrowed` if minify is disabled or failed, `Cow::Owned` if minified.
pub fn minify<'a>(content: MinifyType<'a>, config: &SiteConfig) -> Cow<'a, [u8]> {
    let raw = content.content();
    if !config.build.minify {
        return Cow::Borrowed(raw);
    }

    let minified = match content {
        MinifyType::Html(html) => Some(minify_html_inner(html)),
        MinifyType::Css(css) => minify_wrapped(css, "style"),
        MinifyType::Js(js) => minify_wrapped(js, "script"),
    };

    minified.map_or(Cow::Borrowed(raw), Cow::Owned)
}

// ============================================================================
// Internal Implementation
// ============================================================================

fn html_cfg() -> minify_html::Cfg {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = true;
    cfg.remove_bangs = false;
    cfg.remove_processing_instructions = true;
    cfg
}

/// Minify HTML content using `minify_html` crate.
fn minify_html_inner(html: &[u8]) -> Vec<u8> {
    minify_html::minify(html, &html_cfg())
}

/// Minify a stylesheet or script by running it through the HTML minifier
/// inside its element, then unwrapping the element again.
fn minify_wrapped(content: &[u8], tag: &str) -> Option<Vec<u8>> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");

    let mut wrapped = Vec::with_capacity(content.len() + open.len() + close.len());
    wrapped.extend_from_slice(open.as_bytes());
    wrapped.extend_from_slice(content);
    wrapped.extend_from_slice(close.as_bytes());

    let minified = minify_html::minify(&wrapped, &html_cfg());
    let inner = minified
        .strip_prefix(open.as_bytes())?
        .strip_suffix(close.as_bytes())?;
    Some(inner.to_vec())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;

    fn config_with_minify(enabled: bool) -> SiteConfig {
        let mut config = SiteConfig::default();
        config.build.minify = enabled;
        config
    }

    #[test]
    fn test_minify_html_basic() {
        let html = b"<html>\n  <head>\n  </head>\n  <body>\n    <p>Hello</p>\n  </body>\n</html>";
        let config = config_with_minify(true);
        let result = minify(MinifyType::Html(html), &config);
        let result_str = String::from_utf8_lossy(&result);

        assert!(!result_str.contains("\n  "));
        assert!(result_str.contains("<p>Hello</p>"));
    }

    #[test]
    fn test_minify_html_keeps_placeholders() {
        let html = b"<p>  {title}  </p>\n<div>{#body}</div>";
        let result = minify(MinifyType::Html(html), &config_with_minify(true));
        let result_str = String::from_utf8_lossy(&result);

        assert!(result_str.contains("{title}"));
        assert!(result_str.contains("{#body}"));
    }

    #[test]
    fn test_minify_html_disabled() {
        let html = b"<html>\n  <body>\n  </body>\n</html>";
        let result = minify(MinifyType::Html(html), &config_with_minify(false));

        assert!(matches!(result, Cow::Borrowed(_)));
        assert_eq!(&*result, html);
    }

    #[test]
    fn test_minify_css_strips_whitespace() {
        let css = b"body {\n    color: red;\n}\n";
        let result = minify(MinifyType::Css(css), &config_with_minify(true));
        let result_str = String::from_utf8_lossy(&result);

        assert!(result.len() < css.len());
        assert!(result_str.contains("color:red"));
        assert!(!result_str.contains("<style>"));
    }

    #[test]
    fn test_minify_js_unwrapped() {
        let js = b"function add(a, b) {\n    return a + b;\n}\n";
        let result = minify(MinifyType::Js(js), &config_with_minify(true));
        let result_str = String::from_utf8_lossy(&result);

        assert!(result.len() < js.len());
        assert!(!result_str.contains("<script>"));
    }

    #[test]
    fn test_from_name() {
        assert!(matches!(MinifyType::from_name("core.css", b""), Some(MinifyType::Css(_))));
        assert!(matches!(MinifyType::from_name("core.js", b""), Some(MinifyType::Js(_))));
        assert!(matches!(MinifyType::from_name("a.html", b""), Some(MinifyType::Html(_))));
        assert!(MinifyType::from_name("logo.png", b"").is_none());
        assert!(MinifyType::from_name("README", b"").is_none());
    }
}
