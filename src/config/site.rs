//! `[site]` section configuration.
//!
//! Site identity used by the title-family placeholders.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};

/// `[site]` section in config.toml - site identity.
///
/// # Example
/// ```toml
/// [site]
/// title = "MySite"
/// app_title = "My App"
/// description = "Pages about things"
/// icon = "/theme/icon.png"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
pub struct SiteInfo {
    /// Site title, `{sitetitle}` and the suffix of `{title}`.
    #[serde(default = "defaults::site::title")]
    #[educe(Default = defaults::site::title())]
    pub title: String,

    /// Application name, `{app}` and the root `{page}`.
    #[serde(default = "defaults::site::app_title")]
    #[educe(Default = defaults::site::app_title())]
    pub app_title: String,

    /// Default `{desc}`.
    #[serde(default = "defaults::site::description")]
    #[educe(Default = defaults::site::description())]
    pub description: String,

    /// Default `{icon}`.
    #[serde(default)]
    pub icon: String,
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;

    #[test]
    fn test_site_config_full() {
        let config = r#"
            [site]
            title = "MySite"
            app_title = "My App"
            description = "Pages about things"
            icon = "/theme/icon.png"
        "#;
        let config: SiteConfig = toml::from_str(config).unwrap();

        assert_eq!(config.site.title, "MySite");
        assert_eq!(config.site.app_title, "My App");
        assert_eq!(config.site.description, "Pages about things");
        assert_eq!(config.site.icon, "/theme/icon.png");
    }

    #[test]
    fn test_site_config_defaults() {
        let config: SiteConfig = toml::from_str("").unwrap();

        assert_eq!(config.site.title, "Web Server");
        assert_eq!(config.site.app_title, "WebServer");
        assert_eq!(config.site.description, "A Web Server.");
        assert_eq!(config.site.icon, "");
    }

    #[test]
    fn test_site_config_partial_override() {
        let config = r#"
            [site]
            title = "Docs"
        "#;
        let config: SiteConfig = toml::from_str(config).unwrap();

        assert_eq!(config.site.title, "Docs");
        assert_eq!(config.site.app_title, "WebServer");
    }
}
