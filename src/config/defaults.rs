//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#true() -> bool {
    true
}

pub fn r#false() -> bool {
    false
}

// ============================================================================
// [site] Section Defaults
// ============================================================================

pub mod site {
    pub fn title() -> String {
        "Web Server".into()
    }

    pub fn app_title() -> String {
        "WebServer".into()
    }

    pub fn description() -> String {
        "A Web Server.".into()
    }
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn root() -> Option<PathBuf> {
        None
    }

    pub fn pages() -> PathBuf {
        "pages".into()
    }

    pub fn dist() -> PathBuf {
        "dist".into()
    }

    pub fn theme() -> PathBuf {
        "theme".into()
    }

    pub fn assets() -> PathBuf {
        "assets".into()
    }

    pub fn db() -> PathBuf {
        "db".into()
    }

    pub fn public() -> PathBuf {
        "public".into()
    }
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        8080
    }

    pub fn public_uri() -> Option<String> {
        None
    }
}
