//! Page templating: placeholders, front matter, Markdown and embeds.
//!
//! ```text
//! source ─► resolver (embeds, front matter, markdown) ─► vars (substitution)
//! ```

mod frontmatter;
mod lorem;
pub mod markdown;
mod resolver;
mod scanner;
mod vars;

pub use frontmatter::{PageConfig, extract, normalize_key};
pub use resolver::{COMPANION_MARKER, Resolver, WIDGET_MARKER};
pub use vars::{NONCE, Pass, Scope, html_escape};

use rustc_hash::FxHashMap;

/// Normalized variable name to value.
pub type Vars = FxHashMap<String, String>;
