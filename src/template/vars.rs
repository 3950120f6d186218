//! Variable substitution.
//!
//! `{name}` expands HTML-escaped, `{#name}` expands raw. The title family
//! resolves first, then page vars, global vars and the remaining
//! pseudo-variables below. What happens to a name nobody resolves depends on the [`Pass`].
//!
//! | Name                                    | Value                                   |
//! |-----------------------------------------|-----------------------------------------|
//! | `uri`                                   | URI path joined by `/`                  |
//! | `page` / `Page` / `PAGE`                | last segment                            |
//! | `parent` / `Parent` / `PARENT`          | second to last segment (else last)      |
//! | `root` / `Root` / `ROOT`                | first segment                           |
//! | `sitetitle` `title` `app` `desc` `icon` | page config, then `[site]`              |
//! | `rand N` / `urand N` / `randint N`      | random token / batch-unique / integer   |
//! | `lorem[text] [pswehu] [min][-max]`      | filler text                             |
//!
//! `{nonce}` is reserved for the request-time renderer and is never touched.

use super::{Vars, frontmatter::normalize_key, lorem};
use crate::config::SiteConfig;
use crate::utils::{
    path::UriPath,
    token::{DEFAULT_TOKEN_LEN, random_token, unique_token},
};
use rand::Rng;
use regex::Regex;
use rustc_hash::FxHashSet;
use std::sync::LazyLock;

/// Placeholder left for the request-time renderer.
pub const NONCE: &str = "nonce";

const DEFAULT_RANDINT: u64 = 10;
const DEFAULT_LOREM: (usize, usize) = (3, 5);
const MAX_RAND_LEN: usize = 256;
const MAX_LOREM: usize = 100;

static RAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(u?rand|randint)[ \t]*([0-9]*)$").unwrap());

static LOREM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:lorem|rand)(?:text)?[ \t]*([pswehu][a-z]*)?[ \t]*([0-9]*)([^0-9][0-9]+)?$").unwrap()
});

/// Which compile stage a substitution belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Regular page: everything resolves, unknown names become empty.
    Static,
    /// Dynamic page precompile: title and generator names, and anything
    /// unknown, are kept for the request-time pass.
    Dynamic,
    /// Request-time pass over a dynamic page: everything resolves, unknown
    /// names become empty. `{title}` has no page name to derive from.
    Request,
}

/// Everything a substitution pass can see.
pub struct Scope<'a> {
    pub pass: Pass,
    pub uri: &'a UriPath,
    pub page: &'a Vars,
    pub globals: &'a Vars,
    pub site: &'a SiteConfig,
}

enum Lookup {
    Value(String),
    Keep,
    Empty,
}

impl Scope<'_> {
    /// Expand every variable token in `input`.
    pub fn substitute(&self, input: &str) -> String {
        use super::scanner::{Scanner, Segment};

        let mut out = String::with_capacity(input.len());
        let mut batch = FxHashSet::default();

        for segment in Scanner::new(input) {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Embed(token) => out.push_str(token.source),
                Segment::Var(token) => match self.lookup(token.name, &mut batch) {
                    Lookup::Value(value) if token.raw => out.push_str(&value),
                    Lookup::Value(value) => html_escape_into(&mut out, &value),
                    Lookup::Keep => out.push_str(token.source),
                    Lookup::Empty => {}
                },
            }
        }

        out
    }

    fn lookup(&self, name: &str, batch: &mut FxHashSet<String>) -> Lookup {
        if name == NONCE {
            return Lookup::Keep;
        }

        // The title family reads page config itself and shadows globals.
        if self.pass != Pass::Dynamic {
            if let Some(value) = self.title_var(name) {
                return Lookup::Value(value);
            }
        }

        let key = normalize_key(name);
        if let Some(value) = self.page.get(&key).or_else(|| self.globals.get(&key)) {
            return Lookup::Value(value.clone());
        }

        if let Some(value) = self.uri_var(name) {
            return Lookup::Value(value);
        }

        if self.pass == Pass::Dynamic {
            return Lookup::Keep;
        }

        match generate(name, batch) {
            Some(value) => Lookup::Value(value),
            None => Lookup::Empty,
        }
    }

    /// `uri`, `page`, `parent` and `root` families.
    fn uri_var(&self, name: &str) -> Option<String> {
        if name == "uri" {
            return Some(self.uri.to_string());
        }

        let (base, case) = case_variant(name)?;
        let segments = self.uri.segments();
        let value = match (base, segments) {
            (_, []) => self.site.site.app_title.as_str(),
            ("page", [.., last]) => last.as_str(),
            ("parent", [.., parent, _]) => parent.as_str(),
            ("parent", [only]) => only.as_str(),
            ("root", [first, ..]) => first.as_str(),
            _ => return None,
        };
        Some(case.apply(value))
    }

    /// `sitetitle`, `title`, `app`, `desc` and `icon`.
    fn title_var(&self, name: &str) -> Option<String> {
        let site = &self.site.site;
        let page = |key: &str| self.page.get(key).map(String::as_str);

        let value = match name {
            "sitetitle" => site.title.clone(),
            "title" => match (page("title"), self.page_name()) {
                (Some(title), _) => title.to_string(),
                (None, Some(name)) => format!("{name} | {}", site.title),
                (None, None) => site.title.clone(),
            },
            "app" => page("app")
                .or_else(|| page("apptitle"))
                .unwrap_or(&site.app_title)
                .to_string(),
            "desc" => page("desc")
                .or_else(|| page("description"))
                .unwrap_or(&site.description)
                .to_string(),
            "icon" => page("icon").unwrap_or(&site.icon).to_string(),
            _ => return None,
        };
        Some(value)
    }

    fn page_name(&self) -> Option<String> {
        match self.pass {
            Pass::Request => None,
            Pass::Static | Pass::Dynamic => self.uri.last().map(cap_words),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Case {
    Lower,
    Capitalized,
    Upper,
}

impl Case {
    fn apply(self, value: &str) -> String {
        match self {
            Self::Lower => value.to_string(),
            Self::Capitalized => cap_words(value),
            Self::Upper => value.to_uppercase(),
        }
    }
}

fn case_variant(name: &str) -> Option<(&'static str, Case)> {
    Some(match name {
        "page" => ("page", Case::Lower),
        "Page" => ("page", Case::Capitalized),
        "PAGE" => ("page", Case::Upper),
        "parent" => ("parent", Case::Lower),
        "Parent" => ("parent", Case::Capitalized),
        "PARENT" => ("parent", Case::Upper),
        "root" => ("root", Case::Lower),
        "Root" => ("root", Case::Capitalized),
        "ROOT" => ("root", Case::Upper),
        _ => return None,
    })
}

/// Random and lorem generators.
fn generate(name: &str, batch: &mut FxHashSet<String>) -> Option<String> {
    if let Some(caps) = RAND.captures(name) {
        let size = caps[2].parse::<usize>().ok().filter(|&n| n > 0).map(|n| n.min(MAX_RAND_LEN));
        let value = match &caps[1] {
            "rand" => random_token(size.unwrap_or(DEFAULT_TOKEN_LEN)),
            "urand" => unique_token(size.unwrap_or(DEFAULT_TOKEN_LEN), batch),
            _ => {
                let bound = caps[2].parse::<u64>().ok().filter(|&n| n > 0).unwrap_or(DEFAULT_RANDINT);
                rand::thread_rng().gen_range(0..bound).to_string()
            }
        };
        return Some(value);
    }

    let caps = LOREM.captures(name)?;
    let kind = lorem::Kind::from_letter(caps.get(1).and_then(|m| m.as_str().chars().next()));
    let first = caps[2].parse::<usize>().ok().filter(|&n| n > 0).map(|n| n.min(MAX_LOREM));
    let second = caps
        .get(3)
        .and_then(|m| m.as_str()[1..].parse::<usize>().ok())
        .filter(|&n| n > 0)
        .map(|n| n.min(MAX_LOREM));

    let (mut min, mut max) = DEFAULT_LOREM;
    if let Some(n) = first {
        min = n;
        if caps.get(3).is_none() {
            max = n;
        }
    }
    if let Some(n) = second {
        max = n;
    }
    if min > max {
        std::mem::swap(&mut min, &mut max);
    }

    Some(lorem::generate(kind, min, max))
}

/// Uppercase the first letter of every word.
pub fn cap_words(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut at_start = true;
    for c in s.chars() {
        if at_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_start = !c.is_alphanumeric();
    }
    out
}

/// Escape `& < > "` for use in HTML text and attribute values.
pub fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    html_escape_into(&mut out, s);
    out
}

fn html_escape_into(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}
