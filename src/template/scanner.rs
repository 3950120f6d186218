//! Placeholder tokenizer.
//!
//! Splits a page buffer into literal text and placeholder tokens:
//!
//! | Form       | Meaning                       |
//! |------------|-------------------------------|
//! | `{name}`   | variable, HTML-escaped        |
//! | `{#name}`  | variable, raw                 |
//! | `{@name}`  | embed another page or widget  |
//!
//! Anything that does not fit the token grammar (CSS blocks, JS object
//! literals, stray braces) is passed through as text untouched.

/// Longest accepted token body, braces excluded.
const MAX_TOKEN_LEN: usize = 64;

/// Front matter delimiter line.
const DELIMITER: &str = "---";

/// A piece of a scanned buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Literal text.
    Text(&'a str),
    /// `{name}` or `{#name}`.
    Var(Token<'a>),
    /// `{@name}`.
    Embed(Token<'a>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// Token body without braces and marker.
    pub name: &'a str,
    /// `{#name}` form.
    pub raw: bool,
    /// The complete token text, braces included.
    pub source: &'a str,
}

/// Iterator over the segments of a buffer.
pub struct Scanner<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub const fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = &self.src[self.pos..];
        if rest.is_empty() {
            return None;
        }

        let mut search = 0;
        while let Some(offset) = rest[search..].find('{') {
            let start = search + offset;
            if let Some(segment) = parse_token(&rest[start..]) {
                if start > 0 {
                    self.pos += start;
                    return Some(Segment::Text(&rest[..start]));
                }
                self.pos += segment_len(&segment);
                return Some(segment);
            }
            search = start + 1;
        }

        self.pos = self.src.len();
        Some(Segment::Text(rest))
    }
}

fn segment_len(segment: &Segment<'_>) -> usize {
    match segment {
        Segment::Text(text) => text.len(),
        Segment::Var(token) | Segment::Embed(token) => token.source.len(),
    }
}

/// Parse a token at the start of `s`, which begins with `{`.
fn parse_token(s: &str) -> Option<Segment<'_>> {
    let bytes = s.as_bytes();
    let (marker, body_start) = match bytes.get(1)? {
        b'#' => (Some(b'#'), 2),
        b'@' => (Some(b'@'), 2),
        _ => (None, 1),
    };
    let embed = marker == Some(b'@');

    let mut end = body_start;
    loop {
        let &b = bytes.get(end)?;
        if b == b'}' {
            break;
        }
        let valid = if embed { is_name_byte(b) } else { is_var_byte(b) };
        if !valid || end - body_start >= MAX_TOKEN_LEN {
            return None;
        }
        end += 1;
    }

    let name = &s[body_start..end];
    // Names start with a word character so `{ x }` and `{-}` stay literal.
    if !name.bytes().next().is_some_and(is_word_byte) || name.ends_with(' ') {
        return None;
    }

    let token = Token {
        name,
        raw: marker == Some(b'#'),
        source: &s[..=end],
    };
    Some(if embed {
        Segment::Embed(token)
    } else {
        Segment::Var(token)
    })
}

const fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

const fn is_name_byte(b: u8) -> bool {
    is_word_byte(b) || b == b'-' || b == b'.'
}

/// Variable bodies may carry generator arguments, e.g. `{lorem p 2-4}`.
const fn is_var_byte(b: u8) -> bool {
    is_name_byte(b) || b == b' ' || b == b','
}

/// Split a leading `---` delimited block from `src`.
///
/// Returns `(block, body)` when `src` starts with a delimiter line and a
/// closing delimiter line follows; otherwise `None`.
pub fn split_front_matter(src: &str) -> Option<(&str, &str)> {
    let after_open = strip_delimiter_line(src)?;

    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == DELIMITER {
            let block = &after_open[..offset];
            let body = &after_open[offset + line.len()..];
            return Some((block, body));
        }
        offset += line.len();
    }
    None
}

fn strip_delimiter_line(src: &str) -> Option<&str> {
    let rest = src.strip_prefix(DELIMITER)?;
    rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))
}
