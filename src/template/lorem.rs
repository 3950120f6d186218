//! Lorem ipsum filler text.

use rand::{Rng, seq::SliceRandom};

const WORDS: &[&str] = &[
    "a", "ac", "ad", "at", "et", "id", "in", "ut", "vel", "non", "sed", "nec", "est", "sit", "amet",
    "eget", "elit", "erat", "nisi", "nisl", "odio", "quam", "quis", "nunc", "urna", "ante", "arcu",
    "diam", "dolor", "ipsum", "lorem", "magna", "massa", "mauris", "metus", "morbi", "nulla",
    "purus", "risus", "sapien", "semper", "tellus", "tempor", "turpis", "varius", "vitae",
    "aliquam", "aliquet", "blandit", "commodo", "congue", "cursus", "dapibus", "egestas",
    "euismod", "feugiat", "lacinia", "laoreet", "lectus", "libero", "lobortis", "luctus",
    "maecenas", "molestie", "pharetra", "placerat", "porttitor", "pretium", "pulvinar",
    "rhoncus", "sagittis", "tincidunt", "tristique", "ultrices", "vehicula", "venenatis",
    "vestibulum", "vulputate", "adipiscing", "consectetur", "condimentum", "elementum",
    "fermentum", "hendrerit", "malesuada", "scelerisque", "suspendisse", "ullamcorper",
];

const TLDS: &[&str] = &["com", "net", "org", "io"];

/// Words per generated sentence inside a paragraph.
const SENTENCE_WORDS: (usize, usize) = (4, 12);

/// Filler kinds selected by the first letter after `lorem`/`rand`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Paragraph,
    Sentence,
    Word,
    Email,
    Host,
    Url,
}

impl Kind {
    pub fn from_letter(letter: Option<char>) -> Self {
        match letter {
            Some('s') => Self::Sentence,
            Some('w') => Self::Word,
            Some('e') => Self::Email,
            Some('h') => Self::Host,
            Some('u') => Self::Url,
            _ => Self::Paragraph,
        }
    }
}

/// Generate filler of `kind`; `min..=max` counts sentences for paragraphs,
/// words for sentences and letters for words.
pub fn generate(kind: Kind, min: usize, max: usize) -> String {
    let mut rng = rand::thread_rng();
    match kind {
        Kind::Paragraph => paragraph(&mut rng, min, max),
        Kind::Sentence => sentence(&mut rng, min, max),
        Kind::Word => word(&mut rng, min, max).to_string(),
        Kind::Email => format!("{}@{}", pick(&mut rng), host(&mut rng)),
        Kind::Host => host(&mut rng),
        Kind::Url => format!("https://{}/{}", host(&mut rng), pick(&mut rng)),
    }
}

fn pick(rng: &mut impl Rng) -> &'static str {
    WORDS.choose(rng).copied().unwrap_or("lorem")
}

fn word(rng: &mut impl Rng, min: usize, max: usize) -> &'static str {
    let fitting: Vec<_> = WORDS
        .iter()
        .copied()
        .filter(|w| (min..=max).contains(&w.len()))
        .collect();
    fitting.choose(rng).copied().unwrap_or_else(|| pick(rng))
}

fn sentence(rng: &mut impl Rng, min: usize, max: usize) -> String {
    let count = rng.gen_range(min.max(1)..=max.max(1));
    let text = (0..count).map(|_| pick(rng)).collect::<Vec<_>>().join(" ");

    let mut chars = text.chars();
    match chars.next() {
        Some(first) => format!("{}{}.", first.to_uppercase(), chars.as_str()),
        None => String::new(),
    }
}

fn paragraph(rng: &mut impl Rng, min: usize, max: usize) -> String {
    let count = rng.gen_range(min.max(1)..=max.max(1));
    (0..count)
        .map(|_| sentence(rng, SENTENCE_WORDS.0, SENTENCE_WORDS.1))
        .collect::<Vec<_>>()
        .join(" ")
}

fn host(rng: &mut impl Rng) -> String {
    let tld = TLDS.choose(rng).copied().unwrap_or("com");
    format!("{}.{tld}", pick(rng))
}
