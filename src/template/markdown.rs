//! Markdown rendering.
//!
//! Headings get an `id` derived from their text, prefixed with `h-`.
//! Links to other hosts open in a new tab without an opener reference.

use super::vars::html_escape;
use pulldown_cmark::{CowStr, Event, Options, Parser, Tag, TagEnd, html};

const HEADING_ID_PREFIX: &str = "h-";

pub fn render(markdown: &str) -> String {
    // No heading attributes: `# Hi {name}` keeps its placeholder
    let options = Options::ENABLE_TABLES | Options::ENABLE_FOOTNOTES | Options::ENABLE_STRIKETHROUGH;

    let mut events: Vec<Event> = Parser::new_ext(markdown, options).collect();
    assign_heading_ids(&mut events);
    let events = rewrite_external_links(events);

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events.into_iter());
    out
}

fn assign_heading_ids(events: &mut [Event<'_>]) {
    let mut open: Option<(usize, String)> = None;

    for i in 0..events.len() {
        let closed = match &events[i] {
            Event::Start(Tag::Heading { id: None, .. }) => {
                open = Some((i, String::new()));
                false
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, heading)) = open.as_mut() {
                    heading.push_str(text);
                }
                false
            }
            Event::End(TagEnd::Heading(_)) => true,
            _ => false,
        };

        if closed
            && let Some((start, text)) = open.take()
            && let Event::Start(Tag::Heading { id, .. }) = &mut events[start]
        {
            *id = Some(CowStr::from(format!("{HEADING_ID_PREFIX}{}", slugify(&text))));
        }
    }
}

fn rewrite_external_links(events: Vec<Event<'_>>) -> Vec<Event<'_>> {
    let mut external = Vec::new();

    events
        .into_iter()
        .map(|event| match event {
            Event::Start(Tag::Link { dest_url, title, .. }) if is_external(&dest_url) => {
                external.push(true);
                let title = if title.is_empty() {
                    String::new()
                } else {
                    format!(r#" title="{}""#, html_escape(&title))
                };
                Event::InlineHtml(CowStr::from(format!(
                    r#"<a href="{}"{title} target="_blank" rel="noopener noreferrer">"#,
                    html_escape(&dest_url)
                )))
            }
            Event::Start(tag @ Tag::Link { .. }) => {
                external.push(false);
                Event::Start(tag)
            }
            Event::End(TagEnd::Link) if external.pop() == Some(true) => {
                Event::InlineHtml(CowStr::from("</a>"))
            }
            other => other,
        })
        .collect()
}

fn is_external(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://") || url.starts_with("//")
}

/// Lowercase alphanumeric runs joined by `-`.
fn slugify(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
