//! Markdown rendering for bot replies.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd, html};

/// Link schemes kept as clickable anchors.
const SAFE_SCHEMES: &[&str] = &["http://", "https://", "mailto:"];

/// Render a bot reply as HTML.
///
/// Raw HTML in the reply is dropped. Links whose destination is not
/// http(s) or mailto keep their label but lose the anchor.
#[must_use]
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    // Links cannot nest, so one flag tracks the anchor being skipped.
    let mut skipping_link = false;
    let parser = Parser::new_ext(markdown, options).filter_map(|event| match event {
        Event::Html(_) | Event::InlineHtml(_) => None,
        Event::Start(Tag::Link { ref dest_url, .. }) if !is_safe_link(dest_url) => {
            skipping_link = true;
            None
        }
        Event::End(TagEnd::Link) if skipping_link => {
            skipping_link = false;
            None
        }
        other => Some(other),
    });

    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

fn is_safe_link(dest: &str) -> bool {
    let dest = dest.trim().to_ascii_lowercase();
    SAFE_SCHEMES.iter().any(|scheme| dest.starts_with(scheme))
}
