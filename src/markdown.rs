//! Markdown rendering for assistant bubbles.
//!
//! The assistant message is re-rendered from the start of the accumulator
//! on every increment: Markdown is not safely incremental across partial
//! tokens, so delta-appending rendered output would produce broken markup
//! mid-stream.

use pulldown_cmark::{Options, Parser, escape, html};

/// Render assistant Markdown to an HTML fragment.
#[must_use]
pub fn render_markdown(text: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(text, options);
    let mut out = String::with_capacity(text.len() * 2);
    html::push_html(&mut out, parser);
    out
}

/// Escape user-authored text for safe interpolation into page markup.
#[must_use]
pub fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    // Writing into a String cannot fail.
    let _ = escape::escape_html(&mut escaped, text);
    escaped
}
