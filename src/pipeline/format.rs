//! Reply rendering: code blocks for the chat client's HTML renderer.

use crate::resolver::LineDatum;

/// Render one excerpt as a `<pre><code>` block.
///
/// Whitespace-only excerpts get no `class` attribute, so no language is
/// advertised for them.
pub fn render_fragment(item: &LineDatum) -> String {
    let language = if item.to_display.chars().any(|c| !is_blank(c)) {
        format!("class=\"language-{}\"", item.extension)
    } else {
        " ".to_string()
    };
    format!("<pre><code {language}>{}</code></pre>", item.to_display)
}

/// Whitespace as the ECMAScript `\s` class defines it: Unicode White_Space
/// minus NEL (U+0085), plus the byte-order mark (U+FEFF).
fn is_blank(c: char) -> bool {
    (c.is_whitespace() && c != '\u{85}') || c == '\u{FEFF}'
}

/// Build the reply text.
///
/// A warning wins over any items. Otherwise fragments are joined with a
/// newline in item order; no items means nothing to send.
pub fn render(items: &[LineDatum], warning: Option<&str>) -> Option<String> {
    if let Some(warning) = warning {
        return Some(warning.to_string());
    }

    let message = items
        .iter()
        .map(render_fragment)
        .collect::<Vec<_>>()
        .join("\n");

    if message.is_empty() {
        None
    } else {
        Some(message)
    }
}
