//! Markup-to-text conversion for fetched planning pages.
//!
//! Pure function, no async. Strips script/style blocks wholesale, drops the
//! remaining tags and collapses whitespace so the result can go straight
//! into a prompt payload.

use regex::Regex;

/// Convert raw HTML into plain text. Total: never fails, empty in → empty out.
pub fn html_to_text(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }

    // (?is): case-insensitive, dot matches newline. Fixed patterns, so
    // compilation cannot fail.
    let script = Regex::new(r"(?is)<script\b.*?</script>").expect("static regex");
    let style = Regex::new(r"(?is)<style\b.*?</style>").expect("static regex");
    let tag = Regex::new(r"<[^>]+>").expect("static regex");
    let whitespace = Regex::new(r"\s+").expect("static regex");

    let text = script.replace_all(html, "");
    let text = style.replace_all(&text, "");
    let text = tag.replace_all(&text, " ");
    let text = whitespace.replace_all(&text, " ");

    text.trim().to_string()
}
