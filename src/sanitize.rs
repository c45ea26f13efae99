//! Caption text cleanup.

/// Reduces possibly-HTML caption text to a single line of plain text.
pub fn plain_text(raw: &str) -> String {
    let without_tags = regex!(r"<[^>]*>").replace_all(raw, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    regex!(r"\s+").replace_all(decoded.trim(), " ").into_owned()
}
