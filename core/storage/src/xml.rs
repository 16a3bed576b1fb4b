//! Minimal XML extraction for Azure Blob REST responses.
//!
//! Listing and error bodies are flat enough that tag extraction is
//! sufficient.

/// Text of the first `<tag>...</tag>` element in `body`, unescaped.
pub(crate) fn first_tag(body: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)?;
    Some(unescape(&body[start..start + end]))
}

/// Every `<tag>...</tag>` block in `body`, raw.
pub(crate) fn blocks<'a>(body: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let mut out = Vec::new();
    let mut rest = body;

    while let Some(start) = rest.find(&open) {
        let inner = &rest[start + open.len()..];
        match inner.find(&close) {
            Some(end) => {
                out.push(&inner[..end]);
                rest = &inner[end + close.len()..];
            }
            None => break,
        }
    }
    out
}

/// Replace the five predefined XML entities.
pub(crate) fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
