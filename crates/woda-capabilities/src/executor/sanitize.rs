//! Cleanup for snippets lifted out of rendered HTML.

use std::sync::LazyLock;

use regex::Regex;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("static regex pattern must compile"));

/// Decode HTML character references, named (the full HTML5 table) and
/// numeric.
pub fn unescape_html(input: &str) -> String {
    html_escape::decode_html_entities(input).into_owned()
}

pub fn strip_tags(input: &str) -> String {
    TAG_RE.replace_all(input, "").into_owned()
}

/// Entity unescape, then tag removal.
pub fn clean_snippet(raw: &str) -> String {
    strip_tags(&unescape_html(raw))
}
