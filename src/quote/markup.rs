use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Column width markup is flattened to; the terminal rewraps it anyway.
const FLATTEN_WIDTH: usize = 200;

static SCRIPT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("script pattern is valid")
});

static STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").expect("style pattern is valid")
});

static EVENT_HANDLER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#)
        .expect("event handler pattern is valid")
});

static JAVASCRIPT_URI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(href|src)\s*=\s*(?:"\s*javascript:[^"]*"|'\s*javascript:[^']*'|javascript:[^\s>]*)"#)
        .expect("javascript uri pattern is valid")
});

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag pattern is valid"));

static CID_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*\bsrc\s*=\s*["']?cid:[^>]*>"#).expect("cid pattern is valid")
});

/// Quoted-chain signatures, tried in priority order.
static QUOTE_SIGNATURES: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [
        // generic quote-class container
        Regex::new(r#"(?i)<div\b[^>]*\bclass\s*=\s*["'][^"']*\b(?:gmail_quote|quote)\b[^"']*["']"#),
        // cited blockquote
        Regex::new(r#"(?i)<blockquote\b[^>]*\btype\s*=\s*["']?cite\b"#),
        // client-specific prefix containers
        Regex::new(
            r#"(?i)<div\b[^>]*\b(?:class\s*=\s*["'][^"']*\b(?:moz-cite-prefix|yahoo_quoted)\b|id\s*=\s*["']divRplyFwdMsg["'])"#,
        ),
        // horizontal rule followed by a bolded From: paragraph
        Regex::new(
            r"(?is)<hr\b[^>]*>\s*(?:<div\b[^>]*>\s*)?(?:<p\b[^>]*>\s*)?(?:<font\b[^>]*>\s*)?<(?:b|strong)\b[^>]*>\s*From:",
        ),
    ]
    .map(|re| re.expect("quote signature pattern is valid"))
});

/// Shown in place of an inline image that cannot be resolved.
pub const IMAGE_PLACEHOLDER: &str = "[image]";

/// Removes the quoted chain from a markup body, after sanitizing it.
pub fn strip_markup(html: &str) -> String {
    let clean = sanitize(html);

    let cut = QUOTE_SIGNATURES
        .iter()
        .find_map(|re| re.find(&clean).map(|m| m.start()));

    match cut {
        Some(at) => clean[..at].trim_end().to_string(),
        None => clean,
    }
}

/// Drops script/style blocks, inline event handlers and `javascript:` URIs,
/// and replaces `cid:` images with a placeholder.
pub fn sanitize(html: &str) -> String {
    let out = SCRIPT_RE.replace_all(html, "");
    let out = STYLE_RE.replace_all(&out, "");
    // Attribute rewrites only apply inside tags, never to body text.
    let out = TAG_RE.replace_all(&out, |tag: &Captures| {
        let tag = EVENT_HANDLER_RE.replace_all(&tag[0], "");
        JAVASCRIPT_URI_RE
            .replace_all(&tag, r##"$1="#""##)
            .into_owned()
    });
    CID_IMAGE_RE.replace_all(&out, IMAGE_PLACEHOLDER).into_owned()
}

static BLANK_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n(?:[ \t]*\n)+").expect("blank run pattern is valid"));

/// Flattens markup into readable plain text for the terminal.
///
/// Falls back to the raw markup when it cannot be parsed.
pub fn markup_to_text(html: &str) -> String {
    let text = html2text::from_read(html.as_bytes(), FLATTEN_WIDTH)
        .unwrap_or_else(|_| html.to_string());
    let lines: Vec<&str> = text.lines().map(str::trim_end).collect();
    BLANK_RUN_RE
        .replace_all(&lines.join("\n"), "\n\n")
        .trim()
        .to_string()
}
