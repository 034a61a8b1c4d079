use regex::Regex;
use std::sync::LazyLock;

static ATTRIBUTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^On .+(wrote|said|writes):?\s*$").expect("attribution pattern is valid")
});

static FORWARD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^-{2,}\s*(Original Message|Forwarded message)")
        .expect("forward pattern is valid")
});

static FROM_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\*?From:\*?\s.*@").expect("from header pattern is valid")
});

static IMAGE_PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[image:").expect("image pattern is valid"));

/// Lines after a `From:` line that mark a quoted header block
const HEADER_BLOCK_FIELDS: [&str; 3] = ["Sent:", "To:", "Subject:"];

/// A `From:` line only starts a quoted header block past this line index.
const MIN_FROM_HEADER_LINE: usize = 3;

/// How far below a `From:` line the other header fields may appear
const HEADER_BLOCK_LOOKAHEAD: usize = 4;

/// Minimum run of `>`-prefixed lines treated as a quote
const MIN_QUOTE_RUN: usize = 3;

/// Removes the quoted or forwarded chain from a plain-text body.
///
/// Lines are scanned top to bottom and the body is cut at the first line
/// that starts a chain: an `On ... wrote:` attribution, a forwarded-message
/// separator, a classic `From:`/`Sent:`/`To:` header block, a collapsed
/// `[image: ...]` quote placeholder, or a run of `>` lines. A body with no
/// chain is returned trimmed but otherwise whole.
pub fn strip(body: &str) -> String {
    let lines: Vec<&str> = body.lines().collect();

    let Some(cut) = (0..lines.len()).find(|&i| starts_chain(&lines, i)) else {
        return body.trim().to_string();
    };

    let mut kept = &lines[..cut];
    while let Some((last, rest)) = kept.split_last() {
        if is_trailing_noise(last) {
            kept = rest;
        } else {
            break;
        }
    }

    kept.join("\n").trim().to_string()
}

fn starts_chain(lines: &[&str], i: usize) -> bool {
    let line = lines[i].trim_end();

    ATTRIBUTION_RE.is_match(line.trim_start())
        || FORWARD_RE.is_match(line.trim_start())
        || is_header_block(lines, i)
        || is_collapsed_quote(lines, i)
        || is_quote_run(lines, i)
}

fn is_header_block(lines: &[&str], i: usize) -> bool {
    if i <= MIN_FROM_HEADER_LINE || !FROM_HEADER_RE.is_match(lines[i].trim()) {
        return false;
    }
    lines
        .iter()
        .skip(i + 1)
        .take(HEADER_BLOCK_LOOKAHEAD)
        .any(|next| HEADER_BLOCK_FIELDS.iter().any(|field| next.contains(field)))
}

/// A `wrote:` line directly above an `[image: ...]` placeholder. The cut
/// lands on the attribution line, not the placeholder.
fn is_collapsed_quote(lines: &[&str], i: usize) -> bool {
    lines[i].contains("wrote:")
        && lines
            .get(i + 1)
            .is_some_and(|next| IMAGE_PLACEHOLDER_RE.is_match(next.trim_start()))
}

fn is_quote_run(lines: &[&str], i: usize) -> bool {
    lines.len() - i >= MIN_QUOTE_RUN
        && lines[i..i + MIN_QUOTE_RUN]
            .iter()
            .all(|l| l.trim_start().starts_with('>'))
}

fn is_trailing_noise(line: &str) -> bool {
    matches!(line.trim(), "" | "--" | "\u{2014}" | "\u{2014}\u{2014}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_on_wrote_attribution() {
        let body = "Thanks!\n\nOn Mon, Jan 1, Alice wrote:\n> old text\n> more old text\n> and more";
        assert_eq!(strip(body), "Thanks!");
    }

    #[test]
    fn test_attribution_variants() {
        assert_eq!(strip("Yes\nOn Tuesday Bob said:\nold"), "Yes");
        assert_eq!(strip("Yes\non 2 Feb, Carol <c@x.com> writes\nold"), "Yes");
        assert_eq!(strip("Yes\nOn Feb 2, Dan wrote:   \nold"), "Yes");
    }

    #[test]
    fn test_attribution_must_start_line() {
        let body = "I said On Monday that Bob wrote:\nstill mine";
        assert_eq!(strip(body), body);
    }

    #[test]
    fn test_strips_forwarded_separator() {
        let body = "FYI\n\n---------- Forwarded message ---------\nFrom: a@b.com\nbody";
        assert_eq!(strip(body), "FYI");
        let body = "See below\n-----Original Message-----\nFrom: x@y.com";
        assert_eq!(strip(body), "See below");
    }

    #[test]
    fn test_strips_outlook_header_block() {
        let body = "Line one\nLine two\nLine three\nLine four\n\nFrom: Vendor <vendor@acme.com>\nSent: Monday\nTo: me@x.com\nSubject: Quote";
        assert_eq!(strip(body), "Line one\nLine two\nLine three\nLine four");
    }

    #[test]
    fn test_from_line_too_early_is_kept() {
        let body = "From: boss@corp.com\nTo: me@x.com\nplease review";
        assert_eq!(strip(body), body);
    }

    #[test]
    fn test_from_line_without_header_fields_is_kept() {
        let body = "a\nb\nc\nd\nFrom: friend@x.com is who sent it\nnothing else\nhere";
        assert_eq!(strip(body), body);
    }

    #[test]
    fn test_collapsed_quote_placeholder() {
        let body = "Got it\n\nAlice <alice@x.com> wrote:\n[image: Google logo]\nolder";
        assert_eq!(strip(body), "Got it");
    }

    #[test]
    fn test_quote_run_of_three() {
        let body = "Agreed.\n> one\n> two\n> three\nsign-off";
        assert_eq!(strip(body), "Agreed.");
    }

    #[test]
    fn test_short_quote_run_is_kept() {
        let body = "Inline:\n> one\n> two\nmy answer";
        assert_eq!(strip(body), body);
    }

    #[test]
    fn test_trailing_signature_separator_trimmed() {
        let body = "Thanks\n--\n\nOn Mon, Bob wrote:\n> x";
        assert_eq!(strip(body), "Thanks");
        let body = "Thanks\n\u{2014}\n\nOn Mon, Bob wrote:\n> x";
        assert_eq!(strip(body), "Thanks");
    }

    #[test]
    fn test_no_markers_returns_trimmed_body() {
        let body = "  \nJust a normal message\nWith multiple lines\n\n";
        assert_eq!(strip(body), body.trim());
    }

    #[test]
    fn test_no_markers_keeps_trailing_dashes() {
        let body = "Regards\n--";
        assert_eq!(strip(body), "Regards\n--");
    }

    #[test]
    fn test_strip_is_idempotent() {
        let bodies = [
            "Thanks!\n\nOn Mon, Jan 1, Alice wrote:\n> old",
            "a\nb\nc\nd\ne\nFrom: x@y.com\nSent: now",
            "plain text\n> one\n> two",
            "",
        ];
        for body in bodies {
            let once = strip(body);
            assert_eq!(strip(&once), once, "not idempotent for {body:?}");
        }
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(strip(""), "");
        assert_eq!(strip("   \n\n"), "");
    }

    #[test]
    fn test_whole_body_is_quote() {
        assert_eq!(strip("On Mon, Bob wrote:\n> hi"), "");
    }

    #[test]
    fn test_crlf_line_endings() {
        let body = "Reply here\r\n\r\nOn Mon, Bob wrote:\r\n> old\r\n";
        assert_eq!(strip(body), "Reply here");
    }
}
