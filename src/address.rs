use regex::Regex;
use std::sync::LazyLock;

static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+'\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}")
        .expect("address pattern is valid")
});

static ANGLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>]+)>").expect("angle pattern is valid"));

/// Case-folds an address for comparisons and storage.
pub fn normalize(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Case-insensitive exact match of two addresses
pub fn same_address(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    !a.is_empty() && a.eq_ignore_ascii_case(b)
}

/// Extracts every address found in a free-text header value.
///
/// Header values such as `"Doe, John" <john@acme.com>, ops@acme.com` are not
/// split on commas; instead every substring that looks like an address is
/// taken, case-folded, and deduplicated in order of first appearance.
/// Missing or unparseable headers yield an empty list.
pub fn parse_addresses(header: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in ADDRESS_RE.find_iter(header) {
        let address = normalize(m.as_str().trim_matches('.'));
        if !found.contains(&address) {
            found.push(address);
        }
    }
    found
}

/// Extracts the email address from a "Name <email>" format string.
/// Falls back to the first address-looking substring, then to the trimmed input.
pub fn extract_email(from: &str) -> String {
    if let Some(inner) = ANGLE_RE.captures(from).and_then(|c| c.get(1)) {
        return normalize(inner.as_str());
    }
    parse_addresses(from)
        .into_iter()
        .next()
        .unwrap_or_else(|| normalize(from))
}

/// Extracts the case-folded domain of an address. `None` when there is no
/// `@` or nothing after it.
pub fn extract_domain(email: &str) -> Option<String> {
    let (_, domain) = email.rsplit_once('@')?;
    let domain = domain.trim().trim_end_matches('>').to_lowercase();
    if domain.is_empty() { None } else { Some(domain) }
}

/// Shorthand for the domain of whatever address a sender string carries.
pub fn sender_domain(sender: &str) -> Option<String> {
    extract_domain(&extract_email(sender))
}

/// Display name part of a "Name <email>" sender, or the address itself.
pub fn display_name(sender: &str) -> String {
    match sender.find('<') {
        Some(idx) if idx > 0 => {
            let name = sender[..idx].trim().trim_matches('"').trim();
            if name.is_empty() {
                extract_email(sender)
            } else {
                name.to_string()
            }
        }
        _ => extract_email(sender),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_email_with_name_and_brackets() {
        assert_eq!(extract_email("John Doe <John@Example.com>"), "john@example.com");
    }

    #[test]
    fn test_extract_email_without_brackets() {
        assert_eq!(extract_email("  plain@email.com  "), "plain@email.com");
    }

    #[test]
    fn test_extract_email_complex_name() {
        assert_eq!(
            extract_email("\"Doe, John\" <john.doe@company.co.uk>"),
            "john.doe@company.co.uk"
        );
    }

    #[test]
    fn test_parse_addresses_free_text() {
        let parsed = parse_addresses("\"Doe, John\" <John@Acme.com>, ops@acme.com; Ops <OPS@acme.com>");
        assert_eq!(parsed, vec!["john@acme.com", "ops@acme.com"]);
    }

    #[test]
    fn test_parse_addresses_empty_and_garbage() {
        assert!(parse_addresses("").is_empty());
        assert!(parse_addresses("undisclosed-recipients:;").is_empty());
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("user@Mail.Example.com"), Some("mail.example.com".into()));
        assert_eq!(extract_domain("invalid"), None);
        assert_eq!(extract_domain("trailing@"), None);
    }

    #[test]
    fn test_sender_domain() {
        assert_eq!(sender_domain("Billing <billing@acme.com>"), Some("acme.com".into()));
        assert_eq!(sender_domain("nobody"), None);
    }

    #[test]
    fn test_same_address_is_case_insensitive() {
        assert!(same_address("Me@X.com", "me@x.com"));
        assert!(!same_address("me@x.com", "me@y.com"));
        assert!(!same_address("", ""));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("Alice Chen <alice@example.com>"), "Alice Chen");
        assert_eq!(display_name("\"Bob\" <bob@example.com>"), "Bob");
        assert_eq!(display_name("<carol@example.com>"), "carol@example.com");
        assert_eq!(display_name("dave@example.com"), "dave@example.com");
    }
}
