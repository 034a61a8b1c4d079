use std::collections::HashSet;

use crate::model::Item;

/// Public mailbox providers. Sharing one of these says nothing about whether
/// two senders are related, so they never seed a batch suggestion.
pub const PUBLIC_PROVIDER_DOMAINS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "yahoo.com",
    "ymail.com",
    "hotmail.com",
    "outlook.com",
    "live.com",
    "msn.com",
    "icloud.com",
    "me.com",
    "mac.com",
    "aol.com",
    "protonmail.com",
    "proton.me",
    "gmx.com",
    "mail.com",
    "zoho.com",
    "yandex.com",
    "fastmail.com",
];

/// Finds other visible items from the same sender domain
#[derive(Debug, Clone)]
pub struct SimilarItemFinder {
    skip_domains: HashSet<String>,
}

impl Default for SimilarItemFinder {
    fn default() -> Self {
        Self::new()
    }
}

impl SimilarItemFinder {
    pub fn new() -> Self {
        Self {
            skip_domains: PUBLIC_PROVIDER_DOMAINS
                .iter()
                .map(|d| d.to_string())
                .collect(),
        }
    }

    /// Adds domains (e.g. a shared corporate mail host) to the skip-list.
    pub fn with_extra_skip_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.skip_domains
            .extend(domains.into_iter().map(|d| d.as_ref().trim().to_lowercase()));
        self
    }

    pub fn is_skipped(&self, domain: &str) -> bool {
        self.skip_domains.contains(&domain.to_lowercase())
    }

    /// Items sharing `item`'s sender domain, using the item's own address.
    pub fn find_similar(
        &self,
        item: &Item,
        visible: &[Item],
        excluded: &HashSet<String>,
    ) -> Vec<Item> {
        self.find_similar_by(item, Item::sender_domain, visible, excluded)
    }

    /// Items whose domain (as computed by `domain_of`) matches `item`'s.
    ///
    /// Returns nothing when `item` has no domain or its domain is a public
    /// provider. `item` itself and anything in `excluded` are never returned.
    pub fn find_similar_by<F>(
        &self,
        item: &Item,
        domain_of: F,
        visible: &[Item],
        excluded: &HashSet<String>,
    ) -> Vec<Item>
    where
        F: Fn(&Item) -> Option<String>,
    {
        let Some(domain) = domain_of(item).map(|d| d.to_lowercase()) else {
            return Vec::new();
        };
        if domain.is_empty() || self.is_skipped(&domain) {
            return Vec::new();
        }

        visible
            .iter()
            .filter(|other| other.id != item.id && !excluded.contains(&other.id))
            .filter(|other| {
                domain_of(other).is_some_and(|d| d.eq_ignore_ascii_case(&domain))
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(id: &str, sender: &str) -> Item {
        Item::new(id, sender, "Subject", Utc::now())
    }

    #[test]
    fn test_finds_same_domain_items() {
        let finder = SimilarItemFinder::new();
        let archived = item("1", "billing@acme.com");
        let visible = vec![
            item("2", "Acme Support <support@ACME.com>"),
            item("3", "news@acme.com"),
            item("4", "alice@other.org"),
        ];

        let found = finder.find_similar(&archived, &visible, &HashSet::new());
        let ids: Vec<&str> = found.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3"]);
    }

    #[test]
    fn test_public_provider_yields_nothing() {
        let finder = SimilarItemFinder::new();
        let archived = item("1", "someone@gmail.com");
        let visible = vec![item("2", "other@gmail.com")];
        assert!(finder.find_similar(&archived, &visible, &HashSet::new()).is_empty());
    }

    #[test]
    fn test_missing_domain_yields_nothing() {
        let finder = SimilarItemFinder::new();
        let archived = item("1", "Mailer Daemon");
        let visible = vec![item("2", "Mailer Daemon")];
        assert!(finder.find_similar(&archived, &visible, &HashSet::new()).is_empty());
    }

    #[test]
    fn test_excluded_and_self_are_skipped() {
        let finder = SimilarItemFinder::new();
        let archived = item("1", "a@acme.com");
        let visible = vec![item("1", "a@acme.com"), item("2", "b@acme.com"), item("3", "c@acme.com")];
        let excluded: HashSet<String> = ["2".to_string()].into_iter().collect();

        let found = finder.find_similar(&archived, &visible, &excluded);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "3");
    }

    #[test]
    fn test_subdomains_do_not_match() {
        let finder = SimilarItemFinder::new();
        let archived = item("1", "a@acme.com");
        let visible = vec![item("2", "b@mail.acme.com")];
        assert!(finder.find_similar(&archived, &visible, &HashSet::new()).is_empty());
    }

    #[test]
    fn test_extra_skip_domains() {
        let finder = SimilarItemFinder::new().with_extra_skip_domains(["Corp-Mail.example"]);
        let archived = item("1", "a@corp-mail.example");
        let visible = vec![item("2", "b@corp-mail.example")];
        assert!(finder.find_similar(&archived, &visible, &HashSet::new()).is_empty());
    }

    #[test]
    fn test_custom_domain_function() {
        let finder = SimilarItemFinder::new();
        let archived = item("1", "x@one.com");
        let visible = vec![item("2", "y@two.com")];
        let found = finder.find_similar_by(
            &archived,
            |_| Some("shared.org".to_string()),
            &visible,
            &HashSet::new(),
        );
        assert_eq!(found.len(), 1);
    }
}
