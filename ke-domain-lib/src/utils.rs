//! Utility functions for domain name handling.

/// Longest label DNS allows between two dots.
pub(crate) const MAX_LABEL_LEN: usize = 63;

/// Normalise a fully qualified domain for lookups and cache keys.
///
/// Trims, lower-cases and drops a trailing root dot. Returns `None` when
/// the result is not a syntactically valid FQDN.
pub fn normalize_domain(domain: &str) -> Option<String> {
    let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();
    if is_valid_fqdn(&domain) {
        Some(domain)
    } else {
        None
    }
}

/// Validate that a label (one dot-separated part) has LDH syntax.
pub(crate) fn is_valid_label(label: &str) -> bool {
    if label.is_empty() || label.len() > MAX_LABEL_LEN {
        return false;
    }

    // Cannot start or end with hyphen
    if label.starts_with('-') || label.ends_with('-') {
        return false;
    }

    label
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Validate that an FQDN has basic valid structure.
pub(crate) fn is_valid_fqdn(domain: &str) -> bool {
    if domain.len() < 4 || domain.len() > 253 {
        return false;
    }

    let parts: Vec<&str> = domain.split('.').collect();
    if parts.len() < 2 {
        return false;
    }

    parts.into_iter().all(is_valid_label)
}

/// Remove duplicates while keeping first-seen order.
pub(crate) fn dedup_preserving_order(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_domain() {
        assert_eq!(
            normalize_domain("  MyBrand.CO.KE. "),
            Some("mybrand.co.ke".to_string())
        );
        assert_eq!(normalize_domain("mybrand"), None);
        assert_eq!(normalize_domain(""), None);
        assert_eq!(normalize_domain("-bad.co.ke"), None);
    }

    #[test]
    fn test_is_valid_fqdn() {
        assert!(is_valid_fqdn("example.ke"));
        assert!(is_valid_fqdn("test.co.ke"));
        assert!(is_valid_fqdn("my-shop.me.ke"));

        assert!(!is_valid_fqdn("example"));
        assert!(!is_valid_fqdn(".ke"));
        assert!(!is_valid_fqdn("example."));
        assert!(!is_valid_fqdn("-example.ke"));
        assert!(!is_valid_fqdn("example.ke-"));
        assert!(!is_valid_fqdn("ex..ke"));
        assert!(!is_valid_fqdn("shop_1.co.ke"));
    }

    #[test]
    fn test_is_valid_label() {
        assert!(is_valid_label("mybrand"));
        assert!(is_valid_label("abc123"));
        assert!(is_valid_label("my-brand"));
        assert!(!is_valid_label(""));
        assert!(!is_valid_label("-x"));
        assert!(!is_valid_label("x-"));
        assert!(!is_valid_label(&"a".repeat(64)));
    }

    #[test]
    fn test_dedup_preserving_order() {
        let items = vec!["b".to_string(), "a".to_string(), "b".to_string()];
        assert_eq!(dedup_preserving_order(items), vec!["b", "a"]);
    }
}
