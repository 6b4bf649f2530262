// SPDX-License-Identifier: MIT OR Apache-2.0
//! Recipient restriction and email normalization.

/// Canonical comparison form of an email address.
///
/// Addresses differing only in case or surrounding whitespace are the
/// same recipient.
#[must_use]
pub fn normalize_email(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

/// Result of applying an allow-list to a recipient set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOutcome {
    /// Recipients that survived, original spelling preserved.
    pub recipients: Vec<String>,
    /// Count before filtering.
    pub before: usize,
    /// Count after filtering.
    pub after: usize,
    /// Count dropped.
    pub filtered: usize,
}

/// Apply a customer's restricted-recipients allow-list.
///
/// `None` means unrestricted. Matching is case-insensitive on the
/// normalized form; an empty allow-list drops everyone.
#[must_use]
pub fn apply_allow_list(recipients: Vec<String>, allow_list: Option<&[String]>) -> FilterOutcome {
    let before = recipients.len();
    let recipients = match allow_list {
        None => recipients,
        Some(allowed) => {
            let allowed: Vec<String> = allowed.iter().map(|a| normalize_email(a)).collect();
            recipients
                .into_iter()
                .filter(|r| allowed.contains(&normalize_email(r)))
                .collect()
        }
    };
    let after = recipients.len();
    FilterOutcome {
        recipients,
        before,
        after,
        filtered: before - after,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipients(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn no_allow_list_passes_everyone() {
        let outcome = apply_allow_list(recipients(&["a@x.example", "b@x.example"]), None);
        assert_eq!(outcome.before, 2);
        assert_eq!(outcome.after, 2);
        assert_eq!(outcome.filtered, 0);
    }

    #[test]
    fn allow_list_drops_outsiders() {
        let allowed = recipients(&["ops@x.example"]);
        let outcome = apply_allow_list(
            recipients(&["ops@x.example", "dev@x.example", "sec@x.example"]),
            Some(&allowed),
        );
        assert_eq!(outcome.recipients, recipients(&["ops@x.example"]));
        assert_eq!(outcome.before, 3);
        assert_eq!(outcome.after, 1);
        assert_eq!(outcome.filtered, 2);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let allowed = recipients(&["Ops@X.example"]);
        let outcome = apply_allow_list(recipients(&["ops@x.EXAMPLE"]), Some(&allowed));
        assert_eq!(outcome.after, 1);
        // Original spelling survives.
        assert_eq!(outcome.recipients, recipients(&["ops@x.EXAMPLE"]));
    }

    #[test]
    fn empty_allow_list_drops_everyone() {
        let outcome = apply_allow_list(recipients(&["a@x.example"]), Some(&[]));
        assert_eq!(outcome.after, 0);
        assert_eq!(outcome.filtered, 1);
    }

    #[test]
    fn normalization_trims_and_lowercases() {
        assert_eq!(normalize_email("  Ops@Example.ORG "), "ops@example.org");
    }
}
