//! Free-form account resolution
//!
//! Callers name accounts loosely ("Venture X", "VENTURE-X", "x5660"). The
//! identifier is normalized and then matched, in priority order, against
//! each account's aliases and last-four digits. Priority order is the order
//! accounts are handed in, so an account whose alias is a substring of a
//! sibling's alias must come after that sibling.

use super::types::Account;

/// Lowercase and drop whitespace, hyphens and underscores
pub fn normalize(identifier: &str) -> String {
    identifier
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether a normalized identifier names this account
pub fn matches(account: &Account, normalized: &str) -> bool {
    if normalized.is_empty() {
        return false;
    }

    account
        .aliases
        .iter()
        .map(|alias| normalize(alias))
        .chain(std::iter::once(account.last4.clone()))
        .any(|needle| !needle.is_empty() && normalized.contains(&needle))
}

/// Return the first account, in priority order, that the identifier names
pub fn resolve<'a, I>(accounts: I, identifier: &str) -> Option<&'a Account>
where
    I: IntoIterator<Item = &'a Account>,
{
    let normalized = normalize(identifier);
    accounts
        .into_iter()
        .find(|account| matches(account, &normalized))
}
