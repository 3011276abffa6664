//! Alias table: recipient address to Bluesky credentials

use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::EmailAddress;

/// Prefix of environment variables holding alias definitions
pub const ALIAS_ENV_PREFIX: &str = "ALIAS_";

/// Credentials for one Bluesky account
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub handle: String,
    /// App password
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("handle", &self.handle)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// One configured alias as it appears in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasEntry {
    /// Mailbox address mail is sent to
    pub address: String,
    pub handle: String,
    pub password: String,
}

impl AliasEntry {
    /// Parse the `alias|handle|password` format used by `ALIAS_*` variables
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.split('|');
        let (Some(address), Some(handle), Some(password), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return None;
        };
        if address.trim().is_empty() || handle.trim().is_empty() {
            return None;
        }
        Some(Self {
            address: address.trim().to_string(),
            handle: handle.trim().to_string(),
            password: password.to_string(),
        })
    }

    /// Collect aliases from `(name, value)` pairs, e.g. `std::env::vars()`
    ///
    /// Only names starting with [`ALIAS_ENV_PREFIX`] are considered; malformed
    /// values are skipped with a warning.
    pub fn from_vars<I, K, V>(vars: I) -> Vec<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut entries: Vec<(String, Self)> = vars
            .into_iter()
            .filter(|(key, _)| key.as_ref().starts_with(ALIAS_ENV_PREFIX))
            .filter_map(|(key, value)| match Self::parse(value.as_ref()) {
                Some(entry) => Some((key.as_ref().to_string(), entry)),
                None => {
                    warn!("Ignoring {}: expected 'address|handle|password'", key.as_ref());
                    None
                }
            })
            .collect();
        // Environment order is unspecified; keep results stable
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.into_iter().map(|(_, entry)| entry).collect()
    }
}

/// A recipient that matched a configured alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAlias<'a> {
    /// Normalized alias address as configured
    pub address: &'a str,
    pub credentials: &'a Credentials,
}

/// Read-only mapping from normalized recipient address to credentials
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    aliases: HashMap<String, Credentials>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from entries; later entries override earlier ones
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a AliasEntry>) -> Self {
        let mut table = Self::new();
        for entry in entries {
            table.insert(
                &entry.address,
                Credentials {
                    handle: entry.handle.clone(),
                    password: entry.password.clone(),
                },
            );
        }
        table
    }

    pub fn insert(&mut self, address: &str, credentials: Credentials) {
        let key = EmailAddress::parse(address).normalized();
        self.aliases.insert(key, credentials);
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Find the credentials for a raw `To` header
    ///
    /// Each listed address is compared exactly after normalization; the
    /// first configured one wins.
    pub fn resolve(&self, recipient: &str) -> Option<ResolvedAlias<'_>> {
        EmailAddress::parse_list(recipient).into_iter().find_map(|addr| {
            self.aliases
                .get_key_value(&addr.normalized())
                .map(|(address, credentials)| ResolvedAlias {
                    address: address.as_str(),
                    credentials,
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(address: &str, handle: &str) -> AliasEntry {
        AliasEntry {
            address: address.to_string(),
            handle: handle.to_string(),
            password: "app-pass".to_string(),
        }
    }

    #[test]
    fn test_parse_env_value() {
        let parsed = AliasEntry::parse("tips@example.org|tips.bsky.social|abcd-efgh").unwrap();
        assert_eq!(parsed.address, "tips@example.org");
        assert_eq!(parsed.handle, "tips.bsky.social");
        assert_eq!(parsed.password, "abcd-efgh");
    }

    #[test]
    fn test_parse_rejects_wrong_arity() {
        assert!(AliasEntry::parse("a@b.c|handle").is_none());
        assert!(AliasEntry::parse("a@b.c|handle|pw|extra").is_none());
        assert!(AliasEntry::parse("|handle|pw").is_none());
    }

    #[test]
    fn test_from_vars_filters_prefix_and_malformed() {
        let vars = vec![
            ("HOME", "/root"),
            ("ALIAS_B", "b@example.org|b.bsky.social|pw"),
            ("ALIAS_BAD", "nope"),
            ("ALIAS_A", "a@example.org|a.bsky.social|pw"),
        ];
        let entries = AliasEntry::from_vars(vars);
        let handles: Vec<&str> = entries.iter().map(|e| e.handle.as_str()).collect();
        assert_eq!(handles, vec!["a.bsky.social", "b.bsky.social"]);
    }

    #[test]
    fn test_resolve_exact_and_case_insensitive() {
        let entries = [entry("Tips@Example.org", "tips.bsky.social")];
        let table = AliasTable::from_entries(&entries);

        let resolved = table.resolve("tips@example.org").unwrap();
        assert_eq!(resolved.address, "tips@example.org");
        assert_eq!(resolved.credentials.handle, "tips.bsky.social");

        assert!(table.resolve("tips@example.com").is_none());
        assert!(table.resolve("").is_none());
    }

    #[test]
    fn test_resolve_from_header_list() {
        let entries = [entry("leaks@example.org", "leaks.bsky.social")];
        let table = AliasTable::from_entries(&entries);

        let resolved = table
            .resolve("Someone <someone@example.com>, Leaks Desk <leaks@example.org>")
            .unwrap();
        assert_eq!(resolved.credentials.handle, "leaks.bsky.social");
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials {
            handle: "h".to_string(),
            password: "secret".to_string(),
        };
        assert!(!format!("{creds:?}").contains("secret"));
    }
}
