//! Credential token registry
//!
//! Feature sentences name credentials symbolically (`valid_user`,
//! `overlong_password`, ...). The registry maps those tokens to the literal
//! values typed into the form. The fixed table is built lazily on first
//! resolution and never mutated afterwards, so one registry can be shared by
//! every scenario of a session behind an `Arc`.

use once_cell::sync::OnceCell;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Token that always resolves to the empty string
pub const EMPTY_TOKEN: &str = "empty";

/// Length of the overlong boundary values
pub const OVERLONG_LEN: usize = 300;

/// Lazily built token table
#[derive(Debug, Default)]
pub struct CredentialRegistry {
    overrides: BTreeMap<String, String>,
    table: OnceCell<HashMap<String, String>>,
}

impl CredentialRegistry {
    /// Registry with the built-in table only
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose table is extended (and overridden) by `overrides`
    /// when it is first built
    pub fn with_overrides(overrides: BTreeMap<String, String>) -> Self {
        Self {
            overrides,
            table: OnceCell::new(),
        }
    }

    /// Resolve a token to the value to type
    ///
    /// Never fails: unknown tokens are literals, with one layer of matching
    /// surrounding quotes removed.
    pub fn resolve(&self, token: &str) -> String {
        if token == EMPTY_TOKEN {
            return String::new();
        }
        if let Some(value) = self.table().get(token) {
            return value.clone();
        }
        strip_quotes(token).to_string()
    }

    /// Whether `token` is a registered key
    pub fn contains(&self, token: &str) -> bool {
        token == EMPTY_TOKEN || self.table().contains_key(token)
    }

    /// Registered tokens in lexical order
    pub fn tokens(&self) -> Vec<&str> {
        let mut tokens: Vec<&str> = self.table().keys().map(String::as_str).collect();
        tokens.sort_unstable();
        tokens
    }

    /// Whether the table has been built yet
    pub fn is_built(&self) -> bool {
        self.table.get().is_some()
    }

    fn table(&self) -> &HashMap<String, String> {
        self.table.get_or_init(|| {
            let mut table = builtin_table();
            for (token, value) in &self.overrides {
                table.insert(token.clone(), value.clone());
            }
            debug!("Built credential table with {} tokens", table.len());
            table
        })
    }
}

fn builtin_table() -> HashMap<String, String> {
    let entries: [(&str, String); 17] = [
        ("valid_user", "testuser@example.com".into()),
        ("valid_password", "SecurePass123!".into()),
        ("unknown_user", "unknown@example.com".into()),
        ("wrong_password", "WrongPassword123".into()),
        ("password_with_typo", "SecurePass12".into()),
        ("any_password", "AnyPassword123".into()),
        (EMPTY_TOKEN, String::new()),
        ("minimal_length_user", "ab".into()),
        ("minimal_length_pass", "p1".into()),
        ("overlong_username", "u".repeat(OVERLONG_LEN)),
        ("overlong_password", "p".repeat(OVERLONG_LEN)),
        ("sql_injection_text", "' OR '1'='1".into()),
        ("script_tag_text", "<script>alert(\"xss\")</script>".into()),
        ("user.with.dots", "user.with.dots@example.com".into()),
        ("user+alias", "user+alias@example.com".into()),
        ("padded_valid_user", "  testuser@example.com  ".into()),
        ("padded_valid_password", "  SecurePass123!  ".into()),
    ];
    entries
        .into_iter()
        .map(|(token, value)| (token.to_string(), value))
        .collect()
}

/// Remove one layer of matching `"` or `'` quotes
pub fn strip_quotes(token: &str) -> &str {
    for quote in ['"', '\''] {
        if token.len() >= 2 && token.starts_with(quote) && token.ends_with(quote) {
            return &token[1..token.len() - 1];
        }
    }
    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_token() {
        let mut overrides = BTreeMap::new();
        overrides.insert(EMPTY_TOKEN.to_string(), "not empty".to_string());
        let registry = CredentialRegistry::with_overrides(overrides);
        assert_eq!(registry.resolve("empty"), "");
    }

    #[test]
    fn test_known_tokens_are_deterministic() {
        let registry = CredentialRegistry::new();
        for token in registry.tokens() {
            let first = registry.resolve(token);
            assert_eq!(first, registry.resolve(token), "token {}", token);
        }
        assert_eq!(registry.resolve("valid_user"), "testuser@example.com");
        assert_eq!(registry.resolve("overlong_password").len(), OVERLONG_LEN);
        assert_eq!(registry.resolve("minimal_length_user"), "ab");
    }

    #[test]
    fn test_table_built_lazily_once() {
        let registry = CredentialRegistry::new();
        assert!(!registry.is_built());
        registry.resolve("valid_user");
        assert!(registry.is_built());
        let first = registry.table() as *const _;
        registry.resolve("wrong_password");
        assert_eq!(first, registry.table() as *const _);
    }

    #[test]
    fn test_unknown_tokens_pass_through() {
        let registry = CredentialRegistry::new();
        assert_eq!(registry.resolve("hunter2"), "hunter2");
        assert_eq!(registry.resolve("\"hunter2\""), "hunter2");
        assert_eq!(registry.resolve("'hunter2'"), "hunter2");
        // only one layer
        assert_eq!(registry.resolve("\"\"x\"\""), "\"x\"");
        // unmatched quotes stay
        assert_eq!(registry.resolve("\"half"), "\"half");
        assert_eq!(registry.resolve("\""), "\"");
    }

    #[test]
    fn test_quoted_known_token_is_literal() {
        let registry = CredentialRegistry::new();
        assert_eq!(registry.resolve("\"valid_user\""), "valid_user");
    }

    #[test]
    fn test_overrides_extend_table() {
        let mut overrides = BTreeMap::new();
        overrides.insert("valid_user".to_string(), "qa@corp.test".to_string());
        overrides.insert("legacy_user".to_string(), "legacy".to_string());
        let registry = CredentialRegistry::with_overrides(overrides);
        assert_eq!(registry.resolve("valid_user"), "qa@corp.test");
        assert_eq!(registry.resolve("legacy_user"), "legacy");
        assert!(registry.contains("legacy_user"));
        assert_eq!(registry.resolve("valid_password"), "SecurePass123!");
    }

    #[test]
    fn test_injection_payloads_present() {
        let registry = CredentialRegistry::new();
        assert!(registry.resolve("sql_injection_text").contains("OR"));
        assert!(registry.resolve("script_tag_text").starts_with("<script>"));
    }
}
