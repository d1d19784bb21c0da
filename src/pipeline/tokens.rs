//! The immutable token map shared by every templating task.

use crate::pipeline::env::EnvironmentView;
use crate::pipeline::name::ProductName;
use std::collections::BTreeMap;

/// Immutable mapping from token key to resolved string value.
///
/// Built once per run and shared read-only by every templating step, which
/// guarantees all generated outputs in one run reference the same names.
/// Backed by a `BTreeMap` so iteration order is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TokenMap {
    map: BTreeMap<String, String>,
}

impl TokenMap {
    /// Builds the token map for one run.
    ///
    /// Merges, in increasing precedence: the configured static tokens, the
    /// environment-derived `user` token, and the three product name fields
    /// (`finalName`, `lowerName`, `upperName`). Collisions are not an
    /// error - the higher-precedence source wins.
    pub fn build(
        product: &ProductName,
        env: &EnvironmentView,
        statics: &BTreeMap<String, String>,
    ) -> Self {
        let mut map = statics.clone();
        map.insert("user".to_string(), env.home().display().to_string());
        map.insert("finalName".to_string(), product.display().to_string());
        map.insert("lowerName".to_string(), product.normalized().to_string());
        map.insert("upperName".to_string(), product.upper().to_string());
        Self { map }
    }

    /// Looks up a token value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    /// Returns a copy extended with additional tokens (copy-on-extend).
    ///
    /// The original map is left untouched; extension entries win on
    /// collision.
    pub fn extended<I, K, V>(&self, extra: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = self.map.clone();
        for (key, value) in extra {
            map.insert(key.into(), value.into());
        }
        Self { map }
    }

    /// Iterates over `(key, value)` pairs in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of tokens.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true when the map holds no tokens.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
