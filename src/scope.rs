//! Scope vocabulary and set algebra.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A scope token that does not belong to the registered vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown scope '{0}'")]
pub struct UnknownScope(pub String);

/// A named capability gating access to a resource category.
///
/// The vocabulary is fixed at compile time; configuration may attach
/// display names but never extend the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scope {
    #[serde(rename = "yandex-home")]
    YandexHome,
    #[serde(rename = "yandex-dialogs")]
    YandexDialogs,
}

impl Scope {
    pub const ALL: [Scope; 2] = [Scope::YandexHome, Scope::YandexDialogs];

    /// Canonical name used in scope strings and token claims.
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::YandexHome => "yandex-home",
            Scope::YandexDialogs => "yandex-dialogs",
        }
    }
}

impl FromStr for Scope {
    type Err = UnknownScope;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yandex-home" => Ok(Scope::YandexHome),
            "yandex-dialogs" => Ok(Scope::YandexDialogs),
            _ => Err(UnknownScope(s.to_string())),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of canonical scopes.
///
/// Backed by a `BTreeSet` so `Display` output is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeSet(BTreeSet<Scope>);

impl ScopeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a comma/semicolon/whitespace separated scope string.
    ///
    /// Tokens are matched case-insensitively against the vocabulary; any
    /// unrecognized token is a hard error, never silently dropped.
    pub fn parse(text: &str) -> Result<Self, UnknownScope> {
        let mut set = BTreeSet::new();
        for word in text
            .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .filter(|w| !w.is_empty())
        {
            set.insert(word.parse::<Scope>()?);
        }
        Ok(ScopeSet(set))
    }

    pub fn insert(&mut self, scope: Scope) {
        self.0.insert(scope);
    }

    pub fn contains(&self, scope: Scope) -> bool {
        self.0.contains(&scope)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Scope> + '_ {
        self.0.iter().copied()
    }

    /// True iff every member of `required` is present in `self`.
    ///
    /// When `required` is empty the result is `allow_empty`.
    pub fn test(&self, required: &ScopeSet, allow_empty: bool) -> bool {
        if required.is_empty() {
            return allow_empty;
        }
        required.0.is_subset(&self.0)
    }

    /// True iff both sets hold exactly the same scopes.
    pub fn same(&self, other: &ScopeSet) -> bool {
        self.0 == other.0
    }
}

impl FromIterator<Scope> for ScopeSet {
    fn from_iter<I: IntoIterator<Item = Scope>>(iter: I) -> Self {
        ScopeSet(iter.into_iter().collect())
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, scope) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(scope.as_str())?;
        }
        Ok(())
    }
}
