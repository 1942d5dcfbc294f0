//! Query keys.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One component of a [`QueryKey`].
///
/// Map members are stored sorted by name, so two maps with the same
/// members compare equal regardless of construction order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPart {
    /// JSON `null`.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// String value.
    Str(String),
    /// String-keyed map of nested parts.
    Map(BTreeMap<String, Self>),
}

impl KeyPart {
    /// Builds a [`KeyPart::Map`], dropping members whose value is `None`.
    ///
    /// ```
    /// use moviedex_query::KeyPart;
    ///
    /// let a = KeyPart::map([("page", Some(KeyPart::from(1_u32))), ("region", None)]);
    /// let b = KeyPart::map([("page", Some(KeyPart::from(1_u32)))]);
    /// assert_eq!(a, b);
    /// ```
    pub fn map<'a, I>(members: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Option<Self>)>,
    {
        Self::Map(
            members
                .into_iter()
                .filter_map(|(name, value)| value.map(|v| (String::from(name), v)))
                .collect(),
        )
    }
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        Self::Str(String::from(value))
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for KeyPart {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for KeyPart {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u64> for KeyPart {
    /// Values above `i64::MAX` fall back to their decimal string form.
    fn from(value: u64) -> Self {
        i64::try_from(value).map_or_else(|_| Self::Str(value.to_string()), Self::Int)
    }
}

impl<T: Into<Self>> From<Option<T>> for KeyPart {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Ordered sequence of [`KeyPart`]s identifying one cached query.
///
/// Equality is structural and order-sensitive: `["SEARCH_MOVIES", "a"]`
/// and `["SEARCH_MOVIES", "b"]` are distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
#[allow(clippy::module_name_repetitions)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    /// Creates a key whose first part is the given namespace.
    #[must_use]
    pub fn new(namespace: &str) -> Self {
        Self(vec![KeyPart::from(namespace)])
    }

    /// Appends a part.
    #[must_use]
    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }

    /// Returns the parts of this key.
    #[must_use]
    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// Returns `true` if `prefix` is a leading subsequence of this key.
    ///
    /// A key is a prefix of itself.
    #[must_use]
    pub fn starts_with(&self, prefix: &Self) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl From<Vec<KeyPart>> for QueryKey {
    fn from(parts: Vec<KeyPart>) -> Self {
        Self(parts)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self.0),
        }
    }
}

/// Error returned when parsing a [`QueryKey`] from text.
#[derive(Debug, thiserror::Error)]
#[error("invalid query key: {0}")]
pub struct ParseKeyError(#[from] serde_json::Error);

impl FromStr for QueryKey {
    type Err = ParseKeyError;

    /// Parses either a JSON array (`["SEARCH_MOVIES","batman"]`) or a bare
    /// namespace (`SEARCH_MOVIES`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.starts_with('[') {
            Ok(serde_json::from_str(trimmed)?)
        } else {
            Ok(Self::new(trimmed))
        }
    }
}
