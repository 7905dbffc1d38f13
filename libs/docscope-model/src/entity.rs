use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of a document type known to the schema (e.g. `"Project"`).
///
/// Entity types are compared by name only. The schema decides which
/// collection backs a type and which of its fields are relations.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(String);

impl EntityType {
    /// Create an entity type reference.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The type name.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityType {
    #[inline]
    fn from(name: &str) -> Self {
        Self(name.to_owned())
    }
}

impl From<String> for EntityType {
    #[inline]
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for EntityType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
