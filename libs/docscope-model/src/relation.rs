use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::EntityType;

/// Suffix appended to a relation name to derive its default foreign key field.
pub const FOREIGN_KEY_SUFFIX: &str = "_id";

/// Relations of one entity type, keyed by field name.
pub type Relations = BTreeMap<String, RelationMetadata>;

/// How a related entity is stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Stored inside the parent document.
    Embedded,
    /// Stored in its own collection and referenced by identifier.
    ForeignKey,
}

/// Schema information for one relation field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationMetadata {
    pub kind: RelationKind,
    /// Type of the related entity. Required for resolution.
    #[serde(default)]
    pub target_type: Option<EntityType>,
    /// Field holding the identifier. Defaults to `<relation>_id`.
    #[serde(default)]
    pub foreign_key: Option<String>,
}

impl RelationMetadata {
    /// An embedded relation to `target`.
    #[must_use]
    pub fn embedded(target: impl Into<EntityType>) -> Self {
        Self {
            kind: RelationKind::Embedded,
            target_type: Some(target.into()),
            foreign_key: None,
        }
    }

    /// A foreign-key relation to `target` using the default key field.
    #[must_use]
    pub fn foreign_key(target: impl Into<EntityType>) -> Self {
        Self {
            kind: RelationKind::ForeignKey,
            target_type: Some(target.into()),
            foreign_key: None,
        }
    }

    /// Override the foreign key field name.
    #[must_use]
    pub fn with_foreign_key(mut self, field: impl Into<String>) -> Self {
        self.foreign_key = Some(field.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn is_embedded(&self) -> bool {
        self.kind == RelationKind::Embedded
    }

    #[inline]
    #[must_use]
    pub fn target_type(&self) -> Option<&EntityType> {
        self.target_type.as_ref()
    }

    /// The field that stores identifiers of the related entity.
    #[must_use]
    pub fn foreign_key_name(&self, relation: &str) -> String {
        self.foreign_key
            .clone()
            .unwrap_or_else(|| format!("{relation}{FOREIGN_KEY_SUFFIX}"))
    }
}
