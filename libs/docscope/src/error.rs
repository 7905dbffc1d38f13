//! Error types for docscope.

use docscope_model::{EntityType, Subject};
use thiserror::Error;

/// Failures reported by a [`DocumentStore`](crate::store::DocumentStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database driver failed. Never retried here.
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    /// The local evaluator does not implement an operator.
    #[error("unsupported query operator: {0}")]
    UnsupportedOperator(String),

    /// An operator was given an operand of the wrong shape.
    #[error("invalid operand for {operator}: {reason}")]
    InvalidOperand { operator: String, reason: String },
}

impl StoreError {
    pub(crate) fn invalid_operand(operator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOperand {
            operator: operator.into(),
            reason: reason.into(),
        }
    }
}

/// Failures while resolving, compiling or matching rule conditions.
///
/// Unsatisfied conditions are never errors; the matcher returns `false` and
/// an empty rule set compiles to a selector that matches nothing.
#[derive(Debug, Error)]
pub enum ScopeError {
    /// A relation is declared without a target entity type.
    #[error("relation `{field}` on `{entity_type}` has no target type")]
    MissingRelationTarget {
        entity_type: EntityType,
        field: String,
    },

    /// A rule defined by an in-memory block cannot become a selector.
    #[error("rule for `{subject}` is defined by a block and cannot be compiled to a query")]
    UncompilableRule { subject: Subject },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to serialize entity: {0}")]
    Serialization(#[from] bson::ser::Error),

    #[error("failed to deserialize entity: {0}")]
    Deserialization(#[from] bson::de::Error),
}

/// Failures while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// The `defaults` table of an entity is not a valid document.
    #[error("invalid defaults for entity `{entity_type}`: {source}")]
    InvalidDefaults {
        entity_type: String,
        #[source]
        source: bson::ser::Error,
    },
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Load(Box::new(err))
    }
}
