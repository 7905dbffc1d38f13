use std::collections::HashMap;

use bson::Document;
use docscope_model::{EntityType, RelationMetadata, Relations};

use crate::config::DocScopeConfig;
use crate::error::ConfigError;

/// Read-only relation metadata for entity types.
///
/// An entity type the schema does not know has no relations; its condition
/// keys are treated as literal fields.
pub trait Schema: Send + Sync {
    /// All relations of `entity_type`, keyed by field name.
    fn relations_of(&self, entity_type: &EntityType) -> Option<&Relations>;

    /// A single relation of `entity_type`.
    fn relation(&self, entity_type: &EntityType, field: &str) -> Option<&RelationMetadata> {
        self.relations_of(entity_type)
            .and_then(|relations| relations.get(field))
    }

    /// A freshly constructed, never persisted instance of `entity_type`.
    ///
    /// Used to decide whether a condition on an empty embedded collection
    /// holds vacuously.
    fn blank_instance(&self, _entity_type: &EntityType) -> Document {
        Document::new()
    }
}

#[derive(Clone, Debug, Default)]
struct EntitySchema {
    relations: Relations,
    defaults: Document,
}

/// A [`Schema`] built up front, from code or configuration.
///
/// # Examples
///
/// ```
/// use docscope::schema::{Schema, StaticSchema};
/// use docscope_model::{EntityType, RelationMetadata};
///
/// let schema = StaticSchema::new()
///     .with_relation("Project", "category", RelationMetadata::foreign_key("Category"));
///
/// let project = EntityType::new("Project");
/// assert!(schema.relation(&project, "category").is_some());
/// assert!(schema.relation(&project, "title").is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct StaticSchema {
    entities: HashMap<EntityType, EntitySchema>,
}

impl StaticSchema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the schema from the `entities` section of the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidDefaults` if an entity's defaults cannot
    /// be represented as a document.
    pub fn from_config(config: &DocScopeConfig) -> Result<Self, ConfigError> {
        let mut schema = Self::new();
        for (name, entity) in &config.entities {
            let defaults = entity.defaults_document(name)?;
            schema.entities.insert(
                EntityType::new(name.as_str()),
                EntitySchema {
                    relations: entity.relations.clone(),
                    defaults,
                },
            );
        }
        Ok(schema)
    }

    /// Declare a relation on `entity_type`.
    #[must_use]
    pub fn with_relation(
        mut self,
        entity_type: impl Into<EntityType>,
        field: impl Into<String>,
        relation: RelationMetadata,
    ) -> Self {
        self.entities
            .entry(entity_type.into())
            .or_default()
            .relations
            .insert(field.into(), relation);
        self
    }

    /// Set the field values of a blank `entity_type` instance.
    #[must_use]
    pub fn with_defaults(mut self, entity_type: impl Into<EntityType>, defaults: Document) -> Self {
        self.entities.entry(entity_type.into()).or_default().defaults = defaults;
        self
    }
}

impl Schema for StaticSchema {
    fn relations_of(&self, entity_type: &EntityType) -> Option<&Relations> {
        self.entities.get(entity_type).map(|entity| &entity.relations)
    }

    fn blank_instance(&self, entity_type: &EntityType) -> Document {
        self.entities
            .get(entity_type)
            .map(|entity| entity.defaults.clone())
            .unwrap_or_default()
    }
}
