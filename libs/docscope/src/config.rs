//! Configuration for docscope.
//!
//! Loaded from an optional YAML file, then overridden by `DOCSCOPE__*`
//! environment variables (`DOCSCOPE__MONGO__DATABASE=app` sets `mongo.database`).

use std::collections::BTreeMap;
use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use serde::Deserialize;

use docscope_model::{EntityType, Relations};

use crate::error::ConfigError;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "DOCSCOPE__";

const ENV_SEPARATOR: &str = "__";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocScopeConfig {
    /// Connection settings for [`MongoStore`](crate::store::MongoStore).
    pub mongo: MongoConfig,

    /// Per-entity schema, keyed by entity type name.
    pub entities: BTreeMap<String, EntityConfig>,
}

impl DocScopeConfig {
    /// Load configuration from `path` (if any) and the environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` if the file cannot be read or does not
    /// match the expected shape.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split(ENV_SEPARATOR));
        Ok(figment.extract()?)
    }

    /// Parse configuration from a YAML string, without environment overrides.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Load` on malformed input.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(Figment::from(Yaml::string(yaml)).extract()?)
    }

    /// Collection name for each configured entity type.
    #[must_use]
    pub fn collection_names(&self) -> BTreeMap<EntityType, String> {
        self.entities
            .iter()
            .filter_map(|(name, entity)| {
                entity
                    .collection
                    .as_ref()
                    .map(|collection| (EntityType::new(name.as_str()), collection.clone()))
            })
            .collect()
    }
}

/// `MongoDB` connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MongoConfig {
    /// Connection string.
    pub uri: String,

    /// Database holding the entity collections.
    pub database: String,

    /// Application name reported to the server.
    pub app_name: Option<String>,

    /// How long to wait for a suitable server before failing a request.
    pub server_selection_timeout_ms: u64,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_owned(),
            database: "docscope".to_owned(),
            app_name: Some("docscope".to_owned()),
            server_selection_timeout_ms: 3000,
        }
    }
}

/// Schema of one entity type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntityConfig {
    /// Collection name; the entity type name when omitted.
    pub collection: Option<String>,

    /// Relations keyed by field name.
    pub relations: Relations,

    /// Field values of a freshly constructed instance.
    pub defaults: serde_json::Map<String, serde_json::Value>,
}

impl EntityConfig {
    /// The `defaults` table as a document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidDefaults` if a value has no document form.
    pub fn defaults_document(&self, entity_type: &str) -> Result<bson::Document, ConfigError> {
        bson::to_document(&self.defaults).map_err(|source| ConfigError::InvalidDefaults {
            entity_type: entity_type.to_owned(),
            source,
        })
    }
}
