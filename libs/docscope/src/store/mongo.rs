use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bson::{Bson, Document, doc};
use docscope_model::{EntityType, ID_FIELD, Selector};
use futures::{StreamExt, TryStreamExt};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use tracing::{debug, info};

use super::{DocumentStore, DocumentStream};
use crate::config::MongoConfig;
use crate::error::StoreError;

/// [`DocumentStore`] backed by a `MongoDB` database.
///
/// Each entity type lives in its own collection, named after the type unless
/// configured otherwise. Local matching goes through
/// [`LocalMatcher`](super::LocalMatcher), since the driver has none.
#[derive(Clone, Debug)]
pub struct MongoStore {
    database: Database,
    collections: BTreeMap<EntityType, String>,
}

impl MongoStore {
    /// Connect and verify the connection with a `ping`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the connection string is invalid or
    /// no server answers within the selection timeout.
    pub async fn connect(config: &MongoConfig) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(&config.uri).await?;
        options.app_name.clone_from(&config.app_name);
        options.server_selection_timeout =
            Some(Duration::from_millis(config.server_selection_timeout_ms));

        let client = Client::with_options(options)?;
        let database = client.database(&config.database);
        database.run_command(doc! { "ping": 1 }).await?;

        info!(database = %config.database, "connected to MongoDB");
        Ok(Self::new(database))
    }

    #[must_use]
    pub fn new(database: Database) -> Self {
        Self {
            database,
            collections: BTreeMap::new(),
        }
    }

    /// Override collection names per entity type.
    #[must_use]
    pub fn with_collections(mut self, collections: BTreeMap<EntityType, String>) -> Self {
        self.collections.extend(collections);
        self
    }

    fn collection(&self, entity_type: &EntityType) -> Collection<Document> {
        let name = self
            .collections
            .get(entity_type)
            .map_or(entity_type.as_str(), String::as_str);
        self.database.collection(name)
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn distinct_ids(
        &self,
        entity_type: &EntityType,
        selector: &Selector,
    ) -> Result<Vec<Bson>, StoreError> {
        let ids = self
            .collection(entity_type)
            .distinct(ID_FIELD, selector.as_document().clone())
            .await?;
        debug!(entity_type = %entity_type, count = ids.len(), "distinct ids");
        Ok(ids)
    }

    async fn find(
        &self,
        entity_type: &EntityType,
        selector: &Selector,
    ) -> Result<DocumentStream, StoreError> {
        let cursor = self
            .collection(entity_type)
            .find(selector.as_document().clone())
            .await?;
        Ok(cursor.map_err(StoreError::from).boxed())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use mongodb::options::ServerAddress;

    fn offline_database() -> Database {
        let options = ClientOptions::builder()
            .hosts(vec![ServerAddress::Tcp {
                host: "localhost".to_owned(),
                port: Some(27017),
            }])
            .build();
        Client::with_options(options).unwrap().database("docscope")
    }

    #[tokio::test]
    async fn collection_names_default_to_entity_type() {
        let store = MongoStore::new(offline_database()).with_collections(BTreeMap::from([(
            EntityType::new("Project"),
            "projects".to_owned(),
        )]));

        assert_eq!(store.collection(&EntityType::new("Project")).name(), "projects");
        assert_eq!(store.collection(&EntityType::new("Post")).name(), "Post");
    }
}
