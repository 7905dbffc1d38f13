use std::collections::HashMap;

use async_trait::async_trait;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use docscope_model::{EntityType, ID_FIELD, Selector};
use futures::StreamExt;
use parking_lot::RwLock;

use super::{DocumentStore, DocumentStream, LocalMatcher};
use crate::error::StoreError;

/// Collections held in memory, queried with [`LocalMatcher`].
///
/// Backs tests and offline evaluation.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<EntityType, Vec<Document>>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `doc`, assigning an object id when it has none. Returns the id.
    pub fn insert(&self, entity_type: impl Into<EntityType>, mut doc: Document) -> Bson {
        let id = match doc.get(ID_FIELD) {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                doc.insert(ID_FIELD, id.clone());
                id
            }
        };
        self.collections
            .write()
            .entry(entity_type.into())
            .or_default()
            .push(doc);
        id
    }

    /// Number of stored `entity_type` entities.
    #[must_use]
    pub fn count(&self, entity_type: &EntityType) -> usize {
        self.collections.read().get(entity_type).map_or(0, Vec::len)
    }

    /// Snapshot of every stored `entity_type` entity, in insertion order.
    #[must_use]
    pub fn all(&self, entity_type: &EntityType) -> Vec<Document> {
        self.collections
            .read()
            .get(entity_type)
            .cloned()
            .unwrap_or_default()
    }

    fn matching(
        &self,
        entity_type: &EntityType,
        selector: &Selector,
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read();
        let Some(docs) = collections.get(entity_type) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for doc in docs {
            if LocalMatcher::matches(selector.as_document(), doc)? {
                out.push(doc.clone());
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn distinct_ids(
        &self,
        entity_type: &EntityType,
        selector: &Selector,
    ) -> Result<Vec<Bson>, StoreError> {
        let mut ids: Vec<Bson> = Vec::new();
        for doc in self.matching(entity_type, selector)? {
            if let Some(id) = doc.get(ID_FIELD)
                && !ids.contains(id)
            {
                ids.push(id.clone());
            }
        }
        Ok(ids)
    }

    async fn find(
        &self,
        entity_type: &EntityType,
        selector: &Selector,
    ) -> Result<DocumentStream, StoreError> {
        let docs = self.matching(entity_type, selector)?;
        Ok(futures::stream::iter(docs.into_iter().map(Ok)).boxed())
    }
}
