#![allow(dead_code)]

use std::sync::Arc;

use bson::{Bson, Document, doc};
use docscope::{Authorizer, DocumentStore, InMemoryStore, StaticSchema};
use docscope_model::{EntityType, ID_FIELD, RelationMetadata, Rule};
use futures::TryStreamExt;

pub const PROJECT: &str = "Project";
pub const SUB_PROJECT: &str = "SubProject";
pub const CATEGORY: &str = "Category";
pub const POST: &str = "Post";
pub const OWNER: &str = "Owner";

/// Projects belong to categories, sub-projects to projects, and posts to
/// owners; posts embed their tags.
pub fn schema() -> StaticSchema {
    StaticSchema::new()
        .with_relation(PROJECT, "category", RelationMetadata::foreign_key(CATEGORY))
        .with_relation(SUB_PROJECT, "project", RelationMetadata::foreign_key(PROJECT))
        .with_relation(POST, "owner", RelationMetadata::foreign_key(OWNER))
        .with_relation(POST, "tags", RelationMetadata::embedded("PostTag"))
}

pub struct Fixture {
    pub store: Arc<InMemoryStore>,
    pub authorizer: Authorizer,
}

impl Fixture {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());

        let public = store.insert(CATEGORY, doc! { "name": "Public", "visible": true });
        let secret = store.insert(CATEGORY, doc! { "name": "Secret", "visible": false });

        let sir = store.insert(
            PROJECT,
            doc! { "title": "Sir", "bar": 1, "numbers": ["one", "two"], "age": 50, "category_id": public },
        );
        let lord = store.insert(
            PROJECT,
            doc! { "title": "Lord", "bar": 2, "numbers": ["three"], "age": 30, "category_id": secret },
        );
        store.insert(PROJECT, doc! { "title": "Sir", "bar": 3, "numbers": [], "age": 60 });

        store.insert(SUB_PROJECT, doc! { "name": "a", "project_id": sir });
        store.insert(SUB_PROJECT, doc! { "name": "b", "project_id": lord });
        store.insert(SUB_PROJECT, doc! { "name": "orphan" });

        let x = store.insert(OWNER, doc! { "name": "X" });
        let y = store.insert(OWNER, doc! { "name": "Y" });

        store.insert(POST, doc! { "owner_id": x.clone(), "tags": [{ "label": "A" }] });
        store.insert(POST, doc! { "owner_id": y, "tags": [{ "label": "B" }] });
        store.insert(POST, doc! { "owner_id": x, "tags": [] });
        store.insert(POST, doc! { "title": "untagged" });

        let authorizer = Authorizer::new(Arc::new(schema()), store.clone());
        Self { store, authorizer }
    }

    /// Ids returned by running the compiled scope.
    pub async fn scoped_ids(&self, entity_type: &str, rules: &[Rule]) -> Vec<Bson> {
        let ty = EntityType::new(entity_type);
        let selector = self.authorizer.scope(&ty, rules).await.unwrap();
        let docs: Vec<Document> = self
            .store
            .find(&ty, &selector)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        ids(&docs)
    }

    /// Ids of stored entities the matcher allows, one check per entity.
    pub async fn matched_ids(&self, entity_type: &str, rules: &[Rule]) -> Vec<Bson> {
        let ty = EntityType::new(entity_type);
        let mut allowed = Vec::new();
        for doc in self.store.all(&ty) {
            if self.authorizer.can(&ty, rules, &doc).await.unwrap() {
                allowed.push(doc);
            }
        }
        ids(&allowed)
    }

    pub async fn assert_equivalent(&self, entity_type: &str, rules: &[Rule]) -> Vec<Bson> {
        let scoped = self.scoped_ids(entity_type, rules).await;
        let matched = self.matched_ids(entity_type, rules).await;
        assert_eq!(scoped, matched, "scope and matcher disagree for {rules:?}");
        scoped
    }

    pub fn count(&self, entity_type: &str) -> usize {
        self.store.count(&EntityType::new(entity_type))
    }
}

pub fn ids(docs: &[Document]) -> Vec<Bson> {
    docs.iter()
        .filter_map(|doc| doc.get(ID_FIELD).cloned())
        .collect()
}
