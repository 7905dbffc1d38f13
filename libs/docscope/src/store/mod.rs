//! Storage collaborator contract and reference stores.

mod local;
mod memory;
mod mongo;

pub use local::LocalMatcher;
pub use memory::InMemoryStore;
pub use mongo::MongoStore;

use async_trait::async_trait;
use bson::{Bson, Document};
use docscope_model::{EntityType, Selector};
use futures::stream::BoxStream;

use crate::error::StoreError;

/// Lazy sequence of documents returned by [`DocumentStore::find`].
pub type DocumentStream = BoxStream<'static, Result<Document, StoreError>>;

/// Access to stored entities.
///
/// ```ignore
/// let ids = store.distinct_ids(&category, &selector).await?;
/// let allowed = store.local_match(&project, &selector, &entity)?;
/// ```
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Distinct identifiers of `entity_type` entities matching `selector`.
    ///
    /// # Errors
    ///
    /// Propagates store failures unchanged.
    async fn distinct_ids(
        &self,
        entity_type: &EntityType,
        selector: &Selector,
    ) -> Result<Vec<Bson>, StoreError>;

    /// All `entity_type` entities matching `selector`.
    ///
    /// # Errors
    ///
    /// Propagates store failures unchanged.
    async fn find(
        &self,
        entity_type: &EntityType,
        selector: &Selector,
    ) -> Result<DocumentStream, StoreError>;

    /// Evaluate `selector` against one in-memory entity without a round trip.
    ///
    /// # Errors
    ///
    /// - `UnsupportedOperator` if the selector uses an operator that cannot be
    ///   evaluated locally
    /// - `InvalidOperand` for malformed operator operands
    fn local_match(
        &self,
        _entity_type: &EntityType,
        selector: &Selector,
        entity: &Document,
    ) -> Result<bool, StoreError> {
        LocalMatcher::matches(selector.as_document(), entity)
    }
}
