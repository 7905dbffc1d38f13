//! Entry point for callers: scopes over stored entities and checks on single
//! entities, for raw documents or for types implementing [`Queryable`].

use std::sync::Arc;

use bson::Document;
use docscope_model::{EntityType, Rule, RuleConditions, Selector};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::compile::ScopeCompiler;
use crate::error::ScopeError;
use crate::matcher::DocumentMatcher;
use crate::schema::Schema;
use crate::store::{DocumentStore, DocumentStream};

/// A type stored as entities of one entity type.
///
/// ```
/// use docscope::Queryable;
/// use docscope_model::EntityType;
///
/// struct Project;
///
/// impl Queryable for Project {
///     fn entity_type() -> EntityType {
///         EntityType::new("Project")
///     }
/// }
/// ```
pub trait Queryable {
    fn entity_type() -> EntityType;
}

/// Compiles and evaluates rules against a schema and a store.
#[derive(Clone)]
pub struct Authorizer {
    schema: Arc<dyn Schema>,
    store: Arc<dyn DocumentStore>,
}

impl Authorizer {
    #[must_use]
    pub fn new(schema: Arc<dyn Schema>, store: Arc<dyn DocumentStore>) -> Self {
        Self { schema, store }
    }

    #[must_use]
    pub fn compiler(&self) -> ScopeCompiler<'_> {
        ScopeCompiler::new(self.schema.as_ref(), self.store.as_ref())
    }

    #[must_use]
    pub fn matcher(&self) -> DocumentMatcher<'_> {
        DocumentMatcher::new(self.schema.as_ref(), self.store.as_ref())
    }

    /// Selector for every `entity_type` entity the rules allow.
    ///
    /// # Errors
    ///
    /// See [`ScopeCompiler::compile`].
    pub async fn scope(&self, entity_type: &EntityType, rules: &[Rule]) -> Result<Selector, ScopeError> {
        self.compiler().compile(entity_type, rules).await
    }

    /// Every stored `entity_type` entity the rules allow.
    ///
    /// # Errors
    ///
    /// Compilation errors, or store failures when starting the query.
    pub async fn accessible_documents(
        &self,
        entity_type: &EntityType,
        rules: &[Rule],
    ) -> Result<DocumentStream, ScopeError> {
        let selector = self.scope(entity_type, rules).await?;
        Ok(self.store.find(entity_type, &selector).await?)
    }

    /// Returns `true` if the rules allow acting on `entity`.
    ///
    /// Some applicable allow rule must match (an unconditional allow always
    /// does) and no applicable deny rule may match. Block rules are evaluated
    /// here even though they cannot be compiled to a scope.
    ///
    /// A lone deny rule carrying a prebuilt scope is the one case where the two
    /// paths part: [`scope`](Self::scope) returns that selector verbatim, while
    /// this check finds no allow rule and returns `false`.
    ///
    /// # Errors
    ///
    /// Configuration and store errors propagate.
    #[tracing::instrument(skip_all, fields(entity_type = %entity_type, rules = rules.len()))]
    pub async fn can(
        &self,
        entity_type: &EntityType,
        rules: &[Rule],
        entity: &Document,
    ) -> Result<bool, ScopeError> {
        let mut allowed = false;
        for rule in rules.iter().filter(|rule| rule.applies_to(entity_type)) {
            if rule.is_allow() {
                if !allowed {
                    allowed = self.rule_matches(entity_type, rule, entity).await?;
                }
            } else if self.rule_matches(entity_type, rule, entity).await? {
                debug!(subject = %rule.subject(), "denied by rule");
                return Ok(false);
            }
        }
        Ok(allowed)
    }

    async fn rule_matches(
        &self,
        entity_type: &EntityType,
        rule: &Rule,
        entity: &Document,
    ) -> Result<bool, ScopeError> {
        match rule.conditions() {
            RuleConditions::Tree(tree) => self.matcher().matches(entity_type, tree, entity).await,
            RuleConditions::Scope(scope) => Ok(self.store.local_match(entity_type, scope, entity)?),
            RuleConditions::Predicate(predicate) => Ok(predicate.test(entity)),
        }
    }

    /// Typed [`accessible_documents`](Self::accessible_documents).
    ///
    /// # Errors
    ///
    /// As for `accessible_documents`; each item fails with `Deserialization`
    /// if a stored document does not fit `T`.
    pub async fn accessible<T>(
        &self,
        rules: &[Rule],
    ) -> Result<BoxStream<'static, Result<T, ScopeError>>, ScopeError>
    where
        T: Queryable + DeserializeOwned + Send + 'static,
    {
        let docs = self.accessible_documents(&T::entity_type(), rules).await?;
        Ok(docs
            .map(|item| {
                item.map_err(ScopeError::from)
                    .and_then(|doc| bson::from_document::<T>(doc).map_err(ScopeError::from))
            })
            .boxed())
    }

    /// Typed [`can`](Self::can).
    ///
    /// # Errors
    ///
    /// `Serialization` if `entity` has no document form, otherwise as for `can`.
    pub async fn can_access<T>(&self, rules: &[Rule], entity: &T) -> Result<bool, ScopeError>
    where
        T: Queryable + Serialize + Sync,
    {
        let doc = bson::to_document(entity)?;
        self.can(&T::entity_type(), rules, &doc).await
    }
}
