//! Single-entity evaluation.
//!
//! Conditions are resolved exactly as for scope compilation. Direct clauses
//! go to the store's local matcher; embedded and sub-document clauses are
//! checked element by element.
//!
//! Embedded collections are quantified universally here: every element must
//! satisfy the condition. An empty or missing collection is judged by a blank
//! element, so a negative condition holds vacuously and a positive one fails.
//! A single sub-document stored in an embedded field never matches, as with
//! `$elemMatch`.
//!
//! A sole operator map on a relation (`{tags: {$not: {label: "A"}}}`) is a
//! literal field condition. It is evaluated against the stored value only; the
//! blank element is not consulted, so the negation holds for `tags: []` even
//! when the element type's defaults would match `{label: "A"}`. The compiled
//! selector behaves the same way.
//!
//! Plain sub-documents are walked like embedded collections, except that
//! positional conditions (`{"numbers.0": "one"}`) and arrays holding
//! non-document values are evaluated as dotted paths, the way the store reads
//! them.

use bson::{Bson, Document};
use docscope_model::{ConditionTree, EntityType};

use crate::error::ScopeError;
use crate::resolve::{RelationResolver, ResolvedClause, ResolvedConditions};
use crate::schema::Schema;
use crate::store::DocumentStore;

/// Evaluates conditions against one in-memory entity.
#[derive(Clone, Copy)]
pub struct DocumentMatcher<'a> {
    schema: &'a dyn Schema,
    store: &'a dyn DocumentStore,
    resolver: RelationResolver<'a>,
}

impl<'a> DocumentMatcher<'a> {
    #[must_use]
    pub fn new(schema: &'a dyn Schema, store: &'a dyn DocumentStore) -> Self {
        Self {
            schema,
            store,
            resolver: RelationResolver::new(schema, store),
        }
    }

    /// Returns `true` if `entity` satisfies `conditions`.
    ///
    /// The entity need not be persisted.
    ///
    /// # Errors
    ///
    /// Configuration and store errors propagate; unsatisfied conditions are
    /// `Ok(false)`.
    #[tracing::instrument(skip_all, fields(entity_type = %entity_type))]
    pub async fn matches(
        &self,
        entity_type: &EntityType,
        conditions: &ConditionTree,
        entity: &Document,
    ) -> Result<bool, ScopeError> {
        let resolved = self.resolver.resolve(entity_type, conditions).await?;
        self.matches_resolved(entity_type, &resolved, entity)
    }

    /// Evaluate already resolved conditions.
    ///
    /// # Errors
    ///
    /// Propagates local matcher errors.
    pub fn matches_resolved(
        &self,
        entity_type: &EntityType,
        resolved: &ResolvedConditions,
        entity: &Document,
    ) -> Result<bool, ScopeError> {
        if !self
            .store
            .local_match(entity_type, &resolved.direct_selector(), entity)?
        {
            return Ok(false);
        }
        for clause in resolved {
            let satisfied = match clause {
                ResolvedClause::Embedded {
                    field,
                    element_type,
                    condition,
                } => self.every_embedded(element_type, condition, entity.get(field.as_str()))?,
                ResolvedClause::Path { field, condition } => {
                    let value = entity.get(field.as_str());
                    if is_positional(condition, value) {
                        let selector = ResolvedConditions::new(vec![clause.clone()]).to_selector();
                        self.store.local_match(entity_type, &selector, entity)?
                    } else {
                        self.every_sub_document(entity_type, condition, value)?
                    }
                }
                ResolvedClause::Field { .. } | ResolvedClause::ForeignKey { .. } => true,
            };
            if !satisfied {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn every_embedded(
        &self,
        element_type: &EntityType,
        condition: &ResolvedConditions,
        value: Option<&Bson>,
    ) -> Result<bool, ScopeError> {
        match value.filter(|v| !is_empty_value(v)) {
            None => {
                let blank = self.schema.blank_instance(element_type);
                self.matches_resolved(element_type, condition, &blank)
            }
            Some(Bson::Array(items)) => self.every_item(element_type, condition, items),
            Some(_) => Ok(false),
        }
    }

    fn every_sub_document(
        &self,
        entity_type: &EntityType,
        condition: &ResolvedConditions,
        value: Option<&Bson>,
    ) -> Result<bool, ScopeError> {
        match value.filter(|v| !is_empty_value(v)) {
            None => self.matches_resolved(entity_type, condition, &Document::new()),
            Some(Bson::Array(items)) => self.every_item(entity_type, condition, items),
            Some(Bson::Document(element)) => self.matches_resolved(entity_type, condition, element),
            Some(_) => Ok(false),
        }
    }

    fn every_item(
        &self,
        element_type: &EntityType,
        condition: &ResolvedConditions,
        items: &[Bson],
    ) -> Result<bool, ScopeError> {
        for item in items {
            let Bson::Document(element) = item else {
                return Ok(false);
            };
            if !self.matches_resolved(element_type, condition, element)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Whether a sub-document condition has to be read as a dotted path: it
/// addresses an array position, or the stored value is neither a document nor
/// an array of documents.
fn is_positional(condition: &ResolvedConditions, value: Option<&Bson>) -> bool {
    let indexed = condition.iter().any(|clause| match clause {
        ResolvedClause::Field { field, .. }
        | ResolvedClause::Path { field, .. }
        | ResolvedClause::Embedded { field, .. }
        | ResolvedClause::ForeignKey { field, .. } => field.parse::<usize>().is_ok(),
    });
    indexed
        || match value {
            None | Some(Bson::Null | Bson::Document(_)) => false,
            Some(Bson::Array(items)) => items.iter().any(|item| !matches!(item, Bson::Document(_))),
            Some(_) => true,
        }
}

fn is_empty_value(value: &Bson) -> bool {
    match value {
        Bson::Null => true,
        Bson::Array(items) => items.is_empty(),
        _ => false,
    }
}
