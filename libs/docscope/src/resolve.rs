//! Relation resolution.
//!
//! Rewrites conditions that traverse relations into clauses the store can
//! evaluate against a single collection:
//!
//! - embedded relation: `{tags: {label: "A"}}` becomes `{tags: {$elemMatch: {label: "A"}}}`
//! - foreign key: `{owner: {name: "X"}}` becomes `{owner_id: {$in: [..ids of owners named X..]}}`,
//!   after a sub-query against the related type
//! - plain sub-document: `{meta: {a: 1}}` becomes `{"meta.a": 1}`
//!
//! The scope compiler and the document matcher share the resolved form, so
//! the two evaluations never see different conditions.

use bson::{Bson, Document};
use docscope_model::{ConditionTree, ConditionValue, EntityType, Operator, RelationKind, Selector};
use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::debug;

use crate::error::ScopeError;
use crate::normalize::normalize;
use crate::schema::Schema;
use crate::store::DocumentStore;

/// One resolved condition.
#[derive(Clone, Debug, PartialEq)]
pub enum ResolvedClause {
    /// A literal field condition, emitted as written.
    Field { field: String, value: ConditionValue },
    /// Conditions inside a sub-document that is not a relation.
    Path {
        field: String,
        condition: ResolvedConditions,
    },
    /// Conditions on elements of an embedded collection.
    Embedded {
        field: String,
        element_type: EntityType,
        condition: ResolvedConditions,
    },
    /// Membership of a foreign key in a resolved identifier set.
    ForeignKey { field: String, ids: Vec<Bson> },
}

impl ResolvedClause {
    /// Store-native `(key, condition)` pairs for this clause.
    fn emit(&self, out: &mut Vec<(String, Bson)>) {
        match self {
            Self::Field { field, value } => out.push((field.clone(), value.to_bson())),
            Self::Path { field, condition } => {
                let mut inner = Vec::new();
                for clause in condition.iter() {
                    clause.emit(&mut inner);
                }
                out.extend(
                    inner
                        .into_iter()
                        .map(|(key, value)| (format!("{field}.{key}"), value)),
                );
            }
            Self::Embedded {
                field, condition, ..
            } => {
                let elem_match = Operator::ElemMatch.token();
                let mut matcher = Document::new();
                matcher.insert(elem_match, condition.to_document());
                out.push((field.clone(), Bson::Document(matcher)));
            }
            Self::ForeignKey { field, ids } => {
                let mut membership = Document::new();
                membership.insert(Operator::In.token(), Bson::Array(ids.clone()));
                out.push((field.clone(), Bson::Document(membership)));
            }
        }
    }
}

/// Conditions with every relation resolved.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResolvedConditions {
    clauses: Vec<ResolvedClause>,
}

impl ResolvedConditions {
    #[must_use]
    pub fn new(clauses: Vec<ResolvedClause>) -> Self {
        Self { clauses }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResolvedClause> {
        self.clauses.iter()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// The store-native form of all clauses.
    ///
    /// Clauses are merged into one document. If two clauses target the same
    /// key, each clause becomes its own `$and` operand instead.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let mut pairs = Vec::new();
        for clause in &self.clauses {
            clause.emit(&mut pairs);
        }
        let mut merged = Document::new();
        let mut collided = false;
        for (key, value) in &pairs {
            if merged.insert(key.clone(), value.clone()).is_some() {
                collided = true;
                break;
            }
        }
        if !collided {
            return merged;
        }
        let operands: Vec<Bson> = pairs
            .into_iter()
            .map(|(key, value)| {
                let mut single = Document::new();
                single.insert(key, value);
                Bson::Document(single)
            })
            .collect();
        let mut conjunction = Document::new();
        conjunction.insert(Operator::And.token(), operands);
        conjunction
    }

    #[must_use]
    pub fn to_selector(&self) -> Selector {
        Selector::from_document(self.to_document())
    }

    /// The resolved conditions as a condition tree.
    ///
    /// Resolving the result again yields the same document.
    #[must_use]
    pub fn to_tree(&self) -> ConditionTree {
        ConditionTree::from_document(self.to_document())
    }

    /// Selector over the entity's own fields: literal fields and foreign keys.
    #[must_use]
    pub fn direct_selector(&self) -> Selector {
        Self::new(
            self.clauses
                .iter()
                .filter(|clause| is_direct(clause))
                .cloned()
                .collect(),
        )
        .to_selector()
    }
}

impl<'a> IntoIterator for &'a ResolvedConditions {
    type Item = &'a ResolvedClause;
    type IntoIter = std::slice::Iter<'a, ResolvedClause>;

    fn into_iter(self) -> Self::IntoIter {
        self.clauses.iter()
    }
}

fn is_direct(clause: &ResolvedClause) -> bool {
    matches!(
        clause,
        ResolvedClause::Field { .. } | ResolvedClause::ForeignKey { .. }
    )
}

/// Resolves relation references using the schema and, for foreign keys,
/// sub-queries against the store.
#[derive(Clone, Copy)]
pub struct RelationResolver<'a> {
    schema: &'a dyn Schema,
    store: &'a dyn DocumentStore,
}

impl<'a> RelationResolver<'a> {
    #[must_use]
    pub fn new(schema: &'a dyn Schema, store: &'a dyn DocumentStore) -> Self {
        Self { schema, store }
    }

    /// Resolve `conditions` on `entity_type`.
    ///
    /// Foreign-key relations are resolved depth first; each level issues one
    /// `distinct_ids` query against the related type.
    ///
    /// # Errors
    ///
    /// - `MissingRelationTarget` if a relation has no target type
    /// - `Store` if a sub-query fails
    #[tracing::instrument(skip_all, fields(entity_type = %entity_type))]
    pub async fn resolve(
        &self,
        entity_type: &EntityType,
        conditions: &ConditionTree,
    ) -> Result<ResolvedConditions, ScopeError> {
        self.resolve_tree(Some(entity_type), conditions).await
    }

    /// Relation lookups happen only when `entity_type` is known; inside a plain
    /// sub-document every key is literal.
    fn resolve_tree<'s>(
        &'s self,
        entity_type: Option<&'s EntityType>,
        conditions: &'s ConditionTree,
    ) -> BoxFuture<'s, Result<ResolvedConditions, ScopeError>> {
        async move {
            let normalized = normalize(conditions);
            let mut clauses = Vec::with_capacity(normalized.direct.len() + normalized.embedded.len());
            clauses.extend(
                normalized
                    .direct
                    .into_iter()
                    .map(|(field, value)| ResolvedClause::Field { field, value }),
            );
            for (field, nested) in normalized.embedded {
                clauses.push(self.resolve_nested(entity_type, field, nested).await?);
            }
            Ok(ResolvedConditions::new(clauses))
        }
        .boxed()
    }

    async fn resolve_nested(
        &self,
        entity_type: Option<&EntityType>,
        field: String,
        nested: ConditionTree,
    ) -> Result<ResolvedClause, ScopeError> {
        let relation = entity_type.and_then(|ty| self.schema.relation(ty, &field).map(|rel| (ty, rel)));

        let Some((owner_type, relation)) = relation else {
            if nested.is_empty() {
                // `{field: {}}` is equality with an empty document.
                return Ok(ResolvedClause::Field {
                    field,
                    value: ConditionValue::Nested(nested),
                });
            }
            let condition = self.resolve_tree(None, &nested).await?;
            return Ok(ResolvedClause::Path { field, condition });
        };

        let target = relation
            .target_type()
            .ok_or_else(|| ScopeError::MissingRelationTarget {
                entity_type: owner_type.clone(),
                field: field.clone(),
            })?;
        let condition = self.resolve_tree(Some(target), &nested).await?;

        match relation.kind {
            RelationKind::Embedded => Ok(ResolvedClause::Embedded {
                field,
                element_type: target.clone(),
                condition,
            }),
            RelationKind::ForeignKey => {
                let ids = self
                    .store
                    .distinct_ids(target, &condition.to_selector())
                    .await?;
                debug!(
                    relation = %field,
                    target = %target,
                    ids = ids.len(),
                    "resolved foreign key relation"
                );
                Ok(ResolvedClause::ForeignKey {
                    field: relation.foreign_key_name(&field),
                    ids,
                })
            }
        }
    }
}
