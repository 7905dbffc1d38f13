#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Data model for docscope.
//!
//! - [`Rule`] - one allow/deny statement with its [`RuleConditions`]
//! - [`ConditionTree`], [`ConditionValue`], [`OperatorMap`] - classified conditions
//! - [`Operator`] - the store's query operator vocabulary
//! - [`RelationMetadata`] - how a field relates to another entity type
//! - [`Selector`] - a compiled, store-native query document

pub mod condition;
pub mod entity;
pub mod operator;
pub mod relation;
pub mod rule;
pub mod selector;

pub use condition::{ConditionTree, ConditionValue, OperatorMap, PATH_SEPARATOR};
pub use entity::EntityType;
pub use operator::{Operator, is_operator_key};
pub use relation::{RelationKind, RelationMetadata, Relations};
pub use rule::{Behavior, Rule, RuleConditions, RulePredicate, Subject};
pub use selector::{ID_FIELD, Selector};
