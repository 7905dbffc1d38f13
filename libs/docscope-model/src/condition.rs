//! Condition trees.
//!
//! A condition tree maps field keys to [`ConditionValue`]s. Raw `bson` documents
//! are classified exactly once, on conversion. Everything downstream matches
//! on the variant and never re-inspects the document shape.

use std::collections::BTreeMap;
use std::collections::btree_map;

use bson::{Bson, Document};

use crate::operator::{Operator, is_operator_key};

/// Separator between the segments of a dotted field path.
pub const PATH_SEPARATOR: char = '.';

/// The value side of a single condition entry.
#[derive(Clone, Debug, PartialEq)]
pub enum ConditionValue {
    /// Implicit equality against a scalar.
    Scalar(Bson),
    /// Implicit equality against an array.
    List(Vec<Bson>),
    /// Operator expression, e.g. `{"$in": [..], "$ne": ..}`.
    Operators(OperatorMap),
    /// Traversal into a relation or sub-document.
    Nested(ConditionTree),
}

impl ConditionValue {
    /// Classify a raw value.
    ///
    /// A document whose keys are all operators is an operator map. Any other
    /// document, including an empty one, is a nested tree.
    #[must_use]
    pub fn from_bson(value: Bson) -> Self {
        match value {
            Bson::Document(doc) if is_operator_document(&doc) => {
                Self::Operators(OperatorMap::from_document(doc))
            }
            Bson::Document(doc) => Self::Nested(ConditionTree::from_document(doc)),
            Bson::Array(items) => Self::List(items),
            other => Self::Scalar(other),
        }
    }

    /// Convert back into the raw value as written.
    #[must_use]
    pub fn to_bson(&self) -> Bson {
        match self {
            Self::Scalar(value) => value.clone(),
            Self::List(items) => Bson::Array(items.clone()),
            Self::Operators(ops) => Bson::Document(ops.to_document()),
            Self::Nested(tree) => Bson::Document(tree.to_document()),
        }
    }

    #[inline]
    #[must_use]
    pub fn as_nested(&self) -> Option<&ConditionTree> {
        match self {
            Self::Nested(tree) => Some(tree),
            Self::Scalar(_) | Self::List(_) | Self::Operators(_) => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn as_operators(&self) -> Option<&OperatorMap> {
        match self {
            Self::Operators(ops) => Some(ops),
            Self::Scalar(_) | Self::List(_) | Self::Nested(_) => None,
        }
    }
}

impl From<Bson> for ConditionValue {
    fn from(value: Bson) -> Self {
        Self::from_bson(value)
    }
}

/// Returns `true` for a non-empty document whose keys are all operators.
#[must_use]
pub fn is_operator_document(doc: &Document) -> bool {
    !doc.is_empty() && doc.keys().all(|k| is_operator_key(k))
}

/// Ordered operator expression on a single field.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OperatorMap {
    entries: Vec<(Operator, Bson)>,
}

impl OperatorMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, op: Operator, operand: impl Into<Bson>) -> Self {
        self.insert(op, operand);
        self
    }

    /// Insert an operator, replacing an existing operand for the same operator.
    pub fn insert(&mut self, op: Operator, operand: impl Into<Bson>) {
        let operand = operand.into();
        if let Some(entry) = self.entries.iter_mut().find(|(o, _)| *o == op) {
            entry.1 = operand;
        } else {
            self.entries.push((op, operand));
        }
    }

    /// Operand for `op`, if present.
    #[must_use]
    pub fn get(&self, op: &Operator) -> Option<&Bson> {
        self.entries
            .iter()
            .find_map(|(o, operand)| (o == op).then_some(operand))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Operator, &Bson)> {
        self.entries.iter().map(|(op, operand)| (op, operand))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if `op` is the only operator in the map.
    #[must_use]
    pub fn is_sole(&self, op: &Operator) -> bool {
        matches!(self.entries.as_slice(), [(only, _)] if only == op)
    }

    #[must_use]
    pub fn to_document(&self) -> Document {
        self.entries
            .iter()
            .map(|(op, operand)| (op.token().to_owned(), operand.clone()))
            .collect()
    }

    fn from_document(doc: Document) -> Self {
        Self {
            entries: doc
                .into_iter()
                .filter_map(|(key, operand)| Operator::parse(&key).map(|op| (op, operand)))
                .collect(),
        }
    }
}

/// A mapping from field key to condition.
///
/// Keys are stored as written; dotted keys are split by the normalizer, not here.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConditionTree {
    fields: BTreeMap<String, ConditionValue>,
}

impl ConditionTree {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify every entry of a raw condition document.
    #[must_use]
    pub fn from_document(doc: Document) -> Self {
        Self {
            fields: doc
                .into_iter()
                .map(|(key, value)| (key, ConditionValue::from_bson(value)))
                .collect(),
        }
    }

    /// Single-entry tree.
    #[must_use]
    pub fn single(key: impl Into<String>, value: ConditionValue) -> Self {
        let mut tree = Self::new();
        tree.insert(key, value);
        tree
    }

    /// Insert an entry, replacing any previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: ConditionValue) -> Option<ConditionValue> {
        self.fields.insert(key.into(), value)
    }

    /// Insert an entry, merging nested trees recursively when both sides are nested.
    pub fn merge(&mut self, key: impl Into<String>, value: ConditionValue) {
        match self.fields.entry(key.into()) {
            btree_map::Entry::Occupied(mut slot) => match (slot.get_mut(), value) {
                (ConditionValue::Nested(existing), ConditionValue::Nested(incoming)) => {
                    existing.merge_tree(incoming);
                }
                (current, incoming) => *current = incoming,
            },
            btree_map::Entry::Vacant(slot) => {
                slot.insert(value);
            }
        }
    }

    /// Merge every entry of `other` into this tree.
    pub fn merge_tree(&mut self, other: ConditionTree) {
        for (key, value) in other.fields {
            self.merge(key, value);
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ConditionValue> {
        self.fields.get(key)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ConditionValue> {
        self.fields.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The tree as a raw document, nesting preserved.
    #[must_use]
    pub fn to_document(&self) -> Document {
        self.fields
            .iter()
            .map(|(key, value)| (key.clone(), value.to_bson()))
            .collect()
    }
}

impl From<Document> for ConditionTree {
    fn from(doc: Document) -> Self {
        Self::from_document(doc)
    }
}

impl IntoIterator for ConditionTree {
    type Item = (String, ConditionValue);
    type IntoIter = btree_map::IntoIter<String, ConditionValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a ConditionTree {
    type Item = (&'a String, &'a ConditionValue);
    type IntoIter = btree_map::Iter<'a, String, ConditionValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl FromIterator<(String, ConditionValue)> for ConditionTree {
    fn from_iter<I: IntoIterator<Item = (String, ConditionValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn classifies_values_once() {
        let tree = ConditionTree::from_document(doc! {
            "title": "Sir",
            "numbers": ["one", "two"],
            "age": { "$gt": 45 },
            "owner": { "name": "X" },
        });

        assert!(matches!(tree.get("title"), Some(ConditionValue::Scalar(_))));
        assert!(matches!(tree.get("numbers"), Some(ConditionValue::List(items)) if items.len() == 2));
        let ops = tree.get("age").and_then(ConditionValue::as_operators).unwrap();
        assert_eq!(ops.get(&Operator::Gt), Some(&Bson::Int32(45)));
        let owner = tree.get("owner").and_then(ConditionValue::as_nested).unwrap();
        assert_eq!(owner.get("name"), Some(&ConditionValue::Scalar("X".into())));
    }

    #[test]
    fn mixed_keys_make_a_nested_tree() {
        let value = ConditionValue::from_bson(Bson::Document(doc! { "$exists": true, "name": "X" }));
        assert!(value.as_nested().is_some());
    }

    #[test]
    fn empty_document_is_nested() {
        let value = ConditionValue::from_bson(Bson::Document(doc! {}));
        assert_eq!(value, ConditionValue::Nested(ConditionTree::new()));
    }

    #[test]
    fn sole_negation_is_detected() {
        let value = ConditionValue::from_bson(Bson::Document(doc! { "$not": { "label": "A" } }));
        let ops = value.as_operators().unwrap();
        assert!(ops.is_sole(&Operator::Not));

        let both = OperatorMap::new()
            .with(Operator::Not, doc! { "label": "A" })
            .with(Operator::Size, 1);
        assert!(!both.is_sole(&Operator::Not));
    }

    #[test]
    fn merge_combines_nested_trees() {
        let mut tree = ConditionTree::from_document(doc! { "owner": { "name": "X" } });
        tree.merge(
            "owner",
            ConditionValue::Nested(ConditionTree::from_document(doc! { "age": 3 })),
        );
        assert_eq!(tree.to_document(), doc! { "owner": { "age": 3, "name": "X" } });
    }

    #[test]
    fn merge_replaces_non_nested() {
        let mut tree = ConditionTree::from_document(doc! { "title": "Sir" });
        tree.merge("title", ConditionValue::Scalar("Lord".into()));
        assert_eq!(tree.to_document(), doc! { "title": "Lord" });
    }

    #[test]
    fn document_round_trip_keeps_shape() {
        let raw = doc! { "a.b": 1, "c": { "$in": [1, 2] }, "d": { "e": { "f": true } } };
        let tree = ConditionTree::from_document(raw.clone());
        assert_eq!(tree.to_document(), raw);
    }

    #[test]
    fn operator_map_insert_replaces_operand() {
        let mut ops = OperatorMap::new().with(Operator::Gt, 1);
        ops.insert(Operator::Gt, 2);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops.to_document(), doc! { "$gt": 2 });
    }
}
