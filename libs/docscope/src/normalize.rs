//! Splits condition keys into embedded paths and direct field conditions.

use std::collections::BTreeMap;

use docscope_model::{ConditionTree, ConditionValue, PATH_SEPARATOR, is_operator_key};

/// A condition tree split into two buckets.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalizedConditions {
    /// Conditions that descend into a sub-document or relation, keyed by the
    /// first path segment.
    pub embedded: BTreeMap<String, ConditionTree>,
    /// Conditions on the entity's own fields.
    pub direct: BTreeMap<String, ConditionValue>,
}

impl NormalizedConditions {
    fn embed(&mut self, head: &str, nested: ConditionTree) {
        self.embedded
            .entry(head.to_owned())
            .or_default()
            .merge_tree(nested);
    }
}

/// Classify every key of `conditions`.
///
/// A dotted key `"a.b"` is equivalent to `{"a": {"b": ..}}`. Only the first
/// segment is split; deeper segments are split when the nested tree is
/// normalized in turn.
///
/// # Examples
///
/// ```
/// use docscope::normalize::normalize;
/// use docscope_model::ConditionTree;
/// use bson::doc;
///
/// let dotted = normalize(&ConditionTree::from(doc! { "owner.name": "X", "title": "Sir" }));
/// let nested = normalize(&ConditionTree::from(doc! { "owner": { "name": "X" }, "title": "Sir" }));
/// assert_eq!(dotted, nested);
/// assert!(dotted.direct.contains_key("title"));
/// ```
#[must_use]
pub fn normalize(conditions: &ConditionTree) -> NormalizedConditions {
    let mut out = NormalizedConditions::default();
    for (key, value) in conditions {
        if let Some((head, tail)) = split_path(key) {
            out.embed(head, ConditionTree::single(tail, value.clone()));
        } else if let ConditionValue::Nested(tree) = value {
            out.embed(key, tree.clone());
        } else {
            out.direct.insert(key.clone(), value.clone());
        }
    }
    out
}

fn split_path(key: &str) -> Option<(&str, &str)> {
    if is_operator_key(key) {
        return None;
    }
    key.split_once(PATH_SEPARATOR)
}
