//! In-memory evaluation of store selectors.
//!
//! Follows the server's semantics for the supported vocabulary: dotted paths
//! traverse arrays implicitly, `null` matches a missing field and numbers
//! compare across integer and floating point types.

use std::cmp::Ordering;

use bson::{Bson, Document};
use docscope_model::condition::is_operator_document;
use docscope_model::{Operator, PATH_SEPARATOR};
use regex::{Regex, RegexBuilder};

use crate::error::StoreError;

/// `$type` code reported for `MinKey`.
const MIN_KEY_CODE: i32 = -1;

const TYPE_ALIASES: &[(&str, i32)] = &[
    ("double", 1),
    ("string", 2),
    ("object", 3),
    ("array", 4),
    ("binData", 5),
    ("undefined", 6),
    ("objectId", 7),
    ("bool", 8),
    ("date", 9),
    ("null", 10),
    ("regex", 11),
    ("dbPointer", 12),
    ("javascript", 13),
    ("symbol", 14),
    ("javascriptWithScope", 15),
    ("int", 16),
    ("timestamp", 17),
    ("long", 18),
    ("decimal", 19),
    ("minKey", MIN_KEY_CODE),
    ("maxKey", 127),
];

const NUMBER_ALIAS: &str = "number";
const NUMBER_CODES: &[i32] = &[1, 16, 18, 19];

/// Evaluates selectors against documents already in memory.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalMatcher;

impl LocalMatcher {
    /// Returns `true` if `entity` satisfies `filter`.
    ///
    /// # Errors
    ///
    /// - `UnsupportedOperator` for operators outside the supported vocabulary
    /// - `InvalidOperand` for operands of the wrong shape
    pub fn matches(filter: &Document, entity: &Document) -> Result<bool, StoreError> {
        for (key, condition) in filter {
            let satisfied = match Operator::parse(key) {
                None => field_matches(&lookup(entity, key), condition)?,
                Some(Operator::And) => {
                    !any_clause_fails(&logical_clauses(key, condition)?, entity)?
                }
                Some(Operator::Or) => any_clause_matches(&logical_clauses(key, condition)?, entity)?,
                Some(Operator::Nor) => {
                    !any_clause_matches(&logical_clauses(key, condition)?, entity)?
                }
                Some(_) => return Err(StoreError::UnsupportedOperator(key.clone())),
            };
            if !satisfied {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn logical_clauses<'a>(key: &str, value: &'a Bson) -> Result<Vec<&'a Document>, StoreError> {
    let Bson::Array(items) = value else {
        return Err(StoreError::invalid_operand(key, "expected an array"));
    };
    if items.is_empty() {
        return Err(StoreError::invalid_operand(key, "expected a non-empty array"));
    }
    items
        .iter()
        .map(|item| match item {
            Bson::Document(doc) => Ok(doc),
            _ => Err(StoreError::invalid_operand(key, "expected an array of documents")),
        })
        .collect()
}

fn any_clause_matches(clauses: &[&Document], entity: &Document) -> Result<bool, StoreError> {
    for clause in clauses {
        if LocalMatcher::matches(clause, entity)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn any_clause_fails(clauses: &[&Document], entity: &Document) -> Result<bool, StoreError> {
    for clause in clauses {
        if !LocalMatcher::matches(clause, entity)? {
            return Ok(true);
        }
    }
    Ok(false)
}

// --- path traversal ---

/// Values reached by a dotted path. `None` marks a missing field.
fn lookup<'a>(entity: &'a Document, path: &str) -> Vec<Option<&'a Bson>> {
    let segments: Vec<&str> = path.split(PATH_SEPARATOR).collect();
    let mut leaves = Vec::new();
    descend_document(entity, &segments, &mut leaves);
    if leaves.is_empty() {
        leaves.push(None);
    }
    leaves
}

fn descend_document<'a>(doc: &'a Document, segments: &[&str], out: &mut Vec<Option<&'a Bson>>) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    match doc.get(*head) {
        Some(value) => descend_value(value, rest, out),
        None => out.push(None),
    }
}

fn descend_value<'a>(value: &'a Bson, segments: &[&str], out: &mut Vec<Option<&'a Bson>>) {
    let Some((head, rest)) = segments.split_first() else {
        out.push(Some(value));
        return;
    };
    match value {
        Bson::Document(doc) => descend_document(doc, segments, out),
        Bson::Array(items) => {
            if let Ok(index) = head.parse::<usize>() {
                match items.get(index) {
                    Some(item) => descend_value(item, rest, out),
                    None => out.push(None),
                }
                return;
            }
            for item in items {
                if let Bson::Document(doc) = item {
                    descend_document(doc, segments, out);
                }
            }
        }
        _ => out.push(None),
    }
}

/// Leaves plus the elements of every array leaf.
fn candidates<'a>(leaves: &[Option<&'a Bson>]) -> Vec<Option<&'a Bson>> {
    let mut out = Vec::with_capacity(leaves.len());
    for leaf in leaves {
        out.push(*leaf);
        if let Some(Bson::Array(items)) = leaf {
            out.extend(items.iter().map(Some));
        }
    }
    out
}

// --- field conditions ---

fn field_matches(leaves: &[Option<&Bson>], condition: &Bson) -> Result<bool, StoreError> {
    match condition {
        Bson::Document(ops) if is_operator_document(ops) => operators_match(leaves, ops),
        Bson::RegularExpression(regex) => {
            let compiled = build_regex(&regex.pattern, Some(regex.options.as_str()))?;
            Ok(regex_any(leaves, &compiled))
        }
        expected => Ok(equals_any(leaves, expected)),
    }
}

fn operators_match(leaves: &[Option<&Bson>], ops: &Document) -> Result<bool, StoreError> {
    for (key, operand) in ops {
        let Some(op) = Operator::parse(key) else {
            return Err(StoreError::UnsupportedOperator(key.clone()));
        };
        let satisfied = match op {
            Operator::Eq => equals_any(leaves, operand),
            Operator::Ne => !equals_any(leaves, operand),
            Operator::Gt => compare_any(leaves, operand, Ordering::is_gt),
            Operator::Gte => compare_any(leaves, operand, Ordering::is_ge),
            Operator::Lt => compare_any(leaves, operand, Ordering::is_lt),
            Operator::Lte => compare_any(leaves, operand, Ordering::is_le),
            Operator::In => in_list(leaves, key, operand)?,
            Operator::Nin => !in_list(leaves, key, operand)?,
            Operator::All => contains_all(leaves, key, operand)?,
            Operator::Size => size_is(leaves, key, operand)?,
            Operator::Exists => leaves.iter().any(Option::is_some) == truthy(operand),
            Operator::Type => type_matches(leaves, key, operand)?,
            Operator::Regex => {
                let options = ops.get_str(Operator::Options.token()).ok();
                regex_any(leaves, &regex_operand(key, operand, options)?)
            }
            Operator::Options => {
                if !ops.contains_key(Operator::Regex.token()) {
                    return Err(StoreError::invalid_operand(key, "requires $regex"));
                }
                true
            }
            Operator::Not => !negated_matches(leaves, key, operand)?,
            Operator::ElemMatch => elem_match(leaves, key, operand)?,
            Operator::And | Operator::Or | Operator::Nor | Operator::Other(_) => {
                return Err(StoreError::UnsupportedOperator(key.clone()));
            }
        };
        if !satisfied {
            return Ok(false);
        }
    }
    Ok(true)
}

fn equals_any(leaves: &[Option<&Bson>], expected: &Bson) -> bool {
    candidates(leaves).into_iter().any(|candidate| match candidate {
        Some(value) => values_equal(value, expected),
        None => matches!(expected, Bson::Null),
    })
}

fn compare_any(leaves: &[Option<&Bson>], operand: &Bson, accept: fn(Ordering) -> bool) -> bool {
    candidates(leaves)
        .into_iter()
        .flatten()
        .any(|value| compare(value, operand).is_some_and(accept))
}

fn in_list(leaves: &[Option<&Bson>], key: &str, operand: &Bson) -> Result<bool, StoreError> {
    let Bson::Array(items) = operand else {
        return Err(StoreError::invalid_operand(key, "expected an array"));
    };
    for item in items {
        let found = match item {
            Bson::RegularExpression(regex) => {
                regex_any(leaves, &build_regex(&regex.pattern, Some(regex.options.as_str()))?)
            }
            value => equals_any(leaves, value),
        };
        if found {
            return Ok(true);
        }
    }
    Ok(false)
}

fn contains_all(leaves: &[Option<&Bson>], key: &str, operand: &Bson) -> Result<bool, StoreError> {
    let Bson::Array(items) = operand else {
        return Err(StoreError::invalid_operand(key, "expected an array"));
    };
    Ok(!items.is_empty() && items.iter().all(|item| equals_any(leaves, item)))
}

fn size_is(leaves: &[Option<&Bson>], key: &str, operand: &Bson) -> Result<bool, StoreError> {
    let expected = match operand {
        Bson::Int32(n) => i64::from(*n),
        Bson::Int64(n) => *n,
        _ => return Err(StoreError::invalid_operand(key, "expected an integer")),
    };
    Ok(leaves.iter().any(|leaf| match leaf {
        Some(Bson::Array(items)) => i64::try_from(items.len()).is_ok_and(|len| len == expected),
        _ => false,
    }))
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Null | Bson::Undefined => false,
        other => number(other).is_none_or(|n| !n.is_zero()),
    }
}

fn type_matches(leaves: &[Option<&Bson>], key: &str, operand: &Bson) -> Result<bool, StoreError> {
    let mut codes = Vec::new();
    match operand {
        Bson::Array(specs) => {
            for spec in specs {
                push_type_codes(key, spec, &mut codes)?;
            }
        }
        spec => push_type_codes(key, spec, &mut codes)?,
    }
    Ok(candidates(leaves)
        .into_iter()
        .flatten()
        .any(|value| codes.contains(&type_code(value))))
}

fn push_type_codes(key: &str, spec: &Bson, codes: &mut Vec<i32>) -> Result<(), StoreError> {
    match spec {
        Bson::Int32(code) => codes.push(*code),
        Bson::Int64(code) => codes.push(
            i32::try_from(*code).map_err(|_| StoreError::invalid_operand(key, "type code out of range"))?,
        ),
        Bson::String(alias) if alias == NUMBER_ALIAS => codes.extend_from_slice(NUMBER_CODES),
        Bson::String(alias) => {
            let code = TYPE_ALIASES
                .iter()
                .find_map(|(name, code)| (*name == alias.as_str()).then_some(*code))
                .ok_or_else(|| StoreError::invalid_operand(key, format!("unknown type alias `{alias}`")))?;
            codes.push(code);
        }
        _ => return Err(StoreError::invalid_operand(key, "expected a type code or alias")),
    }
    Ok(())
}

fn type_code(value: &Bson) -> i32 {
    let element_type = value.element_type();
    if element_type == bson::spec::ElementType::MinKey {
        MIN_KEY_CODE
    } else {
        i32::from(element_type as u8)
    }
}

fn regex_operand(key: &str, operand: &Bson, options: Option<&str>) -> Result<Regex, StoreError> {
    match operand {
        Bson::String(pattern) => build_regex(pattern, options),
        Bson::RegularExpression(regex) => build_regex(&regex.pattern, options.or(Some(regex.options.as_str()))),
        _ => Err(StoreError::invalid_operand(key, "expected a pattern")),
    }
}

fn build_regex(pattern: &str, options: Option<&str>) -> Result<Regex, StoreError> {
    let regex_token = Operator::Regex.token();
    let mut builder = RegexBuilder::new(pattern);
    for flag in options.unwrap_or_default().chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            other => {
                return Err(StoreError::invalid_operand(
                    regex_token,
                    format!("unsupported option `{other}`"),
                ));
            }
        };
    }
    builder
        .build()
        .map_err(|e| StoreError::invalid_operand(regex_token, e.to_string()))
}

fn regex_any(leaves: &[Option<&Bson>], regex: &Regex) -> bool {
    candidates(leaves).into_iter().any(|candidate| match candidate {
        Some(Bson::String(s)) => regex.is_match(s),
        _ => false,
    })
}

/// Operand of `$not`. A plain document matches when any element satisfies
/// it, so the negation holds when no element does.
fn negated_matches(leaves: &[Option<&Bson>], key: &str, operand: &Bson) -> Result<bool, StoreError> {
    match operand {
        Bson::Document(ops) if is_operator_document(ops) => operators_match(leaves, ops),
        Bson::Document(filter) => {
            for candidate in candidates(leaves).into_iter().flatten() {
                if let Bson::Document(element) = candidate
                    && LocalMatcher::matches(filter, element)?
                {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Bson::RegularExpression(regex) => Ok(regex_any(
            leaves,
            &build_regex(&regex.pattern, Some(regex.options.as_str()))?,
        )),
        _ => Err(StoreError::invalid_operand(key, "expected a document or a regex")),
    }
}

fn elem_match(leaves: &[Option<&Bson>], key: &str, operand: &Bson) -> Result<bool, StoreError> {
    let Bson::Document(condition) = operand else {
        return Err(StoreError::invalid_operand(key, "expected a document"));
    };
    let on_values = is_operator_document(condition);
    for leaf in leaves {
        let Some(Bson::Array(items)) = leaf else {
            continue;
        };
        for item in items {
            let satisfied = if on_values {
                operators_match(&[Some(item)], condition)?
            } else if let Bson::Document(element) = item {
                LocalMatcher::matches(condition, element)?
            } else {
                false
            };
            if satisfied {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

// --- value comparison ---

#[derive(Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    #[allow(clippy::cast_precision_loss)] // the server compares large longs approximately too
    fn as_f64(self) -> f64 {
        match self {
            Self::Int(n) => n as f64,
            Self::Float(n) => n,
        }
    }

    fn is_zero(self) -> bool {
        match self {
            Self::Int(n) => n == 0,
            Self::Float(n) => n.abs() < f64::EPSILON,
        }
    }

    fn compare(self, other: Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

fn number(value: &Bson) -> Option<Number> {
    match value {
        Bson::Int32(n) => Some(Number::Int(i64::from(*n))),
        Bson::Int64(n) => Some(Number::Int(*n)),
        Bson::Double(n) => Some(Number::Float(*n)),
        _ => None,
    }
}

fn values_equal(a: &Bson, b: &Bson) -> bool {
    if let (Some(x), Some(y)) = (number(a), number(b)) {
        return x.compare(y) == Some(Ordering::Equal);
    }
    match (a, b) {
        (Bson::Array(xs), Bson::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Bson::Document(xs), Bson::Document(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .zip(ys)
                    .all(|((kx, x), (ky, y))| kx == ky && values_equal(x, y))
        }
        _ => a == b,
    }
}

/// Ordering within one comparable type class; `None` across classes.
fn compare(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (number(a), number(b)) {
        return x.compare(y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => {
            Some(x.timestamp_millis().cmp(&y.timestamp_millis()))
        }
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.bytes().cmp(&y.bytes())),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::Timestamp(x), Bson::Timestamp(y)) => {
            Some((x.time, x.increment).cmp(&(y.time, y.increment)))
        }
        _ => None,
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use bson::doc;
    use bson::oid::ObjectId;

    fn check(filter: Document, entity: &Document) -> bool {
        LocalMatcher::matches(&filter, entity).unwrap()
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(check(doc! {}, &doc! { "a": 1 }));
    }

    #[test]
    fn equality_and_array_membership() {
        let entity = doc! { "title": "Sir", "numbers": ["one", "two"] };
        assert!(check(doc! { "title": "Sir" }, &entity));
        assert!(!check(doc! { "title": "Lord" }, &entity));
        assert!(check(doc! { "numbers": "one" }, &entity));
        assert!(check(doc! { "numbers": ["one", "two"] }, &entity));
        assert!(!check(doc! { "numbers": ["two", "one"] }, &entity));
    }

    #[test]
    fn null_matches_missing_field() {
        assert!(check(doc! { "owner": null }, &doc! { "title": "x" }));
        assert!(check(doc! { "owner": null }, &doc! { "owner": null }));
        assert!(!check(doc! { "owner": null }, &doc! { "owner": "y" }));
    }

    #[test]
    fn numbers_compare_across_types() {
        let entity = doc! { "age": 50_i64, "score": 2.5 };
        assert!(check(doc! { "age": 50 }, &entity));
        assert!(check(doc! { "age": { "$gt": 45 } }, &entity));
        assert!(check(doc! { "age": { "$lte": 50.0 } }, &entity));
        assert!(!check(doc! { "age": { "$lt": 50 } }, &entity));
        assert!(check(doc! { "score": { "$gte": 2 } }, &entity));
        assert!(!check(doc! { "age": { "$gt": "a" } }, &entity));
    }

    #[test]
    fn in_and_nin() {
        let entity = doc! { "numbers": ["one", "two"], "title": "Sir" };
        assert!(check(doc! { "numbers": { "$in": ["one", "six"] } }, &entity));
        assert!(!check(doc! { "numbers": { "$in": ["six"] } }, &entity));
        assert!(check(doc! { "numbers": { "$nin": ["six"] } }, &entity));
        assert!(!check(doc! { "numbers": { "$nin": ["one"] } }, &entity));
        assert!(check(doc! { "missing": { "$in": [null] } }, &entity));

        let starts_with_s = Bson::RegularExpression(bson::Regex {
            pattern: "^S".to_owned(),
            options: String::new(),
        });
        assert!(check(doc! { "title": { "$in": [starts_with_s] } }, &entity));
    }

    #[test]
    fn size_exists_and_all() {
        let entity = doc! { "numbers": ["one", "two"], "colors": [] };
        assert!(check(doc! { "numbers": { "$size": 2 } }, &entity));
        assert!(!check(doc! { "numbers": { "$size": 1 } }, &entity));
        assert!(check(doc! { "colors": { "$size": 0 } }, &entity));
        assert!(check(doc! { "numbers": { "$exists": true } }, &entity));
        assert!(check(doc! { "other": { "$exists": false } }, &entity));
        assert!(check(doc! { "numbers": { "$all": ["two", "one"] } }, &entity));
        assert!(!check(doc! { "numbers": { "$all": [] } }, &entity));
    }

    #[test]
    fn dotted_paths_traverse_arrays() {
        let entity = doc! {
            "comments": [{ "author": "a", "votes": 1 }, { "author": "b", "votes": 5 }],
            "meta": { "owner": { "name": "X" } },
        };
        assert!(check(doc! { "comments.author": "b" }, &entity));
        assert!(check(doc! { "comments.votes": { "$gt": 4 } }, &entity));
        assert!(check(doc! { "comments.0.author": "a" }, &entity));
        assert!(!check(doc! { "comments.1.author": "a" }, &entity));
        assert!(check(doc! { "meta.owner.name": "X" }, &entity));
        assert!(check(doc! { "meta.owner.age": null }, &entity));
    }

    #[test]
    fn elem_match_on_documents_and_values() {
        let entity = doc! { "tags": [{ "label": "A" }, { "label": "B" }], "scores": [1, 9] };
        assert!(check(doc! { "tags": { "$elemMatch": { "label": "B" } } }, &entity));
        assert!(!check(doc! { "tags": { "$elemMatch": { "label": "C" } } }, &entity));
        assert!(check(doc! { "scores": { "$elemMatch": { "$gt": 5, "$lt": 10 } } }, &entity));
        assert!(!check(doc! { "missing": { "$elemMatch": { "label": "A" } } }, &entity));
    }

    #[test]
    fn not_over_plain_document_means_no_element_matches() {
        let filter = doc! { "tags": { "$not": { "label": "A" } } };
        assert!(check(filter.clone(), &doc! { "tags": [] }));
        assert!(check(filter.clone(), &doc! { "tags": [{ "label": "B" }] }));
        assert!(!check(filter.clone(), &doc! { "tags": [{ "label": "B" }, { "label": "A" }] }));
        assert!(check(filter, &doc! {}));
    }

    #[test]
    fn not_over_operators_and_ne() {
        let entity = doc! { "age": 10 };
        assert!(check(doc! { "age": { "$not": { "$gt": 20 } } }, &entity));
        assert!(!check(doc! { "age": { "$not": { "$gt": 5 } } }, &entity));
        assert!(check(doc! { "age": { "$ne": 11 } }, &entity));
        assert!(check(doc! { "name": { "$ne": "x" } }, &entity));
    }

    #[test]
    fn regex_with_options() {
        let entity = doc! { "title": "Sir Lancelot" };
        assert!(check(doc! { "title": { "$regex": "^sir", "$options": "i" } }, &entity));
        assert!(!check(doc! { "title": { "$regex": "^sir" } }, &entity));
    }

    #[test]
    fn type_codes_and_aliases() {
        let id = ObjectId::new();
        let entity = doc! { "_id": id, "n": 3, "s": "x" };
        assert!(check(doc! { "_id": { "$type": 7 } }, &entity));
        assert!(check(doc! { "n": { "$type": "number" } }, &entity));
        assert!(check(doc! { "s": { "$type": ["int", "string"] } }, &entity));
        assert!(!check(doc! { "s": { "$type": "int" } }, &entity));
    }

    #[test]
    fn deny_all_sentinel_matches_nothing() {
        let sentinel = docscope_model::Selector::deny_all().into_document();
        assert!(!check(sentinel.clone(), &doc! { "_id": ObjectId::new() }));
        assert!(!check(sentinel, &doc! {}));
    }

    #[test]
    fn logical_operators() {
        let entity = doc! { "bar": 1, "baz": 2 };
        assert!(check(doc! { "$or": [{ "bar": 3 }, { "baz": 2 }] }, &entity));
        assert!(!check(doc! { "$and": [{ "bar": 1 }, { "baz": 3 }] }, &entity));
        assert!(check(doc! { "$nor": [{ "bar": 2 }] }, &entity));
        assert!(!check(doc! { "$nor": [{ "bar": 1 }] }, &entity));
    }

    #[test]
    fn unsupported_operators_are_reported() {
        let err = LocalMatcher::matches(&doc! { "$where": "true" }, &doc! {}).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedOperator(op) if op == "$where"));

        let err = LocalMatcher::matches(&doc! { "a": { "$near": [0, 0] } }, &doc! {}).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedOperator(op) if op == "$near"));
    }

    #[test]
    fn malformed_operands_are_reported() {
        let err = LocalMatcher::matches(&doc! { "a": { "$in": 1 } }, &doc! {}).unwrap_err();
        assert!(matches!(err, StoreError::InvalidOperand { operator, .. } if operator == "$in"));

        let err = LocalMatcher::matches(&doc! { "$or": [] }, &doc! {}).unwrap_err();
        assert!(matches!(err, StoreError::InvalidOperand { .. }));
    }
}
