//! Query operator vocabulary.
//!
//! Tokens are the store's wire-level names and are emitted verbatim. Operators
//! without dedicated handling are kept as [`Operator::Other`] so that store-native
//! syntax still reaches the store.

use std::fmt;

/// Prefix shared by every operator key.
pub const OPERATOR_PREFIX: char = '$';

/// A query operator.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    All,
    Size,
    Exists,
    Type,
    Regex,
    /// Flags for a sibling `$regex`.
    Options,
    Not,
    ElemMatch,
    And,
    Or,
    Nor,
    /// Any other `$`-prefixed key, passed through untouched.
    Other(String),
}

impl Operator {
    /// Parse a condition key into an operator.
    ///
    /// Returns `None` for keys that are field names rather than operators.
    #[must_use]
    pub fn parse(key: &str) -> Option<Self> {
        if !is_operator_key(key) {
            return None;
        }
        let op = match key {
            "$eq" => Self::Eq,
            "$ne" => Self::Ne,
            "$gt" => Self::Gt,
            "$gte" => Self::Gte,
            "$lt" => Self::Lt,
            "$lte" => Self::Lte,
            "$in" => Self::In,
            "$nin" => Self::Nin,
            "$all" => Self::All,
            "$size" => Self::Size,
            "$exists" => Self::Exists,
            "$type" => Self::Type,
            "$regex" => Self::Regex,
            "$options" => Self::Options,
            "$not" => Self::Not,
            "$elemMatch" => Self::ElemMatch,
            "$and" => Self::And,
            "$or" => Self::Or,
            "$nor" => Self::Nor,
            other => Self::Other(other.to_owned()),
        };
        Some(op)
    }

    /// The wire token, including the `$` prefix.
    #[must_use]
    pub fn token(&self) -> &str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::In => "$in",
            Self::Nin => "$nin",
            Self::All => "$all",
            Self::Size => "$size",
            Self::Exists => "$exists",
            Self::Type => "$type",
            Self::Regex => "$regex",
            Self::Options => "$options",
            Self::Not => "$not",
            Self::ElemMatch => "$elemMatch",
            Self::And => "$and",
            Self::Or => "$or",
            Self::Nor => "$nor",
            Self::Other(token) => token,
        }
    }

    /// `$and`, `$or` and `$nor` combine whole selectors rather than field values.
    #[must_use]
    pub fn is_logical(&self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Nor)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Returns `true` if `key` is an operator key rather than a field name.
#[inline]
#[must_use]
pub fn is_operator_key(key: &str) -> bool {
    key.starts_with(OPERATOR_PREFIX)
}
