//! Authorization rules.
//!
//! Rules are supplied by the authorization layer in declaration order and are
//! never mutated by the compiler.

use std::fmt;
use std::sync::Arc;

use bson::Document;
use serde::{Deserialize, Serialize};

use crate::condition::ConditionTree;
use crate::entity::EntityType;
use crate::selector::Selector;

const SUBJECT_ALL: &str = "all";

/// Whether a rule grants or revokes access.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    Allow,
    Deny,
}

/// The entity types a rule applies to.
///
/// The name `"all"` stands for every type, in both directions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Subject {
    /// Every entity type.
    All,
    Type(EntityType),
}

impl Subject {
    /// Returns `true` if this subject covers `entity_type`.
    #[must_use]
    pub fn covers(&self, entity_type: &EntityType) -> bool {
        match self {
            Self::All => true,
            Self::Type(t) => t == entity_type,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(SUBJECT_ALL),
            Self::Type(t) => fmt::Display::fmt(t, f),
        }
    }
}

impl From<EntityType> for Subject {
    fn from(t: EntityType) -> Self {
        Self::Type(t)
    }
}

impl From<&str> for Subject {
    fn from(name: &str) -> Self {
        if name == SUBJECT_ALL {
            Self::All
        } else {
            Self::Type(EntityType::new(name))
        }
    }
}

impl From<String> for Subject {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<Subject> for String {
    fn from(subject: Subject) -> Self {
        subject.to_string()
    }
}

/// In-memory predicate over a single document.
///
/// Predicate rules can only be evaluated one entity at a time; they have no
/// selector form.
#[derive(Clone)]
pub struct RulePredicate(Arc<dyn Fn(&Document) -> bool + Send + Sync>);

impl RulePredicate {
    #[must_use]
    pub fn new(f: impl Fn(&Document) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    #[must_use]
    pub fn test(&self, entity: &Document) -> bool {
        (self.0)(entity)
    }
}

impl fmt::Debug for RulePredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RulePredicate(..)")
    }
}

/// What a rule matches on.
#[derive(Clone, Debug)]
pub enum RuleConditions {
    /// Declarative conditions; compiled by the resolver.
    Tree(ConditionTree),
    /// Already-compiled selector, used as-is.
    Scope(Selector),
    /// Opaque block.
    Predicate(RulePredicate),
}

impl From<ConditionTree> for RuleConditions {
    fn from(tree: ConditionTree) -> Self {
        Self::Tree(tree)
    }
}

impl From<Document> for RuleConditions {
    fn from(doc: Document) -> Self {
        Self::Tree(ConditionTree::from_document(doc))
    }
}

impl From<Selector> for RuleConditions {
    fn from(selector: Selector) -> Self {
        Self::Scope(selector)
    }
}

/// One allow/deny statement.
///
/// # Examples
///
/// ```
/// use docscope_model::{Behavior, Rule};
/// use bson::doc;
///
/// let rule = Rule::allow("Project", doc! { "title": "Sir" });
/// assert_eq!(rule.behavior(), Behavior::Allow);
/// assert!(!rule.has_empty_conditions());
///
/// let all = Rule::allow_all("Project");
/// assert!(all.has_empty_conditions());
/// ```
#[derive(Clone, Debug)]
pub struct Rule {
    behavior: Behavior,
    subject: Subject,
    conditions: RuleConditions,
}

impl Rule {
    #[must_use]
    pub fn new(
        behavior: Behavior,
        subject: impl Into<Subject>,
        conditions: impl Into<RuleConditions>,
    ) -> Self {
        Self {
            behavior,
            subject: subject.into(),
            conditions: conditions.into(),
        }
    }

    #[must_use]
    pub fn allow(subject: impl Into<Subject>, conditions: impl Into<RuleConditions>) -> Self {
        Self::new(Behavior::Allow, subject, conditions)
    }

    #[must_use]
    pub fn deny(subject: impl Into<Subject>, conditions: impl Into<RuleConditions>) -> Self {
        Self::new(Behavior::Deny, subject, conditions)
    }

    /// Unconditional grant.
    #[must_use]
    pub fn allow_all(subject: impl Into<Subject>) -> Self {
        Self::allow(subject, ConditionTree::new())
    }

    /// Unconditional revocation.
    #[must_use]
    pub fn deny_all(subject: impl Into<Subject>) -> Self {
        Self::deny(subject, ConditionTree::new())
    }

    /// Grant decided by an in-memory block.
    #[must_use]
    pub fn allow_if(
        subject: impl Into<Subject>,
        f: impl Fn(&Document) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::allow(subject, RuleConditions::Predicate(RulePredicate::new(f)))
    }

    #[inline]
    #[must_use]
    pub fn behavior(&self) -> Behavior {
        self.behavior
    }

    #[inline]
    #[must_use]
    pub fn is_allow(&self) -> bool {
        self.behavior == Behavior::Allow
    }

    #[inline]
    #[must_use]
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    #[inline]
    #[must_use]
    pub fn conditions(&self) -> &RuleConditions {
        &self.conditions
    }

    /// Returns `true` if the rule applies to `entity_type`.
    #[must_use]
    pub fn applies_to(&self, entity_type: &EntityType) -> bool {
        self.subject.covers(entity_type)
    }

    /// Returns `true` for an empty condition tree. Scopes and predicates are
    /// never considered empty.
    #[must_use]
    pub fn has_empty_conditions(&self) -> bool {
        matches!(&self.conditions, RuleConditions::Tree(tree) if tree.is_empty())
    }
}
