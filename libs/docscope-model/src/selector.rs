use std::fmt;

use bson::{Bson, Document, doc};

use crate::operator::Operator;

/// Identifier field of every stored document.
pub const ID_FIELD: &str = "_id";

/// `$type` code of an object id. No stored document has an id that both is
/// missing and is an object id, which makes the deny-all sentinel impossible.
const OBJECT_ID_TYPE: i32 = 7;

/// A store-native query selector.
///
/// # Examples
///
/// ```
/// use docscope_model::Selector;
/// use bson::doc;
///
/// assert!(Selector::deny_all().is_deny_all());
/// assert!(Selector::allow_all().is_allow_all());
///
/// let selector = Selector::all_of(vec![doc! { "a": 1 }.into(), doc! { "b": 2 }.into()]);
/// assert_eq!(selector.as_document(), &doc! { "$and": [{ "a": 1 }, { "b": 2 }] });
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Selector(Document);

impl Selector {
    /// Matches every document (`{}`).
    #[must_use]
    pub fn allow_all() -> Self {
        Self(Document::new())
    }

    /// Matches no document.
    #[must_use]
    pub fn deny_all() -> Self {
        let exists = Operator::Exists.token();
        let type_code = Operator::Type.token();
        Self(doc! { ID_FIELD: { exists: false, type_code: OBJECT_ID_TYPE } })
    }

    #[must_use]
    pub fn from_document(doc: Document) -> Self {
        Self(doc)
    }

    #[inline]
    #[must_use]
    pub fn is_allow_all(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn is_deny_all(&self) -> bool {
        *self == Self::deny_all()
    }

    #[inline]
    #[must_use]
    pub fn as_document(&self) -> &Document {
        &self.0
    }

    #[inline]
    #[must_use]
    pub fn into_document(self) -> Document {
        self.0
    }

    /// Conjunction of clauses. No clause is `{}`, one clause is emitted bare.
    #[must_use]
    pub fn all_of(clauses: Vec<Selector>) -> Self {
        combine(Operator::And, clauses)
    }

    /// Disjunction of alternatives. A single alternative is emitted bare.
    ///
    /// An empty list yields `{}`; callers decide whether "no alternatives"
    /// means everything or nothing.
    #[must_use]
    pub fn any_of(alternatives: Vec<Selector>) -> Self {
        combine(Operator::Or, alternatives)
    }

    /// Matches every document not matched by `condition`.
    #[must_use]
    pub fn exclusion(condition: Selector) -> Self {
        let nor = Operator::Nor.token();
        Self(doc! { nor: [condition.0] })
    }
}

fn combine(op: Operator, mut clauses: Vec<Selector>) -> Selector {
    match clauses.len() {
        0 => Selector::allow_all(),
        1 => clauses.pop().unwrap_or_default(),
        _ => {
            let token = op.token();
            let operands: Vec<Bson> = clauses.into_iter().map(|clause| Bson::Document(clause.0)).collect();
            Selector(doc! { token: operands })
        }
    }
}

impl From<Document> for Selector {
    fn from(doc: Document) -> Self {
        Self(doc)
    }
}

impl From<Selector> for Document {
    fn from(selector: Selector) -> Self {
        selector.0
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
