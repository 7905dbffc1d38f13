//! Scope compilation.
//!
//! Folds an ordered rule list into one selector:
//!
//! | applicable rules                        | result |
//! |-----------------------------------------|--------|
//! | none                                    | `deny_all()` |
//! | exactly one, carrying a prebuilt scope  | that scope, verbatim |
//! | any defined by a block                  | `UncompilableRule` |
//! | allow alternatives `A1..An`, denies `D1..Dm` | `{$and: [{$or: [A1..An]}, {$nor: [D1]}, .., {$nor: [Dm]}]}` |
//! | an unconditional allow, denies `D1..Dm` | `{$and: [{$nor: [D1]}, .., {$nor: [Dm]}]}` |
//! | an unconditional deny                   | `deny_all()` |
//! | no allow at all                         | `deny_all()` |
//!
//! Single-element `$or`/`$and` wrappers are omitted.

use docscope_model::{EntityType, Rule, RuleConditions, Selector};
use tracing::{debug, warn};

use crate::error::ScopeError;
use crate::resolve::RelationResolver;
use crate::schema::Schema;
use crate::store::DocumentStore;

/// Compiles rules into a store-native selector.
#[derive(Clone, Copy)]
pub struct ScopeCompiler<'a> {
    resolver: RelationResolver<'a>,
}

impl<'a> ScopeCompiler<'a> {
    #[must_use]
    pub fn new(schema: &'a dyn Schema, store: &'a dyn DocumentStore) -> Self {
        Self {
            resolver: RelationResolver::new(schema, store),
        }
    }

    /// Compile the rules that apply to `entity_type`, in declaration order.
    ///
    /// When an unconditional allow is present, conditional allow rules are
    /// skipped without running their sub-queries.
    ///
    /// # Errors
    ///
    /// - `UncompilableRule` if an applicable rule is defined by a block
    /// - `MissingRelationTarget` or `Store` from relation resolution
    #[tracing::instrument(skip_all, fields(entity_type = %entity_type, rules = rules.len()))]
    pub async fn compile(
        &self,
        entity_type: &EntityType,
        rules: &[Rule],
    ) -> Result<Selector, ScopeError> {
        let applicable: Vec<&Rule> = rules
            .iter()
            .filter(|rule| rule.applies_to(entity_type))
            .collect();

        if applicable.is_empty() {
            debug!("no applicable rules, denying all");
            return Ok(Selector::deny_all());
        }

        if let [only] = applicable.as_slice()
            && let RuleConditions::Scope(scope) = only.conditions()
        {
            return Ok(scope.clone());
        }

        if let Some(rule) = applicable
            .iter()
            .find(|rule| matches!(rule.conditions(), RuleConditions::Predicate(_)))
        {
            warn!(
                subject = %rule.subject(),
                "rule is defined by a block and cannot be compiled to a query"
            );
            return Err(ScopeError::UncompilableRule {
                subject: rule.subject().clone(),
            });
        }

        let unconditional = applicable
            .iter()
            .any(|rule| rule.is_allow() && rule.has_empty_conditions());
        if unconditional {
            debug!("unconditional allow present, skipping allow alternatives");
        }

        let mut alternatives = Vec::new();
        let mut exclusions = Vec::new();
        for rule in &applicable {
            if rule.is_allow() {
                if !unconditional {
                    alternatives.push(self.rule_clause(entity_type, rule).await?);
                }
            } else if rule.has_empty_conditions() {
                debug!("unconditional deny, denying all");
                return Ok(Selector::deny_all());
            } else {
                exclusions.push(Selector::exclusion(self.rule_clause(entity_type, rule).await?));
            }
        }

        if alternatives.is_empty() && !unconditional {
            debug!("no allow rule, denying all");
            return Ok(Selector::deny_all());
        }

        debug!(
            alternatives = alternatives.len(),
            exclusions = exclusions.len(),
            "folded rules"
        );
        let mut clauses = Vec::with_capacity(exclusions.len() + 1);
        if !alternatives.is_empty() {
            clauses.push(Selector::any_of(alternatives));
        }
        clauses.extend(exclusions);
        Ok(Selector::all_of(clauses))
    }

    async fn rule_clause(&self, entity_type: &EntityType, rule: &Rule) -> Result<Selector, ScopeError> {
        match rule.conditions() {
            RuleConditions::Tree(tree) => Ok(self.resolver.resolve(entity_type, tree).await?.to_selector()),
            RuleConditions::Scope(scope) => Ok(scope.clone()),
            RuleConditions::Predicate(_) => Err(ScopeError::UncompilableRule {
                subject: rule.subject().clone(),
            }),
        }
    }
}
