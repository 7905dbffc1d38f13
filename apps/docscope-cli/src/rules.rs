//! Rule files.
//!
//! ```yaml
//! rules:
//!   - behavior: allow
//!     subject: Project
//!     conditions: { category: { visible: true } }
//!   - behavior: deny
//!     subject: all
//!     scope: { archived: true }
//! ```
//!
//! `conditions` are resolved against the schema; `scope` is a prebuilt
//! selector used as is. A rule with neither is unconditional.

use std::path::Path;

use anyhow::{Context, bail, ensure};
use bson::{Bson, Document};
use docscope_model::{Behavior, ConditionTree, Rule, RuleConditions, Selector, Subject};
use figment::Figment;
use figment::providers::{Format, Yaml};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RulesFile {
    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleEntry {
    pub behavior: Behavior,
    pub subject: Subject,
    #[serde(default)]
    pub conditions: Option<serde_json::Value>,
    #[serde(default)]
    pub scope: Option<serde_json::Value>,
}

impl RulesFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        ensure!(path.is_file(), "rules file {} does not exist", path.display());
        Figment::from(Yaml::file(path))
            .extract()
            .with_context(|| format!("failed to read rules from {}", path.display()))
    }

    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        Ok(Figment::from(Yaml::string(yaml)).extract()?)
    }

    /// Rules in file order.
    pub fn into_rules(self) -> anyhow::Result<Vec<Rule>> {
        self.rules
            .into_iter()
            .enumerate()
            .map(|(index, entry)| entry.into_rule().with_context(|| format!("rule #{index}")))
            .collect()
    }
}

impl RuleEntry {
    fn into_rule(self) -> anyhow::Result<Rule> {
        let conditions = match (self.conditions, self.scope) {
            (Some(_), Some(_)) => bail!("`conditions` and `scope` are mutually exclusive"),
            (Some(conditions), None) => RuleConditions::Tree(ConditionTree::from(json_document(conditions)?)),
            (None, Some(scope)) => RuleConditions::Scope(Selector::from(json_document(scope)?)),
            (None, None) => RuleConditions::Tree(ConditionTree::new()),
        };
        Ok(Rule::new(self.behavior, self.subject, conditions))
    }
}

/// Convert a JSON object (extended JSON allowed) into a document.
pub fn json_document(value: serde_json::Value) -> anyhow::Result<Document> {
    match Bson::try_from(value)? {
        Bson::Document(doc) => Ok(doc),
        other => bail!("expected an object, found {other}"),
    }
}
