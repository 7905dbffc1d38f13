//! Offline store seeded from a JSON file of documents per entity type:
//!
//! ```json
//! { "Project": [{ "title": "Sir", "bar": 1 }], "Category": [] }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use docscope::InMemoryStore;
use tracing::debug;

use crate::rules::json_document;

pub fn load(path: &Path) -> anyhow::Result<InMemoryStore> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read fixtures from {}", path.display()))?;
    parse(&text).with_context(|| format!("invalid fixtures in {}", path.display()))
}

pub fn parse(json: &str) -> anyhow::Result<InMemoryStore> {
    let collections: BTreeMap<String, Vec<serde_json::Value>> = serde_json::from_str(json)?;
    let store = InMemoryStore::new();
    for (entity_type, docs) in collections {
        debug!(entity_type = %entity_type, count = docs.len(), "loading fixtures");
        for doc in docs {
            store.insert(entity_type.as_str(), json_document(doc)?);
        }
    }
    Ok(store)
}
