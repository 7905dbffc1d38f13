//! `docscope`: compile authorization rules into selectors, check documents
//! against them, and list the stored documents they allow.
//!
//! Entities are read from `MongoDB` (see `mongo` in the configuration) or,
//! with `--fixtures`, from a JSON file held in memory.

mod fixtures;
mod rules;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use bson::{Bson, Document};
use clap::{Parser, Subcommand};
use docscope::{Authorizer, DocScopeConfig, DocumentStore, MongoStore, StaticSchema};
use docscope_model::EntityType;
use futures::{StreamExt, TryStreamExt};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::rules::{RulesFile, json_document};

#[derive(Parser)]
#[command(name = "docscope")]
#[command(about = "Compile and evaluate document-store authorization rules")]
struct Cli {
    /// Configuration file (YAML); `DOCSCOPE__*` variables override it
    #[arg(short, long, env = "DOCSCOPE_CONFIG")]
    config: Option<PathBuf>,

    /// Rules file (YAML)
    #[arg(short, long)]
    rules: PathBuf,

    /// JSON file of documents per entity type, used instead of `MongoDB`
    #[arg(long)]
    fixtures: Option<PathBuf>,

    /// Log level when `RUST_LOG` is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the selector the rules compile to
    Compile {
        entity_type: String,
    },
    /// Check a single document, persisted or not
    Check {
        entity_type: String,
        /// The document as a JSON object
        #[arg(long)]
        document: String,
    },
    /// Print every stored document the rules allow
    Query {
        entity_type: String,
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let level = &cli.log_level;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("docscope={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = DocScopeConfig::load(cli.config.as_deref())?;
    let rules = RulesFile::load(&cli.rules)?.into_rules()?;
    info!(rules = rules.len(), "loaded rules");

    let schema = Arc::new(StaticSchema::from_config(&config)?);
    let store = open_store(&config, cli.fixtures.as_deref()).await?;
    let authorizer = Authorizer::new(schema, store);

    match cli.command {
        Command::Compile { entity_type } => {
            let scope = authorizer.scope(&EntityType::new(entity_type), &rules).await?;
            print_document(scope.into_document())?;
        }
        Command::Check {
            entity_type,
            document,
        } => {
            let entity = json_document(
                serde_json::from_str(&document).context("--document is not valid JSON")?,
            )?;
            let allowed = authorizer
                .can(&EntityType::new(entity_type), &rules, &entity)
                .await?;
            println!("{}", if allowed { "allowed" } else { "denied" });
            if !allowed {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Query { entity_type, limit } => {
            let docs = authorizer
                .accessible_documents(&EntityType::new(entity_type), &rules)
                .await?;
            let mut docs = docs.take(limit.unwrap_or(usize::MAX));
            let mut count = 0_usize;
            while let Some(doc) = docs.try_next().await? {
                print_document(doc)?;
                count += 1;
            }
            info!(count, "query finished");
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn open_store(
    config: &DocScopeConfig,
    fixtures: Option<&Path>,
) -> anyhow::Result<Arc<dyn DocumentStore>> {
    if let Some(path) = fixtures {
        info!(path = %path.display(), "using in-memory fixtures");
        return Ok(Arc::new(fixtures::load(path)?));
    }
    let store = MongoStore::connect(&config.mongo)
        .await
        .context("failed to connect to MongoDB")?
        .with_collections(config.collection_names());
    Ok(Arc::new(store))
}

fn print_document(doc: Document) -> anyhow::Result<()> {
    let json = Bson::Document(doc).into_relaxed_extjson();
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn sample_authorizer() -> (Authorizer, Vec<docscope_model::Rule>) {
        let config = DocScopeConfig::from_yaml(include_str!("../config/docscope.yaml")).unwrap();
        let rules = RulesFile::from_yaml(include_str!("../config/rules.yaml"))
            .unwrap()
            .into_rules()
            .unwrap();
        let store = fixtures::parse(include_str!("../config/fixtures.json")).unwrap();
        let schema = StaticSchema::from_config(&config).unwrap();
        (Authorizer::new(Arc::new(schema), Arc::new(store)), rules)
    }

    async fn accessible(authorizer: &Authorizer, entity_type: &str, rules: &[docscope_model::Rule]) -> Vec<Document> {
        authorizer
            .accessible_documents(&EntityType::new(entity_type), rules)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn sample_configuration_runs() {
        let (authorizer, rules) = sample_authorizer();

        let projects = accessible(&authorizer, "Project", &rules).await;
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].get_str("title").unwrap(), "Sir");

        assert_eq!(accessible(&authorizer, "Post", &rules).await.len(), 1);
        assert!(accessible(&authorizer, "Owner", &rules).await.is_empty());
    }

    #[tokio::test]
    async fn sample_check_uses_tag_defaults() {
        let (authorizer, _) = sample_authorizer();
        let rules = RulesFile::from_yaml(
            "rules:\n  - behavior: allow\n    subject: Post\n    conditions: { tags: { label: untagged } }\n",
        )
        .unwrap()
        .into_rules()
        .unwrap();
        let post = EntityType::new("Post");
        assert!(authorizer.can(&post, &rules, &bson::doc! { "tags": [] }).await.unwrap());
    }

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "docscope",
            "--rules",
            "rules.yaml",
            "--fixtures",
            "fixtures.json",
            "query",
            "Project",
            "--limit",
            "5",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Query { ref entity_type, limit: Some(5) } if entity_type == "Project"
        ));
        assert_eq!(cli.log_level, "info");
    }
}
