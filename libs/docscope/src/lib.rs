#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Compiles authorization rules for a document store.
//!
//! The same rules produce two artifacts that agree with each other:
//!
//! - a selector the store evaluates server-side ([`ScopeCompiler`])
//! - an in-memory check of one entity, persisted or not ([`DocumentMatcher`])
//!
//! Both go through [`RelationResolver`], which turns conditions on embedded
//! relations into element matches and conditions on foreign-key relations
//! into identifier membership.
//!
//! ```ignore
//! let authorizer = Authorizer::new(Arc::new(schema), Arc::new(store));
//! let scope = authorizer.scope(&project, &rules).await?;
//! let allowed = authorizer.can(&project, &rules, &entity).await?;
//! ```

pub mod authorizer;
pub mod compile;
pub mod config;
pub mod error;
pub mod matcher;
pub mod normalize;
pub mod resolve;
pub mod schema;
pub mod store;

pub use authorizer::{Authorizer, Queryable};
pub use compile::ScopeCompiler;
pub use config::{DocScopeConfig, EntityConfig, MongoConfig};
pub use error::{ConfigError, ScopeError, StoreError};
pub use matcher::DocumentMatcher;
pub use normalize::{NormalizedConditions, normalize};
pub use resolve::{RelationResolver, ResolvedClause, ResolvedConditions};
pub use schema::{Schema, StaticSchema};
pub use store::{DocumentStore, DocumentStream, InMemoryStore, LocalMatcher, MongoStore};
