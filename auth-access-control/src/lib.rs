//! Rule-based access control for the ImageVault image server
//!
//! Every signed request carries a public key. This crate decides whether that
//! key may access the requested resource, optionally on behalf of a user:
//! - Access rules grant a resource set, or a named resource group, to a set
//!   of users or to every user (`"*"`)
//! - Groups are resolved when a decision is made, so changing a group changes
//!   every rule that names it
//! - Key pairs, groups and rules live in a store: in memory (seeded from
//!   config, optionally frozen) or in PostgreSQL
//!
//! # Core Concepts
//!
//! - **Public key**: the identity a request is signed with
//! - **Resource**: a protected operation such as `image.get` or `group.put`
//! - **Access rule**: `{resources | group} × users`, owned by one public key
//! - **Resource group**: a named, reusable resource set
//!
//! # Example
//!
//! ```rust
//! use auth_access_control::{
//!     AccessControlEngine, AccessRuleRepository, InMemoryAccessControlStore, KeyPairRepository,
//!     NewAccessRule, UserScope,
//! };
//! use secrecy::SecretString;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(InMemoryAccessControlStore::new());
//!     store.add_key_pair("acme", SecretString::new("s3cr3t".to_string())).await?;
//!
//!     let rule = NewAccessRule::for_resources(["image.get"], UserScope::specific(["alice"]));
//!     store.add_access_rule("acme", rule).await?;
//!
//!     let engine = AccessControlEngine::from_store(store);
//!     assert!(engine.has_access("acme", "image.get", Some("alice")).await?);
//!     assert!(!engine.has_access("acme", "image.get", Some("bob")).await?);
//!
//!     Ok(())
//! }
//! ```

pub mod admin;
pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod models;
pub mod query;
pub mod repository;
pub mod resource;

pub use admin::*;
pub use crate::config::{AccessControlConfig, GroupConfig, KeyPairConfig};
pub use engine::*;
pub use error::*;
pub use gate::*;
pub use models::*;
pub use query::*;
pub use repository::{
    AccessRuleRepository, GroupRepository, InMemoryAccessControlStore, KeyPairRepository,
    PostgresAccessControlStore,
};
pub use resource::*;
