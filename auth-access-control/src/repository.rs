//! Storage interfaces for key pairs, resource groups and access rules
//!
//! Lookups of unknown keys, groups or rules answer `None`, `false` or an empty
//! collection. `Err` is reserved for infrastructure failures and for writes
//! against an immutable store.

mod memory;
mod postgres;

pub use memory::InMemoryAccessControlStore;
pub use postgres::PostgresAccessControlStore;

use crate::{
    error::Result,
    models::{AccessRule, GroupPage, NewAccessRule},
    query::GroupQuery,
};
use async_trait::async_trait;
use secrecy::SecretString;
use std::collections::BTreeSet;

/// Public/private key pairs used to sign requests
#[async_trait]
pub trait KeyPairRepository: Send + Sync {
    /// Store a new key pair; `false` when the public key already exists
    async fn add_key_pair(&self, public_key: &str, private_key: SecretString) -> Result<bool>;

    async fn public_key_exists(&self, public_key: &str) -> Result<bool>;

    /// Private key for authentication, `None` for unknown public keys
    async fn get_private_key(&self, public_key: &str) -> Result<Option<SecretString>>;

    /// Replace the private key; `false` when the public key is unknown
    async fn update_private_key(&self, public_key: &str, private_key: SecretString)
        -> Result<bool>;

    /// Delete a public key together with all of its access rules
    async fn delete_public_key(&self, public_key: &str) -> Result<bool>;
}

/// Named resource groups
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GroupRepository: Send + Sync {
    async fn group_exists(&self, name: &str) -> Result<bool>;

    /// Resources of a group; an existing empty group is `Some(empty)`
    async fn get_group(&self, name: &str) -> Result<Option<BTreeSet<String>>>;

    /// Create a group; `false` when the name is taken
    async fn add_resource_group(&self, name: &str, resources: BTreeSet<String>) -> Result<bool>;

    /// Replace a group's resources wholesale; `false` when the group is missing
    async fn update_resource_group(&self, name: &str, resources: BTreeSet<String>)
        -> Result<bool>;

    async fn delete_resource_group(&self, name: &str) -> Result<bool>;

    /// One page of groups in name order, plus the total number of groups
    async fn get_groups(&self, query: GroupQuery) -> Result<GroupPage>;
}

/// Access rules, each owned by one public key
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccessRuleRepository: Send + Sync {
    /// Store a rule under `public_key` and return its generated id
    ///
    /// Returns `None` when the public key does not exist.
    async fn add_access_rule(&self, public_key: &str, rule: NewAccessRule)
        -> Result<Option<String>>;

    /// A rule by id, `None` unless it exists and belongs to `public_key`
    async fn get_access_rule(&self, public_key: &str, rule_id: &str) -> Result<Option<AccessRule>>;

    async fn delete_access_rule(&self, public_key: &str, rule_id: &str) -> Result<bool>;

    /// All rules of a public key in insertion order
    async fn get_access_list_for_public_key(&self, public_key: &str) -> Result<Vec<AccessRule>>;
}
