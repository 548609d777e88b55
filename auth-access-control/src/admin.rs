//! Administrative operations behind the key, group and access rule endpoints
//!
//! Unlike the repositories, these operations turn "not found" and "already
//! exists" into errors with an HTTP status, the way the REST layer reports
//! them.

use crate::{
    engine::AccessControlEngine,
    error::AccessControlError,
    models::{AccessRule, ExpandedAccessRule, NewAccessRule, ResourceGroup},
    query::GroupQuery,
    repository::{AccessRuleRepository, GroupRepository, KeyPairRepository},
};
use error_common::ImageVaultError;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("{0}")]
    Validation(String),

    #[error("Group '{0}' does not exist")]
    UnknownGroup(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] AccessControlError),
}

impl AdminError {
    pub fn status_code(&self) -> u16 {
        match self {
            AdminError::Validation(_) | AdminError::UnknownGroup(_) => 400,
            AdminError::NotFound(_) => 404,
            AdminError::Conflict(_) => 409,
            AdminError::Store(AccessControlError::Immutable) => 405,
            AdminError::Store(
                AccessControlError::MalformedRule(_) | AccessControlError::UnknownResource(_),
            ) => 400,
            AdminError::Store(AccessControlError::StorageError(_)) => 503,
            AdminError::Store(_) => 500,
        }
    }
}

impl From<AdminError> for ImageVaultError {
    fn from(error: AdminError) -> Self {
        match error {
            AdminError::Validation(message) => ImageVaultError::ValidationError(message),
            AdminError::UnknownGroup(group) => {
                ImageVaultError::ValidationError(format!("Group '{group}' does not exist"))
            }
            AdminError::NotFound(message) => ImageVaultError::NotFound(message),
            AdminError::Conflict(message) => ImageVaultError::Conflict(message),
            AdminError::Store(error) => error.into(),
        }
    }
}

pub type AdminResult<T> = std::result::Result<T, AdminError>;

/// Whether a put created a new entry or replaced an existing one (201 vs 200)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PutOutcome {
    Created,
    Updated,
}

/// Paging metadata returned next to a group listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub page: u32,
    pub limit: u32,
    pub count: usize,
    pub hits: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupListing {
    pub search: PageInfo,
    pub groups: Vec<ResourceGroup>,
}

/// CRUD facade over the key pair, group and access rule stores
#[derive(Clone)]
pub struct AccessControlAdmin {
    keys: Arc<dyn KeyPairRepository>,
    groups: Arc<dyn GroupRepository>,
    rules: Arc<dyn AccessRuleRepository>,
    engine: AccessControlEngine,
}

impl AccessControlAdmin {
    pub fn new(
        keys: Arc<dyn KeyPairRepository>,
        groups: Arc<dyn GroupRepository>,
        rules: Arc<dyn AccessRuleRepository>,
    ) -> Self {
        let engine = AccessControlEngine::new(rules.clone(), groups.clone());
        Self {
            keys,
            groups,
            rules,
            engine,
        }
    }

    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: KeyPairRepository + GroupRepository + AccessRuleRepository + 'static,
    {
        Self::new(store.clone(), store.clone(), store)
    }

    // =========================================================================
    // Key pairs
    // =========================================================================

    /// Create a key pair, or replace the private key of an existing one
    pub async fn put_key(&self, public_key: &str, private_key: SecretString) -> AdminResult<PutOutcome> {
        if public_key.is_empty() {
            return Err(AdminError::Validation("Public key must not be empty".to_string()));
        }

        let copy = SecretString::new(private_key.expose_secret().clone());
        if self.keys.add_key_pair(public_key, copy).await? {
            info!(public_key, "Key pair created");
            return Ok(PutOutcome::Created);
        }
        if self.keys.update_private_key(public_key, private_key).await? {
            info!(public_key, "Private key replaced");
            return Ok(PutOutcome::Updated);
        }
        Err(AdminError::Conflict(format!(
            "Public key '{public_key}' was deleted concurrently"
        )))
    }

    pub async fn delete_key(&self, public_key: &str) -> AdminResult<()> {
        if self.keys.delete_public_key(public_key).await? {
            Ok(())
        } else {
            Err(public_key_not_found(public_key))
        }
    }

    // =========================================================================
    // Access rules
    // =========================================================================

    /// Validate and store a batch of rules, returning their ids in order
    ///
    /// Nothing is stored unless every rule references an existing group. If
    /// an insert fails part way, the rules already stored from the batch are
    /// deleted again before the error is returned.
    pub async fn add_rules(
        &self,
        public_key: &str,
        rules: Vec<NewAccessRule>,
    ) -> AdminResult<Vec<String>> {
        if rules.is_empty() {
            return Err(AdminError::Validation("No access rules provided".to_string()));
        }
        if !self.keys.public_key_exists(public_key).await? {
            return Err(public_key_not_found(public_key));
        }

        for rule in &rules {
            if let Some(group) = rule.target.group_name() {
                if !self.groups.group_exists(group).await? {
                    return Err(AdminError::UnknownGroup(group.to_string()));
                }
            }
        }

        let mut ids = Vec::with_capacity(rules.len());
        for rule in rules {
            let added = match self.rules.add_access_rule(public_key, rule).await {
                Ok(Some(id)) => Ok(id),
                Ok(None) => Err(public_key_not_found(public_key)),
                Err(error) => Err(error.into()),
            };
            match added {
                Ok(id) => ids.push(id),
                Err(error) => {
                    self.roll_back_rules(public_key, &ids).await;
                    return Err(error);
                }
            }
        }

        info!(public_key, added = ids.len(), "Access rules added");
        Ok(ids)
    }

    /// Remove the rules of a partially stored batch
    async fn roll_back_rules(&self, public_key: &str, ids: &[String]) {
        for id in ids {
            if let Err(error) = self.rules.delete_access_rule(public_key, id).await {
                warn!(public_key, rule_id = %id, %error, "Failed to roll back access rule");
            }
        }
        if !ids.is_empty() {
            warn!(public_key, rolled_back = ids.len(), "Access rule batch rolled back");
        }
    }

    /// Parse a JSON body holding one rule or an array of rules, then add them
    pub async fn add_rules_json(
        &self,
        public_key: &str,
        body: &serde_json::Value,
    ) -> AdminResult<Vec<String>> {
        let rules = match body {
            serde_json::Value::Array(_) => Vec::<NewAccessRule>::deserialize(body),
            _ => NewAccessRule::deserialize(body).map(|rule| vec![rule]),
        }
        .map_err(|e| AdminError::Validation(e.to_string()))?;

        self.add_rules(public_key, rules).await
    }

    pub async fn get_rule(&self, public_key: &str, rule_id: &str) -> AdminResult<AccessRule> {
        self.rules
            .get_access_rule(public_key, rule_id)
            .await?
            .ok_or_else(|| AdminError::NotFound("Access rule not found".to_string()))
    }

    pub async fn delete_rule(&self, public_key: &str, rule_id: &str) -> AdminResult<()> {
        if self.rules.delete_access_rule(public_key, rule_id).await? {
            info!(public_key, rule_id, "Access rule deleted");
            Ok(())
        } else {
            Err(AdminError::NotFound("Access rule not found".to_string()))
        }
    }

    pub async fn list_rules(&self, public_key: &str) -> AdminResult<Vec<AccessRule>> {
        self.ensure_public_key(public_key).await?;
        Ok(self.rules.get_access_list_for_public_key(public_key).await?)
    }

    /// Access list with group references replaced by their resources
    pub async fn list_expanded_rules(&self, public_key: &str) -> AdminResult<Vec<ExpandedAccessRule>> {
        self.ensure_public_key(public_key).await?;
        Ok(self.engine.expanded_access_list(public_key).await?)
    }

    // =========================================================================
    // Groups
    // =========================================================================

    pub async fn get_group(&self, name: &str) -> AdminResult<ResourceGroup> {
        let resources = self
            .groups
            .get_group(name)
            .await?
            .ok_or_else(|| group_not_found(name))?;

        Ok(ResourceGroup {
            name: name.to_string(),
            resources,
        })
    }

    /// Create a group, or replace the resources of an existing one
    pub async fn put_group(&self, name: &str, resources: BTreeSet<String>) -> AdminResult<PutOutcome> {
        if name.is_empty() {
            return Err(AdminError::Validation("Group name must not be empty".to_string()));
        }

        if self.groups.update_resource_group(name, resources.clone()).await? {
            info!(group = name, "Resource group replaced");
            return Ok(PutOutcome::Updated);
        }
        if self.groups.add_resource_group(name, resources).await? {
            info!(group = name, "Resource group created");
            return Ok(PutOutcome::Created);
        }
        Err(AdminError::Conflict(format!("Group '{name}' was created concurrently")))
    }

    /// Delete a group; rules naming it stay in place and stop granting
    pub async fn delete_group(&self, name: &str) -> AdminResult<()> {
        if self.groups.delete_resource_group(name).await? {
            info!(group = name, "Resource group deleted");
            Ok(())
        } else {
            Err(group_not_found(name))
        }
    }

    pub async fn list_groups(&self, query: GroupQuery) -> AdminResult<GroupListing> {
        let page = self.groups.get_groups(query).await?;
        let total_pages = query.total_pages(page.total_count);

        Ok(GroupListing {
            search: PageInfo {
                page: query.page(),
                limit: query.limit(),
                count: page.items.len(),
                hits: page.total_count,
                total_pages,
                has_next: u64::from(query.page()) < total_pages,
                has_previous: query.page() > 1,
            },
            groups: page.items,
        })
    }

    async fn ensure_public_key(&self, public_key: &str) -> AdminResult<()> {
        if self.keys.public_key_exists(public_key).await? {
            Ok(())
        } else {
            Err(public_key_not_found(public_key))
        }
    }
}

fn public_key_not_found(public_key: &str) -> AdminError {
    AdminError::NotFound(format!("Public key '{public_key}' not found"))
}

fn group_not_found(name: &str) -> AdminError {
    AdminError::NotFound(format!("Group '{name}' not found"))
}
