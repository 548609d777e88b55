use super::{AccessRuleRepository, GroupRepository, KeyPairRepository};
use crate::{
    config::AccessControlConfig,
    error::{AccessControlError, Result},
    models::{AccessRule, GroupPage, NewAccessRule, ResourceGroup},
    query::GroupQuery,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use secrecy::{ExposeSecret, SecretString};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Default)]
struct State {
    keys: HashMap<String, SecretString>,
    /// Rules per public key, in insertion order
    rules: HashMap<String, Vec<AccessRule>>,
    groups: BTreeMap<String, BTreeSet<String>>,
}

/// In-memory store for key pairs, groups and access rules
///
/// Reads share a read lock; every write takes the write lock for its whole
/// check-and-mutate step. A frozen store rejects writes with
/// [`AccessControlError::Immutable`].
pub struct InMemoryAccessControlStore {
    state: RwLock<State>,
    mutable: bool,
}

impl InMemoryAccessControlStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            mutable: true,
        }
    }

    /// Seed a store from static configuration
    ///
    /// The store is frozen afterwards unless the config says `mutable: true`.
    pub fn from_config(config: &AccessControlConfig) -> Result<Self> {
        config.validate()?;

        let mut state = State::default();
        for group in &config.groups {
            state
                .groups
                .insert(group.name.clone(), group.resources.clone());
        }

        for key_pair in &config.key_pairs {
            if state.keys.contains_key(&key_pair.public_key) {
                return Err(AccessControlError::DuplicatePublicKey(
                    key_pair.public_key.clone(),
                ));
            }
            state.keys.insert(
                key_pair.public_key.clone(),
                SecretString::new(key_pair.private_key.expose_secret().clone()),
            );

            let rules = key_pair
                .acl
                .iter()
                .cloned()
                .map(|rule| rule.with_id(Uuid::new_v4().to_string()))
                .collect();
            state.rules.insert(key_pair.public_key.clone(), rules);
        }

        info!(
            key_pairs = state.keys.len(),
            groups = state.groups.len(),
            mutable = config.mutable,
            "Seeded access control store from config"
        );

        Ok(Self {
            state: RwLock::new(state),
            mutable: config.mutable,
        })
    }

    /// Reject every subsequent write
    pub fn frozen(mut self) -> Self {
        self.mutable = false;
        self
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    fn ensure_mutable(&self) -> Result<()> {
        if self.mutable {
            Ok(())
        } else {
            Err(AccessControlError::Immutable)
        }
    }
}

impl Default for InMemoryAccessControlStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyPairRepository for InMemoryAccessControlStore {
    async fn add_key_pair(&self, public_key: &str, private_key: SecretString) -> Result<bool> {
        self.ensure_mutable()?;
        let mut state = self.state.write();

        if state.keys.contains_key(public_key) {
            return Ok(false);
        }
        state.keys.insert(public_key.to_string(), private_key);
        info!(public_key, "Added key pair");
        Ok(true)
    }

    async fn public_key_exists(&self, public_key: &str) -> Result<bool> {
        Ok(self.state.read().keys.contains_key(public_key))
    }

    async fn get_private_key(&self, public_key: &str) -> Result<Option<SecretString>> {
        let state = self.state.read();
        Ok(state
            .keys
            .get(public_key)
            .map(|secret| SecretString::new(secret.expose_secret().clone())))
    }

    async fn update_private_key(
        &self,
        public_key: &str,
        private_key: SecretString,
    ) -> Result<bool> {
        self.ensure_mutable()?;
        let mut state = self.state.write();

        match state.keys.get_mut(public_key) {
            Some(secret) => {
                *secret = private_key;
                info!(public_key, "Updated private key");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_public_key(&self, public_key: &str) -> Result<bool> {
        self.ensure_mutable()?;
        let mut state = self.state.write();

        if state.keys.remove(public_key).is_none() {
            return Ok(false);
        }
        let removed_rules = state.rules.remove(public_key).map_or(0, |rules| rules.len());
        info!(public_key, removed_rules, "Deleted public key");
        Ok(true)
    }
}

#[async_trait]
impl GroupRepository for InMemoryAccessControlStore {
    async fn group_exists(&self, name: &str) -> Result<bool> {
        Ok(self.state.read().groups.contains_key(name))
    }

    async fn get_group(&self, name: &str) -> Result<Option<BTreeSet<String>>> {
        Ok(self.state.read().groups.get(name).cloned())
    }

    async fn add_resource_group(&self, name: &str, resources: BTreeSet<String>) -> Result<bool> {
        self.ensure_mutable()?;
        let mut state = self.state.write();

        if state.groups.contains_key(name) {
            return Ok(false);
        }
        info!(group = name, resources = resources.len(), "Added resource group");
        state.groups.insert(name.to_string(), resources);
        Ok(true)
    }

    async fn update_resource_group(
        &self,
        name: &str,
        resources: BTreeSet<String>,
    ) -> Result<bool> {
        self.ensure_mutable()?;
        let mut state = self.state.write();

        match state.groups.get_mut(name) {
            Some(existing) => {
                info!(group = name, resources = resources.len(), "Updated resource group");
                *existing = resources;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_resource_group(&self, name: &str) -> Result<bool> {
        self.ensure_mutable()?;
        let deleted = self.state.write().groups.remove(name).is_some();
        if deleted {
            info!(group = name, "Deleted resource group");
        }
        Ok(deleted)
    }

    async fn get_groups(&self, query: GroupQuery) -> Result<GroupPage> {
        let state = self.state.read();
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit()).unwrap_or(usize::MAX);

        let items = state
            .groups
            .iter()
            .skip(offset)
            .take(limit)
            .map(|(name, resources)| ResourceGroup {
                name: name.clone(),
                resources: resources.clone(),
            })
            .collect();

        Ok(GroupPage {
            items,
            total_count: state.groups.len() as u64,
        })
    }
}

#[async_trait]
impl AccessRuleRepository for InMemoryAccessControlStore {
    async fn add_access_rule(
        &self,
        public_key: &str,
        rule: NewAccessRule,
    ) -> Result<Option<String>> {
        self.ensure_mutable()?;
        let mut state = self.state.write();

        if !state.keys.contains_key(public_key) {
            debug!(public_key, "Refusing access rule for unknown public key");
            return Ok(None);
        }

        let id = Uuid::new_v4().to_string();
        state
            .rules
            .entry(public_key.to_string())
            .or_default()
            .push(rule.with_id(id.clone()));
        info!(public_key, rule_id = %id, "Added access rule");
        Ok(Some(id))
    }

    async fn get_access_rule(&self, public_key: &str, rule_id: &str) -> Result<Option<AccessRule>> {
        let state = self.state.read();
        Ok(state
            .rules
            .get(public_key)
            .and_then(|rules| rules.iter().find(|rule| rule.id == rule_id))
            .cloned())
    }

    async fn delete_access_rule(&self, public_key: &str, rule_id: &str) -> Result<bool> {
        self.ensure_mutable()?;
        let mut state = self.state.write();

        let Some(rules) = state.rules.get_mut(public_key) else {
            return Ok(false);
        };
        let before = rules.len();
        rules.retain(|rule| rule.id != rule_id);
        let deleted = rules.len() != before;
        if deleted {
            info!(public_key, rule_id, "Deleted access rule");
        }
        Ok(deleted)
    }

    async fn get_access_list_for_public_key(&self, public_key: &str) -> Result<Vec<AccessRule>> {
        Ok(self
            .state
            .read()
            .rules
            .get(public_key)
            .cloned()
            .unwrap_or_default())
    }
}
