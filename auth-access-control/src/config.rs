//! Static access control configuration
//!
//! Loaded from a YAML, TOML or JSON file, layered with `IMAGEVAULT_ACL__*`
//! environment variables (`IMAGEVAULT_ACL__MUTABLE=false`).

use crate::{
    error::{AccessControlError, Result},
    models::NewAccessRule,
};
use ::config::{Config, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use tracing::warn;

pub const ENV_PREFIX: &str = "IMAGEVAULT_ACL";

fn default_mutable() -> bool {
    true
}

/// One public key with its private key and access rules
#[derive(Debug, Deserialize)]
pub struct KeyPairConfig {
    pub public_key: String,
    pub private_key: SecretString,
    #[serde(default)]
    pub acl: Vec<NewAccessRule>,
}

/// A named resource group
///
/// Groups are a list rather than a map: the `config` crate lowercases map
/// keys, and group names are case sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    #[serde(default)]
    pub resources: BTreeSet<String>,
}

#[derive(Debug, Deserialize)]
pub struct AccessControlConfig {
    /// Whether the seeded store accepts writes afterwards
    #[serde(default = "default_mutable")]
    pub mutable: bool,

    #[serde(default)]
    pub key_pairs: Vec<KeyPairConfig>,

    #[serde(default)]
    pub groups: Vec<GroupConfig>,

    /// Resources recognized by the request gate besides the catalog
    #[serde(default)]
    pub additional_resources: Vec<String>,
}

impl Default for AccessControlConfig {
    fn default() -> Self {
        Self {
            mutable: default_mutable(),
            key_pairs: Vec::new(),
            groups: Vec::new(),
            additional_resources: Vec::new(),
        }
    }
}

impl AccessControlConfig {
    /// Load from a file, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AccessControlError::InvalidConfig(e.to_string()))?;

        let parsed: Self = config
            .try_deserialize()
            .map_err(|e| AccessControlError::InvalidConfig(e.to_string()))?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<()> {
        let mut group_names = HashSet::new();
        for group in &self.groups {
            if group.name.is_empty() {
                return Err(AccessControlError::InvalidConfig(
                    "Group names must not be empty".to_string(),
                ));
            }
            if !group_names.insert(group.name.as_str()) {
                return Err(AccessControlError::InvalidConfig(format!(
                    "Group '{}' is declared more than once",
                    group.name
                )));
            }
        }

        let mut seen = HashSet::new();

        for key_pair in &self.key_pairs {
            if key_pair.public_key.is_empty() {
                return Err(AccessControlError::InvalidConfig(
                    "Public keys must not be empty".to_string(),
                ));
            }
            if key_pair.private_key.expose_secret().is_empty() {
                return Err(AccessControlError::InvalidConfig(format!(
                    "Private key of '{}' must not be empty",
                    key_pair.public_key
                )));
            }
            if !seen.insert(key_pair.public_key.as_str()) {
                return Err(AccessControlError::DuplicatePublicKey(
                    key_pair.public_key.clone(),
                ));
            }

            for rule in &key_pair.acl {
                if let Some(group) = rule.target.group_name() {
                    if !group_names.contains(group) {
                        warn!(
                            public_key = %key_pair.public_key,
                            group,
                            "Access rule references a group missing from config"
                        );
                    }
                }
            }
        }

        Ok(())
    }
}
