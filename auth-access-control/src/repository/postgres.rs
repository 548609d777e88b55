//! PostgreSQL-backed access control store
//!
//! Tables are created by `migrations/0001_access_control.sql`:
//! - `access_key_pairs`: one row per public key
//! - `access_groups`: group name and its resource array
//! - `access_rules`: rules keyed by uuid, cascading with their public key

use super::{AccessRuleRepository, GroupRepository, KeyPairRepository};
use crate::{
    error::{AccessControlError, Result},
    models::{AccessRule, GroupPage, NewAccessRule, ResourceGroup, RuleTarget, UserScope},
    query::GroupQuery,
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::collections::BTreeSet;
use tracing::{debug, info};
use uuid::Uuid;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

fn storage_error(action: &'static str) -> impl FnOnce(sqlx::Error) -> AccessControlError {
    move |e| AccessControlError::StorageError(format!("Failed to {action}: {e}"))
}

/// PostgreSQL-backed store for key pairs, groups and access rules
pub struct PostgresAccessControlStore {
    pool: PgPool,
}

impl PostgresAccessControlStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create with connection string
    pub async fn from_connection_string(connection_string: &str) -> Result<Self> {
        let pool = PgPool::connect(connection_string)
            .await
            .map_err(storage_error("connect"))?;

        Ok(Self::new(pool))
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| AccessControlError::StorageError(format!("Failed to migrate: {e}")))?;
        info!("Access control schema is up to date");
        Ok(())
    }

    fn rule_from_row(row: &PgRow) -> Result<AccessRule> {
        let id: Uuid = row.try_get("id").map_err(storage_error("decode rule id"))?;
        let resources: Option<Vec<String>> = row
            .try_get("resources")
            .map_err(storage_error("decode rule resources"))?;
        let group: Option<String> = row
            .try_get("group_name")
            .map_err(storage_error("decode rule group"))?;
        let all_users: bool = row
            .try_get("all_users")
            .map_err(storage_error("decode rule users"))?;
        let users: Vec<String> = row
            .try_get("users")
            .map_err(storage_error("decode rule users"))?;

        let users = if all_users {
            UserScope::Wildcard
        } else {
            UserScope::Specific(users.into_iter().collect())
        };
        let rule = NewAccessRule::from_parts(
            resources.map(|resources| resources.into_iter().collect()),
            group,
            users,
        )?;

        Ok(rule.with_id(id.to_string()))
    }
}

#[async_trait]
impl KeyPairRepository for PostgresAccessControlStore {
    async fn add_key_pair(&self, public_key: &str, private_key: SecretString) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO access_key_pairs (public_key, private_key)
            VALUES ($1, $2)
            ON CONFLICT (public_key) DO NOTHING
            "#,
        )
        .bind(public_key)
        .bind(private_key.expose_secret())
        .execute(&self.pool)
        .await
        .map_err(storage_error("add key pair"))?;

        let added = result.rows_affected() == 1;
        if added {
            info!(public_key, "Added key pair");
        }
        Ok(added)
    }

    async fn public_key_exists(&self, public_key: &str) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM access_key_pairs WHERE public_key = $1)",
        )
        .bind(public_key)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_error("look up public key"))
    }

    async fn get_private_key(&self, public_key: &str) -> Result<Option<SecretString>> {
        let private_key = sqlx::query_scalar::<_, String>(
            "SELECT private_key FROM access_key_pairs WHERE public_key = $1",
        )
        .bind(public_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error("fetch private key"))?;

        Ok(private_key.map(SecretString::new))
    }

    async fn update_private_key(
        &self,
        public_key: &str,
        private_key: SecretString,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE access_key_pairs
            SET private_key = $2, updated_at = NOW()
            WHERE public_key = $1
            "#,
        )
        .bind(public_key)
        .bind(private_key.expose_secret())
        .execute(&self.pool)
        .await
        .map_err(storage_error("update private key"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_public_key(&self, public_key: &str) -> Result<bool> {
        // access_rules rows go with the key through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM access_key_pairs WHERE public_key = $1")
            .bind(public_key)
            .execute(&self.pool)
            .await
            .map_err(storage_error("delete public key"))?;

        let deleted = result.rows_affected() == 1;
        if deleted {
            info!(public_key, "Deleted public key");
        }
        Ok(deleted)
    }
}

#[async_trait]
impl GroupRepository for PostgresAccessControlStore {
    async fn group_exists(&self, name: &str) -> Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM access_groups WHERE name = $1)")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_error("look up group"))
    }

    async fn get_group(&self, name: &str) -> Result<Option<BTreeSet<String>>> {
        let resources = sqlx::query_scalar::<_, Vec<String>>(
            "SELECT resources FROM access_groups WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error("fetch group"))?;

        Ok(resources.map(|resources| resources.into_iter().collect()))
    }

    async fn add_resource_group(&self, name: &str, resources: BTreeSet<String>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO access_groups (name, resources)
            VALUES ($1, $2)
            ON CONFLICT (name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(resources.into_iter().collect::<Vec<_>>())
        .execute(&self.pool)
        .await
        .map_err(storage_error("add group"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_resource_group(
        &self,
        name: &str,
        resources: BTreeSet<String>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE access_groups
            SET resources = $2, updated_at = NOW()
            WHERE name = $1
            "#,
        )
        .bind(name)
        .bind(resources.into_iter().collect::<Vec<_>>())
        .execute(&self.pool)
        .await
        .map_err(storage_error("update group"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_resource_group(&self, name: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM access_groups WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(storage_error("delete group"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_groups(&self, query: GroupQuery) -> Result<GroupPage> {
        let offset = i64::try_from(query.offset()).unwrap_or(i64::MAX);

        // Count and page in one transaction so both see the same snapshot
        let mut tx = self.pool.begin().await.map_err(storage_error("start transaction"))?;

        let total_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM access_groups")
            .fetch_one(&mut *tx)
            .await
            .map_err(storage_error("count groups"))?;

        let rows = sqlx::query(
            r#"
            SELECT name, resources
            FROM access_groups
            ORDER BY name
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(i64::from(query.limit()))
        .bind(offset)
        .fetch_all(&mut *tx)
        .await
        .map_err(storage_error("list groups"))?;

        tx.commit().await.map_err(storage_error("commit transaction"))?;

        let items = rows
            .iter()
            .map(|row| {
                let name: String = row.try_get("name").map_err(storage_error("decode group"))?;
                let resources: Vec<String> = row
                    .try_get("resources")
                    .map_err(storage_error("decode group"))?;
                Ok(ResourceGroup::new(name, resources))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(page = query.page(), total_count, "Listed groups");
        Ok(GroupPage {
            items,
            total_count: u64::try_from(total_count).unwrap_or_default(),
        })
    }
}

#[async_trait]
impl AccessRuleRepository for PostgresAccessControlStore {
    async fn add_access_rule(
        &self,
        public_key: &str,
        rule: NewAccessRule,
    ) -> Result<Option<String>> {
        let id = Uuid::new_v4();
        let (resources, group) = match rule.target {
            RuleTarget::Resources(resources) => (Some(resources.into_iter().collect::<Vec<_>>()), None),
            RuleTarget::Group(group) => (None, Some(group)),
        };
        let (all_users, users) = match rule.users {
            UserScope::Wildcard => (true, Vec::new()),
            UserScope::Specific(users) => (false, users.into_iter().collect()),
        };

        let result = sqlx::query(
            r#"
            INSERT INTO access_rules (id, public_key, resources, group_name, all_users, users)
            SELECT $1, $2, $3, $4, $5, $6
            WHERE EXISTS (SELECT 1 FROM access_key_pairs WHERE public_key = $2)
            "#,
        )
        .bind(id)
        .bind(public_key)
        .bind(resources)
        .bind(group)
        .bind(all_users)
        .bind(users)
        .execute(&self.pool)
        .await
        .map_err(storage_error("add access rule"))?;

        if result.rows_affected() == 0 {
            debug!(public_key, "Refusing access rule for unknown public key");
            return Ok(None);
        }

        info!(public_key, rule_id = %id, "Added access rule");
        Ok(Some(id.to_string()))
    }

    async fn get_access_rule(&self, public_key: &str, rule_id: &str) -> Result<Option<AccessRule>> {
        // Ids we never issued cannot exist
        let Ok(id) = Uuid::parse_str(rule_id) else {
            return Ok(None);
        };

        let row = sqlx::query(
            r#"
            SELECT id, resources, group_name, all_users, users
            FROM access_rules
            WHERE public_key = $1 AND id = $2
            "#,
        )
        .bind(public_key)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_error("fetch access rule"))?;

        row.as_ref().map(Self::rule_from_row).transpose()
    }

    async fn delete_access_rule(&self, public_key: &str, rule_id: &str) -> Result<bool> {
        let Ok(id) = Uuid::parse_str(rule_id) else {
            return Ok(false);
        };

        let result = sqlx::query("DELETE FROM access_rules WHERE public_key = $1 AND id = $2")
            .bind(public_key)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_error("delete access rule"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_access_list_for_public_key(&self, public_key: &str) -> Result<Vec<AccessRule>> {
        let rows = sqlx::query(
            r#"
            SELECT id, resources, group_name, all_users, users
            FROM access_rules
            WHERE public_key = $1
            ORDER BY position
            "#,
        )
        .bind(public_key)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error("list access rules"))?;

        rows.iter().map(Self::rule_from_row).collect()
    }
}
