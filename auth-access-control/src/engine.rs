use crate::{
    error::Result,
    models::{AccessRule, ExpandedAccessRule, RuleTarget, UserScope},
    repository::{AccessRuleRepository, GroupRepository},
};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Authorization engine answering `(public key, resource, user)` questions
///
/// Holds no state of its own: every call reads the current rules and resolves
/// group references against the current groups, so updating a group changes
/// the outcome of later calls without touching any rule.
#[derive(Clone)]
pub struct AccessControlEngine {
    rules: Arc<dyn AccessRuleRepository>,
    groups: Arc<dyn GroupRepository>,
}

impl AccessControlEngine {
    pub fn new(rules: Arc<dyn AccessRuleRepository>, groups: Arc<dyn GroupRepository>) -> Self {
        Self { rules, groups }
    }

    /// Engine over a single store implementing both repositories
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: AccessRuleRepository + GroupRepository + 'static,
    {
        Self::new(store.clone(), store)
    }

    pub(crate) fn rule_repository(&self) -> &Arc<dyn AccessRuleRepository> {
        &self.rules
    }

    /// Whether `public_key` may access `resource` on behalf of `user`
    ///
    /// The first rule whose effective resources contain `resource` and whose
    /// user scope covers `user` grants access. Unknown keys and missing
    /// groups simply never match.
    pub async fn has_access(
        &self,
        public_key: &str,
        resource: &str,
        user: Option<&str>,
    ) -> Result<bool> {
        let rules = self.rules.get_access_list_for_public_key(public_key).await?;

        for rule in &rules {
            if !self.rule_covers(rule, resource).await? {
                continue;
            }
            if rule.users.matches(user) {
                debug!(public_key, resource, rule_id = %rule.id, "Access granted");
                return Ok(true);
            }
        }

        debug!(public_key, resource, rules = rules.len(), "No rule grants access");
        Ok(false)
    }

    /// Users that `public_key` may act for on `resource`
    ///
    /// Wildcard when any matching rule is a wildcard, otherwise the union of
    /// the matching rules' users (empty when nothing matches).
    pub async fn users_for_resource(&self, public_key: &str, resource: &str) -> Result<UserScope> {
        let rules = self.rules.get_access_list_for_public_key(public_key).await?;
        let mut scope = UserScope::Specific(BTreeSet::new());

        for rule in rules {
            if self.rule_covers(&rule, resource).await? {
                scope = scope.union(rule.users);
                if scope.is_wildcard() {
                    break;
                }
            }
        }

        Ok(scope)
    }

    /// The key's rules with group references replaced by current resources
    pub async fn expanded_access_list(&self, public_key: &str) -> Result<Vec<ExpandedAccessRule>> {
        let rules = self.rules.get_access_list_for_public_key(public_key).await?;
        let mut expanded = Vec::with_capacity(rules.len());

        for rule in rules {
            let resources = self.effective_resources(&rule).await?.into_owned();
            expanded.push(ExpandedAccessRule {
                id: rule.id,
                group: rule.target.group_name().map(ToString::to_string),
                resources,
                users: rule.users,
            });
        }

        Ok(expanded)
    }

    /// Resources a rule grants right now; a missing group grants nothing
    async fn effective_resources<'a>(&self, rule: &'a AccessRule) -> Result<Cow<'a, BTreeSet<String>>> {
        match &rule.target {
            RuleTarget::Resources(resources) => Ok(Cow::Borrowed(resources)),
            RuleTarget::Group(name) => {
                let resources = self.groups.get_group(name).await?.unwrap_or_else(|| {
                    debug!(group = %name, rule_id = %rule.id, "Rule references missing group");
                    BTreeSet::new()
                });
                Ok(Cow::Owned(resources))
            }
        }
    }

    async fn rule_covers(&self, rule: &AccessRule, resource: &str) -> Result<bool> {
        Ok(self.effective_resources(rule).await?.contains(resource))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::AccessControlError,
        models::NewAccessRule,
        repository::{MockAccessRuleRepository, MockGroupRepository},
    };

    fn rule(id: &str, new: NewAccessRule) -> AccessRule {
        new.with_id(id)
    }

    #[tokio::test]
    async fn test_rule_storage_errors_propagate() {
        let mut rules = MockAccessRuleRepository::new();
        rules
            .expect_get_access_list_for_public_key()
            .returning(|_| Err(AccessControlError::StorageError("connection refused".into())));
        let groups = MockGroupRepository::new();

        let engine = AccessControlEngine::new(Arc::new(rules), Arc::new(groups));
        let err = engine.has_access("acme", "image.get", None).await.unwrap_err();
        assert!(matches!(err, AccessControlError::StorageError(_)));
    }

    #[tokio::test]
    async fn test_group_storage_errors_propagate() {
        let mut rules = MockAccessRuleRepository::new();
        rules.expect_get_access_list_for_public_key().returning(|_| {
            Ok(vec![rule("1", NewAccessRule::for_group("g", UserScope::Wildcard))])
        });
        let mut groups = MockGroupRepository::new();
        groups
            .expect_get_group()
            .returning(|_| Err(AccessControlError::StorageError("timeout".into())));

        let engine = AccessControlEngine::new(Arc::new(rules), Arc::new(groups));
        assert!(engine.has_access("acme", "image.get", None).await.is_err());
        assert!(engine.users_for_resource("acme", "image.get").await.is_err());
    }

    #[tokio::test]
    async fn test_first_match_stops_group_lookups() {
        let mut rules = MockAccessRuleRepository::new();
        rules.expect_get_access_list_for_public_key().returning(|_| {
            Ok(vec![
                rule("1", NewAccessRule::for_resources(["image.get"], UserScope::Wildcard)),
                rule("2", NewAccessRule::for_group("g", UserScope::Wildcard)),
            ])
        });
        let mut groups = MockGroupRepository::new();
        groups.expect_get_group().never();

        let engine = AccessControlEngine::new(Arc::new(rules), Arc::new(groups));
        assert!(engine.has_access("acme", "image.get", Some("alice")).await.unwrap());
    }

    #[tokio::test]
    async fn test_users_for_resource_union() {
        let mut rules = MockAccessRuleRepository::new();
        rules.expect_get_access_list_for_public_key().returning(|_| {
            Ok(vec![
                rule("1", NewAccessRule::for_resources(["image.get"], UserScope::specific(["alice"]))),
                rule("2", NewAccessRule::for_resources(["image.get"], UserScope::specific(["bob"]))),
                rule("3", NewAccessRule::for_resources(["image.delete"], UserScope::Wildcard)),
            ])
        });
        let engine = AccessControlEngine::new(Arc::new(rules), Arc::new(MockGroupRepository::new()));

        assert_eq!(
            engine.users_for_resource("acme", "image.get").await.unwrap(),
            UserScope::specific(["alice", "bob"])
        );
        assert_eq!(
            engine.users_for_resource("acme", "image.delete").await.unwrap(),
            UserScope::Wildcard
        );
        assert_eq!(
            engine.users_for_resource("acme", "metadata.get").await.unwrap(),
            UserScope::Specific(BTreeSet::new())
        );
    }
}
