use crate::error::{AccessControlError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Reserved value of `users` meaning "every user"
pub const WILDCARD: &str = "*";

/// Which resources an access rule grants
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleTarget {
    /// A literal resource set
    Resources(BTreeSet<String>),
    /// A named resource group, resolved at evaluation time
    Group(String),
}

impl RuleTarget {
    pub fn resources<I, S>(resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RuleTarget::Resources(resources.into_iter().map(Into::into).collect())
    }

    pub fn group(name: impl Into<String>) -> Self {
        RuleTarget::Group(name.into())
    }

    pub fn group_name(&self) -> Option<&str> {
        match self {
            RuleTarget::Group(name) => Some(name),
            RuleTarget::Resources(_) => None,
        }
    }
}

/// Which users an access rule applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UsersDocument", into = "UsersDocument")]
pub enum UserScope {
    /// Every user, including requests that name no user
    Wildcard,
    /// Exactly the listed users
    Specific(BTreeSet<String>),
}

impl UserScope {
    pub fn specific<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        UserScope::Specific(users.into_iter().map(Into::into).collect())
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, UserScope::Wildcard)
    }

    /// Whether the scope covers `user`
    ///
    /// A request without a user only matches the wildcard scope.
    pub fn matches(&self, user: Option<&str>) -> bool {
        match (self, user) {
            (UserScope::Wildcard, _) => true,
            (UserScope::Specific(_), None) => false,
            (UserScope::Specific(users), Some(user)) => users.contains(user),
        }
    }

    /// Union of two scopes; the wildcard absorbs everything
    pub fn union(self, other: UserScope) -> UserScope {
        match (self, other) {
            (UserScope::Specific(mut left), UserScope::Specific(right)) => {
                left.extend(right);
                UserScope::Specific(left)
            }
            _ => UserScope::Wildcard,
        }
    }
}

impl fmt::Display for UserScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserScope::Wildcard => f.write_str(WILDCARD),
            UserScope::Specific(users) => {
                let users: Vec<&str> = users.iter().map(String::as_str).collect();
                write!(f, "[{}]", users.join(", "))
            }
        }
    }
}

/// Wire shape of `users`: the `"*"` sentinel or a list of user names
///
/// A list that contains the string `"*"` is a specific user called `*`,
/// not the wildcard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum UsersDocument {
    Sentinel(String),
    List(BTreeSet<String>),
}

impl TryFrom<UsersDocument> for UserScope {
    type Error = AccessControlError;

    fn try_from(document: UsersDocument) -> Result<Self> {
        match document {
            UsersDocument::Sentinel(value) if value == WILDCARD => Ok(UserScope::Wildcard),
            UsersDocument::Sentinel(value) => Err(AccessControlError::MalformedRule(format!(
                "Illegal value for users property: {value:?}, expected \"*\" or a list of users"
            ))),
            UsersDocument::List(users) => Ok(UserScope::Specific(users)),
        }
    }
}

impl From<UserScope> for UsersDocument {
    fn from(scope: UserScope) -> Self {
        match scope {
            UserScope::Wildcard => UsersDocument::Sentinel(WILDCARD.to_string()),
            UserScope::Specific(users) => UsersDocument::List(users),
        }
    }
}

/// An access rule that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RuleDocument", into = "RuleDocument")]
pub struct NewAccessRule {
    pub target: RuleTarget,
    pub users: UserScope,
}

impl NewAccessRule {
    pub fn new(target: RuleTarget, users: UserScope) -> Self {
        Self { target, users }
    }

    /// Rule granting a literal resource set
    pub fn for_resources<I, S>(resources: I, users: UserScope) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(RuleTarget::resources(resources), users)
    }

    /// Rule granting whatever the named group holds
    pub fn for_group(group: impl Into<String>, users: UserScope) -> Self {
        Self::new(RuleTarget::group(group), users)
    }

    /// Build a rule from its optional parts, rejecting neither or both targets
    pub fn from_parts(
        resources: Option<BTreeSet<String>>,
        group: Option<String>,
        users: UserScope,
    ) -> Result<Self> {
        let target = match (resources, group) {
            (Some(resources), None) => RuleTarget::Resources(resources),
            (None, Some(group)) => RuleTarget::Group(group),
            (Some(_), Some(_)) => {
                return Err(AccessControlError::MalformedRule(
                    "Both resources and group found in rule".to_string(),
                ))
            }
            (None, None) => {
                return Err(AccessControlError::MalformedRule(
                    "Neither group nor resources found in rule".to_string(),
                ))
            }
        };

        Ok(Self { target, users })
    }

    /// Attach the identifier the store generated
    pub fn with_id(self, id: impl Into<String>) -> AccessRule {
        AccessRule {
            id: id.into(),
            target: self.target,
            users: self.users,
        }
    }
}

/// A stored access rule, owned by exactly one public key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RuleDocument", into = "RuleDocument")]
pub struct AccessRule {
    pub id: String,
    pub target: RuleTarget,
    pub users: UserScope,
}

impl AccessRule {
    /// The rule without its identifier
    pub fn to_new(&self) -> NewAccessRule {
        NewAccessRule {
            target: self.target.clone(),
            users: self.users.clone(),
        }
    }
}

/// Serialized form shared by stored and new rules
///
/// `{"resources": [...], "users": ...}` or `{"group": "...", "users": ...}`,
/// plus `id` once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resources: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group: Option<String>,
    users: UserScope,
}

impl TryFrom<RuleDocument> for NewAccessRule {
    type Error = AccessControlError;

    fn try_from(document: RuleDocument) -> Result<Self> {
        if document.id.is_some() {
            return Err(AccessControlError::MalformedRule(
                "Found unknown properties in rule: [id]".to_string(),
            ));
        }
        NewAccessRule::from_parts(document.resources, document.group, document.users)
    }
}

impl TryFrom<RuleDocument> for AccessRule {
    type Error = AccessControlError;

    fn try_from(document: RuleDocument) -> Result<Self> {
        let id = document
            .id
            .ok_or_else(|| AccessControlError::MalformedRule("Stored rule without id".to_string()))?;
        Ok(NewAccessRule::from_parts(document.resources, document.group, document.users)?.with_id(id))
    }
}

impl From<NewAccessRule> for RuleDocument {
    fn from(rule: NewAccessRule) -> Self {
        let (resources, group) = match rule.target {
            RuleTarget::Resources(resources) => (Some(resources), None),
            RuleTarget::Group(group) => (None, Some(group)),
        };
        RuleDocument {
            id: None,
            resources,
            group,
            users: rule.users,
        }
    }
}

impl From<AccessRule> for RuleDocument {
    fn from(rule: AccessRule) -> Self {
        let AccessRule { id, target, users } = rule;
        let mut document = RuleDocument::from(NewAccessRule { target, users });
        document.id = Some(id);
        document
    }
}

/// An access rule with its group reference resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandedAccessRule {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub resources: BTreeSet<String>,
    pub users: UserScope,
}

/// A named, reusable resource set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceGroup {
    pub name: String,
    pub resources: BTreeSet<String>,
}

impl ResourceGroup {
    pub fn new<I, S>(name: impl Into<String>, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            resources: resources.into_iter().map(Into::into).collect(),
        }
    }
}

/// One page of groups plus the unpaged total
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPage {
    pub items: Vec<ResourceGroup>,
    pub total_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wildcard_matches_missing_user() {
        assert!(UserScope::Wildcard.matches(None));
        assert!(UserScope::Wildcard.matches(Some("anyone")));

        let scope = UserScope::specific(["alice"]);
        assert!(scope.matches(Some("alice")));
        assert!(!scope.matches(Some("bob")));
        assert!(!scope.matches(None));
    }

    #[test]
    fn test_literal_star_is_not_the_wildcard() {
        let scope: UserScope = serde_json::from_value(json!(["*"])).unwrap();
        assert!(!scope.is_wildcard());
        assert!(scope.matches(Some("*")));
        assert!(!scope.matches(Some("alice")));

        let scope: UserScope = serde_json::from_value(json!("*")).unwrap();
        assert!(scope.is_wildcard());

        assert!(serde_json::from_value::<UserScope>(json!("alice")).is_err());
    }

    #[test]
    fn test_scope_union() {
        let merged = UserScope::specific(["alice"]).union(UserScope::specific(["bob"]));
        assert_eq!(merged, UserScope::specific(["alice", "bob"]));

        let merged = UserScope::specific(["alice"]).union(UserScope::Wildcard);
        assert_eq!(merged, UserScope::Wildcard);
    }

    #[test]
    fn test_rule_wire_shape() {
        let rule: NewAccessRule = serde_json::from_value(json!({
            "resources": ["image.get", "image.head"],
            "users": ["alice"],
        }))
        .unwrap();
        assert_eq!(
            rule,
            NewAccessRule::for_resources(["image.get", "image.head"], UserScope::specific(["alice"]))
        );

        let rule: NewAccessRule =
            serde_json::from_value(json!({ "group": "read-stats", "users": "*" })).unwrap();
        assert_eq!(rule.target.group_name(), Some("read-stats"));

        let stored = rule.with_id("abc");
        assert_eq!(
            serde_json::to_value(&stored).unwrap(),
            json!({ "id": "abc", "group": "read-stats", "users": "*" })
        );
    }

    #[test]
    fn test_malformed_rules_are_rejected() {
        let both = json!({ "resources": ["image.get"], "group": "g", "users": "*" });
        let err = serde_json::from_value::<NewAccessRule>(both).unwrap_err();
        assert!(err.to_string().contains("Both resources and group"));

        let neither = json!({ "users": "*" });
        let err = serde_json::from_value::<NewAccessRule>(neither).unwrap_err();
        assert!(err.to_string().contains("Neither group nor resources"));

        let unknown = json!({ "group": "g", "users": "*", "foo": "bar" });
        assert!(serde_json::from_value::<NewAccessRule>(unknown).is_err());

        let missing_users = json!({ "group": "g" });
        assert!(serde_json::from_value::<NewAccessRule>(missing_users).is_err());

        let with_id = json!({ "id": "x", "group": "g", "users": "*" });
        assert!(serde_json::from_value::<NewAccessRule>(with_id).is_err());
    }

    #[test]
    fn test_from_parts() {
        assert!(NewAccessRule::from_parts(None, None, UserScope::Wildcard).is_err());
        assert!(NewAccessRule::from_parts(
            Some(BTreeSet::new()),
            Some("g".to_string()),
            UserScope::Wildcard
        )
        .is_err());

        let rule =
            NewAccessRule::from_parts(Some(BTreeSet::new()), None, UserScope::Wildcard).unwrap();
        assert_eq!(rule.target, RuleTarget::Resources(BTreeSet::new()));
    }
}
