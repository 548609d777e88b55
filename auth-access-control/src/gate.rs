//! Per-request access decision
//!
//! The gate runs once per routed request, after the signature has been
//! verified, and decides whether the signing public key may touch the
//! requested resource.

use crate::{engine::AccessControlEngine, error::Result, resource::Resource};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

/// What the gate knows about one request
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Public key that signed the request
    pub public_key: String,
    /// Resource identifier derived from route and method
    pub resource: String,
    /// User the request acts on, if the route has one
    pub user: Option<String>,
    /// `publickey` segment of the route, for access rule routes
    pub route_public_key: Option<String>,
    /// `group` segment of the route, for group routes
    pub route_group: Option<String>,
}

impl RequestContext {
    pub fn new(public_key: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            resource: resource.into(),
            ..Default::default()
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_route_public_key(mut self, public_key: impl Into<String>) -> Self {
        self.route_public_key = Some(public_key.into());
        self
    }

    pub fn with_route_group(mut self, group: impl Into<String>) -> Self {
        self.route_group = Some(group.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantReason {
    /// An access rule covers the resource and user
    Rule,
    /// Reading the access rules of the signing key itself
    OwnPublicKey,
    /// Reading a group that one of the key's rules references
    GroupMembership,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    MissingPublicKey,
    UnknownResource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum GateDecision {
    Granted(GrantReason),
    Denied,
    /// The request cannot be evaluated at all (answered with 400)
    Rejected(RejectReason),
}

impl GateDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, GateDecision::Granted(_))
    }
}

const OWN_PUBLIC_KEY_RESOURCES: &[Resource] = &[
    Resource::AccessRuleGet,
    Resource::AccessRuleHead,
    Resource::AccessRuleOptions,
    Resource::AccessRulesGet,
    Resource::AccessRulesHead,
    Resource::AccessRulesOptions,
];

const GROUP_LOOKUP_RESOURCES: &[Resource] =
    &[Resource::GroupGet, Resource::GroupHead, Resource::GroupOptions];

/// Access decision for routed requests
#[derive(Clone)]
pub struct RequestGate {
    engine: AccessControlEngine,
    additional_resources: HashSet<String>,
}

impl RequestGate {
    pub fn new(engine: AccessControlEngine) -> Self {
        Self {
            engine,
            additional_resources: HashSet::new(),
        }
    }

    /// Recognize resources outside the catalog, e.g. from plugins
    pub fn with_additional_resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.additional_resources
            .extend(resources.into_iter().map(Into::into));
        self
    }

    pub async fn check(&self, request: &RequestContext) -> Result<GateDecision> {
        if request.public_key.is_empty() {
            warn!(resource = %request.resource, "Request without public key");
            return Ok(GateDecision::Rejected(RejectReason::MissingPublicKey));
        }

        let catalog_entry = request.resource.parse::<Resource>().ok();
        if catalog_entry.is_none() && !self.additional_resources.contains(&request.resource) {
            warn!(resource = %request.resource, "Request for unknown resource");
            return Ok(GateDecision::Rejected(RejectReason::UnknownResource));
        }

        if self
            .engine
            .has_access(&request.public_key, &request.resource, request.user.as_deref())
            .await?
        {
            return Ok(GateDecision::Granted(GrantReason::Rule));
        }

        if let Some(resource) = catalog_entry {
            if let Some(reason) = self.implicit_grant(resource, request).await? {
                debug!(public_key = %request.public_key, %resource, ?reason, "Implicit access granted");
                return Ok(GateDecision::Granted(reason));
            }
        }

        warn!(
            public_key = %request.public_key,
            resource = %request.resource,
            user = request.user.as_deref().unwrap_or("-"),
            "Permission denied (public key)"
        );
        Ok(GateDecision::Denied)
    }

    async fn implicit_grant(
        &self,
        resource: Resource,
        request: &RequestContext,
    ) -> Result<Option<GrantReason>> {
        if OWN_PUBLIC_KEY_RESOURCES.contains(&resource)
            && request.route_public_key.as_deref() == Some(request.public_key.as_str())
        {
            return Ok(Some(GrantReason::OwnPublicKey));
        }

        if GROUP_LOOKUP_RESOURCES.contains(&resource) {
            if let Some(route_group) = request.route_group.as_deref() {
                let rules = self
                    .engine
                    .rule_repository()
                    .get_access_list_for_public_key(&request.public_key)
                    .await?;
                if rules
                    .iter()
                    .any(|rule| rule.target.group_name() == Some(route_group))
                {
                    return Ok(Some(GrantReason::GroupMembership));
                }
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_serialization() {
        let granted = serde_json::to_value(GateDecision::Granted(GrantReason::OwnPublicKey)).unwrap();
        assert_eq!(
            granted,
            serde_json::json!({ "decision": "granted", "reason": "own_public_key" })
        );

        let denied = serde_json::to_value(GateDecision::Denied).unwrap();
        assert_eq!(denied, serde_json::json!({ "decision": "denied" }));
    }
}
