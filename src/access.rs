//! Access control contract.
//!
//! An [`AccessControlProvider`] turns a resolved [`Principal`] into an
//! [`AccessControl`] instance bound to that principal. The evaluation logic is
//! supplied by the application; [`RolePolicy`](crate::RolePolicy) is one ready-made
//! implementation.

use crate::principal::Principal;
use crate::resource::{Resource, ResourceRegistry};
use crate::types::Action;
use std::sync::Arc;

/// Authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Permission is granted.
    Allow,
    /// Permission is denied.
    Deny,
}

impl Decision {
    /// Returns `true` for [`Decision::Allow`].
    pub fn is_allow(self) -> bool {
        matches!(self, Decision::Allow)
    }
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        if allowed { Decision::Allow } else { Decision::Deny }
    }
}

/// Resource annotated with a decision for each requested action.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceCheck {
    resource: Resource,
    decisions: Vec<(Action, Decision)>,
}

impl ResourceCheck {
    /// Returns the checked resource.
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// Returns decisions in request order.
    pub fn decisions(&self) -> &[(Action, Decision)] {
        &self.decisions
    }

    /// Iterates the permitted actions in request order.
    pub fn permitted(&self) -> impl Iterator<Item = &Action> {
        self.decisions
            .iter()
            .filter(|(_, decision)| decision.is_allow())
            .map(|(action, _)| action)
    }

    /// Returns whether `action` was requested and permitted.
    pub fn is_permitted(&self, action: &str) -> bool {
        self.decisions
            .iter()
            .any(|(requested, decision)| requested.as_str() == action && decision.is_allow())
    }

    /// Returns whether every requested action was permitted.
    ///
    /// An empty request permits nothing and returns `false`.
    pub fn all_permitted(&self) -> bool {
        !self.decisions.is_empty() && self.decisions.iter().all(|(_, decision)| decision.is_allow())
    }
}

/// Per-principal permission evaluation.
pub trait AccessControl: Send + Sync {
    /// Returns whether the bound principal may perform `action` on `resource`.
    fn is_allowed(&self, resource: &Resource, action: &Action) -> bool;

    /// Same as [`is_allowed`](Self::is_allowed), as a [`Decision`].
    fn decide(&self, resource: &Resource, action: &Action) -> Decision {
        Decision::from(self.is_allowed(resource, action))
    }

    /// Evaluates several actions against one resource.
    fn check_resource(&self, resource: &Resource, actions: &[Action]) -> ResourceCheck {
        ResourceCheck {
            resource: resource.clone(),
            decisions: actions
                .iter()
                .map(|action| (action.clone(), self.decide(resource, action)))
                .collect(),
        }
    }

    /// Evaluates a batch; the output has one entry per input, in input order.
    fn check_resources(&self, requests: &[(Resource, Vec<Action>)]) -> Vec<ResourceCheck> {
        requests
            .iter()
            .map(|(resource, actions)| self.check_resource(resource, actions))
            .collect()
    }
}

/// Factory producing an [`AccessControl`] instance for a principal.
///
/// Implementations must be deterministic for a given principal snapshot.
pub trait AccessControlProvider: Send + Sync {
    /// Instance type bound to one principal.
    type Access: AccessControl;

    /// Builds the instance for `principal`.
    fn access(&self, principal: &Principal) -> Self::Access;
}

impl<F, A> AccessControlProvider for F
where
    F: Fn(&Principal) -> A + Send + Sync,
    A: AccessControl,
{
    type Access = A;

    fn access(&self, principal: &Principal) -> A {
        self(principal)
    }
}

/// Access instance handed out with a session.
///
/// Denies any action outside the resource kind's registered vocabulary, then
/// delegates to the provider's instance.
#[derive(Debug, Clone)]
pub struct SessionAccess<A> {
    inner: A,
    resources: Arc<ResourceRegistry>,
}

impl<A> SessionAccess<A> {
    pub(crate) fn new(inner: A, resources: Arc<ResourceRegistry>) -> Self {
        Self { inner, resources }
    }

    /// Returns the provider's instance.
    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Returns the registry this instance checks action vocabularies against.
    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }
}

impl<A> AccessControl for SessionAccess<A>
where
    A: AccessControl,
{
    fn is_allowed(&self, resource: &Resource, action: &Action) -> bool {
        self.resources
            .is_action_allowed(resource.kind().as_str(), action.as_str())
            && self.inner.is_allowed(resource, action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::principal::{PrincipalProvider, PrincipalRecord};
    use crate::resource::ResourceSchema;
    use crate::schema::{ObjectSchema, Schema};
    use crate::types::{ResourceKind, Role};
    use serde_json::{Value, json};

    struct TenantAccess {
        tenant: Option<Value>,
    }

    impl AccessControl for TenantAccess {
        fn is_allowed(&self, resource: &Resource, _action: &Action) -> bool {
            self.tenant.is_some() && resource.attribute("tenantId") == self.tenant.as_ref()
        }
    }

    fn tenant_access(principal: &Principal) -> TenantAccess {
        TenantAccess {
            tenant: principal.attribute("tenantId").cloned(),
        }
    }

    fn action(value: &str) -> Action {
        Action::try_from(value).unwrap()
    }

    fn registry() -> ResourceRegistry {
        ResourceRegistry::new([ResourceSchema::new(
            ResourceKind::try_from("user").unwrap(),
            ObjectSchema::new()
                .field("tenantId", Schema::String)
                .field("public", Schema::Bool),
            [action("read"), action("update")],
        )])
    }

    fn principal(tenant: &str) -> Principal {
        let provider = PrincipalProvider::new(
            [Role::try_from("member").unwrap()],
            ObjectSchema::new().field("tenantId", Schema::String),
            (),
        );
        provider
            .validate(
                PrincipalRecord::new("account-a")
                    .role("member")
                    .attributes(json!({"tenantId": tenant})),
            )
            .unwrap()
    }

    fn user(registry: &ResourceRegistry, id: &str, tenant: &str) -> Resource {
        registry
            .parse("user", id, &json!({"tenantId": tenant, "public": true}))
            .unwrap()
    }

    #[test]
    fn closure_provider_should_compare_tenant_attributes() {
        let registry = registry();
        let resource = user(&registry, "u1", "t1");
        let provider = tenant_access;

        assert!(provider.access(&principal("t1")).is_allowed(&resource, &action("read")));
        assert!(!provider.access(&principal("t2")).is_allowed(&resource, &action("read")));
    }

    #[test]
    fn is_allowed_should_be_deterministic() {
        let registry = registry();
        let resource = user(&registry, "u1", "t1");
        let access = tenant_access(&principal("t1"));

        let first = access.is_allowed(&resource, &action("read"));
        for _ in 0..10 {
            assert_eq!(access.is_allowed(&resource, &action("read")), first);
        }
    }

    #[test]
    fn check_resources_should_preserve_order_and_length() {
        let registry = registry();
        let access = tenant_access(&principal("t1"));
        let requests = vec![
            (user(&registry, "u1", "t1"), vec![action("read")]),
            (user(&registry, "u2", "t2"), vec![action("read"), action("update")]),
            (user(&registry, "u3", "t1"), vec![]),
        ];

        let checks = access.check_resources(&requests);

        assert_eq!(checks.len(), 3);
        let ids: Vec<&str> = checks.iter().map(|c| c.resource().id().as_str()).collect();
        assert_eq!(ids, ["u1", "u2", "u3"]);
        assert!(checks[0].all_permitted());
        assert_eq!(checks[1].decisions().len(), 2);
        assert_eq!(checks[1].permitted().count(), 0);
        assert!(checks[2].decisions().is_empty());
        assert!(!checks[2].all_permitted());
    }

    #[test]
    fn session_access_should_deny_unregistered_action() {
        let registry = Arc::new(registry());
        let resource = user(&registry, "u1", "t1");
        let access = SessionAccess::new(tenant_access(&principal("t1")), Arc::clone(&registry));

        let check = access.check_resource(&resource, &[action("read"), action("delete")]);

        assert!(check.is_permitted("read"));
        assert!(!check.is_permitted("delete"));
        assert!(!check.all_permitted());
        assert_eq!(check.permitted().collect::<Vec<_>>(), [&action("read")]);
    }
}
