use crate::access::{AccessControl, AccessControlProvider};
use crate::error::{Error, Result};
use crate::permission::{Permission, permission_matches};
use crate::principal::Principal;
use crate::resource::Resource;
use crate::types::{Action, ResourceKind, Role};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Attribute condition attached to a resource kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `principal.attributes[principal] == resource.attr[resource]`, both present and non-null.
    AttributeMatch { principal: String, resource: String },
    /// `resource.attr[attribute] == principal.id`.
    Owner { attribute: String },
}

impl Condition {
    /// Shorthand for [`Condition::AttributeMatch`].
    pub fn attribute_match(principal: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::AttributeMatch {
            principal: principal.into(),
            resource: resource.into(),
        }
    }

    /// Shorthand for [`Condition::Owner`].
    pub fn owner(attribute: impl Into<String>) -> Self {
        Self::Owner {
            attribute: attribute.into(),
        }
    }

    fn holds(&self, principal: &Principal, resource: &Resource) -> bool {
        match self {
            Condition::AttributeMatch {
                principal: p_attr,
                resource: r_attr,
            } => match (principal.attribute(p_attr), resource.attribute(r_attr)) {
                (Some(expected), Some(actual)) => !expected.is_null() && expected == actual,
                _ => false,
            },
            Condition::Owner { attribute } => matches!(
                resource.attribute(attribute),
                Some(Value::String(owner)) if owner == principal.id().as_str()
            ),
        }
    }
}

/// Role-based access policy with attribute conditions.
///
/// A principal may perform an action when one of its roles (including inherited
/// roles, if enabled) grants `kind:action` and every condition registered for the
/// resource kind holds.
#[derive(Debug, Clone)]
pub struct RolePolicy {
    inner: Arc<PolicyInner>,
}

#[derive(Debug)]
struct PolicyInner {
    effective: HashMap<Role, HashSet<Permission>>,
    conditions: HashMap<ResourceKind, Vec<Condition>>,
    enable_wildcard: bool,
}

/// Builder for [`RolePolicy`].
#[derive(Debug, Clone)]
pub struct RolePolicyBuilder {
    grants: HashMap<Role, HashSet<Permission>>,
    inherits: HashMap<Role, Vec<Role>>,
    conditions: HashMap<ResourceKind, Vec<Condition>>,
    enable_role_hierarchy: bool,
    enable_wildcard: bool,
    max_inherit_depth: usize,
}

impl Default for RolePolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RolePolicyBuilder {
    /// Creates a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            grants: HashMap::new(),
            inherits: HashMap::new(),
            conditions: HashMap::new(),
            enable_role_hierarchy: false,
            enable_wildcard: false,
            max_inherit_depth: 16,
        }
    }

    /// Grants `permission` to `role`.
    pub fn grant(mut self, role: Role, permission: Permission) -> Self {
        self.grants.entry(role).or_default().insert(permission);
        self
    }

    /// Declares `parent` as a role inherited by `role`.
    pub fn inherit(mut self, role: Role, parent: Role) -> Self {
        let parents = self.inherits.entry(role).or_default();
        if !parents.contains(&parent) {
            parents.push(parent);
        }
        self
    }

    /// Adds a condition that must hold for every action on `kind`.
    pub fn condition(mut self, kind: ResourceKind, condition: Condition) -> Self {
        self.conditions.entry(kind).or_default().push(condition);
        self
    }

    /// Enables or disables role inheritance.
    pub fn enable_role_hierarchy(mut self, on: bool) -> Self {
        self.enable_role_hierarchy = on;
        self
    }

    /// Enables or disables wildcard permission matching.
    pub fn enable_wildcard(mut self, on: bool) -> Self {
        self.enable_wildcard = on;
        self
    }

    /// Sets maximum inheritance depth.
    pub fn max_inherit_depth(mut self, depth: usize) -> Self {
        self.max_inherit_depth = depth;
        self
    }

    /// Builds the policy, resolving each role's effective permissions.
    pub fn build(self) -> Result<RolePolicy> {
        let mut roles: Vec<&Role> = self.grants.keys().chain(self.inherits.keys()).collect();
        roles.sort();
        roles.dedup();

        let mut effective = HashMap::with_capacity(roles.len());
        for role in roles {
            let expanded = if self.enable_role_hierarchy {
                self.expand_role(role)?
            } else {
                vec![role.clone()]
            };
            let permissions: HashSet<Permission> = expanded
                .iter()
                .filter_map(|r| self.grants.get(r))
                .flatten()
                .cloned()
                .collect();
            effective.insert(role.clone(), permissions);
        }

        tracing::debug!(
            roles = effective.len(),
            kinds_with_conditions = self.conditions.len(),
            "role policy built"
        );

        Ok(RolePolicy {
            inner: Arc::new(PolicyInner {
                effective,
                conditions: self.conditions,
                enable_wildcard: self.enable_wildcard,
            }),
        })
    }

    fn parents_of(&self, role: &Role) -> Vec<Role> {
        self.inherits.get(role).cloned().unwrap_or_default()
    }

    fn expand_role(&self, role: &Role) -> Result<Vec<Role>> {
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();
        let mut output = Vec::new();

        visiting.insert(role.clone());
        output.push(role.clone());

        let mut stack: Vec<(Role, usize, std::vec::IntoIter<Role>)> =
            vec![(role.clone(), 0, self.parents_of(role).into_iter())];

        while let Some((current, depth, mut iter)) = stack.pop() {
            if let Some(parent) = iter.next() {
                stack.push((current, depth, iter));

                let next_depth = depth + 1;
                if next_depth > self.max_inherit_depth {
                    return Err(Error::RoleDepthExceeded {
                        role: parent,
                        max_depth: self.max_inherit_depth,
                    });
                }
                if visiting.contains(&parent) {
                    return Err(Error::RoleCycleDetected { role: parent });
                }
                if visited.contains(&parent) {
                    continue;
                }

                visiting.insert(parent.clone());
                output.push(parent.clone());
                let parents = self.parents_of(&parent);
                stack.push((parent, next_depth, parents.into_iter()));
                continue;
            }

            visiting.remove(&current);
            visited.insert(current);
        }

        Ok(output)
    }
}

impl RolePolicy {
    /// Creates a builder.
    pub fn builder() -> RolePolicyBuilder {
        RolePolicyBuilder::new()
    }

    /// Returns the effective permissions of `roles`, inheritance applied.
    pub fn effective_permissions<'a>(
        &self,
        roles: impl IntoIterator<Item = &'a Role>,
    ) -> HashSet<Permission> {
        roles
            .into_iter()
            .filter_map(|role| self.inner.effective.get(role))
            .flatten()
            .cloned()
            .collect()
    }
}

impl AccessControlProvider for RolePolicy {
    type Access = PolicyAccess;

    fn access(&self, principal: &Principal) -> PolicyAccess {
        PolicyAccess {
            principal: principal.clone(),
            permissions: self.effective_permissions(principal.roles()).into_iter().collect(),
            policy: Arc::clone(&self.inner),
        }
    }
}

/// [`RolePolicy`] instance bound to one principal snapshot.
#[derive(Debug, Clone)]
pub struct PolicyAccess {
    principal: Principal,
    permissions: Vec<Permission>,
    policy: Arc<PolicyInner>,
}

impl PolicyAccess {
    /// Returns the principal this instance evaluates for.
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Returns the principal's effective permissions.
    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }
}

impl AccessControl for PolicyAccess {
    fn is_allowed(&self, resource: &Resource, action: &Action) -> bool {
        let kind = resource.kind().as_str();
        let granted = self.permissions.iter().any(|granted| {
            permission_matches(granted, kind, action.as_str(), self.policy.enable_wildcard)
        });
        if !granted {
            return false;
        }
        self.policy.conditions.get(kind).is_none_or(|conditions| {
            conditions
                .iter()
                .all(|condition| condition.holds(&self.principal, resource))
        })
    }
}
