use crate::error::{Error, ResolverError, Result};
use crate::schema::{Attributes, ObjectSchema, ValidationError};
use crate::types::{PrincipalId, Role};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;

/// Authenticated actor. Only [`PrincipalProvider`] constructs principals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Principal {
    id: PrincipalId,
    roles: Vec<Role>,
    attributes: Attributes,
}

impl Principal {
    /// Returns the principal identifier.
    pub fn id(&self) -> &PrincipalId {
        &self.id
    }

    /// Returns roles in resolver order. Duplicates carry no extra meaning.
    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    /// Returns whether the principal holds `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|held| held.as_str() == role)
    }

    /// Returns the validated attribute bag.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Returns a single attribute.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }
}

/// Unvalidated principal data as returned by a resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrincipalRecord {
    /// Principal identifier.
    pub id: String,
    /// Role names.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Attribute bag.
    #[serde(default = "empty_object")]
    pub attributes: Value,
}

fn empty_object() -> Value {
    Value::Object(Attributes::new())
}

impl PrincipalRecord {
    /// Creates a record with no roles and no attributes.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: Vec::new(),
            attributes: empty_object(),
        }
    }

    /// Adds a role.
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    /// Replaces the attribute bag.
    pub fn attributes(mut self, attributes: Value) -> Self {
        self.attributes = attributes;
        self
    }
}

/// Resolver interface looking up principals by id.
///
/// `Ok(None)` means the principal does not exist.
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    /// Returns the record for `id`, if any.
    async fn resolve(
        &self,
        id: &PrincipalId,
    ) -> std::result::Result<Option<PrincipalRecord>, ResolverError>;
}

/// Resolver backed by an async closure. See [`resolver_fn`].
#[derive(Clone, Copy)]
pub struct FnResolver<F>(F);

impl<F> fmt::Debug for FnResolver<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnResolver").finish_non_exhaustive()
    }
}

/// Wraps an async closure as a [`PrincipalResolver`].
pub fn resolver_fn<F, Fut>(f: F) -> FnResolver<F>
where
    F: Fn(PrincipalId) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<Option<PrincipalRecord>, ResolverError>>
        + Send
        + 'static,
{
    FnResolver(f)
}

#[async_trait]
impl<F, Fut> PrincipalResolver for FnResolver<F>
where
    F: Fn(PrincipalId) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<Option<PrincipalRecord>, ResolverError>>
        + Send
        + 'static,
{
    async fn resolve(
        &self,
        id: &PrincipalId,
    ) -> std::result::Result<Option<PrincipalRecord>, ResolverError> {
        (self.0)(id.clone()).await
    }
}

/// Principal schema plus the resolver that produces raw principal data.
pub struct PrincipalProvider<R> {
    roles: HashSet<Role>,
    attributes: ObjectSchema,
    resolver: R,
}

impl<R> fmt::Debug for PrincipalProvider<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrincipalProvider")
            .field("roles", &self.roles)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

impl<R> PrincipalProvider<R> {
    /// Creates a provider with a closed role vocabulary and an attribute schema.
    pub fn new(
        roles: impl IntoIterator<Item = Role>,
        attributes: ObjectSchema,
        resolver: R,
    ) -> Self {
        Self {
            roles: roles.into_iter().collect(),
            attributes,
            resolver,
        }
    }

    /// Returns the role vocabulary.
    pub fn roles(&self) -> &HashSet<Role> {
        &self.roles
    }

    /// Returns the attribute schema.
    pub fn attribute_schema(&self) -> &ObjectSchema {
        &self.attributes
    }

    /// Returns the underlying resolver.
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Validates a raw record against the role vocabulary and attribute schema.
    pub fn validate(&self, record: PrincipalRecord) -> Result<Principal> {
        let id = PrincipalId::new(&record.id)
            .map_err(|err| ValidationError::new("$.id", err.to_string()))?;

        let mut roles = Vec::with_capacity(record.roles.len());
        for (i, raw) in record.roles.iter().enumerate() {
            let role = Role::new(raw)
                .ok()
                .filter(|role| role.as_str() == raw.as_str() && self.roles.contains(role))
                .ok_or_else(|| {
                    ValidationError::new(
                        format!("$.roles[{i}]"),
                        format!("`{raw}` is not a declared role"),
                    )
                })?;
            roles.push(role);
        }

        let attributes = self
            .attributes
            .validate(&record.attributes)
            .map_err(|err| {
                ValidationError::new(err.path.replacen('$', "$.attributes", 1), err.message)
            })?;

        Ok(Principal {
            id,
            roles,
            attributes,
        })
    }
}

impl<R> PrincipalProvider<R>
where
    R: PrincipalResolver,
{
    /// Resolves and validates the principal for `id`.
    ///
    /// Returns `Ok(None)` when the resolver reports no such principal. A record
    /// that violates the schema, or that carries a different id, is an error.
    pub async fn resolve(&self, id: &PrincipalId) -> Result<Option<Principal>> {
        let Some(record) = self.resolver.resolve(id).await.map_err(Error::from)? else {
            return Ok(None);
        };
        if record.id != id.as_str() {
            return Err(ValidationError::new(
                "$.id",
                format!("resolver returned `{}` for `{id}`", record.id),
            )
            .into());
        }
        self.validate(record).map(Some)
    }
}
