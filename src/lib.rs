//! Session tokens, principal resolution and typed access control.
//!
//! An application registers its resource kinds in a [`ResourceRegistry`], describes
//! its principals with a [`PrincipalProvider`], and supplies an
//! [`AccessControlProvider`] that turns a principal into an [`AccessControl`]
//! instance. [`Auth`] ties them together: it issues signed tokens and resolves a
//! token into a [`Session`] carrying the principal and its access instance.
//! Resolution never fails; every problem is reported as [`SessionResolution::Invalid`].
//!
//! # Examples
//!
//! ```no_run
//! use rs_session::{
//!     Action, Algorithm, AuthBuilder, Claims, JwtConfig, ObjectSchema, Permission, PrincipalId,
//!     PrincipalProvider, PrincipalRecord, ResolverError, ResourceKind, ResourceRegistry,
//!     ResourceSchema, Role, RolePolicy, Schema, resolver_fn,
//! };
//! # fn main() -> rs_session::Result<()> {
//! let resources = ResourceRegistry::new([ResourceSchema::new(
//!     ResourceKind::try_from("document")?,
//!     ObjectSchema::new().field("tenantId", Schema::String),
//!     [Action::try_from("read")?],
//! )]);
//! let principals = PrincipalProvider::new(
//!     [Role::try_from("member")?],
//!     ObjectSchema::new(),
//!     resolver_fn(|id: PrincipalId| async move {
//!         Ok::<_, ResolverError>(Some(PrincipalRecord::new(id.as_str()).role("member")))
//!     }),
//! );
//! let policy = RolePolicy::builder()
//!     .grant(Role::try_from("member")?, Permission::try_from("document:read")?)
//!     .build()?;
//! let jwt = JwtConfig::new(Algorithm::EdDSA, "<pkcs8 pem>", "<spki pem>", "issuer", "app");
//!
//! let auth = AuthBuilder::new(principals, resources, policy, jwt).build();
//! let token = auth.generate(Claims::new(PrincipalId::try_from("user_1")?), None)?;
//! let resolution = futures::executor::block_on(auth.resolve(&token));
//! assert!(resolution.is_valid());
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_code)]

mod access;
mod auth;
mod error;
mod expiration;
mod keys;
mod permission;
mod policy;
mod principal;
mod resource;
mod schema;
mod session;
mod types;

#[cfg(feature = "memory-store")]
mod memory_store;

#[cfg(feature = "axum")]
pub mod axum;

pub use crate::access::{AccessControl, AccessControlProvider, Decision, ResourceCheck, SessionAccess};
pub use crate::auth::{Auth, AuthBuilder};
pub use crate::error::{Error, ResolverError, Result};
pub use crate::expiration::Expiration;
pub use crate::keys::{JwtConfig, KeyMaterial};
pub use crate::permission::{DefaultPermissionValidator, Permission, PermissionValidator};
pub use crate::policy::{Condition, PolicyAccess, RolePolicy, RolePolicyBuilder};
pub use crate::principal::{
    FnResolver, Principal, PrincipalProvider, PrincipalRecord, PrincipalResolver, resolver_fn,
};
pub use crate::resource::{Resource, ResourceRegistry, ResourceSchema};
pub use crate::schema::{Attributes, ObjectSchema, Schema, UnknownFields, ValidationError};
pub use crate::session::{
    Claims, Session, SessionClaims, SessionError, SessionErrorCode, SessionResolution,
    TokenMetadata,
};
pub use crate::types::{Action, PrincipalId, ResourceId, ResourceKind, Role};
pub use jsonwebtoken::Algorithm;

#[cfg(feature = "memory-store")]
pub use crate::memory_store::MemoryPrincipalStore;
