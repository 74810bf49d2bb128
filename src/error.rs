use crate::schema::ValidationError;
use crate::types::Role;
use jsonwebtoken::Algorithm;
use thiserror::Error;

/// Resolver-layer error type.
pub type ResolverError = Box<dyn std::error::Error + Send + Sync>;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
///
/// Token verification failures are not listed here: [`Auth::resolve`](crate::Auth::resolve)
/// captures them into [`SessionResolution::Invalid`](crate::SessionResolution).
#[derive(Debug, Error)]
pub enum Error {
    /// Principal resolver failure.
    #[error("resolver error: {0}")]
    Resolver(#[source] ResolverError),
    /// Invalid identifier input.
    #[error("invalid id: {0}")]
    InvalidId(String),
    /// Invalid permission input.
    #[error("invalid permission: {0}")]
    InvalidPermission(String),
    /// Resource kind is not registered.
    #[error("resource kind not found: {kind}")]
    ResourceNotFound { kind: String },
    /// Raw data does not conform to its declared schema.
    #[error("schema validation failed: {0}")]
    SchemaValidation(#[from] ValidationError),
    /// Role inheritance cycle detected.
    #[error("role cycle detected at role {role}")]
    RoleCycleDetected { role: Role },
    /// Role inheritance depth exceeded.
    #[error("role inheritance depth exceeded at role {role}; max depth {max_depth}")]
    RoleDepthExceeded { role: Role, max_depth: usize },
    /// Expiration input could not be interpreted.
    #[error("invalid expiration: {0}")]
    InvalidExpiration(String),
    /// Signing algorithm is not asymmetric.
    #[error("unsupported signing algorithm: {0:?}")]
    UnsupportedAlgorithm(Algorithm),
    /// Key material could not be imported.
    #[error("key import failed: {0}")]
    Key(#[source] jsonwebtoken::errors::Error),
    /// Token could not be signed.
    #[error("token signing failed: {0}")]
    Token(#[source] jsonwebtoken::errors::Error),
}

impl From<ResolverError> for Error {
    fn from(error: ResolverError) -> Self {
        Self::Resolver(error)
    }
}
