use crate::expiration::Expiration;
use crate::principal::Principal;
use crate::types::PrincipalId;
use jsonwebtoken::Header;
use jsonwebtoken::errors::ErrorKind;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

const REGISTERED_CLAIMS: [&str; 6] = ["sub", "iss", "aud", "iat", "exp", "nbf"];

/// Caller-supplied claims for [`Auth::generate`](crate::Auth::generate).
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    id: PrincipalId,
    not_before: Option<Expiration>,
    extra: Map<String, Value>,
}

impl Claims {
    /// Creates claims for subject `id`.
    pub fn new(id: PrincipalId) -> Self {
        Self {
            id,
            not_before: None,
            extra: Map::new(),
        }
    }

    /// Adds a custom claim. Registered claim names (`sub`, `iss`, `aud`, `iat`,
    /// `exp`, `nbf`) are owned by the token issuer and are ignored here.
    pub fn with_claim(mut self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        if !REGISTERED_CLAIMS.contains(&name.as_str()) {
            self.extra.insert(name, value);
        }
        self
    }

    /// Sets the `nbf` claim.
    pub fn not_before(mut self, at: impl Into<Expiration>) -> Self {
        self.not_before = Some(at.into());
        self
    }

    /// Returns the subject id.
    pub fn id(&self) -> &PrincipalId {
        &self.id
    }

    pub(crate) fn into_payload(
        self,
        issuer: &str,
        audience: &str,
        now: i64,
        expiration: Expiration,
    ) -> SessionClaims {
        SessionClaims {
            sub: self.id.as_str().to_string(),
            iss: issuer.to_string(),
            aud: audience.to_string(),
            iat: now,
            exp: expiration.resolve(now),
            nbf: self.not_before.map(|nbf| nbf.resolve(now)),
            extra: self.extra,
        }
    }
}

/// Signed token payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: the principal id.
    pub sub: String,
    /// Issuer.
    pub iss: String,
    /// Audience.
    pub aud: String,
    /// Issued-at, Unix seconds.
    pub iat: i64,
    /// Expiration, Unix seconds.
    pub exp: i64,
    /// Not-before, Unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    /// Custom claims.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Verified token header and payload.
#[derive(Debug, Clone, Serialize)]
pub struct TokenMetadata {
    /// Protected header.
    pub header: Header,
    /// Verified claims.
    pub payload: SessionClaims,
}

/// Machine-readable reason a session did not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionErrorCode {
    /// Token is not a well-formed signed token.
    TokenMalformed,
    /// Signature does not verify against the public key.
    SignatureInvalid,
    /// `exp` is in the past.
    TokenExpired,
    /// `nbf` is in the future.
    TokenNotYetValid,
    /// `iss` does not match.
    IssuerMismatch,
    /// `aud` does not match.
    AudienceMismatch,
    /// A required claim is absent.
    ClaimMissing,
    /// Header algorithm does not match the configured algorithm.
    AlgorithmMismatch,
    /// Token verified but no principal exists for its subject.
    PrincipalNotFound,
    /// Anything else.
    InternalError,
}

impl SessionErrorCode {
    /// Returns the stable string form.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionErrorCode::TokenMalformed => "token_malformed",
            SessionErrorCode::SignatureInvalid => "signature_invalid",
            SessionErrorCode::TokenExpired => "token_expired",
            SessionErrorCode::TokenNotYetValid => "token_not_yet_valid",
            SessionErrorCode::IssuerMismatch => "issuer_mismatch",
            SessionErrorCode::AudienceMismatch => "audience_mismatch",
            SessionErrorCode::ClaimMissing => "claim_missing",
            SessionErrorCode::AlgorithmMismatch => "algorithm_mismatch",
            SessionErrorCode::PrincipalNotFound => "principal_not_found",
            SessionErrorCode::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for SessionErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failed session resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{code}: {message}")]
pub struct SessionError {
    code: SessionErrorCode,
    message: String,
}

impl SessionError {
    /// Creates a session error.
    pub fn new(code: SessionErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Returns the error code.
    pub fn code(&self) -> SessionErrorCode {
        self.code
    }

    /// Returns the human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<jsonwebtoken::errors::Error> for SessionError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        let code = match err.kind() {
            ErrorKind::InvalidSignature => SessionErrorCode::SignatureInvalid,
            ErrorKind::ExpiredSignature => SessionErrorCode::TokenExpired,
            ErrorKind::ImmatureSignature => SessionErrorCode::TokenNotYetValid,
            ErrorKind::InvalidIssuer => SessionErrorCode::IssuerMismatch,
            ErrorKind::InvalidAudience => SessionErrorCode::AudienceMismatch,
            ErrorKind::MissingRequiredClaim(_) => SessionErrorCode::ClaimMissing,
            ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm => SessionErrorCode::AlgorithmMismatch,
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => SessionErrorCode::TokenMalformed,
            _ => SessionErrorCode::InternalError,
        };
        Self::new(code, err.to_string())
    }
}

/// Resolved session: the principal, its access instance and the verified token.
#[derive(Debug, Clone)]
pub struct Session<A> {
    principal: Principal,
    access: A,
    token: TokenMetadata,
}

impl<A> Session<A> {
    pub(crate) fn new(principal: Principal, access: A, token: TokenMetadata) -> Self {
        Self {
            principal,
            access,
            token,
        }
    }

    /// Returns the resolved principal.
    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Returns the access instance bound to the principal.
    pub fn access(&self) -> &A {
        &self.access
    }

    /// Returns the verified token header and payload.
    pub fn token(&self) -> &TokenMetadata {
        &self.token
    }

    /// Public projection: `{ "id": <subject> }`.
    pub fn to_json(&self) -> Value {
        serde_json::json!({ "id": self.principal.id() })
    }
}

/// Serializes only the subject id.
impl<A> Serialize for Session<A> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Session", 1)?;
        state.serialize_field("id", self.principal.id())?;
        state.end()
    }
}

/// Outcome of [`Auth::resolve`](crate::Auth::resolve).
#[derive(Debug, Clone)]
pub enum SessionResolution<A> {
    /// Token verified and principal resolved.
    Valid(Session<A>),
    /// Resolution failed.
    Invalid(SessionError),
}

impl<A> SessionResolution<A> {
    /// Returns `true` for [`SessionResolution::Valid`].
    pub fn is_valid(&self) -> bool {
        matches!(self, SessionResolution::Valid(_))
    }

    /// Returns the session, if valid.
    pub fn session(&self) -> Option<&Session<A>> {
        match self {
            SessionResolution::Valid(session) => Some(session),
            SessionResolution::Invalid(_) => None,
        }
    }

    /// Returns the error, if invalid.
    pub fn error(&self) -> Option<&SessionError> {
        match self {
            SessionResolution::Valid(_) => None,
            SessionResolution::Invalid(err) => Some(err),
        }
    }

    /// Converts into a `Result`.
    pub fn into_result(self) -> Result<Session<A>, SessionError> {
        match self {
            SessionResolution::Valid(session) => Ok(session),
            SessionResolution::Invalid(err) => Err(err),
        }
    }
}
