use crate::access::{AccessControlProvider, SessionAccess};
use crate::error::{Error, Result};
use crate::expiration::Expiration;
use crate::keys::{JwtConfig, KeyMaterial};
use crate::principal::{PrincipalProvider, PrincipalResolver};
use crate::resource::ResourceRegistry;
use crate::session::{
    Claims, Session, SessionClaims, SessionError, SessionErrorCode, SessionResolution,
    TokenMetadata,
};
use crate::types::PrincipalId;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use std::fmt;
use std::sync::Arc;

/// Session orchestrator: issues tokens and resolves them into sessions.
pub struct Auth<R, P> {
    principals: PrincipalProvider<R>,
    resources: Arc<ResourceRegistry>,
    access: P,
    keys: KeyMaterial,
    validation: Validation,
    default_expiration: Expiration,
}

impl<R, P> fmt::Debug for Auth<R, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth")
            .field("principals", &self.principals)
            .field("resources", &self.resources)
            .field("keys", &self.keys)
            .field("default_expiration", &self.default_expiration)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Auth`].
pub struct AuthBuilder<R, P> {
    principals: PrincipalProvider<R>,
    resources: ResourceRegistry,
    access: P,
    jwt: JwtConfig,
    default_expiration: Expiration,
}

impl<R, P> AuthBuilder<R, P> {
    /// Creates a new builder. Tokens expire after one hour unless configured otherwise.
    pub fn new(
        principals: PrincipalProvider<R>,
        resources: ResourceRegistry,
        access: P,
        jwt: JwtConfig,
    ) -> Self {
        Self {
            principals,
            resources,
            access,
            jwt,
            default_expiration: Expiration::default(),
        }
    }

    /// Sets the expiration used when [`Auth::generate`] receives none.
    pub fn default_expiration(mut self, expiration: impl Into<Expiration>) -> Self {
        self.default_expiration = expiration.into();
        self
    }

    /// Builds the orchestrator. Keys are imported on first use.
    pub fn build(self) -> Auth<R, P> {
        let mut validation = Validation::new(self.jwt.algorithm);
        validation.set_issuer(&[&self.jwt.issuer]);
        validation.set_audience(&[&self.jwt.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = self.jwt.leeway;

        Auth {
            principals: self.principals,
            resources: Arc::new(self.resources),
            access: self.access,
            keys: KeyMaterial::new(self.jwt),
            validation,
            default_expiration: self.default_expiration,
        }
    }
}

impl<R, P> Auth<R, P> {
    /// Returns the principal provider.
    pub fn principals(&self) -> &PrincipalProvider<R> {
        &self.principals
    }

    /// Returns the resource registry.
    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    /// Returns the access control provider.
    pub fn access_provider(&self) -> &P {
        &self.access
    }

    /// Returns the key material.
    pub fn keys(&self) -> &KeyMaterial {
        &self.keys
    }

    /// Returns the signing key, importing it on first call.
    pub fn secret(&self) -> Result<&EncodingKey> {
        self.keys.secret()
    }

    /// Returns the verification key, importing it on first call.
    pub fn pubkey(&self) -> Result<&DecodingKey> {
        self.keys.pubkey()
    }

    /// Issues a signed token for `claims`.
    ///
    /// Uses the default expiration when `expiration` is `None`.
    pub fn generate(&self, claims: Claims, expiration: Option<Expiration>) -> Result<String> {
        let config = self.keys.config();
        let payload = claims.into_payload(
            &config.issuer,
            &config.audience,
            Utc::now().timestamp(),
            expiration.unwrap_or(self.default_expiration),
        );
        let header = Header::new(config.algorithm);
        let token = encode(&header, &payload, self.secret()?).map_err(Error::Token)?;
        tracing::debug!(sub = %payload.sub, exp = payload.exp, "session token issued");
        Ok(token)
    }

    /// Verifies signature, issuer, audience, `exp` and `nbf`.
    pub fn verify(&self, token: &str) -> std::result::Result<TokenMetadata, SessionError> {
        let key = self
            .pubkey()
            .map_err(|err| SessionError::new(SessionErrorCode::InternalError, err.to_string()))?;
        let data = decode::<SessionClaims>(token, key, &self.validation).map_err(|err| {
            if matches!(err.kind(), ErrorKind::Base64(_)) && signature_segment_only(token) {
                SessionError::new(SessionErrorCode::SignatureInvalid, err.to_string())
            } else {
                SessionError::from(err)
            }
        })?;
        Ok(TokenMetadata {
            header: data.header,
            payload: data.claims,
        })
    }
}

impl<R, P> Auth<R, P>
where
    R: PrincipalResolver,
    P: AccessControlProvider,
{
    /// Resolves `token` into a session.
    ///
    /// Never fails: every failure is reported as [`SessionResolution::Invalid`].
    pub async fn resolve(&self, token: &str) -> SessionResolution<SessionAccess<P::Access>> {
        let token = match self.verify(token) {
            Ok(token) => token,
            Err(err) => return reject(err),
        };

        let id = match PrincipalId::new(&token.payload.sub) {
            Ok(id) => id,
            Err(err) => {
                return reject(SessionError::new(
                    SessionErrorCode::TokenMalformed,
                    err.to_string(),
                ));
            }
        };

        let principal = match self.principals.resolve(&id).await {
            Ok(Some(principal)) => principal,
            Ok(None) => {
                return reject(SessionError::new(
                    SessionErrorCode::PrincipalNotFound,
                    format!("principal `{id}` not found"),
                ));
            }
            Err(err) => {
                tracing::error!(sub = %id, error = %err, "principal resolution failed");
                return reject(SessionError::new(
                    SessionErrorCode::InternalError,
                    err.to_string(),
                ));
            }
        };

        let access = SessionAccess::new(
            self.access.access(&principal),
            Arc::clone(&self.resources),
        );
        tracing::debug!(sub = %id, "session resolved");
        SessionResolution::Valid(Session::new(principal, access, token))
    }
}

fn reject<A>(err: SessionError) -> SessionResolution<A> {
    match loggable_message(&err) {
        Some(message) => tracing::debug!(code = %err.code(), message, "session rejected"),
        None => tracing::debug!(code = %err.code(), "session rejected"),
    }
    SessionResolution::Invalid(err)
}

// True when header and payload decode without the signature, so a base64
// failure can only come from the signature segment.
fn signature_segment_only(token: &str) -> bool {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    decode::<serde_json::Value>(token, &DecodingKey::from_secret(&[]), &validation).is_ok()
}

// Internal errors are already logged with their cause at `error!`.
fn loggable_message(err: &SessionError) -> Option<&str> {
    match err.code() {
        SessionErrorCode::InternalError => None,
        _ => Some(err.message()),
    }
}
