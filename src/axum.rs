//! Axum integration utilities.
//!
//! [`SessionLayer`] resolves `Authorization: Bearer <token>` on every request and
//! stores the resulting [`Session`] in request extensions, where handlers extract it.

use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use thiserror::Error;

use crate::access::{AccessControlProvider, SessionAccess};
use crate::auth::Auth;
use crate::principal::PrincipalResolver;
use crate::session::{Session, SessionError, SessionErrorCode, SessionResolution};

use ::axum::Json;
use ::axum::body::Body;
use ::axum::extract::FromRequestParts;
use ::axum::http::header::AUTHORIZATION;
use ::axum::http::request::Parts;
use ::axum::http::{HeaderMap, Request};
use ::axum::response::{IntoResponse, Response};
use ::tower::{Layer, Service};
use http::StatusCode;

/// Errors returned by the session middleware.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Authorization header is missing.
    #[error("missing authorization header")]
    MissingAuthorization,
    /// Authorization header format is invalid.
    #[error("invalid authorization header")]
    InvalidAuthorization,
    /// No session was attached to the request.
    #[error("no session on request")]
    MissingSession,
    /// Token did not resolve into a session.
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Maps a session error code to an HTTP status.
pub fn status_for(code: SessionErrorCode) -> StatusCode {
    match code {
        SessionErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::UNAUTHORIZED,
    }
}

/// Rejection type for the middleware and extractor.
#[derive(Debug)]
pub struct AuthRejection {
    status: StatusCode,
    body: SessionError,
}

impl AuthRejection {
    /// Returns the HTTP status.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<AuthError> for AuthRejection {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Session(session) => Self {
                status: status_for(session.code()),
                body: session,
            },
            AuthError::MissingSession => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: SessionError::new(SessionErrorCode::InternalError, err.to_string()),
            },
            other => Self {
                status: StatusCode::UNAUTHORIZED,
                body: SessionError::new(SessionErrorCode::TokenMalformed, other.to_string()),
            },
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl<S, A> FromRequestParts<S> for Session<A>
where
    S: Send + Sync,
    A: Clone + Send + Sync + 'static,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session<A>>()
            .cloned()
            .ok_or_else(|| AuthError::MissingSession.into())
    }
}

/// Middleware layer that resolves bearer tokens into sessions.
pub struct SessionLayer<R, P> {
    auth: Arc<Auth<R, P>>,
}

impl<R, P> SessionLayer<R, P> {
    /// Creates a new session layer.
    pub fn new(auth: Arc<Auth<R, P>>) -> Self {
        Self { auth }
    }
}

impl<R, P> Clone for SessionLayer<R, P> {
    fn clone(&self) -> Self {
        Self {
            auth: Arc::clone(&self.auth),
        }
    }
}

impl<Inner, R, P> Layer<Inner> for SessionLayer<R, P> {
    type Service = SessionService<Inner, R, P>;

    fn layer(&self, inner: Inner) -> Self::Service {
        SessionService {
            inner,
            auth: Arc::clone(&self.auth),
        }
    }
}

/// Middleware service that attaches [`Session`] or rejects the request.
pub struct SessionService<Inner, R, P> {
    inner: Inner,
    auth: Arc<Auth<R, P>>,
}

impl<Inner: Clone, R, P> Clone for SessionService<Inner, R, P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            auth: Arc::clone(&self.auth),
        }
    }
}

impl<Inner, R, P> Service<Request<Body>> for SessionService<Inner, R, P>
where
    Inner: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    Inner::Future: Send + 'static,
    R: PrincipalResolver + 'static,
    P: AccessControlProvider + 'static,
    P::Access: Clone + 'static,
{
    type Response = Response;
    type Error = Inner::Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let auth = Arc::clone(&self.auth);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let token = match bearer_token(req.headers()) {
                Ok(token) => token,
                Err(err) => return Ok(AuthRejection::from(err).into_response()),
            };
            match auth.resolve(&token).await {
                SessionResolution::Valid(session) => {
                    req.extensions_mut()
                        .insert::<Session<SessionAccess<P::Access>>>(session);
                    poll_fn(|cx| inner.poll_ready(cx)).await?;
                    inner.call(req).await
                }
                SessionResolution::Invalid(err) => {
                    Ok(AuthRejection::from(AuthError::from(err)).into_response())
                }
            }
        })
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthorization)?;
    let value = value
        .to_str()
        .map_err(|_| AuthError::InvalidAuthorization)?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthorization)?;
    if token.is_empty() {
        return Err(AuthError::InvalidAuthorization);
    }
    Ok(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthBuilder;
    use crate::error::ResolverError;
    use crate::expiration::Expiration;
    use crate::keys::JwtConfig;
    use crate::permission::Permission;
    use crate::policy::{PolicyAccess, RolePolicy};
    use crate::principal::{PrincipalProvider, PrincipalRecord, resolver_fn};
    use crate::resource::{ResourceRegistry, ResourceSchema};
    use crate::schema::{ObjectSchema, Schema};
    use crate::session::Claims;
    use crate::types::{Action, PrincipalId, ResourceKind, Role};
    use ::axum::http::HeaderValue;
    use futures::executor::block_on;
    use jsonwebtoken::Algorithm;
    use serde_json::json;
    use std::convert::Infallible;
    use tower::{ServiceExt, service_fn};

    const ED_PRIVATE: &str = include_str!("../tests/fixtures/ed25519_private.pem");
    const ED_PUBLIC: &str = include_str!("../tests/fixtures/ed25519_public.pem");

    type TestSession = Session<SessionAccess<PolicyAccess>>;

    fn auth() -> Arc<Auth<impl PrincipalResolver, RolePolicy>> {
        let registry = ResourceRegistry::new([ResourceSchema::new(
            ResourceKind::try_from("user").unwrap(),
            ObjectSchema::new().field("tenantId", Schema::String),
            [Action::try_from("read").unwrap()],
        )]);
        let principals = PrincipalProvider::new(
            [Role::try_from("member").unwrap()],
            ObjectSchema::new().field("tenantId", Schema::String),
            resolver_fn(|id: PrincipalId| async move {
                let record = match id.as_str() {
                    "account-a" => Some(
                        PrincipalRecord::new("account-a")
                            .role("member")
                            .attributes(json!({"tenantId": "t1"})),
                    ),
                    "broken" => Some(
                        PrincipalRecord::new("broken")
                            .role("member")
                            .attributes(json!({"tenantId": 42})),
                    ),
                    _ => None,
                };
                Ok::<_, ResolverError>(record)
            }),
        );
        let policy = RolePolicy::builder()
            .grant(
                Role::try_from("member").unwrap(),
                Permission::try_from("user:read").unwrap(),
            )
            .build()
            .unwrap();
        let jwt = JwtConfig::new(Algorithm::EdDSA, ED_PRIVATE, ED_PUBLIC, "issuer", "app");
        Arc::new(AuthBuilder::new(principals, registry, policy, jwt).build())
    }

    fn bearer<R, P>(auth: &Arc<Auth<R, P>>, id: &str, expiration: Option<Expiration>) -> String {
        let claims = Claims::new(PrincipalId::try_from(id).unwrap());
        format!("Bearer {}", auth.generate(claims, expiration).unwrap())
    }

    async fn echo_principal(req: Request<Body>) -> Result<Response, Infallible> {
        let (mut parts, _body) = req.into_parts();
        match TestSession::from_request_parts(&mut parts, &()).await {
            Ok(session) => {
                let mut response = StatusCode::OK.into_response();
                response.headers_mut().insert(
                    "x-principal",
                    HeaderValue::from_str(session.principal().id().as_str()).unwrap(),
                );
                Ok(response)
            }
            Err(rejection) => Ok(rejection.into_response()),
        }
    }

    fn send<R>(auth: &Arc<Auth<R, RolePolicy>>, authorization: Option<&str>) -> Response
    where
        R: PrincipalResolver + 'static,
    {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        let request = builder.body(Body::empty()).unwrap();
        let service = SessionLayer::new(Arc::clone(auth)).layer(service_fn(echo_principal));
        block_on(service.oneshot(request)).unwrap()
    }

    #[test]
    fn layer_should_attach_session_for_valid_token() {
        let auth = auth();
        let header = bearer(&auth, "account-a", None);

        let response = send(&auth, Some(&header));

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-principal"),
            Some(&HeaderValue::from_static("account-a"))
        );
    }

    #[test]
    fn layer_should_reject_missing_header() {
        let auth = auth();
        assert_eq!(send(&auth, None).status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn layer_should_reject_expired_token() {
        let auth = auth();
        let header = bearer(&auth, "account-a", Some("10 seconds ago".parse().unwrap()));

        assert_eq!(send(&auth, Some(&header)).status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn layer_should_reject_unknown_principal() {
        let auth = auth();
        let header = bearer(&auth, "ghost", None);

        assert_eq!(send(&auth, Some(&header)).status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn layer_should_answer_internal_error_with_500() {
        let auth = auth();
        let header = bearer(&auth, "broken", None);

        assert_eq!(
            send(&auth, Some(&header)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn extractor_without_session_should_answer_500() {
        let (mut parts, _body) = Request::builder().uri("/").body(()).unwrap().into_parts();

        let rejection = block_on(TestSession::from_request_parts(&mut parts, &())).unwrap_err();

        assert_eq!(rejection.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn bearer_token_should_extract_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn bearer_token_should_reject_missing_header() {
        let headers = HeaderMap::new();
        assert!(matches!(
            bearer_token(&headers),
            Err(AuthError::MissingAuthorization)
        ));
    }

    #[test]
    fn bearer_token_should_reject_other_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert!(matches!(
            bearer_token(&headers),
            Err(AuthError::InvalidAuthorization)
        ));
    }

    #[test]
    fn rejection_should_map_session_codes_to_status() {
        let expired = AuthRejection::from(AuthError::from(SessionError::new(
            SessionErrorCode::TokenExpired,
            "expired",
        )));
        let internal = AuthRejection::from(AuthError::from(SessionError::new(
            SessionErrorCode::InternalError,
            "boom",
        )));

        assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            expired.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
