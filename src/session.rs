//! Session accessor over the attached verification outcome.
//!
//! The request gate attaches one [`AuthSession`] to every request it sees.
//! Handlers read it through the [`SessionExt`] trait, by extracting
//! [`AuthSession`] directly (infallible, absent attachment reads as
//! anonymous), or through the [`RequireAuth`] guard which rejects
//! unauthenticated requests with 401.

use crate::auth::Claims;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::convert::Infallible;

/// The verification outcome attached to a request.
///
/// Either a verified claim set or anonymous; computed once by the gate and
/// never re-verified for the same request. All methods are pure reads.
#[derive(Debug, Clone)]
pub struct AuthSession {
    claims: Option<Claims>,
}

impl AuthSession {
    /// An unauthenticated session (no token, invalid token, or skipped path).
    pub fn anonymous() -> Self {
        Self { claims: None }
    }

    /// A session backed by verified claims.
    ///
    /// Also useful in handler tests to fabricate authenticated requests
    /// without real cryptography.
    pub fn verified(claims: Claims) -> Self {
        Self {
            claims: Some(claims),
        }
    }

    /// The verified claims, if any.
    pub fn claims(&self) -> Option<&Claims> {
        self.claims.as_ref()
    }

    /// The authenticated subject (`sub` claim), if any.
    pub fn subject_id(&self) -> Option<&str> {
        self.claims.as_ref().map(Claims::subject)
    }

    /// Whether the request carried a token that verified.
    pub fn is_authenticated(&self) -> bool {
        self.claims.is_some()
    }
}

/// Extension trait for reading the session off a request.
pub trait SessionExt {
    /// The session the gate attached, or `None` if the gate did not run.
    fn auth_session(&self) -> Option<&AuthSession>;
}

impl<B> SessionExt for axum::http::Request<B> {
    fn auth_session(&self) -> Option<&AuthSession> {
        self.extensions().get::<AuthSession>()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthSession
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // No attachment (gate not mounted) reads as anonymous.
        Ok(parts
            .extensions
            .get::<AuthSession>()
            .cloned()
            .unwrap_or_else(AuthSession::anonymous))
    }
}

/// Extractor that rejects unauthenticated requests.
///
/// Enforcement lives here, downstream of the gate: the gate only annotates
/// requests, and routes that need authentication opt in with this guard.
#[derive(Debug, Clone)]
pub struct RequireAuth(pub Claims);

/// Rejection returned when [`RequireAuth`] finds no verified session.
#[derive(Debug)]
pub struct Unauthorized;

impl IntoResponse for Unauthorized {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": "UNAUTHORIZED",
                "message": "Authentication required",
            }
        });

        let mut response = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
        if let Ok(header_value) = "Bearer realm=\"hanko\", error=\"invalid_token\"".parse() {
            response
                .headers_mut()
                .insert("WWW-Authenticate", header_value);
        }
        response
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = Unauthorized;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthSession>()
            .and_then(|session| session.claims().cloned())
            .map(RequireAuth)
            .ok_or(Unauthorized)
    }
}
