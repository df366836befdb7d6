//! # Request Extractors
//!
//! ```text
//! Authorization: Bearer <token>
//!        │
//!        ▼
//! MaybeCaller ── no header ──────────► None (anonymous)
//!        │
//!        ├── not "Bearer ..." ───────► 401
//!        ├── bad / expired token ────► 401
//!        └── valid ──► IdentityProvider::resolve ──► Some(Caller)
//! ```
//!
//! Whether an anonymous caller may proceed is decided per handler by
//! [`libris_core::policy::authorize`], not here.

use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use libris_core::policy::{authorize, Operation, Resource};
use libris_core::{Caller, CoreError};

use crate::auth::extract_bearer_token;
use crate::error::ApiError;
use crate::state::AppState;

/// The caller behind a request, if it sent credentials.
#[derive(Debug, Clone)]
pub struct MaybeCaller(pub Option<Caller>);

impl MaybeCaller {
    /// Runs the policy check for this request.
    pub fn authorize(&self, resource: Resource, operation: Operation) -> Result<(), ApiError> {
        authorize(resource, operation, self.0.as_ref()).map_err(ApiError::from)
    }

    /// Runs the policy check and returns the caller for entries that
    /// require one.
    pub fn require(&self, resource: Resource, operation: Operation) -> Result<&Caller, ApiError> {
        self.authorize(resource, operation)?;
        self.0.as_ref().ok_or_else(|| {
            ApiError::from(CoreError::unauthorized(
                "authentication credentials were not provided",
            ))
        })
    }
}

impl FromRequestParts<AppState> for MaybeCaller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(header) = parts.headers.get(AUTHORIZATION) else {
            return Ok(MaybeCaller(None));
        };

        let token = header
            .to_str()
            .ok()
            .and_then(extract_bearer_token)
            .ok_or_else(|| CoreError::unauthorized("malformed authorization header"))?;

        let caller = state.identity().resolve(token).await?;
        Ok(MaybeCaller(Some(caller)))
    }
}

/// `Json<T>` whose rejections render as field errors.
#[derive(Debug)]
pub struct Body<T>(pub T);

impl<T, S> FromRequest<S> for Body<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Body(value))
    }
}
