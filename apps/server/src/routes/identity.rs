//! Registration and login.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use libris_core::policy::{Operation, Resource};
use libris_core::{MAX_USERNAME_LEN, MIN_PASSWORD_LEN};

use crate::error::ApiError;
use crate::extract::{Body, MaybeCaller};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// What the registration form expects.
pub async fn registration_form(caller: MaybeCaller) -> Result<Json<Value>, ApiError> {
    caller.authorize(Resource::Registration, Operation::Retrieve)?;

    Ok(Json(json!({
        "username": {
            "required": true,
            "max_length": MAX_USERNAME_LEN,
            "help_text": "Letters, digits and @/./+/-/_ only."
        },
        "password": {
            "required": true,
            "min_length": MIN_PASSWORD_LEN
        }
    })))
}

/// `POST /api/register` → `201 { message, token }`
pub async fn register(
    State(state): State<AppState>,
    caller: MaybeCaller,
    body: Result<Body<Credentials>, ApiError>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    caller.authorize(Resource::Registration, Operation::Create)?;
    let Body(credentials) = body?;

    let (user, token) = state
        .identity()
        .register(&credentials.username, &credentials.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("user '{}' registered", user.username),
            "token": token,
        })),
    ))
}

/// `POST /api/token` → `200 { token, user }`
pub async fn token(
    State(state): State<AppState>,
    caller: MaybeCaller,
    body: Result<Body<Credentials>, ApiError>,
) -> Result<Json<Value>, ApiError> {
    caller.authorize(Resource::Session, Operation::Create)?;
    let Body(credentials) = body?;

    let (user, token) = state
        .identity()
        .authenticate(&credentials.username, &credentials.password)
        .await?;

    Ok(Json(json!({ "token": token, "user": user })))
}
