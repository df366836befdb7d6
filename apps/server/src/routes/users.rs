//! User administration (staff only).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use libris_core::policy::{Operation, Resource};
use libris_core::{User, UserUpdate};

use crate::error::ApiError;
use crate::extract::{Body, MaybeCaller};
use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    caller: MaybeCaller,
) -> Result<Json<Vec<User>>, ApiError> {
    caller.authorize(Resource::User, Operation::List)?;
    Ok(Json(state.db.users().list().await?))
}

pub async fn retrieve(
    State(state): State<AppState>,
    caller: MaybeCaller,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    caller.authorize(Resource::User, Operation::Retrieve)?;
    Ok(Json(state.db.users().get(&id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    caller: MaybeCaller,
    Path(id): Path<String>,
    body: Result<Body<UserUpdate>, ApiError>,
) -> Result<Json<User>, ApiError> {
    caller.authorize(Resource::User, Operation::Update)?;
    let Body(update) = body?;

    Ok(Json(state.db.users().update(&id, &update).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    caller: MaybeCaller,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    caller.authorize(Resource::User, Operation::Delete)?;
    state.db.users().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
