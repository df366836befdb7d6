//! Catalog: authors.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use libris_core::policy::{Operation, Resource};
use libris_core::{Author, AuthorInput};

use crate::error::ApiError;
use crate::extract::{Body, MaybeCaller};
use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    caller: MaybeCaller,
) -> Result<Json<Vec<Author>>, ApiError> {
    caller.authorize(Resource::Author, Operation::List)?;
    Ok(Json(state.db.authors().list().await?))
}

pub async fn retrieve(
    State(state): State<AppState>,
    caller: MaybeCaller,
    Path(id): Path<String>,
) -> Result<Json<Author>, ApiError> {
    caller.authorize(Resource::Author, Operation::Retrieve)?;
    Ok(Json(state.db.authors().get(&id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    caller: MaybeCaller,
    body: Result<Body<AuthorInput>, ApiError>,
) -> Result<(StatusCode, Json<Author>), ApiError> {
    caller.authorize(Resource::Author, Operation::Create)?;
    let Body(input) = body?;

    let author = state.db.authors().create(&input).await?;
    Ok((StatusCode::CREATED, Json(author)))
}

pub async fn update(
    State(state): State<AppState>,
    caller: MaybeCaller,
    Path(id): Path<String>,
    body: Result<Body<AuthorInput>, ApiError>,
) -> Result<Json<Author>, ApiError> {
    caller.authorize(Resource::Author, Operation::Update)?;
    let Body(input) = body?;

    Ok(Json(state.db.authors().update(&id, &input).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    caller: MaybeCaller,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    caller.authorize(Resource::Author, Operation::Delete)?;
    state.db.authors().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
