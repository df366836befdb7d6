//! Catalog: books.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use libris_core::policy::{Operation, Resource};
use libris_core::{Book, BookInput};

use crate::error::ApiError;
use crate::extract::{Body, MaybeCaller};
use crate::state::AppState;

pub async fn list(
    State(state): State<AppState>,
    caller: MaybeCaller,
) -> Result<Json<Vec<Book>>, ApiError> {
    caller.authorize(Resource::Book, Operation::List)?;
    Ok(Json(state.db.books().list().await?))
}

pub async fn retrieve(
    State(state): State<AppState>,
    caller: MaybeCaller,
    Path(id): Path<String>,
) -> Result<Json<Book>, ApiError> {
    caller.authorize(Resource::Book, Operation::Retrieve)?;
    Ok(Json(state.db.books().get(&id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    caller: MaybeCaller,
    body: Result<Body<BookInput>, ApiError>,
) -> Result<(StatusCode, Json<Book>), ApiError> {
    caller.authorize(Resource::Book, Operation::Create)?;
    let Body(input) = body?;

    let book = state.db.books().create(&input).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

pub async fn update(
    State(state): State<AppState>,
    caller: MaybeCaller,
    Path(id): Path<String>,
    body: Result<Body<BookInput>, ApiError>,
) -> Result<Json<Book>, ApiError> {
    caller.authorize(Resource::Book, Operation::Update)?;
    let Body(input) = body?;

    Ok(Json(state.db.books().update(&id, &input).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    caller: MaybeCaller,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    caller.authorize(Resource::Book, Operation::Delete)?;
    state.db.books().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
