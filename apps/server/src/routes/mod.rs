//! # HTTP Routes
//!
//! ```text
//! ┌──────────────────────────────┬──────────────────────┬──────────────────┐
//! │ path                         │ methods              │ module           │
//! ├──────────────────────────────┼──────────────────────┼──────────────────┤
//! │ /health                      │ GET                  │ health           │
//! │ /api/register                │ GET POST             │ identity         │
//! │ /api/token                   │ POST                 │ identity         │
//! │ /api/books[/{id}]            │ GET POST PUT DELETE  │ books            │
//! │ /api/authors[/{id}]          │ GET POST PUT DELETE  │ authors          │
//! │ /api/loans[/{id}]            │ GET POST PUT PATCH   │ loans            │
//! │ /api/users[/{id}]            │ GET PUT DELETE       │ users            │
//! └──────────────────────────────┴──────────────────────┴──────────────────┘
//! ```
//!
//! Every handler starts with a policy check on its (resource, operation)
//! pair before touching the body or the database.

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub mod authors;
pub mod books;
pub mod health;
pub mod identity;
pub mod loans;
pub mod users;

/// Builds the full router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/register",
            get(identity::registration_form).post(identity::register),
        )
        .route("/api/token", post(identity::token))
        .route("/api/books", get(books::list).post(books::create))
        .route(
            "/api/books/{id}",
            get(books::retrieve).put(books::update).delete(books::delete),
        )
        .route("/api/authors", get(authors::list).post(authors::create))
        .route(
            "/api/authors/{id}",
            get(authors::retrieve)
                .put(authors::update)
                .delete(authors::delete),
        )
        .route("/api/loans", get(loans::list).post(loans::open))
        .route(
            "/api/loans/{id}",
            get(loans::retrieve).put(loans::update).patch(loans::update),
        )
        .route("/api/users", get(users::list))
        .route(
            "/api/users/{id}",
            get(users::retrieve).put(users::update).delete(users::delete),
        )
        .with_state(state)
}
