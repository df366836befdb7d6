//! # Author Repository
//!
//! Database operations for authors. Deleting an author removes its book
//! links (`ON DELETE CASCADE`) and leaves the books in place.

use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use libris_core::validation::validate_author_input;
use libris_core::{Author, AuthorInput, Clock, CoreError};

use crate::error::{DbError, DbResult};

const AUTHOR_COLUMNS: &str = "id, name, surname, biography, created_at, updated_at";

/// Repository for author database operations.
#[derive(Clone)]
pub struct AuthorRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl AuthorRepository {
    /// Creates a new AuthorRepository.
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        AuthorRepository { pool, clock }
    }

    /// Lists authors ordered by surname, then name.
    pub async fn list(&self) -> DbResult<Vec<Author>> {
        debug!("Listing authors");

        let authors = sqlx::query_as::<_, Author>(&format!(
            "SELECT {AUTHOR_COLUMNS} FROM authors ORDER BY surname, name, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(authors)
    }

    /// Gets an author by ID.
    pub async fn get(&self, id: &str) -> DbResult<Author> {
        debug!(id = %id, "Getting author");

        sqlx::query_as::<_, Author>(&format!(
            "SELECT {AUTHOR_COLUMNS} FROM authors WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Author", id))
    }

    /// Creates an author.
    pub async fn create(&self, input: &AuthorInput) -> DbResult<Author> {
        validate_author_input(input).map_err(CoreError::from)?;

        let id = Uuid::new_v4().to_string();
        let now = self.clock.now();

        sqlx::query(
            r#"
            INSERT INTO authors (id, name, surname, biography, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
        )
        .bind(&id)
        .bind(input.name.trim())
        .bind(input.surname.trim())
        .bind(input.biography.trim())
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(id = %id, "Author created");
        self.get(&id).await
    }

    /// Replaces an author's fields.
    pub async fn update(&self, id: &str, input: &AuthorInput) -> DbResult<Author> {
        validate_author_input(input).map_err(CoreError::from)?;

        let result = sqlx::query(
            r#"
            UPDATE authors
            SET name = ?1, surname = ?2, biography = ?3, updated_at = ?4
            WHERE id = ?5
            "#,
        )
        .bind(input.name.trim())
        .bind(input.surname.trim())
        .bind(input.biography.trim())
        .bind(self.clock.now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Author", id));
        }

        info!(id = %id, "Author updated");
        self.get(id).await
    }

    /// Deletes an author.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM authors WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Author", id));
        }

        info!(id = %id, "Author deleted");
        Ok(())
    }
}
