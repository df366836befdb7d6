//! # Book Repository
//!
//! Database operations for books and their author links.
//!
//! ## Key Operations
//! - CRUD operations
//! - Author links (many-to-many via `book_authors`)
//! - ISBN uniqueness reported as a field error
//!
//! ## Inventory Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Who writes available_copies?                           │
//! │                                                                         │
//! │  Staff (this repository)          Loan ledger                          │
//! │  ───────────────────────          ───────────                          │
//! │  create: sets both counters       open:  available_copies - 1          │
//! │  update: sets total_copies,       close: available_copies + 1          │
//! │          available_copies only                                          │
//! │          when the body has it                                           │
//! │                                                                         │
//! │  The CHECK constraint keeps 0 <= available <= total for both writers.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use libris_core::validation::validate_book_input;
use libris_core::{Book, BookInput, Clock, CoreError, FieldErrors, ValidationError};

use crate::error::{DbError, DbResult};
use crate::repository::in_use_on_restrict;

/// Columns of the `books` table, without the author links.
#[derive(Debug, sqlx::FromRow)]
struct BookRow {
    id: String,
    title: String,
    isbn: String,
    description: String,
    total_copies: i64,
    available_copies: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookRow {
    fn into_book(self, authors: Vec<String>) -> Book {
        Book {
            id: self.id,
            title: self.title,
            isbn: self.isbn,
            description: self.description,
            authors,
            total_copies: self.total_copies,
            available_copies: self.available_copies,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const BOOK_COLUMNS: &str = "id, title, isbn, description, total_copies, available_copies, created_at, updated_at";

/// Repository for book database operations.
///
/// ## Usage
/// ```rust,ignore
/// let books = db.books();
///
/// let book = books.create(&input).await?;
/// let same = books.get(&book.id).await?;
/// ```
#[derive(Clone)]
pub struct BookRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl BookRepository {
    /// Creates a new BookRepository.
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        BookRepository { pool, clock }
    }

    /// Lists every book, ordered by title.
    pub async fn list(&self) -> DbResult<Vec<Book>> {
        debug!("Listing books");

        let rows: Vec<BookRow> = sqlx::query_as(&format!(
            "SELECT {BOOK_COLUMNS} FROM books ORDER BY title, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        let links: Vec<(String, String)> =
            sqlx::query_as("SELECT book_id, author_id FROM book_authors ORDER BY rowid")
                .fetch_all(&self.pool)
                .await?;

        let mut authors_by_book: HashMap<String, Vec<String>> = HashMap::new();
        for (book_id, author_id) in links {
            authors_by_book.entry(book_id).or_default().push(author_id);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let authors = authors_by_book.remove(&row.id).unwrap_or_default();
                row.into_book(authors)
            })
            .collect())
    }

    /// Gets a book by ID.
    pub async fn get(&self, id: &str) -> DbResult<Book> {
        debug!(id = %id, "Getting book");

        let mut conn = self.pool.acquire().await?;
        fetch_book(&mut conn, id)
            .await?
            .ok_or_else(|| DbError::not_found("Book", id))
    }

    /// Creates a book.
    ///
    /// `available_copies` defaults to `total_copies` when omitted.
    ///
    /// ## Errors
    /// - `Rejected(Validation)` for bad fields, a taken ISBN or an
    ///   unknown author id
    pub async fn create(&self, input: &BookInput) -> DbResult<Book> {
        let available = validate_book_input(input, None).map_err(CoreError::from)?;
        let authors = distinct(&input.authors);
        let isbn = input.isbn.trim();

        let mut conn = self.pool.acquire().await?;
        check_references(&mut conn, isbn, &authors, None).await?;
        drop(conn);

        let id = Uuid::new_v4().to_string();
        let now = self.clock.now();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO books
                (id, title, isbn, description, total_copies, available_copies, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            "#,
        )
        .bind(&id)
        .bind(input.title.trim())
        .bind(isbn)
        .bind(input.description.trim())
        .bind(input.total_copies)
        .bind(available)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error(e, isbn))?;

        link_authors(&mut tx, &id, &authors).await?;
        tx.commit().await?;

        info!(id = %id, isbn = %isbn, "Book created");
        self.get(&id).await
    }

    /// Replaces a book's fields and author links.
    ///
    /// When the body leaves `available_copies` out the stored value is
    /// kept, so concurrent loans are not overwritten.
    pub async fn update(&self, id: &str, input: &BookInput) -> DbResult<Book> {
        let current = self.get(id).await?;

        validate_book_input(input, Some(current.available_copies)).map_err(CoreError::from)?;
        let authors = distinct(&input.authors);
        let isbn = input.isbn.trim();

        let mut conn = self.pool.acquire().await?;
        check_references(&mut conn, isbn, &authors, Some(id)).await?;
        drop(conn);

        let now = self.clock.now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE books
            SET title = ?1,
                isbn = ?2,
                description = ?3,
                total_copies = ?4,
                available_copies = COALESCE(?5, available_copies),
                updated_at = ?6
            WHERE id = ?7
            "#,
        )
        .bind(input.title.trim())
        .bind(isbn)
        .bind(input.description.trim())
        .bind(input.total_copies)
        .bind(input.available_copies)
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| write_error(e, isbn))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Book", id));
        }

        sqlx::query("DELETE FROM book_authors WHERE book_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        link_authors(&mut tx, id, &authors).await?;
        tx.commit().await?;

        info!(id = %id, "Book updated");
        self.get(id).await
    }

    /// Deletes a book.
    ///
    /// ## Errors
    /// - `NotFound` if the book doesn't exist
    /// - `Rejected(Conflict(InUse))` if any loan references it
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting book");

        let result = sqlx::query("DELETE FROM books WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| in_use_on_restrict(e.into(), "Book"))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Book", id));
        }

        info!(id = %id, "Book deleted");
        Ok(())
    }
}

// =============================================================================
// Helpers (shared with the loan ledger)
// =============================================================================

/// Loads one book with its author ids, on any connection or transaction.
pub(crate) async fn fetch_book(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Book>> {
    let row: Option<BookRow> = sqlx::query_as(&format!(
        "SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let authors: Vec<String> =
        sqlx::query_scalar("SELECT author_id FROM book_authors WHERE book_id = ?1 ORDER BY rowid")
            .bind(id)
            .fetch_all(&mut *conn)
            .await?;

    Ok(Some(row.into_book(authors)))
}

/// Order-preserving de-duplication of author ids.
fn distinct(ids: &[String]) -> Vec<String> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        let id = id.trim().to_string();
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen
}

/// Field errors for a taken ISBN and for author ids that don't resolve.
async fn check_references(
    conn: &mut SqliteConnection,
    isbn: &str,
    authors: &[String],
    exclude_book: Option<&str>,
) -> DbResult<()> {
    let mut errors = FieldErrors::new();

    let taken: Option<String> =
        sqlx::query_scalar("SELECT id FROM books WHERE isbn = ?1 AND id <> COALESCE(?2, '')")
            .bind(isbn)
            .bind(exclude_book)
            .fetch_optional(&mut *conn)
            .await?;
    if taken.is_some() {
        errors.push(ValidationError::duplicate("isbn", isbn));
    }

    for author_id in authors {
        let exists: Option<String> = sqlx::query_scalar("SELECT id FROM authors WHERE id = ?1")
            .bind(author_id)
            .fetch_optional(&mut *conn)
            .await?;
        if exists.is_none() {
            errors.push(ValidationError::UnknownReference {
                field: "authors".to_string(),
                id: author_id.clone(),
            });
        }
    }

    errors
        .into_result()
        .map_err(|e| DbError::from(CoreError::from(e)))
}

async fn link_authors(conn: &mut SqliteConnection, book_id: &str, authors: &[String]) -> DbResult<()> {
    for author_id in authors {
        sqlx::query("INSERT INTO book_authors (book_id, author_id) VALUES (?1, ?2)")
            .bind(book_id)
            .bind(author_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| match DbError::from(e) {
                // Author deleted between the check and the insert.
                DbError::ForeignKeyViolation { .. } => CoreError::from(
                    ValidationError::UnknownReference {
                        field: "authors".to_string(),
                        id: author_id.clone(),
                    },
                )
                .into(),
                other => other,
            })?;
    }
    Ok(())
}

/// Turns constraint failures of a book write into field errors.
fn write_error(err: sqlx::Error, isbn: &str) -> DbError {
    let err = DbError::from(err);
    if err.is_unique_violation_on("books.isbn") {
        return CoreError::from(ValidationError::duplicate("isbn", isbn)).into();
    }
    match err {
        DbError::CheckViolation { .. } => CoreError::from(ValidationError::InvalidFormat {
            field: "available_copies".to_string(),
            reason: "must stay between 0 and total_copies".to_string(),
        })
        .into(),
        other => other,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
