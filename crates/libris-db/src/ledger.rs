//! # Loan Ledger
//!
//! Opening, closing, amending and listing loans. The only place that
//! writes more than one record in one go.
//!
//! ## Open Loan
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       open_loan(caller, book)                           │
//! │                                                                         │
//! │  Validation stage (no transaction)                                     │
//! │  ├── book exists?                 no ──► NotFound                      │
//! │  ├── caller holds ACTIVE loan?    yes ─► Conflict(DuplicateActiveLoan) │
//! │  └── available_copies > 0?        no ──► Conflict(NoCopiesAvailable)   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN                                                                 │
//! │  ├── UPDATE books SET available_copies - 1                             │
//! │  │     WHERE available_copies > 0    0 rows ─► Conflict(NoCopies...)   │
//! │  ├── ACTIVE loan re-check            found ──► Conflict(Duplicate...)  │
//! │  ├── re-read book, bounds hold?      no ─────► ProcessingFailed        │
//! │  ├── INSERT loan (ACTIVE, due +14d)  unique ─► Conflict(Duplicate...)  │
//! │  └── COMMIT                          error ──► ProcessingFailed        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reopening a RETURNED loan takes its copy back with the same conditional
//! decrement, so a loan holds a copy exactly while it is not RETURNED.
//!
//! ## Serialization
//! The decrement is the first statement of the transaction, so it takes
//! SQLite's write lock before anything is read. A second transaction on the
//! same book waits on `busy_timeout` and then sees the committed counter;
//! it can never decrement a stale value.
//!
//! ## Errors
//! Business-rule violations come back as typed `Conflict`s. Anything else
//! that goes wrong inside a transaction is rolled back, logged with its
//! cause and returned as the opaque [`CoreError::ProcessingFailed`].

use std::fmt::Display;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, error, info};
use uuid::Uuid;

use libris_core::loan::{check_can_open, new_active_loan, plan_update, LoanScope, LoanTransition, LoanUpdate};
use libris_core::{Caller, Clock, ConflictReason, CoreError, CoreResult, Loan, LoanStatus};

use crate::error::DbError;
use crate::repository::book::fetch_book;

const LOAN_COLUMNS: &str =
    "id, user_id, book_id, loaned_at, due_at, returned_at, status, created_at, updated_at";

/// Logs the cause of a failed loan operation and hides it from the caller.
fn processing_failed(operation: &'static str, cause: impl Display) -> CoreError {
    error!(operation, error = %cause, "Loan operation failed and was rolled back");
    CoreError::ProcessingFailed
}

/// Transactional loan operations.
///
/// ## Usage
/// ```rust,ignore
/// let ledger = LoanLedger::new(pool, Arc::new(SystemClock));
///
/// let loan = ledger.open_loan(&caller, &book_id).await?;
/// let loan = ledger.close_loan(&caller, &loan.id).await?;
/// ```
#[derive(Clone)]
pub struct LoanLedger {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl LoanLedger {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        LoanLedger { pool, clock }
    }

    // =========================================================================
    // Open
    // =========================================================================

    /// Lends one copy of `book_id` to the caller.
    ///
    /// ## Errors
    /// - `NotFound` if the book doesn't exist
    /// - `Conflict(DuplicateActiveLoan)` if the caller already has it
    /// - `Conflict(NoCopiesAvailable)` if every copy is out
    /// - `ProcessingFailed` for anything else; nothing was written
    pub async fn open_loan(&self, caller: &Caller, book_id: &str) -> CoreResult<Loan> {
        const OP: &str = "open_loan";
        debug!(user_id = %caller.user_id, book_id = %book_id, "Opening loan");

        {
            let mut conn = self.pool.acquire().await.map_err(|e| processing_failed(OP, e))?;
            let book = fetch_book(&mut conn, book_id)
                .await
                .map_err(|e| processing_failed(OP, e))?;
            let has_active = has_active_loan(&mut conn, &caller.user_id, book_id)
                .await
                .map_err(|e| processing_failed(OP, e))?;

            check_can_open(book_id, book.as_ref(), has_active)?;
        }

        let now = self.clock.now();
        let mut tx = self.pool.begin().await.map_err(|e| processing_failed(OP, e))?;

        // Dropping `tx` on the error path rolls everything back.
        let loan = open_in_transaction(&mut tx, caller, book_id, now).await?;

        tx.commit().await.map_err(|e| processing_failed(OP, e))?;

        info!(
            loan_id = %loan.id,
            user_id = %loan.user_id,
            book_id = %loan.book_id,
            due_at = %loan.due_at,
            "Loan opened"
        );
        Ok(loan)
    }

    // =========================================================================
    // Update / Close
    // =========================================================================

    /// Applies `update` to a loan visible to the caller.
    ///
    /// Requesting RETURNED closes the loan and gives the copy back. Moving
    /// a RETURNED loan to any other status takes a copy again. Everything
    /// else is stored with no inventory effect.
    ///
    /// ## Errors
    /// - `NotFound` if the loan doesn't exist or belongs to someone else
    /// - `Conflict(AlreadyReturned)` when closing a returned loan
    /// - `Conflict(NoCopiesAvailable)` when reopening with every copy out
    /// - `Conflict(DuplicateActiveLoan)` when reactivating would give the
    ///   borrower two ACTIVE loans for the book
    /// - `Validation` for a due date before the loan date
    pub async fn update_loan(
        &self,
        caller: &Caller,
        loan_id: &str,
        update: &LoanUpdate,
    ) -> CoreResult<Loan> {
        let current = self.get_loan(caller, loan_id).await?;
        let now = self.clock.now();

        match plan_update(&current, update, now)? {
            LoanTransition::Return {
                returned_at,
                due_at,
            } => self.close_in_transaction(&current, returned_at, due_at, now).await?,
            LoanTransition::Reopen { status, due_at } => {
                self.reopen_in_transaction(&current, status, due_at, now).await?
            }
            LoanTransition::Amend {
                status,
                due_at,
                returned_at,
            } => self.amend(&current, status, due_at, returned_at, now).await?,
        }

        self.load(loan_id)
            .await?
            .ok_or_else(|| processing_failed("update_loan", "loan vanished after update"))
    }

    /// Closes a loan: shorthand for an update to RETURNED.
    pub async fn close_loan(&self, caller: &Caller, loan_id: &str) -> CoreResult<Loan> {
        let update = LoanUpdate {
            status: Some(LoanStatus::Returned),
            due_at: None,
        };
        self.update_loan(caller, loan_id, &update).await
    }

    async fn close_in_transaction(
        &self,
        loan: &Loan,
        returned_at: DateTime<Utc>,
        due_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        const OP: &str = "close_loan";
        let mut tx = self.pool.begin().await.map_err(|e| processing_failed(OP, e))?;

        let closed = sqlx::query(
            r#"
            UPDATE loans
            SET status = ?1, returned_at = ?2, due_at = ?3, updated_at = ?4
            WHERE id = ?5 AND status <> ?1
            "#,
        )
        .bind(LoanStatus::Returned)
        .bind(returned_at)
        .bind(due_at)
        .bind(now)
        .bind(&loan.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| processing_failed(OP, e))?;

        // Someone else closed it after we read it.
        if closed.rows_affected() == 0 {
            return Err(ConflictReason::AlreadyReturned.into());
        }

        let restocked = sqlx::query(
            r#"
            UPDATE books
            SET available_copies = available_copies + 1, updated_at = ?1
            WHERE id = ?2
            "#,
        )
        .bind(now)
        .bind(&loan.book_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| processing_failed(OP, e))?;

        if restocked.rows_affected() != 1 {
            return Err(processing_failed(OP, format!("book {} missing", loan.book_id)));
        }

        tx.commit().await.map_err(|e| processing_failed(OP, e))?;

        info!(loan_id = %loan.id, book_id = %loan.book_id, "Loan returned");
        Ok(())
    }

    async fn reopen_in_transaction(
        &self,
        loan: &Loan,
        status: LoanStatus,
        due_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        const OP: &str = "reopen_loan";
        let mut tx = self.pool.begin().await.map_err(|e| processing_failed(OP, e))?;

        let decremented = sqlx::query(
            r#"
            UPDATE books
            SET available_copies = available_copies - 1, updated_at = ?1
            WHERE id = ?2 AND available_copies > 0
            "#,
        )
        .bind(now)
        .bind(&loan.book_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| processing_failed(OP, e))?;

        // Loans keep their book alive (RESTRICT), so the book is there.
        if decremented.rows_affected() == 0 {
            return Err(ConflictReason::NoCopiesAvailable.into());
        }

        let reopened = sqlx::query(
            r#"
            UPDATE loans
            SET status = ?1, due_at = ?2, returned_at = NULL, updated_at = ?3
            WHERE id = ?4 AND status = ?5
            "#,
        )
        .bind(status)
        .bind(due_at)
        .bind(now)
        .bind(&loan.id)
        .bind(LoanStatus::Returned)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            err if err.is_unique_violation_on("loans.user_id") => {
                CoreError::Conflict(ConflictReason::DuplicateActiveLoan)
            }
            err => processing_failed(OP, err),
        })?;

        if reopened.rows_affected() != 1 {
            return Err(processing_failed(
                OP,
                format!("loan {} left RETURNED concurrently", loan.id),
            ));
        }

        tx.commit().await.map_err(|e| processing_failed(OP, e))?;

        info!(
            loan_id = %loan.id,
            book_id = %loan.book_id,
            status = status.as_str(),
            "Returned loan reopened"
        );
        Ok(())
    }

    async fn amend(
        &self,
        loan: &Loan,
        status: LoanStatus,
        due_at: DateTime<Utc>,
        returned_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        sqlx::query(
            r#"
            UPDATE loans
            SET status = ?1, due_at = ?2, returned_at = ?3, updated_at = ?4
            WHERE id = ?5
            "#,
        )
        .bind(status)
        .bind(due_at)
        .bind(returned_at)
        .bind(now)
        .bind(&loan.id)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            err if err.is_unique_violation_on("loans.user_id") => {
                CoreError::Conflict(ConflictReason::DuplicateActiveLoan)
            }
            err => processing_failed("amend_loan", err),
        })?;

        info!(loan_id = %loan.id, status = status.as_str(), "Loan amended");
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Loans visible to the caller, newest first.
    pub async fn list_loans(&self, caller: &Caller) -> CoreResult<Vec<Loan>> {
        let loans = match LoanScope::for_caller(caller) {
            LoanScope::All => {
                sqlx::query_as::<_, Loan>(&format!(
                    "SELECT {LOAN_COLUMNS} FROM loans ORDER BY julianday(loaned_at) DESC, id"
                ))
                .fetch_all(&self.pool)
                .await
            }
            LoanScope::Borrower(user_id) => {
                sqlx::query_as::<_, Loan>(&format!(
                    "SELECT {LOAN_COLUMNS} FROM loans WHERE user_id = ?1 \
                     ORDER BY julianday(loaned_at) DESC, id"
                ))
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| processing_failed("list_loans", e))?;

        debug!(user_id = %caller.user_id, count = loans.len(), "Listed loans");
        Ok(loans)
    }

    /// One loan, if the caller may see it. Other people's loans are
    /// reported as `NotFound`.
    pub async fn get_loan(&self, caller: &Caller, loan_id: &str) -> CoreResult<Loan> {
        match self.load(loan_id).await? {
            Some(loan) if LoanScope::for_caller(caller).permits(&loan) => Ok(loan),
            _ => Err(CoreError::not_found("Loan", loan_id)),
        }
    }

    async fn load(&self, loan_id: &str) -> CoreResult<Option<Loan>> {
        sqlx::query_as::<_, Loan>(&format!("SELECT {LOAN_COLUMNS} FROM loans WHERE id = ?1"))
            .bind(loan_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| processing_failed("get_loan", e))
    }
}

// =============================================================================
// Transaction Steps
// =============================================================================

async fn has_active_loan(
    conn: &mut SqliteConnection,
    user_id: &str,
    book_id: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM loans
            WHERE user_id = ?1 AND book_id = ?2 AND status = ?3
        )
        "#,
    )
    .bind(user_id)
    .bind(book_id)
    .bind(LoanStatus::Active)
    .fetch_one(&mut *conn)
    .await
}

/// Everything between BEGIN and COMMIT of an open-loan transaction.
async fn open_in_transaction(
    conn: &mut SqliteConnection,
    caller: &Caller,
    book_id: &str,
    now: DateTime<Utc>,
) -> CoreResult<Loan> {
    const OP: &str = "open_loan";

    let decremented = sqlx::query(
        r#"
        UPDATE books
        SET available_copies = available_copies - 1, updated_at = ?1
        WHERE id = ?2 AND available_copies > 0
        "#,
    )
    .bind(now)
    .bind(book_id)
    .execute(&mut *conn)
    .await
    .map_err(|e| processing_failed(OP, e))?;

    if decremented.rows_affected() == 0 {
        // Either the last copy went to a concurrent transaction or the
        // book was deleted after the validation stage.
        let book = fetch_book(conn, book_id)
            .await
            .map_err(|e| processing_failed(OP, e))?;
        return Err(match book {
            Some(_) => ConflictReason::NoCopiesAvailable.into(),
            None => CoreError::not_found("Book", book_id),
        });
    }

    if has_active_loan(conn, &caller.user_id, book_id)
        .await
        .map_err(|e| processing_failed(OP, e))?
    {
        return Err(ConflictReason::DuplicateActiveLoan.into());
    }

    let book = fetch_book(conn, book_id)
        .await
        .map_err(|e| processing_failed(OP, e))?
        .ok_or_else(|| processing_failed(OP, format!("book {book_id} vanished mid-transaction")))?;

    if !book.inventory_is_consistent() {
        return Err(processing_failed(
            OP,
            format!(
                "book {book_id} out of bounds: available={} total={}",
                book.available_copies, book.total_copies
            ),
        ));
    }

    let loan = new_active_loan(Uuid::new_v4().to_string(), &caller.user_id, book_id, now);

    sqlx::query(
        r#"
        INSERT INTO loans
            (id, user_id, book_id, loaned_at, due_at, returned_at, status, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&loan.id)
    .bind(&loan.user_id)
    .bind(&loan.book_id)
    .bind(loan.loaned_at)
    .bind(loan.due_at)
    .bind(loan.returned_at)
    .bind(loan.status)
    .bind(loan.created_at)
    .bind(loan.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        err if err.is_unique_violation_on("loans.user_id") => {
            CoreError::Conflict(ConflictReason::DuplicateActiveLoan)
        }
        err => processing_failed(OP, err),
    })?;

    Ok(loan)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::test_support::{book_input, member, setup, staff, start};
    use chrono::Duration;
    use libris_core::{Book, FixedClock};

    async fn book_x(db: &Database) -> Book {
        db.books().create(&book_input("9780000000002", 2)).await.unwrap()
    }

    async fn available(db: &Database, book_id: &str) -> i64 {
        db.books().get(book_id).await.unwrap().available_copies
    }

    fn conflict(err: CoreError) -> ConflictReason {
        match err {
            CoreError::Conflict(reason) => reason,
            other => panic!("expected a conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_open_loan_takes_a_copy() {
        let (db, _clock) = setup().await;
        let ana = member(&db, "ana").await;
        let book = book_x(&db).await;

        let loan = db.loans().open_loan(&ana.caller(), &book.id).await.unwrap();

        assert_eq!(loan.status, LoanStatus::Active);
        assert_eq!(loan.user_id, ana.id);
        assert_eq!(loan.book_id, book.id);
        assert_eq!(loan.loaned_at, start());
        assert_eq!(loan.due_at, start() + Duration::days(14));
        assert!(loan.returned_at.is_none());
        assert_eq!(available(&db, &book.id).await, 1);
    }

    #[tokio::test]
    async fn test_open_then_get_round_trip() {
        let (db, _clock) = setup().await;
        let ana = member(&db, "ana").await;
        let book = book_x(&db).await;

        let created = db.loans().open_loan(&ana.caller(), &book.id).await.unwrap();
        let fetched = db.loans().get_loan(&ana.caller(), &created.id).await.unwrap();

        assert_eq!(fetched.user_id, created.user_id);
        assert_eq!(fetched.book_id, created.book_id);
        assert_eq!(fetched.loaned_at, created.loaned_at);
        assert_eq!(fetched.due_at, created.due_at);
        assert_eq!(fetched.due_at - fetched.loaned_at, Duration::days(14));
    }

    #[tokio::test]
    async fn test_open_missing_book() {
        let (db, _clock) = setup().await;
        let ana = member(&db, "ana").await;

        let err = db.loans().open_loan(&ana.caller(), "missing").await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_second_open_for_same_pair_conflicts() {
        let (db, _clock) = setup().await;
        let ana = member(&db, "ana").await;
        let book = book_x(&db).await;

        db.loans().open_loan(&ana.caller(), &book.id).await.unwrap();
        let err = db.loans().open_loan(&ana.caller(), &book.id).await.unwrap_err();

        assert_eq!(conflict(err), ConflictReason::DuplicateActiveLoan);
        assert_eq!(available(&db, &book.id).await, 1);
        assert_eq!(db.loans().list_loans(&ana.caller()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_open_without_copies_conflicts() {
        let (db, _clock) = setup().await;
        let ana = member(&db, "ana").await;
        let book = db.books().create(&book_input("9780000000003", 0)).await.unwrap();

        let err = db.loans().open_loan(&ana.caller(), &book.id).await.unwrap_err();

        assert_eq!(conflict(err), ConflictReason::NoCopiesAvailable);
        assert_eq!(available(&db, &book.id).await, 0);
        assert!(db.loans().list_loans(&ana.caller()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_close_restocks_once() {
        let (db, clock) = setup().await;
        let ana = member(&db, "ana").await;
        let book = book_x(&db).await;
        let loan = db.loans().open_loan(&ana.caller(), &book.id).await.unwrap();

        clock.advance(Duration::days(3));
        let closed = db.loans().close_loan(&ana.caller(), &loan.id).await.unwrap();

        assert_eq!(closed.status, LoanStatus::Returned);
        assert_eq!(closed.returned_at, Some(start() + Duration::days(3)));
        assert_eq!(closed.due_at, loan.due_at);
        assert_eq!(available(&db, &book.id).await, 2);

        let err = db.loans().close_loan(&ana.caller(), &loan.id).await.unwrap_err();
        assert_eq!(conflict(err), ConflictReason::AlreadyReturned);
        assert_eq!(available(&db, &book.id).await, 2);
    }

    #[tokio::test]
    async fn test_amend_has_no_inventory_effect() {
        let (db, _clock) = setup().await;
        let ana = member(&db, "ana").await;
        let book = book_x(&db).await;
        let loan = db.loans().open_loan(&ana.caller(), &book.id).await.unwrap();

        let update = LoanUpdate {
            status: Some(LoanStatus::Overdue),
            due_at: Some(loan.due_at + Duration::days(7)),
        };
        let amended = db.loans().update_loan(&ana.caller(), &loan.id, &update).await.unwrap();

        assert_eq!(amended.status, LoanStatus::Overdue);
        assert_eq!(amended.due_at, loan.due_at + Duration::days(7));
        assert_eq!(amended.loaned_at, loan.loaned_at);
        assert_eq!(available(&db, &book.id).await, 1);

        // OVERDUE loans still come back through the normal close path.
        db.loans().close_loan(&ana.caller(), &loan.id).await.unwrap();
        assert_eq!(available(&db, &book.id).await, 2);
    }

    #[tokio::test]
    async fn test_leaving_returned_clears_return_stamp() {
        let (db, _clock) = setup().await;
        let ana = member(&db, "ana").await;
        let book = book_x(&db).await;
        let loan = db.loans().open_loan(&ana.caller(), &book.id).await.unwrap();
        db.loans().close_loan(&ana.caller(), &loan.id).await.unwrap();

        let update = LoanUpdate {
            status: Some(LoanStatus::Lost),
            due_at: None,
        };
        let lost = db.loans().update_loan(&ana.caller(), &loan.id, &update).await.unwrap();

        assert_eq!(lost.status, LoanStatus::Lost);
        assert!(lost.returned_at.is_none());
        assert_eq!(available(&db, &book.id).await, 1);
    }

    #[tokio::test]
    async fn test_reopen_then_close_keeps_inventory_in_bounds() {
        let (db, _clock) = setup().await;
        let ana = member(&db, "ana").await;
        let book = db.books().create(&book_input("9780000000003", 1)).await.unwrap();
        let loan = db.loans().open_loan(&ana.caller(), &book.id).await.unwrap();
        db.loans().close_loan(&ana.caller(), &loan.id).await.unwrap();
        assert_eq!(available(&db, &book.id).await, 1);

        let reactivate = LoanUpdate {
            status: Some(LoanStatus::Active),
            due_at: None,
        };
        let reopened = db
            .loans()
            .update_loan(&ana.caller(), &loan.id, &reactivate)
            .await
            .unwrap();
        assert_eq!(reopened.status, LoanStatus::Active);
        assert!(reopened.returned_at.is_none());
        assert_eq!(available(&db, &book.id).await, 0);

        let closed = db.loans().close_loan(&ana.caller(), &loan.id).await.unwrap();
        assert_eq!(closed.status, LoanStatus::Returned);
        assert_eq!(available(&db, &book.id).await, 1);
    }

    #[tokio::test]
    async fn test_reopen_without_copies_conflicts() {
        let (db, _clock) = setup().await;
        let ana = member(&db, "ana").await;
        let ben = member(&db, "ben").await;
        let book = db.books().create(&book_input("9780000000003", 1)).await.unwrap();
        let loan = db.loans().open_loan(&ana.caller(), &book.id).await.unwrap();
        db.loans().close_loan(&ana.caller(), &loan.id).await.unwrap();
        db.loans().open_loan(&ben.caller(), &book.id).await.unwrap();

        let reactivate = LoanUpdate {
            status: Some(LoanStatus::Active),
            due_at: None,
        };
        let err = db
            .loans()
            .update_loan(&ana.caller(), &loan.id, &reactivate)
            .await
            .unwrap_err();

        assert_eq!(conflict(err), ConflictReason::NoCopiesAvailable);
        let loan = db.loans().get_loan(&ana.caller(), &loan.id).await.unwrap();
        assert_eq!(loan.status, LoanStatus::Returned);
        assert!(loan.returned_at.is_some());
        assert_eq!(available(&db, &book.id).await, 0);
    }

    #[tokio::test]
    async fn test_storage_failure_mid_close_rolls_back() {
        let (db, _clock) = setup().await;
        let ana = member(&db, "ana").await;
        let book = book_x(&db).await;
        let loan = db.loans().open_loan(&ana.caller(), &book.id).await.unwrap();

        // Counter drifts to the ceiling, so the restock breaks the CHECK.
        sqlx::query("UPDATE books SET available_copies = total_copies WHERE id = ?1")
            .bind(&book.id)
            .execute(db.pool())
            .await
            .unwrap();

        let err = db.loans().close_loan(&ana.caller(), &loan.id).await.unwrap_err();

        assert!(matches!(err, CoreError::ProcessingFailed));
        assert_eq!(available(&db, &book.id).await, 2);
        let unchanged = db.loans().get_loan(&ana.caller(), &loan.id).await.unwrap();
        assert_eq!(unchanged, loan);
    }

    #[tokio::test]
    async fn test_reactivating_into_duplicate_conflicts() {
        let (db, _clock) = setup().await;
        let ana = member(&db, "ana").await;
        let book = book_x(&db).await;
        let first = db.loans().open_loan(&ana.caller(), &book.id).await.unwrap();
        db.loans().close_loan(&ana.caller(), &first.id).await.unwrap();
        db.loans().open_loan(&ana.caller(), &book.id).await.unwrap();

        let update = LoanUpdate {
            status: Some(LoanStatus::Active),
            due_at: None,
        };
        let err = db.loans().update_loan(&ana.caller(), &first.id, &update).await.unwrap_err();

        assert_eq!(conflict(err), ConflictReason::DuplicateActiveLoan);
        let first = db.loans().get_loan(&ana.caller(), &first.id).await.unwrap();
        assert_eq!(first.status, LoanStatus::Returned);
        assert_eq!(available(&db, &book.id).await, 1);
    }

    #[tokio::test]
    async fn test_due_date_before_loan_rejected() {
        let (db, _clock) = setup().await;
        let ana = member(&db, "ana").await;
        let book = book_x(&db).await;
        let loan = db.loans().open_loan(&ana.caller(), &book.id).await.unwrap();

        let update = LoanUpdate {
            status: None,
            due_at: Some(loan.loaned_at - Duration::days(1)),
        };
        let err = db.loans().update_loan(&ana.caller(), &loan.id, &update).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn test_visibility_by_role() {
        let (db, clock) = setup().await;
        let ana = member(&db, "ana").await;
        let bob = member(&db, "bob").await;
        let carol = staff(&db, "carol").await;
        let book = book_x(&db).await;

        let ana_loan = db.loans().open_loan(&ana.caller(), &book.id).await.unwrap();
        clock.advance(Duration::hours(1));
        let bob_loan = db.loans().open_loan(&bob.caller(), &book.id).await.unwrap();

        let mine = db.loans().list_loans(&ana.caller()).await.unwrap();
        assert_eq!(mine.iter().map(|l| l.id.clone()).collect::<Vec<_>>(), vec![ana_loan.id.clone()]);

        // Staff sees everything, newest first.
        let all = db.loans().list_loans(&carol.caller()).await.unwrap();
        assert_eq!(
            all.iter().map(|l| l.id.clone()).collect::<Vec<_>>(),
            vec![bob_loan.id.clone(), ana_loan.id.clone()]
        );

        let err = db.loans().get_loan(&bob.caller(), &ana_loan.id).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
        let err = db.loans().close_loan(&bob.caller(), &ana_loan.id).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }));
        assert_eq!(available(&db, &book.id).await, 0);

        // Staff may close anyone's loan.
        db.loans().close_loan(&carol.caller(), &ana_loan.id).await.unwrap();
        assert_eq!(available(&db, &book.id).await, 1);
    }

    #[tokio::test]
    async fn test_book_x_walkthrough() {
        let (db, clock) = setup().await;
        let a = member(&db, "user_a").await;
        let b = member(&db, "user_b").await;
        let c = member(&db, "user_c").await;
        let book = book_x(&db).await;
        assert_eq!(available(&db, &book.id).await, 2);

        let loan1 = db.loans().open_loan(&a.caller(), &book.id).await.unwrap();
        assert_eq!(available(&db, &book.id).await, 1);
        assert_eq!(loan1.status, LoanStatus::Active);
        assert_eq!(loan1.due_at, loan1.loaned_at + Duration::days(14));

        let loan2 = db.loans().open_loan(&b.caller(), &book.id).await.unwrap();
        assert_eq!(available(&db, &book.id).await, 0);
        assert_eq!(loan2.status, LoanStatus::Active);

        let err = db.loans().open_loan(&c.caller(), &book.id).await.unwrap_err();
        assert_eq!(conflict(err), ConflictReason::NoCopiesAvailable);
        assert_eq!(available(&db, &book.id).await, 0);

        clock.advance(Duration::days(5));
        let loan1 = db.loans().close_loan(&a.caller(), &loan1.id).await.unwrap();
        assert_eq!(available(&db, &book.id).await, 1);
        assert_eq!(loan1.status, LoanStatus::Returned);
        assert_eq!(loan1.returned_at, Some(start() + Duration::days(5)));

        let again = db.loans().open_loan(&a.caller(), &book.id).await.unwrap();
        assert_eq!(again.status, LoanStatus::Active);
        assert_eq!(available(&db, &book.id).await, 0);
    }

    // =========================================================================
    // Concurrency (file database, several pooled connections)
    // =========================================================================

    async fn file_database(dir: &tempfile::TempDir) -> Database {
        let config = DbConfig::new(dir.path().join("ledger.db"))
            .max_connections(8)
            .busy_timeout(std::time::Duration::from_secs(30));
        Database::new(config)
            .await
            .unwrap()
            .with_clock(Arc::new(FixedClock::new(start())))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_opens_never_oversell() {
        let dir = tempfile::tempdir().unwrap();
        let db = file_database(&dir).await;
        let book = db.books().create(&book_input("9780000000004", 3)).await.unwrap();

        let mut callers = Vec::new();
        for i in 0..10 {
            callers.push(member(&db, &format!("reader{i}")).await.caller());
        }

        let mut handles = Vec::new();
        for caller in callers {
            let ledger = db.loans();
            let book_id = book.id.clone();
            handles.push(tokio::spawn(async move { ledger.open_loan(&caller, &book_id).await }));
        }

        let mut opened = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => opened += 1,
                Err(err) => assert_eq!(conflict(err), ConflictReason::NoCopiesAvailable),
            }
        }

        assert_eq!(opened, 3);
        let book = db.books().get(&book.id).await.unwrap();
        assert_eq!(book.available_copies, 0);
        assert!(book.inventory_is_consistent());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_opens_by_one_user_create_one_loan() {
        let dir = tempfile::tempdir().unwrap();
        let db = file_database(&dir).await;
        let book = db.books().create(&book_input("9780000000005", 5)).await.unwrap();
        let caller = member(&db, "eager").await.caller();

        let mut handles = Vec::new();
        for _ in 0..6 {
            let ledger = db.loans();
            let caller = caller.clone();
            let book_id = book.id.clone();
            handles.push(tokio::spawn(async move { ledger.open_loan(&caller, &book_id).await }));
        }

        let mut opened = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => opened += 1,
                Err(err) => assert_eq!(conflict(err), ConflictReason::DuplicateActiveLoan),
            }
        }

        assert_eq!(opened, 1);
        assert_eq!(available(&db, &book.id).await, 4);
        assert_eq!(db.loans().list_loans(&caller).await.unwrap().len(), 1);
    }
}
