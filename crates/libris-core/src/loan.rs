//! # Loan Lifecycle Rules
//!
//! Pure decisions behind the loan ledger. libris-db runs them inside its
//! transactions; nothing here touches storage.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Loan Lifecycle                                 │
//! │                                                                         │
//! │  open loan ──► ACTIVE ──────── close (RETURNED) ────────► RETURNED      │
//! │                  │               available_copies += 1     │            │
//! │                  │                                         │            │
//! │                  ├── amend (OVERDUE / LOST / due_at) ──┐   │            │
//! │                  │     no inventory effect             │   │            │
//! │                  ◄─────────────────────────────────────┘   │            │
//! │                                                            │            │
//! │  close again ──────────────────────────────────────► Conflict           │
//! │                                                      (AlreadyReturned)  │
//! │                                                                         │
//! │  RETURNED ──► any other status (reopen): available_copies -= 1          │
//! │                                                                         │
//! │  open loan: available_copies -= 1, due_at = loaned_at + 14 days         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A loan holds a copy exactly while it is not RETURNED. So entering
//! RETURNED gives a copy back, leaving it takes one, and every other
//! change is stored as requested.

use chrono::{DateTime, Duration, Utc};

use crate::error::{ConflictReason, CoreError, CoreResult};
use crate::types::{Book, Caller, Loan, LoanStatus};
use crate::validation::validate_due_at;
use crate::LOAN_PERIOD_DAYS;

// =============================================================================
// Due Dates
// =============================================================================

/// The fixed loan period.
#[inline]
pub fn loan_period() -> Duration {
    Duration::days(LOAN_PERIOD_DAYS)
}

/// When a loan started at `loaned_at` is due.
#[inline]
pub fn due_date(loaned_at: DateTime<Utc>) -> DateTime<Utc> {
    loaned_at + loan_period()
}

// =============================================================================
// Opening
// =============================================================================

/// Pre-transaction checks for opening a loan, in their required order.
///
/// ## Order
/// 1. `book` must exist → `NotFound`
/// 2. no ACTIVE loan for (caller, book) → `Conflict(DuplicateActiveLoan)`
/// 3. a copy must be free → `Conflict(NoCopiesAvailable)`
pub fn check_can_open(
    book_id: &str,
    book: Option<&Book>,
    has_active_loan: bool,
) -> CoreResult<()> {
    let Some(book) = book else {
        return Err(CoreError::not_found("Book", book_id));
    };

    if has_active_loan {
        return Err(ConflictReason::DuplicateActiveLoan.into());
    }

    if !book.can_lend() {
        return Err(ConflictReason::NoCopiesAvailable.into());
    }

    Ok(())
}

/// Builds the ACTIVE loan the ledger inserts.
pub fn new_active_loan(
    id: String,
    user_id: &str,
    book_id: &str,
    now: DateTime<Utc>,
) -> Loan {
    Loan {
        id,
        user_id: user_id.to_string(),
        book_id: book_id.to_string(),
        loaned_at: now,
        due_at: due_date(now),
        returned_at: None,
        status: LoanStatus::Active,
        created_at: now,
        updated_at: now,
    }
}

// =============================================================================
// Updating / Closing
// =============================================================================

/// Fields a caller may change on an existing loan.
///
/// User, book and loan date are fixed at creation and have no slot here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoanUpdate {
    pub status: Option<LoanStatus>,
    pub due_at: Option<DateTime<Utc>>,
}

/// What the ledger has to do to apply a [`LoanUpdate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoanTransition {
    /// Close the loan: mark RETURNED, stamp `returned_at`, give the copy back.
    Return {
        returned_at: DateTime<Utc>,
        due_at: DateTime<Utc>,
    },
    /// Leave RETURNED: take a copy again and clear `returned_at`.
    Reopen {
        status: LoanStatus,
        due_at: DateTime<Utc>,
    },
    /// Store the new field values; inventory is untouched.
    Amend {
        status: LoanStatus,
        due_at: DateTime<Utc>,
        returned_at: Option<DateTime<Utc>>,
    },
}

impl LoanTransition {
    /// Whether applying this transition moves `available_copies`.
    pub fn touches_inventory(&self) -> bool {
        matches!(self, LoanTransition::Return { .. } | LoanTransition::Reopen { .. })
    }
}

/// Decides how `update` applies to `current`.
///
/// ## Rules
/// - RETURNED requested on a RETURNED loan → `Conflict(AlreadyReturned)`
/// - RETURNED requested on any other loan → [`LoanTransition::Return`]
/// - any other status on a RETURNED loan → [`LoanTransition::Reopen`]
/// - anything else → [`LoanTransition::Amend`]
/// - a new `due_at` must not precede `loaned_at`
pub fn plan_update(
    current: &Loan,
    update: &LoanUpdate,
    now: DateTime<Utc>,
) -> CoreResult<LoanTransition> {
    let due_at = match update.due_at {
        Some(due_at) => {
            validate_due_at(current.loaned_at, due_at)?;
            due_at
        }
        None => current.due_at,
    };

    match update.status {
        Some(LoanStatus::Returned) if current.is_returned() => {
            Err(ConflictReason::AlreadyReturned.into())
        }
        Some(LoanStatus::Returned) => Ok(LoanTransition::Return {
            returned_at: now,
            due_at,
        }),
        Some(status) if current.is_returned() => Ok(LoanTransition::Reopen { status, due_at }),
        requested => Ok(LoanTransition::Amend {
            status: requested.unwrap_or(current.status),
            due_at,
            returned_at: current.returned_at,
        }),
    }
}

// =============================================================================
// Visibility
// =============================================================================

/// Which loans a caller may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoanScope {
    /// Staff: every loan.
    All,
    /// Members: only their own.
    Borrower(String),
}

impl LoanScope {
    pub fn for_caller(caller: &Caller) -> Self {
        if caller.is_staff() {
            LoanScope::All
        } else {
            LoanScope::Borrower(caller.user_id.clone())
        }
    }

    pub fn permits(&self, loan: &Loan) -> bool {
        match self {
            LoanScope::All => true,
            LoanScope::Borrower(user_id) => loan.user_id == *user_id,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
