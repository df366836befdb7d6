//! # Domain Types
//!
//! Core domain types used throughout Libris.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │      Book       │◄─►│     Author      │   │      User       │       │
//! │  │  ─────────────  │ n:m ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  id (UUID)      │       │
//! │  │  isbn (unique)  │   │  name, surname  │   │  username       │       │
//! │  │  total_copies   │   │  biography      │   │  role           │       │
//! │  │  available_...  │   └─────────────────┘   └────────┬────────┘       │
//! │  └────────┬────────┘                                  │                │
//! │           │              ┌─────────────────┐          │                │
//! │           └─────────────►│      Loan       │◄─────────┘                │
//! │                          │  ─────────────  │                           │
//! │                          │  loaned_at      │                           │
//! │                          │  due_at         │                           │
//! │                          │  returned_at    │                           │
//! │                          │  status         │                           │
//! │                          └─────────────────┘                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every entity is identified by a UUID v4 string. The loan's user and book
//! references are set once, by the ledger, and never change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Role & Caller
// =============================================================================

/// Two-tier role model: staff may write the catalog and see every loan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular library user.
    #[default]
    Member,
    /// Staff / administrator.
    Staff,
}

/// The resolved identity behind a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: String,
    pub username: String,
    pub role: Role,
}

impl Caller {
    #[inline]
    pub fn is_staff(&self) -> bool {
        self.role == Role::Staff
    }
}

// =============================================================================
// User
// =============================================================================

/// A registered user. The password hash never leaves libris-db.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// The identity this user acts as.
    pub fn caller(&self) -> Caller {
        Caller {
            user_id: self.id.clone(),
            username: self.username.clone(),
            role: self.role,
        }
    }
}

/// Admin-side changes to a user account.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub role: Option<Role>,
    pub password: Option<String>,
}

// =============================================================================
// Author
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Author {
    pub id: String,
    pub name: String,
    pub surname: String,
    pub biography: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Author {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.surname)
    }
}

/// Body of an author create / update request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub surname: String,
    #[serde(default)]
    pub biography: String,
}

// =============================================================================
// Book
// =============================================================================

/// A catalog entry together with its inventory counters.
///
/// ## Inventory Invariant
/// `0 <= available_copies <= total_copies` at all times. Only the loan
/// ledger moves `available_copies`, one unit per loan opened or returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub isbn: String,
    pub description: String,
    /// Author ids (many-to-many).
    pub authors: Vec<String>,
    pub total_copies: i64,
    pub available_copies: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Whether at least one copy can be lent right now.
    #[inline]
    pub fn can_lend(&self) -> bool {
        self.available_copies > 0
    }

    /// Number of copies currently out on loan.
    #[inline]
    pub fn copies_on_loan(&self) -> i64 {
        self.total_copies - self.available_copies
    }

    /// Checks `0 <= available_copies <= total_copies`.
    #[inline]
    pub fn inventory_is_consistent(&self) -> bool {
        (0..=self.total_copies).contains(&self.available_copies)
    }
}

/// Body of a book create / update request.
///
/// `available_copies` may be omitted: on create it defaults to
/// `total_copies`, on update it keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub isbn: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub total_copies: i64,
    pub available_copies: Option<i64>,
}

// =============================================================================
// Loan Status
// =============================================================================

/// The status of a loan.
///
/// Only ACTIVE and RETURNED are reached by ledger logic. OVERDUE and LOST
/// exist as values that staff may set by hand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    /// Book is with the borrower.
    #[default]
    Active,
    /// Past due and not yet returned.
    Overdue,
    /// Book came back.
    Returned,
    /// Book is considered lost.
    Lost,
}

impl LoanStatus {
    /// Wire representation (`ACTIVE`, `RETURNED`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "ACTIVE",
            LoanStatus::Overdue => "OVERDUE",
            LoanStatus::Returned => "RETURNED",
            LoanStatus::Lost => "LOST",
        }
    }

    /// Parses a wire value, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(LoanStatus::Active),
            "OVERDUE" => Some(LoanStatus::Overdue),
            "RETURNED" => Some(LoanStatus::Returned),
            "LOST" => Some(LoanStatus::Lost),
            _ => None,
        }
    }
}

// =============================================================================
// Loan
// =============================================================================

/// One user borrowing one copy of one book.
///
/// Loans are never deleted; a returned loan stays as history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Loan {
    pub id: String,
    #[serde(rename = "user")]
    pub user_id: String,
    #[serde(rename = "book")]
    pub book_id: String,
    pub loaned_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }

    #[inline]
    pub fn is_returned(&self) -> bool {
        self.status == LoanStatus::Returned
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
