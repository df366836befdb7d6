//! # libris-core: Pure Domain Logic for Libris
//!
//! This crate is the **heart** of Libris. It holds the loan lifecycle
//! rules, the access policy and every domain type, as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Libris Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Access Gateway (apps/server)                    │   │
//! │  │     bearer token ──► Caller ──► policy::authorize ──► route     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ libris-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   loan    │  │  policy   │  │ validation│  │   │
//! │  │   │  Book     │  │  due date │  │  table    │  │  fields   │  │   │
//! │  │   │  Loan     │  │  plan_upd │  │ authorize │  │  errors   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 libris-db (Database Layer)                      │   │
//! │  │        SQLite, catalog, users, loan ledger transactions         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Book, Author, Loan, Caller, ...)
//! - [`loan`] - Loan lifecycle rules (due dates, update planning, visibility)
//! - [`policy`] - Role policy as a lookup table
//! - [`clock`] - Injected source of "now"
//! - [`error`] - Domain error types
//! - [`validation`] - Field-level input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use libris_core::loan::due_date;
//!
//! let loaned_at = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
//! let due = due_date(loaned_at);
//!
//! assert_eq!(due, Utc.with_ymd_and_hms(2026, 3, 15, 10, 0, 0).unwrap());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod clock;
pub mod error;
pub mod loan;
pub mod policy;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{ConflictReason, CoreError, CoreResult, FieldErrors, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Number of days a book may be kept before it is due.
pub const LOAN_PERIOD_DAYS: i64 = 14;

/// Maximum length of a book title.
pub const MAX_TITLE_LEN: usize = 200;

/// Maximum length of an ISBN (ISBN-13, no separators).
pub const MAX_ISBN_LEN: usize = 13;

/// Maximum length of an author's name or surname.
pub const MAX_PERSON_NAME_LEN: usize = 100;

/// Maximum length of a username.
pub const MAX_USERNAME_LEN: usize = 150;

/// Minimum length of a password.
pub const MIN_PASSWORD_LEN: usize = 8;
