//! # Repository Module
//!
//! Catalog and user repositories for Libris.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Route handler                                                         │
//! │       │                                                                 │
//! │       │  db.books().create(&input)                                     │
//! │       ▼                                                                 │
//! │  BookRepository                                                        │
//! │  ├── list(&self)                                                       │
//! │  ├── get(&self, id)                                                    │
//! │  ├── create(&self, input)                                              │
//! │  ├── update(&self, id, input)                                          │
//! │  └── delete(&self, id)                                                 │
//! │       │                                                                 │
//! │       │  SQL                                                            │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Loans are not a repository: every loan write goes through
//! [`crate::ledger::LoanLedger`].
//!
//! ## Available Repositories
//!
//! - [`BookRepository`] - Books, their author links and copy counters
//! - [`AuthorRepository`] - Authors
//! - [`UserRepository`] - Accounts and password hashes

pub mod author;
pub mod book;
pub mod user;

pub use author::AuthorRepository;
pub use book::BookRepository;
pub use user::UserRepository;

use libris_core::{ConflictReason, CoreError};

use crate::error::DbError;

/// Maps a RESTRICT foreign key failure on delete to an `InUse` conflict.
pub(crate) fn in_use_on_restrict(err: DbError, entity: &str) -> DbError {
    match err {
        DbError::ForeignKeyViolation { .. } => DbError::Rejected(CoreError::Conflict(
            ConflictReason::InUse {
                entity: entity.to_string(),
            },
        )),
        other => other,
    }
}
