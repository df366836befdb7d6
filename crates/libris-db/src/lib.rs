//! # libris-db: Database Layer for Libris
//!
//! SQLite storage for the catalog, the user accounts and the loan ledger,
//! with sqlx for async access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Libris Data Flow                                 │
//! │                                                                         │
//! │  HTTP handler (POST /api/loans)                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    libris-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │  BookRepo     │    │  (embedded)  │  │   │
//! │  │   │               │    │  AuthorRepo   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│  UserRepo     │    │ 001_init.sql │  │   │
//! │  │   │ Clock         │    ├───────────────┤    │              │  │   │
//! │  │   │               │◄───│  LoanLedger   │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  SQLite Database (WAL)                          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - `DbConfig` and the shared `Database` handle
//! - [`migrations`] - schema files compiled into the binary
//! - [`error`] - `DbError` and constraint classification
//! - [`repository`] - Books, authors, users
//! - [`ledger`] - Loan transactions
//!
//! ## Usage
//!
//! ```rust,ignore
//! use libris_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("libris.db")).await?;
//!
//! let book = db.books().create(&input).await?;
//! let loan = db.loans().open_loan(&caller, &book.id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use ledger::LoanLedger;
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::{AuthorRepository, BookRepository, UserRepository};

// =============================================================================
// Test Fixtures
// =============================================================================
