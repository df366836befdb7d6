//! # Libris Server
//!
//! HTTP/JSON access gateway for the Libris catalog and loan ledger.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Request Pipeline                                │
//! │                                                                         │
//! │  HTTP request                                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌──────────────┐   ┌──────────────────┐   ┌────────────────────────┐  │
//! │  │ MaybeCaller  │──►│ policy::authorize│──►│ handler                │  │
//! │  │ (bearer JWT) │   │ (resource, op)   │   │ catalog / identity /   │  │
//! │  └──────────────┘   └──────────────────┘   │ loan ledger            │  │
//! │                                            └───────────┬────────────┘  │
//! │                                                        │               │
//! │                                                        ▼               │
//! │                                            ApiError ──► JSON response  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `LIBRIS_HTTP_ADDR` - Listen address (default: 0.0.0.0:8080)
//! - `LIBRIS_DATABASE_PATH` - SQLite file (default: ./libris.db)
//! - `LIBRIS_DB_MAX_CONNECTIONS` - Pool size (default: 5)
//! - `LIBRIS_JWT_SECRET` - Secret for JWT signing
//! - `LIBRIS_TOKEN_LIFETIME_SECS` - Token lifetime (default: 86400)
//! - `RUST_LOG` - Log filter (default: info,libris=debug)

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

// Re-exports
pub use config::ServerConfig;
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
