//! # Error Types
//!
//! Domain-specific error types for libris-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  libris-core errors (this file)                                        │
//! │  ├── CoreError        - Caller-facing taxonomy                         │
//! │  ├── ConflictReason   - Which business rule was violated               │
//! │  ├── ValidationError  - One field-level input failure                  │
//! │  └── FieldErrors      - All field failures of one request              │
//! │                                                                         │
//! │  libris-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  Gateway errors (apps/server)                                          │
//! │  └── ApiError         - What the HTTP client sees                      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ApiError → client                 │
//! │        DbError ───────────────────┘                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Caller-facing errors of every Libris operation.
///
/// Validation and business-rule failures carry a descriptive message.
/// Unexpected failures inside a loan transaction collapse into
/// [`CoreError::ProcessingFailed`]; the cause is logged where it happens
/// and never travels further.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed or missing input, keyed by field.
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// Missing or bad credentials.
    #[error("Authentication required: {0}")]
    Unauthorized(String),

    /// Authenticated, but the role does not allow the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A referenced entity does not exist (or is not visible to the caller).
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A business rule rejected the operation.
    #[error("{0}")]
    Conflict(ConflictReason),

    /// A transactional effect failed; everything was rolled back.
    #[error("could not process the loan")]
    ProcessingFailed,
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates an Unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        CoreError::Unauthorized(message.into())
    }

    /// Creates a Forbidden error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        CoreError::Forbidden(message.into())
    }

    /// Returns the conflict reason, if this is a conflict.
    pub fn conflict_reason(&self) -> Option<&ConflictReason> {
        match self {
            CoreError::Conflict(reason) => Some(reason),
            _ => None,
        }
    }
}

impl From<ValidationError> for CoreError {
    fn from(err: ValidationError) -> Self {
        CoreError::Validation(FieldErrors::from(err))
    }
}

impl From<FieldErrors> for CoreError {
    fn from(errors: FieldErrors) -> Self {
        CoreError::Validation(errors)
    }
}

impl From<ConflictReason> for CoreError {
    fn from(reason: ConflictReason) -> Self {
        CoreError::Conflict(reason)
    }
}

// =============================================================================
// Conflict Reason
// =============================================================================

/// The business rule a rejected operation ran into.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictReason {
    /// The caller already holds an ACTIVE loan for this book.
    #[error("duplicate active loan: you already have this book on loan")]
    DuplicateActiveLoan,

    /// Every copy of the book is on loan.
    #[error("no copies available for this book")]
    NoCopiesAvailable,

    /// The loan was returned before.
    #[error("this loan was already returned")]
    AlreadyReturned,

    /// The record is referenced by loan history and cannot be deleted.
    #[error("{entity} has loan history and cannot be deleted")]
    InUse { entity: String },
}

// =============================================================================
// Validation Error
// =============================================================================

/// A single field-level input failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., non-digit ISBN, unknown status).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., duplicate ISBN or username).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// A referenced record does not exist.
    #[error("{field} references unknown id '{id}'")]
    UnknownReference { field: String, id: String },
}

impl ValidationError {
    /// The field this failure belongs to.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooShort { field, .. }
            | ValidationError::TooLong { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::Duplicate { field, .. }
            | ValidationError::UnknownReference { field, .. } => field,
        }
    }

    /// Creates a Duplicate error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        ValidationError::Duplicate {
            field: field.into(),
            value: value.into(),
        }
    }
}

// =============================================================================
// Field Errors
// =============================================================================

/// Every field-level failure found while validating one request.
///
/// Validators push into this collection instead of stopping at the first
/// problem, so a client sees all offending fields at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    errors: Vec<ValidationError>,
}

impl FieldErrors {
    pub fn new() -> Self {
        FieldErrors::default()
    }

    /// Records the failure of `result`, if any.
    pub fn check(&mut self, result: Result<(), ValidationError>) {
        if let Err(err) = result {
            self.errors.push(err);
        }
    }

    pub fn push(&mut self, err: ValidationError) {
        self.errors.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    /// Messages grouped by field name, in field order.
    pub fn by_field(&self) -> BTreeMap<String, Vec<String>> {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for err in &self.errors {
            map.entry(err.field().to_string())
                .or_default()
                .push(err.to_string());
        }
        map
    }

    /// `Ok(())` when nothing was recorded.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<ValidationError> for FieldErrors {
    fn from(err: ValidationError) -> Self {
        FieldErrors { errors: vec![err] }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        write!(f, "{}", messages.join("; "))
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
