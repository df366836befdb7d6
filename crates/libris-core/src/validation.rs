//! # Validation Module
//!
//! Field-level input validation for Libris.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Gateway (axum)                                               │
//! │  └── Type validation (JSON deserialization)                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Required / length / format checks                                 │
//! │  └── Copy-count bounds                                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── UNIQUE (isbn, username)                                           │
//! │  ├── CHECK (0 <= available_copies <= total_copies)                     │
//! │  └── Partial UNIQUE (one ACTIVE loan per user and book)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Single-field validators return the first problem they see; the
//! `validate_*_input` functions run every check and collect the results
//! into [`FieldErrors`].

use chrono::{DateTime, Utc};

use crate::error::{FieldErrors, ValidationError};
use crate::types::{AuthorInput, BookInput};
use crate::{MAX_ISBN_LEN, MAX_PERSON_NAME_LEN, MAX_TITLE_LEN, MAX_USERNAME_LEN, MIN_PASSWORD_LEN};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a required free-text field with an optional maximum length.
pub fn validate_required(field: &str, value: &str, max: Option<usize>) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if let Some(max) = max {
        if value.chars().count() > max {
            return Err(ValidationError::TooLong {
                field: field.to_string(),
                max,
            });
        }
    }

    Ok(())
}

/// Validates a book title.
///
/// ## Rules
/// - Must not be empty
/// - At most 200 characters
pub fn validate_title(title: &str) -> ValidationResult<()> {
    validate_required("title", title, Some(MAX_TITLE_LEN))
}

/// Validates an ISBN.
///
/// ## Rules
/// - Must not be empty
/// - At most 13 characters
/// - Digits only; ISBN-10 may end in `X`
///
/// ## Example
/// ```rust
/// use libris_core::validation::validate_isbn;
///
/// assert!(validate_isbn("9780441013593").is_ok());
/// assert!(validate_isbn("080442957X").is_ok());
/// assert!(validate_isbn("978-0441").is_err());
/// ```
pub fn validate_isbn(isbn: &str) -> ValidationResult<()> {
    validate_required("isbn", isbn, Some(MAX_ISBN_LEN))?;

    let isbn = isbn.trim();
    let body_is_digits = isbn
        .char_indices()
        .all(|(i, c)| c.is_ascii_digit() || (c == 'X' && i == isbn.len() - 1));

    if !body_is_digits {
        return Err(ValidationError::InvalidFormat {
            field: "isbn".to_string(),
            reason: "must contain only digits (ISBN-10 may end in X)".to_string(),
        });
    }

    Ok(())
}

/// Validates a username.
///
/// ## Rules
/// - Must not be empty, at most 150 characters
/// - Letters, digits and `@ . + - _` only
pub fn validate_username(username: &str) -> ValidationResult<()> {
    validate_required("username", username, Some(MAX_USERNAME_LEN))?;

    if !username
        .trim()
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        return Err(ValidationError::InvalidFormat {
            field: "username".to_string(),
            reason: "may contain only letters, numbers, and @/./+/-/_".to_string(),
        });
    }

    Ok(())
}

/// Validates a password. Surrounding whitespace is significant.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::Required {
            field: "password".to_string(),
        });
    }

    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: MIN_PASSWORD_LEN,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates copy counters.
///
/// ## Rules
/// - `total_copies >= 0`
/// - `0 <= available_copies <= total_copies`
pub fn validate_copies(total: i64, available: i64) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    if total < 0 {
        errors.push(ValidationError::OutOfRange {
            field: "total_copies".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    if available < 0 || available > total.max(0) {
        errors.push(ValidationError::OutOfRange {
            field: "available_copies".to_string(),
            min: 0,
            max: total.max(0),
        });
    }

    errors.into_result()
}

/// A due date may move, but never before the loan started.
pub fn validate_due_at(loaned_at: DateTime<Utc>, due_at: DateTime<Utc>) -> ValidationResult<()> {
    if due_at < loaned_at {
        return Err(ValidationError::InvalidFormat {
            field: "due_at".to_string(),
            reason: "must not be earlier than the loan date".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Request Validators
// =============================================================================

/// Validates a book body and returns the effective `available_copies`.
///
/// `current_available` is the stored value when updating; it is used when
/// the body leaves `available_copies` out.
pub fn validate_book_input(
    input: &BookInput,
    current_available: Option<i64>,
) -> Result<i64, FieldErrors> {
    let mut errors = FieldErrors::new();

    errors.check(validate_title(&input.title));
    errors.check(validate_isbn(&input.isbn));
    errors.check(validate_required("description", &input.description, None));

    let available = input
        .available_copies
        .or(current_available)
        .unwrap_or(input.total_copies);

    if let Err(copy_errors) = validate_copies(input.total_copies, available) {
        for err in copy_errors.iter() {
            errors.push(err.clone());
        }
    }

    errors.into_result().map(|()| available)
}

/// Validates an author body.
pub fn validate_author_input(input: &AuthorInput) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    errors.check(validate_required("name", &input.name, Some(MAX_PERSON_NAME_LEN)));
    errors.check(validate_required("surname", &input.surname, Some(MAX_PERSON_NAME_LEN)));
    errors.check(validate_required("biography", &input.biography, None));
    errors.into_result()
}

/// Validates a registration form.
pub fn validate_registration(username: &str, password: &str) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    errors.check(validate_username(username));
    errors.check(validate_password(password));
    errors.into_result()
}

// =============================================================================
// Unit Tests
// =============================================================================
