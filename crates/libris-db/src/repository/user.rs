//! # User Repository
//!
//! Accounts, roles and password hashes.
//!
//! ## Password Storage
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  register("ana", "s3cret-pass")                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  argon2id + random salt ──► "$argon2id$v=19$m=19456,t=2,p=1$..."        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  users.password_hash (never selected into `User`)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use libris_core::validation::{validate_password, validate_registration, validate_username};
use libris_core::{Clock, CoreError, FieldErrors, Role, User, UserUpdate, ValidationError};

use crate::error::{DbError, DbResult};
use crate::repository::in_use_on_restrict;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    username: String,
    password_hash: String,
    role: Role,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            role: row.role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const USER_COLUMNS: &str = "id, username, password_hash, role, created_at, updated_at";

/// Repository for user accounts.
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        UserRepository { pool, clock }
    }

    /// Self-service registration: always creates a member.
    pub async fn register(&self, username: &str, password: &str) -> DbResult<User> {
        self.create(username, password, Role::Member).await
    }

    /// Creates an account with an explicit role.
    ///
    /// ## Errors
    /// - `Rejected(Validation)` for a bad or taken username, or a weak password
    pub async fn create(&self, username: &str, password: &str, role: Role) -> DbResult<User> {
        validate_registration(username, password).map_err(CoreError::from)?;
        let username = username.trim();

        if self.find_row_by_username(username).await?.is_some() {
            return Err(username_taken(username));
        }

        let id = Uuid::new_v4().to_string();
        let now = self.clock.now();
        let password_hash = hash_password(password)?;

        sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash, role, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            "#,
        )
        .bind(&id)
        .bind(username)
        .bind(&password_hash)
        .bind(role)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            err if err.is_unique_violation_on("users.username") => username_taken(username),
            err => err,
        })?;

        info!(id = %id, username = %username, role = ?role, "User created");
        self.get(&id).await
    }

    /// Checks a username / password pair.
    ///
    /// Returns `None` for an unknown user and for a wrong password alike.
    pub async fn verify_credentials(&self, username: &str, password: &str) -> DbResult<Option<User>> {
        let Some(row) = self.find_row_by_username(username.trim()).await? else {
            debug!(username = %username, "Login for unknown user");
            return Ok(None);
        };

        if verify_password(password, &row.password_hash) {
            Ok(Some(row.into()))
        } else {
            warn!(username = %username, "Password mismatch");
            Ok(None)
        }
    }

    /// Lists users ordered by username.
    pub async fn list(&self) -> DbResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY username"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    /// Gets a user by ID.
    pub async fn get(&self, id: &str) -> DbResult<User> {
        self.find(id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    /// Gets a user by ID, `None` when it doesn't exist.
    pub async fn find(&self, id: &str) -> DbResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(User::from))
    }

    /// Applies an admin update. Absent fields keep their value.
    pub async fn update(&self, id: &str, update: &UserUpdate) -> DbResult<User> {
        let current = self.get(id).await?;

        let mut errors = FieldErrors::new();
        if let Some(username) = &update.username {
            errors.check(validate_username(username));
        }
        if let Some(password) = &update.password {
            errors.check(validate_password(password));
        }
        errors.into_result().map_err(CoreError::from)?;

        let username = update
            .username
            .as_deref()
            .map(str::trim)
            .unwrap_or(&current.username)
            .to_string();

        if username != current.username && self.find_row_by_username(&username).await?.is_some() {
            return Err(username_taken(&username));
        }

        let password_hash = match &update.password {
            Some(password) => Some(hash_password(password)?),
            None => None,
        };

        sqlx::query(
            r#"
            UPDATE users
            SET username = ?1,
                role = ?2,
                password_hash = COALESCE(?3, password_hash),
                updated_at = ?4
            WHERE id = ?5
            "#,
        )
        .bind(&username)
        .bind(update.role.unwrap_or(current.role))
        .bind(password_hash)
        .bind(self.clock.now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            err if err.is_unique_violation_on("users.username") => username_taken(&username),
            err => err,
        })?;

        info!(id = %id, "User updated");
        self.get(id).await
    }

    /// Deletes a user.
    ///
    /// ## Errors
    /// - `NotFound` if the user doesn't exist
    /// - `Rejected(Conflict(InUse))` if the user has loan history
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| in_use_on_restrict(e.into(), "User"))?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        info!(id = %id, "User deleted");
        Ok(())
    }

    async fn find_row_by_username(&self, username: &str) -> DbResult<Option<UserRow>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}

fn username_taken(username: &str) -> DbError {
    CoreError::from(ValidationError::duplicate("username", username)).into()
}

// =============================================================================
// Password Hashing
// =============================================================================

/// Hashes a password for storage (argon2id, random salt, PHC string).
pub fn hash_password(password: &str) -> DbResult<String> {
    use argon2::{
        password_hash::{rand_core::OsRng, SaltString},
        Argon2, PasswordHasher,
    };

    let salt = SaltString::generate(&mut OsRng);

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| DbError::Internal(format!("Failed to hash password: {}", e)))?;

    Ok(hash.to_string())
}

/// Verifies a password against a stored PHC hash.
pub fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

// =============================================================================
// Unit Tests
// =============================================================================
