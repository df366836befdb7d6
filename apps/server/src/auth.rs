//! JWT authentication module.
//!
//! Token issuing and validation, plus the identity provider that sits on
//! top of it: register, authenticate, resolve.

use std::sync::Arc;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use libris_core::{Caller, CoreError, User};
use libris_db::UserRepository;

use crate::error::ApiError;

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,
}

/// JWT token manager (HS256).
pub struct JwtManager {
    secret: String,
    lifetime_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager.
    pub fn new(secret: String, lifetime_secs: i64) -> Self {
        JwtManager {
            secret,
            lifetime_secs,
        }
    }

    /// Generate an access token for a user.
    pub fn issue_token(&self, user_id: &str) -> Result<String, ApiError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.lifetime_secs);

        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to generate token");
            ApiError::internal("could not issue a token")
        })
    }

    /// Validate and decode a token.
    pub fn validate_token(&self, token: &str) -> Result<Claims, CoreError> {
        let validation = Validation::default();

        let token_data: TokenData<Claims> = decode(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|e| {
            debug!(error = %e, "Token rejected");
            CoreError::unauthorized("invalid or expired token")
        })?;

        Ok(token_data.claims)
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

// =============================================================================
// Identity Provider
// =============================================================================

/// Registration, login and token resolution.
#[derive(Clone)]
pub struct IdentityProvider {
    users: UserRepository,
    jwt: Arc<JwtManager>,
}

impl IdentityProvider {
    pub fn new(users: UserRepository, jwt: Arc<JwtManager>) -> Self {
        IdentityProvider { users, jwt }
    }

    /// Creates a member account and signs it in.
    pub async fn register(&self, username: &str, password: &str) -> Result<(User, String), ApiError> {
        let user = self.users.register(username, password).await?;
        let token = self.jwt.issue_token(&user.id)?;

        info!(user_id = %user.id, username = %user.username, "User registered");
        Ok((user, token))
    }

    /// Checks credentials and issues a token.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<(User, String), ApiError> {
        let Some(user) = self.users.verify_credentials(username, password).await? else {
            warn!(username = %username, "Authentication failed");
            return Err(CoreError::unauthorized("unable to log in with provided credentials").into());
        };

        let token = self.jwt.issue_token(&user.id)?;
        Ok((user, token))
    }

    /// Resolves a token to the caller it was issued for.
    ///
    /// A valid token for a deleted user is rejected.
    pub async fn resolve(&self, token: &str) -> Result<Caller, ApiError> {
        let claims = self.jwt.validate_token(token)?;

        match self.users.find(&claims.sub).await? {
            Some(user) => Ok(user.caller()),
            None => {
                warn!(user_id = %claims.sub, "Token for unknown user");
                Err(CoreError::unauthorized("invalid or expired token").into())
            }
        }
    }
}
