//! Shared application state.

use std::sync::Arc;

use libris_db::Database;

use crate::auth::{IdentityProvider, JwtManager};
use crate::config::ServerConfig;

/// Handed to every handler by axum. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub jwt: Arc<JwtManager>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(db: Database, config: ServerConfig) -> Self {
        let jwt = JwtManager::new(config.jwt_secret.clone(), config.token_lifetime_secs);
        AppState {
            db,
            jwt: Arc::new(jwt),
            config: Arc::new(config),
        }
    }

    pub fn identity(&self) -> IdentityProvider {
        IdentityProvider::new(self.db.users(), Arc::clone(&self.jwt))
    }
}
