//! Application state management
//!
//! Contains shared state accessible across all handlers. Built once at
//! startup and never mutated afterwards.

use crate::auth::{PasswordHasher, TokenService};
use crate::store::{AchievementRepository, MemoryStore, PgStore, StudentRepository, UserRepository};
use crate::users::UserService;
use deadpool_postgres::Pool;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    /// Staff accounts, login and the admin invariants
    pub users: UserService,

    /// Public achievements list and its dashboard CRUD
    pub achievements: Arc<dyn AchievementRepository>,

    pub students: Arc<dyn StudentRepository>,

    /// Verifies bearer tokens in the identity stage
    pub tokens: TokenService,
}

impl AppState {
    /// State backed by PostgreSQL
    pub fn with_database(pool: Pool, tokens: TokenService, hasher: PasswordHasher) -> Self {
        Self::from_store(Arc::new(PgStore::new(pool)), tokens, hasher)
    }

    /// State kept in process memory
    pub fn in_memory(tokens: TokenService, hasher: PasswordHasher) -> Self {
        Self::from_store(Arc::new(MemoryStore::new()), tokens, hasher)
    }

    fn from_store<S>(store: Arc<S>, tokens: TokenService, hasher: PasswordHasher) -> Self
    where
        S: UserRepository + AchievementRepository + StudentRepository + 'static,
    {
        Self {
            users: UserService::new(store.clone(), hasher, tokens.clone()),
            achievements: store.clone(),
            students: store,
            tokens,
        }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
