use std::sync::Arc;

use sqlx::SqlitePool;

use crate::server::auth::IdentityVerifier;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub verifier: Arc<dyn IdentityVerifier>,
}

impl AppState {
    pub fn new(pool: SqlitePool, verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self { pool, verifier }
    }
}
