//! Shared application state.

use std::sync::Arc;

use tally_db::{AuditRecorder, Database, Services};

use crate::auth::JwtManager;
use crate::config::ApiConfig;

/// Handed to every handler as `State<Arc<AppState>>`.
#[derive(Debug)]
pub struct AppState {
    pub services: Services,
    pub jwt: JwtManager,
    pub config: ApiConfig,
}

impl AppState {
    /// Wires services and the token manager over an open database.
    ///
    /// Must be called inside a tokio runtime when the audit mode is
    /// `background`.
    pub fn new(db: Database, config: ApiConfig) -> Arc<Self> {
        let audit = AuditRecorder::new(db.audit_logs(), config.audit.mode);
        let jwt = JwtManager::new(
            config.auth.jwt_secret.clone(),
            config.auth.token_lifetime_secs,
        );

        Arc::new(AppState {
            services: Services::new(db, audit),
            jwt,
            config,
        })
    }
}
