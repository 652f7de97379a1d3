//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use crate::web::token::TokenCodec;
use lesson_portal_core::access::RoutePolicy;
use lesson_portal_core::ports::{BlobStore, DatabaseService, IdentityProvider};
use lesson_portal_core::{LessonService, SessionIssuer};
use std::sync::Arc;
use std::time::Duration;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<dyn IdentityProvider>,
    pub lessons: LessonService,
    pub sessions: SessionIssuer,
    pub tokens: TokenCodec,
    pub routes: RoutePolicy,
    /// Tokens older than this are re-minted by the access gate.
    pub refresh_after: Duration,
    pub secure_cookies: bool,
}

impl AppState {
    pub fn new(
        config: &Config,
        db: Arc<dyn DatabaseService>,
        blobs: Arc<dyn BlobStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let lifetime = chrono::Duration::seconds(config.session_ttl.as_secs() as i64);
        Self {
            lessons: LessonService::new(db.clone(), blobs, config.download_url_ttl),
            sessions: SessionIssuer::new(db, lifetime),
            tokens: TokenCodec::new(&config.session_secret, config.secure_cookies),
            routes: RoutePolicy {
                public_routes: config.public_routes.clone(),
                auth_routes: config.auth_routes.clone(),
                ..RoutePolicy::default()
            },
            refresh_after: config.session_refresh_after,
            secure_cookies: config.secure_cookies,
            identity,
        }
    }
}
