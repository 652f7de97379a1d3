//! Shared fixtures for the web layer's tests.

use chrono::{Duration, Utc};
use lesson_portal_core::domain::{ExternalIdentity, Session, User};
use lesson_portal_core::testing::{InMemoryBlobStore, InMemoryDatabase, StubIdentityProvider};
use std::sync::Arc;

use crate::config::Config;
use crate::web::state::AppState;

pub(crate) fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        database_max_connections: 1,
        run_migrations: false,
        log_level: tracing::Level::INFO,
        session_secret: "a-test-secret-that-is-long-enough-for-hs256".to_string(),
        session_ttl: std::time::Duration::from_secs(3600),
        session_refresh_after: std::time::Duration::from_secs(300),
        secure_cookies: false,
        google_client_id: "client-id".to_string(),
        google_client_secret: "client-secret".to_string(),
        google_redirect_url: "http://localhost/api/auth/callback/google".to_string(),
        s3_bucket: "lessons".to_string(),
        s3_region: "us-east-1".to_string(),
        download_url_ttl: std::time::Duration::from_secs(300),
        max_upload_bytes: 1024 * 1024,
        public_routes: vec!["/".to_string()],
        auth_routes: vec!["/login".to_string()],
        cors_origin: None,
    }
}

pub(crate) struct Harness {
    pub state: Arc<AppState>,
    pub db: Arc<InMemoryDatabase>,
    pub blobs: Arc<InMemoryBlobStore>,
}

impl Harness {
    pub fn new() -> Self {
        let db = Arc::new(InMemoryDatabase::default());
        let blobs = Arc::new(InMemoryBlobStore::default());
        let identity = Arc::new(StubIdentityProvider {
            identity: ExternalIdentity {
                email: "new.student@school.test".to_string(),
                name: "New Student".to_string(),
                picture_url: None,
                provider_account_id: "google-123".to_string(),
            },
        });
        let state = AppState::new(&test_config(), db.clone(), blobs.clone(), identity);
        Self {
            state: Arc::new(state),
            db,
            blobs,
        }
    }

    /// A session for `user` as it looked when issued `age` ago.
    pub fn session_for(&self, user: &User, age: Duration) -> Session {
        let issued_at = Utc::now() - age;
        Session {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            vetted: user.vetted,
            image: user.avatar_url.clone(),
            issued_at,
            expires_at: issued_at + Duration::hours(1),
        }
    }

    pub fn token_for(&self, user: &User, age: Duration) -> String {
        self.state.tokens.encode(&self.session_for(user, age)).unwrap()
    }

    /// A `Cookie` header value carrying a fresh session for `user`.
    pub fn cookie_for(&self, user: &User) -> String {
        format!("session={}", self.token_for(user, Duration::zero()))
    }
}
