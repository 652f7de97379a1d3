//! crates/lesson_portal_core/src/session.rs
//!
//! Turns a verified external identity into a `Session`, and re-stamps existing
//! sessions from the account store on refresh.
//!
//! Role and vetting changes reach the gate only when a session is minted, so the
//! window between an out-of-band change and its enforcement is bounded by how
//! often sessions are refreshed, and never exceeds the session lifetime.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{error, info};

use crate::domain::{ExternalIdentity, Session, User};
use crate::ports::{DatabaseService, PortError, PortResult};

#[derive(Clone)]
pub struct SessionIssuer {
    db: Arc<dyn DatabaseService>,
    lifetime: Duration,
}

impl SessionIssuer {
    pub fn new(db: Arc<dyn DatabaseService>, lifetime: Duration) -> Self {
        Self { db, lifetime }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Signs in a verified identity, registering the account on first sight.
    ///
    /// Fails closed: if the account store cannot be reached no session is issued.
    pub async fn sign_in(&self, identity: &ExternalIdentity) -> PortResult<Session> {
        if identity.email.trim().is_empty() {
            return Err(PortError::Unauthorized);
        }

        let user = self.db.get_or_create_user(identity).await.map_err(|e| {
            error!("Sign-in for {} failed: {:?}", identity.email, e);
            e
        })?;

        info!(user_id = %user.id, role = %user.role, vetted = user.vetted, "User signed in");
        Ok(self.mint(&user))
    }

    /// Re-reads the account behind `session` and mints a fresh one.
    pub async fn refresh(&self, session: &Session) -> PortResult<Session> {
        let user = match self.db.get_user_by_id(session.user_id).await {
            Ok(user) => user,
            Err(PortError::NotFound(_)) => return Err(PortError::Unauthorized),
            Err(e) => return Err(e),
        };
        Ok(self.mint(&user))
    }

    fn mint(&self, user: &User) -> Session {
        let issued_at = Utc::now();
        Session {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            vetted: user.vetted,
            image: user.avatar_url.clone(),
            issued_at,
            expires_at: issued_at + self.lifetime,
        }
    }
}
