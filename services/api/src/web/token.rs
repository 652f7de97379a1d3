//! services/api/src/web/token.rs
//!
//! Encodes a `Session` as a signed JWT and carries it in the `session` cookie.

use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use lesson_portal_core::domain::{Role, Session};
use lesson_portal_core::ports::{PortError, PortResult};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "session";

/// JWT claims payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    id: Uuid,
    email: String,
    role: String,
    vetted: bool,
    #[serde(default)]
    image: Option<String>,
    /// Issued at (unix timestamp).
    iat: i64,
    /// Expiration (unix timestamp).
    exp: i64,
}

/// Signs and verifies session tokens with a shared HS256 secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    secure_cookies: bool,
}

impl TokenCodec {
    pub fn new(secret: &str, secure_cookies: bool) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            secure_cookies,
        }
    }

    pub fn encode(&self, session: &Session) -> PortResult<String> {
        let claims = Claims {
            id: session.user_id,
            email: session.email.clone(),
            role: session.role.as_str().to_string(),
            vetted: session.vetted,
            image: session.image.clone(),
            iat: session.issued_at.timestamp(),
            exp: session.expires_at.timestamp(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| PortError::Unexpected(format!("failed to sign session: {}", e)))
    }

    /// Returns the session in `token`, or `None` if it is forged, expired or unreadable.
    pub fn decode(&self, token: &str) -> Option<Session> {
        let claims = match jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!("Discarding session token: {}", e);
                return None;
            }
        };

        let role: Role = claims.role.parse().ok()?;
        Some(Session {
            user_id: claims.id,
            email: claims.email,
            role,
            vetted: claims.vetted,
            image: claims.image,
            issued_at: DateTime::<Utc>::from_timestamp(claims.iat, 0)?,
            expires_at: DateTime::<Utc>::from_timestamp(claims.exp, 0)?,
        })
    }

    /// Builds the cookie carrying `session`, expiring with it.
    pub fn session_cookie(&self, session: &Session) -> PortResult<Cookie<'static>> {
        let token = self.encode(session)?;
        let max_age = (session.expires_at - session.issued_at).num_seconds().max(0);
        Ok(Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .secure(self.secure_cookies)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(max_age))
            .build())
    }

    pub fn clear_cookie(&self) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, ""))
            .path("/")
            .http_only(true)
            .secure(self.secure_cookies)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::ZERO)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const SECRET: &str = "an-adequately-long-test-secret-value";

    fn session(lifetime: Duration) -> Session {
        let issued_at = Utc::now();
        Session {
            user_id: Uuid::new_v4(),
            email: "ada@school.test".to_string(),
            role: Role::Teacher,
            vetted: true,
            image: Some("https://img.test/ada.png".to_string()),
            issued_at,
            expires_at: issued_at + lifetime,
        }
    }

    #[test]
    fn a_signed_session_decodes_to_the_same_claims() {
        let codec = TokenCodec::new(SECRET, true);
        let original = session(Duration::hours(1));

        let decoded = codec.decode(&codec.encode(&original).unwrap()).unwrap();

        assert_eq!(decoded.user_id, original.user_id);
        assert_eq!(decoded.role, Role::Teacher);
        assert!(decoded.vetted);
        assert_eq!(decoded.image, original.image);
        assert_eq!(decoded.expires_at.timestamp(), original.expires_at.timestamp());
    }

    #[test]
    fn tokens_signed_with_another_secret_are_ignored() {
        let other = TokenCodec::new("some-other-secret-that-is-long-enough", true);
        let token = other.encode(&session(Duration::hours(1))).unwrap();

        assert!(TokenCodec::new(SECRET, true).decode(&token).is_none());
    }

    #[test]
    fn expired_tokens_are_ignored() {
        let codec = TokenCodec::new(SECRET, true);
        let mut stale = session(Duration::hours(1));
        stale.issued_at -= Duration::hours(3);
        stale.expires_at = stale.issued_at + Duration::hours(1);

        assert!(codec.decode(&codec.encode(&stale).unwrap()).is_none());
    }

    #[test]
    fn garbage_is_ignored() {
        assert!(TokenCodec::new(SECRET, true).decode("not.a.jwt").is_none());
    }

    #[test]
    fn session_cookie_is_http_only_and_lives_as_long_as_the_session() {
        let codec = TokenCodec::new(SECRET, false);
        let cookie = codec.session_cookie(&session(Duration::hours(1))).unwrap();

        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(3600)));
    }
}
