//! services/api/src/adapters/oauth.rs
//!
//! Google sign-in. Implements the `IdentityProvider` port with the OAuth 2.0
//! authorization code flow (PKCE), then reads the account's profile from the
//! OpenID Connect userinfo endpoint.

use async_trait::async_trait;
use lesson_portal_core::domain::ExternalIdentity;
use lesson_portal_core::ports::{AuthorizationRequest, IdentityProvider, PortError, PortResult};
use oauth2::basic::BasicClient;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use tracing::warn;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

const SCOPES: &[&str] = &["openid", "email", "profile"];

/// The subset of the userinfo document we read.
#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
    picture: Option<String>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct GoogleIdentityProvider {
    client_id: ClientId,
    client_secret: ClientSecret,
    auth_url: AuthUrl,
    token_url: TokenUrl,
    redirect_url: RedirectUrl,
    http: reqwest::Client,
}

impl GoogleIdentityProvider {
    /// Creates the provider, validating the configured redirect URL.
    pub fn new(client_id: &str, client_secret: &str, redirect_url: &str) -> PortResult<Self> {
        let invalid = |what: &str, e: oauth2::url::ParseError| {
            PortError::Validation(format!("invalid {} URL: {}", what, e))
        };
        let redirect_url =
            RedirectUrl::new(redirect_url.to_string()).map_err(|e| invalid("redirect", e))?;
        let auth_url = AuthUrl::new(GOOGLE_AUTH_URL.to_string()).map_err(|e| invalid("auth", e))?;
        let token_url =
            TokenUrl::new(GOOGLE_TOKEN_URL.to_string()).map_err(|e| invalid("token", e))?;

        // The token endpoint must never be followed through a redirect.
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| PortError::Unexpected(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            client_id: ClientId::new(client_id.to_string()),
            client_secret: ClientSecret::new(client_secret.to_string()),
            auth_url,
            token_url,
            redirect_url,
            http,
        })
    }

    async fn fetch_user_info(&self, access_token: &str) -> PortResult<GoogleUserInfo> {
        let response = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| PortError::Unavailable(format!("userinfo request failed: {}", e)))?;

        if !response.status().is_success() {
            warn!("Userinfo endpoint answered {}", response.status());
            return Err(PortError::Unauthorized);
        }

        response
            .json::<GoogleUserInfo>()
            .await
            .map_err(|e| PortError::Unexpected(format!("malformed userinfo: {}", e)))
    }
}

//=========================================================================================
// `IdentityProvider` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityProvider for GoogleIdentityProvider {
    fn authorization_request(&self) -> PortResult<AuthorizationRequest> {
        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_auth_uri(self.auth_url.clone())
            .set_redirect_uri(self.redirect_url.clone());

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let mut request = client
            .authorize_url(CsrfToken::new_random)
            .set_pkce_challenge(pkce_challenge);
        for scope in SCOPES {
            request = request.add_scope(Scope::new((*scope).to_string()));
        }
        let (url, csrf_token) = request.url();

        Ok(AuthorizationRequest {
            url: url.to_string(),
            csrf_token: csrf_token.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
        })
    }

    async fn exchange_code(&self, code: &str, pkce_verifier: &str) -> PortResult<ExternalIdentity> {
        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_token_uri(self.token_url.clone())
            .set_redirect_uri(self.redirect_url.clone());

        let token = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .set_pkce_verifier(PkceCodeVerifier::new(pkce_verifier.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| {
                warn!("Token exchange failed: {}", e);
                PortError::Unauthorized
            })?;

        let info = self.fetch_user_info(token.access_token().secret()).await?;

        let email = match info.email {
            Some(email) if info.email_verified && !email.trim().is_empty() => email,
            _ => {
                warn!(sub = %info.sub, "Rejecting identity without a verified email");
                return Err(PortError::Unauthorized);
            }
        };

        Ok(ExternalIdentity {
            name: info.name.unwrap_or_else(|| email.clone()),
            email,
            picture_url: info.picture,
            provider_account_id: info.sub,
        })
    }
}
