//! crates/lesson_portal_core/src/access.rs
//!
//! The request gate's decision table. Given a path and the session (if any),
//! decides whether the request proceeds or is redirected elsewhere.

use crate::domain::{Role, Session};

/// How a route is treated when no session is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Reachable by anyone.
    Public,
    /// Only meaningful without a session, e.g. the login page.
    AuthOnly,
    Protected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Redirect(String),
}

/// Route classification, loaded from configuration.
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    pub public_routes: Vec<String>,
    pub auth_routes: Vec<String>,
    pub login_path: String,
    pub waiting_path: String,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self {
            public_routes: vec!["/".to_string()],
            auth_routes: vec!["/login".to_string()],
            login_path: "/login".to_string(),
            waiting_path: "/waiting-for-approval".to_string(),
        }
    }
}

impl RoutePolicy {
    pub fn classify(&self, path: &str) -> RouteClass {
        if self.auth_routes.iter().any(|r| r == path) {
            RouteClass::AuthOnly
        } else if self.public_routes.iter().any(|r| r == path) {
            RouteClass::Public
        } else {
            RouteClass::Protected
        }
    }

    /// Evaluates the gate for one request.
    ///
    /// The vetting check runs before role routing so an unvetted account never
    /// reaches role-specific content.
    pub fn evaluate(&self, path: &str, session: Option<&Session>) -> AccessDecision {
        let class = self.classify(path);

        let Some(session) = session else {
            return match class {
                RouteClass::AuthOnly | RouteClass::Public => AccessDecision::Allow,
                RouteClass::Protected => AccessDecision::Redirect(self.login_path.clone()),
            };
        };

        if class == RouteClass::AuthOnly {
            return AccessDecision::Redirect(home_for(session.role).to_string());
        }

        if !session.vetted && path != self.waiting_path {
            return AccessDecision::Redirect(self.waiting_path.clone());
        }

        match session.role {
            Role::Student if in_area(path, "/teacher") => {
                AccessDecision::Redirect(home_for(Role::Student).to_string())
            }
            Role::Teacher if in_area(path, "/student") => {
                AccessDecision::Redirect(home_for(Role::Teacher).to_string())
            }
            Role::Student | Role::Teacher | Role::Admin => AccessDecision::Allow,
        }
    }
}

/// The landing page for each role.
pub fn home_for(role: Role) -> &'static str {
    match role {
        Role::Student => "/student",
        Role::Teacher => "/teacher",
        Role::Admin => "/",
    }
}

/// True when `path` is `prefix` itself or lies beneath it.
fn in_area(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
