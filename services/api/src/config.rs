//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub database_max_connections: u32,
    pub run_migrations: bool,
    pub log_level: Level,

    // --- Sessions ---
    pub session_secret: String,
    pub session_ttl: Duration,
    pub session_refresh_after: Duration,
    pub secure_cookies: bool,

    // --- Identity provider ---
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_redirect_url: String,

    // --- Object storage ---
    pub s3_bucket: String,
    pub s3_region: String,
    pub download_url_ttl: Duration,
    pub max_upload_bytes: usize,

    // --- Routing ---
    pub public_routes: Vec<String>,
    pub auth_routes: Vec<String>,
    pub cors_origin: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address = parse_or("BIND_ADDRESS", "0.0.0.0:3000".parse::<SocketAddr>().ok())?;
        let database_url = required("DATABASE_URL")?;
        let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", Some(5))?;
        let run_migrations = parse_or("RUN_MIGRATIONS", Some(true))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Session Settings ---
        let session_secret = required("SESSION_SECRET")?;
        if session_secret.len() < 32 {
            return Err(ConfigError::InvalidValue(
                "SESSION_SECRET".to_string(),
                "must be at least 32 characters".to_string(),
            ));
        }
        let session_ttl = Duration::from_secs(parse_or("SESSION_TTL_SECS", Some(3600))?);
        let session_refresh_after = Duration::from_secs(parse_or("SESSION_REFRESH_SECS", Some(300))?);
        let secure_cookies = parse_or("SECURE_COOKIES", Some(true))?;

        // --- Load Identity Provider Settings ---
        let google_client_id = required("GOOGLE_CLIENT_ID")?;
        let google_client_secret = required("GOOGLE_CLIENT_SECRET")?;
        let google_redirect_url = required("GOOGLE_REDIRECT_URL")?;

        // --- Load Object Storage Settings ---
        let s3_bucket = required("S3_BUCKET")?;
        let s3_region = std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let download_url_ttl = Duration::from_secs(parse_or("DOWNLOAD_URL_TTL_SECS", Some(300))?);
        let max_upload_bytes = parse_or("MAX_UPLOAD_BYTES", Some(10 * 1024 * 1024))?;

        // --- Load Routing Settings ---
        let public_routes = list_or("PUBLIC_ROUTES", &["/"]);
        let auth_routes = list_or("AUTH_ROUTES", &["/login"]);
        let cors_origin = std::env::var("CORS_ORIGIN").ok();

        Ok(Self {
            bind_address,
            database_url,
            database_max_connections,
            run_migrations,
            log_level,
            session_secret,
            session_ttl,
            session_refresh_after,
            secure_cookies,
            google_client_id,
            google_client_secret,
            google_redirect_url,
            s3_bucket,
            s3_region,
            download_url_ttl,
            max_upload_bytes,
            public_routes,
            auth_routes,
            cors_origin,
        })
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

/// Parses `name` when set, otherwise falls back to `default` (`None` means required).
fn parse_or<T>(name: &str, default: Option<T>) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => default.ok_or_else(|| ConfigError::MissingVar(name.to_string())),
    }
}

/// Reads a comma-separated list of paths.
fn list_or(name: &str, default: &[&str]) -> Vec<String> {
    match std::env::var(name) {
        Ok(raw) => parse_list(&raw),
        Err(_) => default.iter().map(|s| s.to_string()).collect(),
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_lists_are_trimmed_and_skip_blanks() {
        assert_eq!(parse_list(" /, /about ,,/help"), vec!["/", "/about", "/help"]);
        assert!(parse_list("").is_empty());
    }
}
