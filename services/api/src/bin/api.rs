//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, GoogleIdentityProvider, S3BlobStore},
    config::Config,
    error::ApiError,
    web::{router, state::AppState, ApiDoc},
};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use axum::{
    extract::DefaultBodyLimit,
    http::{header::{ACCEPT, CONTENT_TYPE}, HeaderValue, Method},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Database (connects lazily on first use) ---
    let db_adapter = Arc::new(DbAdapter::new(
        config.database_url.clone(),
        config.database_max_connections,
    ));
    if config.run_migrations {
        info!("Running database migrations...");
        db_adapter.run_migrations().await?;
        info!("Database migrations complete.");
    }

    // --- 3. Initialize Service Adapters ---
    let aws_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.s3_region.clone()))
        .load()
        .await;
    let blob_store = Arc::new(S3BlobStore::new(
        aws_sdk_s3::Client::new(&aws_config),
        config.s3_bucket.clone(),
    ));

    let identity = Arc::new(GoogleIdentityProvider::new(
        &config.google_client_id,
        &config.google_client_secret,
        &config.google_redirect_url,
    )?);

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(&config, db_adapter, blob_store, identity));

    // --- 5. Create the Web Router ---
    let mut app = router(app_state).layer(DefaultBodyLimit::max(config.max_upload_bytes));

    if let Some(origin) = &config.cors_origin {
        let origin = origin
            .parse::<HeaderValue>()
            .map_err(|e| ApiError::Internal(format!("Invalid CORS_ORIGIN '{}': {}", origin, e)))?;
        let cors = CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE, ACCEPT]);
        app = app.layer(cors);
    }

    // Merge the app with the Swagger UI router.
    let app = Router::new()
        .merge(app)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
