//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, GeminiCompletionAdapter, InMemoryChatLogStore, JsonListingSource},
    config::Config,
    error::ApiError,
    web::{get_listing_handler, list_listings_handler, rest::ApiDoc, state::AppState, ws_handler},
};
use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::get,
    Router,
};
use listing_assistant_core::{
    ports::{ChatLogStore, ListingSource},
    CompletionClient, ConversationController, ListingCatalog,
};
use sqlx::postgres::PgPoolOptions;
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

    // --- 2. Chat-Log Storage ---
    let chat_logs: Arc<dyn ChatLogStore> = match &config.database_url {
        Some(database_url) => {
            info!("Connecting to database...");
            let db_pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            let db_adapter = DbAdapter::new(db_pool);
            info!("Running database migrations...");
            db_adapter.run_migrations().await?;
            info!("Database migrations complete.");
            Arc::new(db_adapter)
        }
        None => {
            info!("DATABASE_URL not set; chat logs are kept in memory.");
            Arc::new(InMemoryChatLogStore::new())
        }
    };

    // --- 3. Load the Listing Catalog ---
    let listings = JsonListingSource::new(config.listings_path.clone())
        .load_listings()
        .await?;
    let catalog = Arc::new(ListingCatalog::new(listings));
    info!(
        "Catalog ready with {} listing(s) across {} cities.",
        catalog.len(),
        catalog.cities().len()
    );

    // --- 4. Initialize the Completion Client and Controller ---
    let completion_adapter = Arc::new(GeminiCompletionAdapter::from_key(
        &config.gemini_api_key,
        &config.completion_api_base,
        config.completion_model.clone(),
    ));
    let completion = CompletionClient::new(completion_adapter, config.retry_policy);
    let controller = Arc::new(ConversationController::new(completion, catalog.clone()));

    // --- 5. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        catalog,
        chat_logs,
        controller,
    });

    let allowed_origin = config
        .allowed_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid ALLOWED_ORIGIN: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    // --- 6. Create the Web Router ---
    let api_router = Router::new()
        .route("/listings", get(list_listings_handler))
        .route("/listings/{id}", get(get_listing_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
