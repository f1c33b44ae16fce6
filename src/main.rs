//! LinkBio Backend
//!
//! Public link-in-bio profile pages with view and click tracking, served over
//! a transactional SQLite item store.

mod api;
mod auth;
mod config;
mod db;
mod display;
mod errors;
mod keys;
mod models;
mod store;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use store::Store;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting LinkBio Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (LINKBIO_API_PSK). Write requests are unauthenticated!");
    }

    // Initialize the item store
    let pool = store::init_store(&config.db_path).await?;
    let repo = Arc::new(Repository::new(
        Store::new(pool),
        config.list_limit,
        config.txn_retries,
    ));

    let state = AppState {
        repo,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.api_psk.clone();

    let api_routes = Router::new()
        .route("/profiles", get(api::list_profiles).post(api::create_profile))
        .route("/profiles/{slug}", get(api::profile_detail))
        .route(
            "/profiles/{slug}/edit",
            get(api::profile_edit).post(api::update_profile),
        )
        .route("/profiles/{slug}/links", post(api::add_link))
        .route("/profiles/{slug}/links/{id}/delete", post(api::delete_link))
        .route("/profiles/{slug}/order", post(api::reorder_links))
        // Reads stay public; writes need the PSK when one is configured
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_write_guard(psk.clone(), req, next)
        }));

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/{slug}/link/{id}", get(api::link_redirect));

    Router::new()
        .nest("/api", api_routes)
        .merge(public_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
