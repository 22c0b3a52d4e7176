//! Freight Site Backend
//!
//! Content and lead backend for a freight-forwarding marketing site: public
//! news and contact-form endpoints plus an admin area, on top of a state
//! store that degrades to local data when its backend is unavailable.

mod api;
mod auth;
mod config;
mod errors;
mod fallback;
mod models;
mod remote;
mod slug;
mod store;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use fallback::PrerenderSnapshot;
use remote::{RemoteDataClient, SqliteBackend};
use store::{ContentStore, RuntimeMode};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ContentStore>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(config.log_json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!config.log_json).then(tracing_subscriber::fmt::layer))
        .init();

    tracing::info!("Starting Freight Site Backend");
    tracing::info!("Environment: {}", config.app_env.as_str());
    tracing::info!("Prerender mode: {}", config.prerender);
    tracing::info!("Bind address: {}", config.bind_addr);

    let remote = connect_backend(&config).await?;

    let snapshot = if config.prerender {
        let snapshot = PrerenderSnapshot::load(&config.snapshot_path).await?;
        tracing::info!(
            "Loaded prerender snapshot with {} articles",
            snapshot.articles.len()
        );
        Some(snapshot)
    } else {
        None
    };

    let mode = RuntimeMode {
        env: config.app_env,
        prerender: config.prerender,
    };
    let store = Arc::new(ContentStore::new(remote, mode, snapshot));

    // Held for the lifetime of the server
    let _auth_subscription = store.init_auth().await;

    let mut auth_changes = store.watch_auth();
    tokio::spawn(async move {
        while auth_changes.changed().await.is_ok() {
            let state = auth_changes.borrow_and_update().as_str();
            tracing::info!(state, "Admin auth state changed");
        }
    });

    match store.refresh_articles().await {
        Ok(source) => tracing::info!(?source, "Articles loaded"),
        Err(e) => tracing::warn!("Initial article load failed: {}", e),
    }
    if store.is_configured() {
        if let Err(e) = store.refresh_leads().await {
            tracing::warn!("Initial lead load failed: {}", e);
        }
    }

    // Create application state
    let state = AppState {
        store,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Open the SQLite backend when a database path is configured.
async fn connect_backend(
    config: &Config,
) -> Result<Option<Arc<dyn RemoteDataClient>>, Box<dyn std::error::Error>> {
    let Some(db_path) = &config.db_path else {
        tracing::warn!("No database configured (FREIGHT_DB_PATH). Running on local data only!");
        return Ok(None);
    };

    tracing::info!("Database path: {:?}", db_path);
    let pool = remote::init_database(db_path).await?;
    let backend = SqliteBackend::new(pool, Duration::from_secs(config.session_ttl_secs));

    match (&config.admin_email, &config.admin_password) {
        (Some(email), Some(password)) => {
            backend.ensure_admin(email, password).await?;
            tracing::info!("Admin account ready for {}", email);
        }
        _ => tracing::warn!(
            "FREIGHT_ADMIN_EMAIL/FREIGHT_ADMIN_PASSWORD not set; using existing admin accounts"
        ),
    }

    Ok(Some(Arc::new(backend)))
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let store = state.store.clone();

    let admin_routes = Router::new()
        .route("/leads", get(api::list_leads))
        .route("/leads/refresh", post(api::refresh_leads))
        .route("/leads/{id}/status", put(api::update_lead_status))
        .route("/leads/{id}", delete(api::delete_lead))
        .route("/articles", get(api::list_articles).post(api::create_article))
        .route("/articles/refresh", post(api::refresh_articles))
        .route(
            "/articles/{id}",
            put(api::update_article).delete(api::delete_article),
        )
        .route("/snapshot", get(api::get_snapshot).post(api::save_snapshot));

    // Routes guarded by the current session token
    let protected_routes = Router::new()
        .route("/auth/logout", post(api::logout))
        .nest("/admin", admin_routes)
        .layer(middleware::from_fn(move |req, next| {
            auth::session_auth_layer(store.clone(), req, next)
        }));

    // Public routes
    let api_routes = Router::new()
        .route("/news", get(api::list_news))
        .route("/news/{slug}", get(api::get_news))
        .route("/leads", post(api::submit_lead))
        .route("/auth/login", post(api::login))
        .route("/auth/session", get(api::session_status))
        .merge(protected_routes);

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
