//! Libris HTTP service
//!
//! The entry point for the personal library catalog.
//! Handles:
//! - Authentication (bearer tokens)
//! - Rate limiting
//! - Request routing
//! - Observability (logging, metrics, tracing)

mod handlers;
mod middleware;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use libris_common::{
    auth::JwtManager,
    config::AppConfig,
    db::{DbPool, Repository},
    metrics::{self, LATENCY_BUCKETS},
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use middleware::rate_limit::{rate_limit_middleware, RateLimit};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repo: Repository,
    pub jwt: Arc<JwtManager>,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Connect the database and build the shared services
    pub async fn from_config(
        config: AppConfig,
        metrics: Option<PrometheusHandle>,
    ) -> libris_common::Result<Self> {
        let pool = DbPool::new(&config.database).await?;
        let repo = Repository::new(pool, config.media.clone());
        let jwt = Arc::new(JwtManager::new(
            &config.auth.jwt_secret,
            config.auth.jwt_expiration_secs,
        ));

        Ok(Self {
            config: Arc::new(config),
            repo,
            jwt,
            metrics,
        })
    }
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }

    info!(
        service = %config.observability.service_name,
        "Starting Libris v{}",
        libris_common::VERSION
    );

    // Initialize metrics
    let handle = if config.observability.metrics_port == 0 {
        None
    } else {
        let handle = PrometheusBuilder::new()
            .set_buckets(LATENCY_BUCKETS)?
            .install_recorder()?;
        metrics::register_metrics();
        Some(handle)
    };

    // Connect the database and build the shared state
    let state = AppState::from_config(config, handle.clone()).await?;
    let config = state.config.clone();

    if let Some(handle) = handle {
        let addr = SocketAddr::new(config.server.host.parse()?, config.observability.metrics_port);
        tokio::spawn(serve_metrics(addr, handle));
    }

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Scrape endpoint on its own port
async fn serve_metrics(addr: SocketAddr, handle: PrometheusHandle) {
    let app = Router::new().route(
        "/metrics",
        get(move || std::future::ready(handle.render())),
    );

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "Failed to bind metrics listener");
            return;
        }
    };
    info!("Metrics listening on {}", addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "Metrics listener stopped");
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    use handlers::{accounts, authors, books, groups, health, library};

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let catalog = Router::new()
        // Accounts
        .route("/accounts/register", post(accounts::register))
        .route("/profile", get(accounts::get_profile))
        .route("/profile/update", post(accounts::update_profile))
        .route("/profile/avatar", post(accounts::update_avatar))

        // Books
        .route("/books", get(books::list_books))
        .route("/book/add", get(books::new_book).post(books::create_book))
        .route("/book/{id}", get(books::get_book))
        .route("/book/update/{id}", get(books::edit_book).post(books::update_book))
        .route("/book/delete/{id}", post(books::delete_book))
        .route("/book/{id}/cover", post(books::update_cover))
        .route("/book/{id}/rate", post(books::rate_book))
        .route("/book/{id}/status/update", post(books::update_status))
        .route("/book/{id}/price/update", post(books::update_price))

        // Authors
        .route("/authors", get(authors::list_authors))
        .route("/author/add", get(authors::new_author).post(authors::create_author))
        .route("/author/{id}", get(authors::get_author))
        .route("/author/update/{id}", get(authors::edit_author).post(authors::update_author))
        .route("/author/delete/{id}", post(authors::delete_author))
        .route("/author/{id}/headshot", post(authors::update_headshot))

        // Publishers
        .route("/publishers", get(groups::list_publishers))
        .route("/publisher/add", get(groups::new_publisher).post(groups::create_publisher))
        .route("/publisher/{id}", get(groups::get_publisher))
        .route("/publisher/update/{id}", get(groups::edit_publisher).post(groups::update_publisher))
        .route("/publisher/delete/{id}", post(groups::delete_publisher))

        // Genres
        .route("/genres", get(groups::list_genres))
        .route("/genre/add", get(groups::new_genre).post(groups::create_genre))
        .route("/genre/{id}", get(groups::get_genre))
        .route("/genre/update/{id}", get(groups::edit_genre).post(groups::update_genre))
        .route("/genre/delete/{id}", post(groups::delete_genre))

        // Collections
        .route("/collections", get(groups::list_collections))
        .route("/collection/add", get(groups::new_collection).post(groups::create_collection))
        .route("/collection/{id}", get(groups::get_collection))
        .route("/collection/update/{id}", get(groups::edit_collection).post(groups::update_collection))
        .route("/collection/delete/{id}", post(groups::delete_collection))
        .route("/collection/{id}/books", get(groups::collection_books).post(groups::set_collection_books))

        // Sections
        .route("/sections", get(groups::list_sections))
        .route("/section/add", get(groups::new_section).post(groups::create_section))
        .route("/section/{id}", get(groups::get_section))
        .route("/section/update/{id}", get(groups::edit_section).post(groups::update_section))
        .route("/section/delete/{id}", post(groups::delete_section))
        .route("/section/{id}/books", get(groups::section_books).post(groups::set_section_books))

        // Library views
        .route("/library/{view}", get(library::library));

    let catalog = if state.config.rate_limit.enabled {
        let limit = RateLimit::from_config(&state.config.rate_limit);
        catalog.layer(axum::middleware::from_fn_with_state(limit, rate_limit_middleware))
    } else {
        catalog
    };

    // Health endpoints (no auth, no rate limit)
    let probes = Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/metrics", get(health::metrics));

    // Compose the app
    Router::new()
        .merge(catalog)
        .merge(probes)
        .layer(DefaultBodyLimit::max(state.config.server.body_limit_bytes))
        .layer(axum::middleware::from_fn(middleware::metrics::track_requests))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.request_timeout(),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use crate::handlers::test_support::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };

    #[tokio::test]
    async fn test_request_id_is_propagated() {
        let app = TestApp::new().await;
        let response = app
            .send(Request::get("/health").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = TestApp::new().await;
        let token = app.token("alice").await;
        let response = app.get("/nowhere", &token).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_wrong_method_is_405() {
        let app = TestApp::new().await;
        let token = app.token("alice").await;
        let response = app.get("/book/delete/00000000-0000-0000-0000-000000000000", &token).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
