//! HTTP API server for primes-api.
//!
//! Exposes the dispatcher over HTTP. Every `GET /api/primes/{n}` gets its own
//! isolated compute unit; the request task only awaits the outcome.
//!
//! # Example
//!
//! ```bash
//! # Start the server
//! primes-api serve --port 3000
//!
//! # Compute primes
//! curl http://localhost:3000/api/primes/1000000
//!
//! # View API documentation
//! open "http://localhost:3000/docs"
//! ```

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use axum::{Router, http::HeaderValue, routing::get};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::dispatcher::{Dispatcher, DispatcherConfig};
use crate::error::Result;
use crate::worker::Isolation;

/// Shared application state.
pub struct AppState {
    /// Dispatcher that spawns one compute unit per request.
    pub dispatcher: Dispatcher,
    /// Isolation mode backing the dispatcher.
    pub isolation: Isolation,
}

impl AppState {
    pub fn new(dispatcher: Dispatcher, isolation: Isolation) -> Self {
        Self {
            dispatcher,
            isolation,
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Compute unit isolation mode.
    pub isolation: Isolation,
    /// Advisory worker capacity reported to operators.
    pub worker_capacity: usize,
    /// Enable CORS for all origins.
    pub cors: bool,
    /// Specific CORS origins (if cors is true but we want to restrict).
    pub cors_origins: Option<Vec<String>>,
}

/// Constructs the HTTP router.
///
/// The returned router includes:
/// - `GET /api/primes/{n}` and `GET /api/health`,
/// - OpenAPI UI at `/docs` and raw spec at `/openapi.json`,
/// - request-id and tracing middleware, and
/// - the optional CORS layer.
pub fn build_router(state: Arc<AppState>, cors: Option<CorsLayer>) -> Router {
    let api_routes = Router::new()
        .route("/primes/{n}", get(handlers::get_primes))
        .route("/health", get(handlers::health_check));

    let mut app = Router::new()
        .nest("/api", api_routes)
        .merge(Scalar::with_url("/docs", openapi::ApiDoc::openapi()))
        .route(
            "/openapi.json",
            get(|| async { axum::Json(openapi::ApiDoc::openapi()) }),
        )
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .with_state(state);

    if let Some(cors_layer) = cors {
        app = app.layer(cors_layer);
    }

    app
}

/// Build the CORS layer described by `config`, if any.
fn cors_layer(config: &ServerConfig) -> Option<CorsLayer> {
    let base = || {
        CorsLayer::new()
            .allow_methods(Any)
            .allow_headers(Any)
            .max_age(Duration::from_secs(3600))
    };

    if let Some(ref origins) = config.cors_origins {
        let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        if origins.is_empty() {
            tracing::warn!("No valid CORS origins given, CORS disabled");
            return None;
        }
        Some(base().allow_origin(origins))
    } else if config.cors {
        Some(base().allow_origin(Any))
    } else {
        None
    }
}

/// Start and run the HTTP API server.
///
/// Builds the dispatcher for the configured isolation mode, binds to the
/// configured host and port, and shuts down gracefully on Ctrl+C.
///
/// # Examples
///
/// ```no_run
/// use primes_api::server::{ServerConfig, run_server};
/// use primes_api::worker::Isolation;
///
/// #[tokio::main]
/// async fn main() {
///     let config = ServerConfig {
///         host: "127.0.0.1".into(),
///         port: 3000,
///         isolation: Isolation::Process,
///         worker_capacity: 4,
///         cors: false,
///         cors_origins: None,
///     };
///     let _ = run_server(config).await;
/// }
/// ```
pub async fn run_server(config: ServerConfig) -> Result<()> {
    let dispatcher = Dispatcher::new(
        config.isolation.spawner()?,
        DispatcherConfig {
            worker_capacity: config.worker_capacity,
        },
    );
    let state = Arc::new(AppState::new(dispatcher, config.isolation));
    let app = build_router(state, cors_layer(&config));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        %addr,
        isolation = %config.isolation,
        worker_capacity = config.worker_capacity,
        "Server running on http://{}",
        addr
    );
    tracing::info!(
        "Worker capacity: {} (advisory, compute units are spawned per request)",
        config.worker_capacity
    );
    tracing::info!("Try: curl http://{}/api/primes/1000000", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");

    Ok(())
}

/// Await a CTRL+C (SIGINT) to trigger graceful shutdown.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for CTRL+C, shutting down");
    }
}
