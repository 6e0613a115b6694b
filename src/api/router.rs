//! API router configuration.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers::{api_info, apply_settings, execute_oneshot, health, robot_logs, AppState};
use super::security::require_api_key;
use crate::error::Error;

/// Create the API router with all routes configured.
pub fn create_router() -> Router {
    create_router_with_state(AppState::default())
}

/// Create the API router with custom state.
///
/// Same-origin only unless the state's [`super::AccessPolicy`] lists
/// origins.
pub fn create_router_with_state(state: AppState) -> Router {
    let execute = Router::new()
        .route("/execute", post(execute_oneshot))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let api_v1 = Router::new().route("/", get(api_info)).merge(execute);

    let router = Router::new()
        .route("/health", get(health))
        .route("/settings", post(apply_settings))
        .route("/robot-logs", get(robot_logs))
        .nest("/api/v1", api_v1)
        .layer(TraceLayer::new_for_http());

    let router = match state.access.cors_layer() {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.with_state(state)
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Stop accepting connections on Ctrl-C and drain in-flight requests.
    pub graceful_shutdown: bool,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            graceful_shutdown: true,
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("127.0.0.1", 3000)
    }
}

/// Start the API server.
pub async fn serve(config: ServerConfig) -> crate::Result<()> {
    serve_with_state(config, AppState::default()).await
}

/// Start the API server with custom state.
pub async fn serve_with_state(config: ServerConfig, state: AppState) -> crate::Result<()> {
    let addr = config.bind_address();
    let router = create_router_with_state(state);

    tracing::info!("Starting robot-deploy server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let server = axum::serve(listener, router);
    let result = if config.graceful_shutdown {
        server.with_graceful_shutdown(shutdown_signal()).await
    } else {
        server.await
    };
    result.map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
