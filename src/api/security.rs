//! Access control for the HTTP layer.
//!
//! Command execution needs a bearer key; with no keys configured the route
//! refuses every request. Cross-origin access is off unless origins are
//! listed explicitly.

use std::collections::HashSet;

use axum::{
    extract::{Request, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method, StatusCode,
    },
    middleware::Next,
    response::Response,
    Json,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use super::handlers::AppState;
use super::types::ErrorResponse;

const BEARER: &str = "Bearer ";

/// API keys and allowed browser origins.
#[derive(Clone, Default)]
pub struct AccessPolicy {
    api_keys: HashSet<String>,
    allowed_origins: Vec<HeaderValue>,
}

impl std::fmt::Debug for AccessPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessPolicy")
            .field("api_keys", &self.api_keys.len())
            .field("allowed_origins", &self.allowed_origins)
            .finish()
    }
}

impl AccessPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `key` as a bearer token for command execution. Empty keys
    /// are ignored.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        if !key.is_empty() {
            self.api_keys.insert(key);
        }
        self
    }

    /// Allow browser requests from `origin`, e.g. `http://10.0.0.2:8080`.
    /// Values that are not valid header values are skipped with a warning.
    pub fn with_allowed_origin(mut self, origin: &str) -> Self {
        match HeaderValue::from_str(origin) {
            Ok(value) => self.allowed_origins.push(value),
            Err(_) => warn!(origin, "ignoring invalid CORS origin"),
        }
        self
    }

    pub fn execution_enabled(&self) -> bool {
        !self.api_keys.is_empty()
    }

    /// Check an `Authorization` header value.
    pub fn authorize(&self, header: Option<&str>) -> Result<(), StatusCode> {
        if !self.execution_enabled() {
            return Err(StatusCode::FORBIDDEN);
        }
        match header.and_then(|h| h.strip_prefix(BEARER)) {
            Some(key) if self.api_keys.contains(key) => Ok(()),
            _ => Err(StatusCode::UNAUTHORIZED),
        }
    }

    /// CORS layer for the listed origins, or `None` to stay same-origin.
    pub fn cors_layer(&self) -> Option<CorsLayer> {
        if self.allowed_origins.is_empty() {
            return None;
        }
        Some(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(self.allowed_origins.clone()))
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([CONTENT_TYPE, AUTHORIZATION]),
        )
    }
}

/// Middleware guarding command execution.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match state.access.authorize(header) {
        Ok(()) => Ok(next.run(request).await),
        Err(StatusCode::FORBIDDEN) => Err((
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::execution_disabled()),
        )),
        Err(status) => {
            warn!(path = %request.uri().path(), "rejected request without valid API key");
            Err((status, Json(ErrorResponse::unauthorized())))
        }
    }
}
