//! REST API handlers.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use axum::{extract::State, http::StatusCode, Json};
use tracing::{info, warn};

use super::security::AccessPolicy;
use super::types::{
    ErrorResponse, ExecuteCommandRequest, ExecuteCommandResponse, ReportResponse,
    SettingsRequest, SettingsResponse,
};
use crate::deploy::{Deployer, DeploymentContext, DeviceSettings, RobotTarget};
use crate::error::Error;
use crate::execution::{BoundedRunner, Command, CommandRunner, DEFAULT_TIMEOUT};

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<dyn CommandRunner>,
    pub deployer: Arc<Deployer<Arc<dyn CommandRunner>>>,
    /// Settings from the last accepted form.
    pub settings: Arc<RwLock<Option<DeviceSettings>>>,
    /// Timeout for ad-hoc commands that do not set their own.
    pub default_timeout: Duration,
    /// API keys and CORS origins.
    pub access: Arc<AccessPolicy>,
}

impl AppState {
    pub fn new(runner: Arc<dyn CommandRunner>, context: DeploymentContext) -> Self {
        let deployer = Arc::new(Deployer::new(Arc::clone(&runner), context));
        Self {
            runner,
            deployer,
            settings: Arc::new(RwLock::new(None)),
            default_timeout: DEFAULT_TIMEOUT,
            access: Arc::new(AccessPolicy::new()),
        }
    }

    pub fn with_access(mut self, access: AccessPolicy) -> Self {
        self.access = Arc::new(access);
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    fn store_settings(&self, settings: DeviceSettings) -> crate::Result<()> {
        let mut slot = self.settings.write().map_err(|_| Error::LockPoisoned)?;
        *slot = Some(settings);
        Ok(())
    }

    /// The robot from the stored settings, if complete.
    pub fn robot_target(&self) -> crate::Result<Option<RobotTarget>> {
        let slot = self.settings.read().map_err(|_| Error::LockPoisoned)?;
        Ok(slot.as_ref().and_then(DeviceSettings::target))
    }

    /// Like [`robot_target`](Self::robot_target), but a missing target is an
    /// error.
    pub fn require_target(&self) -> crate::Result<RobotTarget> {
        self.robot_target()?.ok_or(Error::MissingTarget)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Arc::new(BoundedRunner::new()), DeploymentContext::default())
    }
}

fn internal(err: impl ToString) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::internal_error(err.to_string())),
    )
}

/// Run blocking runner work off the async executor.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> crate::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| internal(Error::TaskJoin(e.to_string())))?
        .map_err(internal)
}

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}

/// API information endpoint.
pub async fn api_info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "robot-deploy",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// Accept the settings form, configure this device, and deploy to the
/// robot when one is given.
pub async fn apply_settings(
    State(state): State<AppState>,
    Json(req): Json<SettingsRequest>,
) -> Result<Json<SettingsResponse>, ApiError> {
    let settings = DeviceSettings::parse(&req.my_ip, &req.robot_ip, &req.robot_pass).map_err(
        |e| {
            let body = match e {
                Error::InvalidAddress { field: "robot", .. } => ErrorResponse::invalid_robot_ip(),
                _ => ErrorResponse::invalid_device_ip(),
            };
            warn!(error = %e, "rejected settings");
            (StatusCode::UNPROCESSABLE_ENTITY, Json(body))
        },
    )?;

    state.store_settings(settings.clone()).map_err(internal)?;
    info!(device = %settings.device_ip, robot = ?settings.robot_ip, "settings stored");

    let deployer = Arc::clone(&state.deployer);
    let reports = blocking(move || deployer.apply_settings(&settings)).await?;

    Ok(Json(SettingsResponse {
        success: reports.iter().all(|r| r.succeeded()),
        deployed: reports.len() > 1,
        reports: reports.iter().map(ReportResponse::from_report).collect(),
    }))
}

/// Print the service logs of the stored robot.
pub async fn robot_logs(State(state): State<AppState>) -> Result<Json<ReportResponse>, ApiError> {
    let target = state.require_target().map_err(|e| match e {
        Error::MissingTarget => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::no_robot_target()),
        ),
        other => internal(other),
    })?;

    let deployer = Arc::clone(&state.deployer);
    let report = blocking(move || deployer.robot_logs(&target)).await?;
    Ok(Json(ReportResponse::from_report(&report)))
}

/// Execute one command line through the bounded runner. Guarded by
/// [`super::security::require_api_key`].
pub async fn execute_oneshot(
    State(state): State<AppState>,
    Json(req): Json<ExecuteCommandRequest>,
) -> Result<Json<ExecuteCommandResponse>, ApiError> {
    if req.command.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request("command must not be empty")),
        ));
    }
    if req.timeout_secs == Some(0) {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::bad_request("timeout_secs must be positive")),
        ));
    }

    let cmd = Command::new(&req.command).timeout(req.timeout().unwrap_or(state.default_timeout));
    let runner = Arc::clone(&state.runner);
    let started = Instant::now();
    let outcome = blocking(move || runner.run(&cmd)).await?;

    Ok(Json(ExecuteCommandResponse::from_outcome(
        &outcome,
        started.elapsed(),
    )))
}
