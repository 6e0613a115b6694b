//! HTTP layer for robot-deploy.
//!
//! ## Endpoints
//!
//! ### Health & Info
//! - `GET /health` - Health check
//! - `GET /api/v1/` - API information
//!
//! ### Deployment
//! - `POST /settings` - Store device/robot settings, configure, deploy
//! - `GET /robot-logs` - Print the robot's service logs
//!
//! ### One-shot Execution
//! - `POST /api/v1/execute` - Run a command line through the bounded runner
//!   (requires `Authorization: Bearer <key>`; disabled without keys)
//!
//! No CORS headers are sent unless origins are configured.
//!
//! ## Example
//!
//! ```no_run
//! use robot_deploy::api::{serve, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> robot_deploy::Result<()> {
//!     let config = ServerConfig::new("127.0.0.1", 3000);
//!     serve(config).await
//! }
//! ```

pub mod handlers;
pub mod router;
pub mod security;
pub mod types;

pub use handlers::AppState;
pub use router::{create_router, create_router_with_state, serve, serve_with_state, ServerConfig};
pub use security::AccessPolicy;
pub use types::{
    ErrorResponse, ExecuteCommandRequest, ExecuteCommandResponse, FailureResponse,
    ReportResponse, SettingsRequest, SettingsResponse, StepResponse,
};
