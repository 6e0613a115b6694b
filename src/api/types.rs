//! API request and response types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::deploy::{Report, StepReport};
use crate::execution::{FailureCause, Outcome};

/// Settings form: device address, optional robot address and password.
///
/// Also accepts the camelCase names used by the browser form.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SettingsRequest {
    #[serde(default, alias = "myIp")]
    pub my_ip: String,
    #[serde(default, alias = "robotIp")]
    pub robot_ip: String,
    #[serde(default, alias = "robotPass")]
    pub robot_pass: String,
}

/// Failure details of one step.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FailureResponse {
    /// `timeout`, `non_zero_exit`, `cancelled` or `stderr`.
    pub cause: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl From<FailureCause> for FailureResponse {
    fn from(cause: FailureCause) -> Self {
        let (cause, exit_code) = match cause {
            FailureCause::Timeout => ("timeout", None),
            FailureCause::NonZeroExit(code) => ("non_zero_exit", Some(code)),
            FailureCause::Cancelled => ("cancelled", None),
            FailureCause::Stderr => ("stderr", None),
        };
        Self { cause, exit_code }
    }
}

/// One step of a report.
#[derive(Debug, Clone, Serialize)]
pub struct StepResponse {
    pub label: String,
    pub success: bool,
    /// Output on success, diagnostics on failure.
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureResponse>,
}

impl StepResponse {
    pub fn from_step(step: &StepReport) -> Self {
        let failure = match &step.outcome {
            Outcome::Success(_) => None,
            Outcome::Failure(failure) => Some(failure.cause.into()),
        };
        Self {
            label: step.label.clone(),
            success: step.outcome.is_success(),
            output: step.outcome.text().to_string(),
            failure,
        }
    }
}

/// A full report, structured and as plain text.
#[derive(Debug, Clone, Serialize)]
pub struct ReportResponse {
    pub title: String,
    pub success: bool,
    pub skipped: usize,
    pub steps: Vec<StepResponse>,
    /// The transcript an operator would read.
    pub text: String,
}

impl ReportResponse {
    pub fn from_report(report: &Report) -> Self {
        Self {
            title: report.title.clone(),
            success: report.succeeded(),
            skipped: report.skipped,
            steps: report.steps.iter().map(StepResponse::from_step).collect(),
            text: report.to_string(),
        }
    }
}

/// Response for the settings endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SettingsResponse {
    pub success: bool,
    /// Whether a robot deployment was attempted.
    pub deployed: bool,
    pub reports: Vec<ReportResponse>,
}

/// Request to execute a command.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteCommandRequest {
    /// The command line to execute.
    pub command: String,
    /// Timeout in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ExecuteCommandRequest {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Response for command execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecuteCommandResponse {
    /// Whether execution was successful.
    pub success: bool,
    /// Output on success, diagnostics on failure.
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureResponse>,
    /// Exit code, if the command exited on its own.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Whether the command timed out.
    pub timed_out: bool,
    /// Wall-clock time of the request in milliseconds.
    pub duration_ms: u64,
}

impl ExecuteCommandResponse {
    pub fn from_outcome(outcome: &Outcome, duration: Duration) -> Self {
        let duration_ms = duration.as_millis() as u64;
        match outcome {
            Outcome::Success(output) => Self {
                success: true,
                output: output.clone(),
                failure: None,
                exit_code: Some(0),
                timed_out: false,
                duration_ms,
            },
            Outcome::Failure(failure) => Self {
                success: false,
                output: failure.diagnostics.clone(),
                failure: Some(failure.cause.into()),
                exit_code: match failure.cause {
                    FailureCause::NonZeroExit(code) => Some(code),
                    FailureCause::Stderr => Some(0),
                    _ => None,
                },
                timed_out: failure.is_timeout(),
                duration_ms,
            },
        }
    }
}

/// Generic API error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "INVALID_DEVICE_IP").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn invalid_device_ip() -> Self {
        Self::new(
            "INVALID_DEVICE_IP",
            "The IP-address for your device is empty or invalid.",
        )
    }

    pub fn invalid_robot_ip() -> Self {
        Self::new("INVALID_ROBOT_IP", "The IP-address for the robot is invalid.")
    }

    pub fn no_robot_target() -> Self {
        Self::new("NO_ROBOT_TARGET", "No robot IP and/or password set.")
    }

    pub fn unauthorized() -> Self {
        Self::new("UNAUTHORIZED", "A valid API key is required.")
    }

    pub fn execution_disabled() -> Self {
        Self::new(
            "EXECUTION_DISABLED",
            "Command execution is disabled: no API key is configured.",
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }
}
