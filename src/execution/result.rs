//! Execution result types.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// How the polling loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The child was observed exited with this code.
    ///
    /// On Unix a child killed by signal `n` reports `128 + n`.
    Exited(i32),
    /// The budget ran out before the child was observed exited.
    TimedOut,
    /// The invocation was cancelled before the child was observed exited.
    Cancelled,
}

/// Why an invocation is reported as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    /// The command exceeded its timeout.
    Timeout,
    /// The command ran to completion with a non-zero status.
    NonZeroExit(i32),
    /// The invocation was cancelled by the caller.
    Cancelled,
    /// The command exited with status 0 but wrote to standard error.
    Stderr,
}

impl FailureCause {
    /// Reason line appended to the diagnostics, if this cause has one.
    pub fn reason(&self) -> Option<String> {
        match self {
            Self::Timeout => Some("Request timed out!".to_string()),
            Self::NonZeroExit(code) => Some(format!("Request failed! (code {})", code)),
            Self::Cancelled => Some("Request cancelled!".to_string()),
            Self::Stderr => None,
        }
    }
}

/// A failed invocation: the cause plus the text shown to the operator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{diagnostics}")]
pub struct Failure {
    /// Structured cause.
    pub cause: FailureCause,
    /// Captured standard error followed by the reason line.
    pub diagnostics: String,
}

impl Failure {
    /// Whether the failure was a timeout.
    pub fn is_timeout(&self) -> bool {
        self.cause == FailureCause::Timeout
    }

    /// Exit code, for non-zero exits.
    pub fn exit_code(&self) -> Option<i32> {
        match self.cause {
            FailureCause::NonZeroExit(code) => Some(code),
            _ => None,
        }
    }
}

/// Outcome of one runner invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Clean, in-time exit with status 0 and nothing on standard error.
    Success(String),
    /// Anything else.
    Failure(Failure),
}

impl Outcome {
    /// Check if the invocation succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The output on success, the diagnostics otherwise.
    pub fn text(&self) -> &str {
        match self {
            Self::Success(output) => output,
            Self::Failure(failure) => &failure.diagnostics,
        }
    }

    /// Convert into a standard `Result`.
    pub fn into_result(self) -> std::result::Result<String, Failure> {
        match self {
            Self::Success(output) => Ok(output),
            Self::Failure(failure) => Err(failure),
        }
    }

    /// Rewrite the displayed text, keeping the kind and cause.
    pub fn map_text(self, f: impl Fn(&str) -> String) -> Self {
        match self {
            Self::Success(output) => Self::Success(f(&output)),
            Self::Failure(failure) => Self::Failure(Failure {
                cause: failure.cause,
                diagnostics: f(&failure.diagnostics),
            }),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Everything captured during one invocation.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Process ID of the child.
    pub pid: u32,
    /// Captured standard output, kept even when the outcome is a failure.
    pub stdout: Vec<u8>,
    /// Captured standard error.
    pub stderr: Vec<u8>,
    /// How the polling loop ended.
    pub completion: Completion,
    /// Wall-clock time from spawn to reaping.
    pub duration: Duration,
}

impl ExecutionResult {
    /// Check if the child was observed exiting with status 0.
    pub fn exited_cleanly(&self) -> bool {
        self.completion == Completion::Exited(0)
    }

    /// Check if the loop ran out of budget.
    pub fn timed_out(&self) -> bool {
        self.completion == Completion::TimedOut
    }

    /// Exit code, if the child was observed exiting.
    pub fn exit_code(&self) -> Option<i32> {
        match self.completion {
            Completion::Exited(code) => Some(code),
            _ => None,
        }
    }

    /// Standard output decoded lossily.
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Standard error decoded lossily.
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Collapse into an [`Outcome`].
    ///
    /// Diagnostics win over output: whenever standard error is non-empty or
    /// the command did not exit cleanly, the standard output is left out.
    pub fn outcome(&self) -> Outcome {
        let cause = match self.completion {
            Completion::TimedOut => Some(FailureCause::Timeout),
            Completion::Cancelled => Some(FailureCause::Cancelled),
            Completion::Exited(0) => None,
            Completion::Exited(code) => Some(FailureCause::NonZeroExit(code)),
        };

        let mut diagnostics = self.stderr_text();
        if let Some(reason) = cause.as_ref().and_then(FailureCause::reason) {
            diagnostics.push('\n');
            diagnostics.push_str(&reason);
        }

        if diagnostics.is_empty() {
            Outcome::Success(self.stdout_text())
        } else {
            Outcome::Failure(Failure {
                cause: cause.unwrap_or(FailureCause::Stderr),
                diagnostics,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(stdout: &str, stderr: &str, completion: Completion) -> ExecutionResult {
        ExecutionResult {
            pid: 1,
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
            completion,
            duration: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_clean_exit_returns_stdout() {
        let outcome = result("hello\n", "", Completion::Exited(0)).outcome();
        assert_eq!(outcome, Outcome::Success("hello\n".to_string()));
    }

    #[test]
    fn test_clean_exit_without_output_is_empty_success() {
        let outcome = result("", "", Completion::Exited(0)).outcome();
        assert_eq!(outcome.into_result().unwrap(), "");
    }

    #[test]
    fn test_non_zero_exit_discards_stdout() {
        let outcome = result("partial", "boom", Completion::Exited(3)).outcome();
        let failure = outcome.into_result().unwrap_err();
        assert_eq!(failure.cause, FailureCause::NonZeroExit(3));
        assert_eq!(failure.exit_code(), Some(3));
        assert_eq!(failure.diagnostics, "boom\nRequest failed! (code 3)");
        assert!(!failure.diagnostics.contains("partial"));
    }

    #[test]
    fn test_timeout_reason_appended_after_newline() {
        let failure = result("tick\ntick\n", "", Completion::TimedOut)
            .outcome()
            .into_result()
            .unwrap_err();
        assert!(failure.is_timeout());
        assert_eq!(failure.diagnostics, "\nRequest timed out!");
    }

    #[test]
    fn test_cancelled_reason() {
        let failure = result("", "", Completion::Cancelled)
            .outcome()
            .into_result()
            .unwrap_err();
        assert_eq!(failure.cause, FailureCause::Cancelled);
        assert!(failure.to_string().contains("cancelled"));
    }

    #[test]
    fn test_stderr_on_clean_exit_is_failure() {
        let failure = result("out", "warning: something", Completion::Exited(0))
            .outcome()
            .into_result()
            .unwrap_err();
        assert_eq!(failure.cause, FailureCause::Stderr);
        assert_eq!(failure.diagnostics, "warning: something");
    }

    #[test]
    fn test_execution_result_accessors() {
        let res = result("x", "", Completion::Exited(0));
        assert!(res.exited_cleanly());
        assert!(!res.timed_out());
        assert_eq!(res.exit_code(), Some(0));

        let res = result("x", "", Completion::TimedOut);
        assert!(res.timed_out());
        assert_eq!(res.exit_code(), None);
    }

    #[test]
    fn test_map_text_keeps_cause() {
        let outcome = Outcome::Failure(Failure {
            cause: FailureCause::NonZeroExit(5),
            diagnostics: "secret failed".to_string(),
        })
        .map_text(|t| t.replace("secret", "***"));
        match outcome {
            Outcome::Failure(f) => {
                assert_eq!(f.cause, FailureCause::NonZeroExit(5));
                assert_eq!(f.diagnostics, "*** failed");
            }
            Outcome::Success(_) => panic!("expected failure"),
        }
    }
}
