//! Error types for robot-deploy.

use thiserror::Error;

/// Main error type for robot-deploy operations.
///
/// Timeouts and non-zero exits are not errors: the runner reports them as
/// [`crate::execution::Outcome::Failure`] values. Only conditions that stop
/// an invocation from producing an outcome at all end up here.
#[derive(Error, Debug)]
pub enum Error {
    /// The command could not be started.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error from the host process facility.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An address supplied by the operator is not a valid IP address.
    #[error("invalid {field} address: '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    /// No robot address and password have been configured yet.
    #[error("no robot IP and/or password set")]
    MissingTarget,

    /// Internal lock was poisoned.
    #[error("internal lock poisoned")]
    LockPoisoned,

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// A blocking task could not be joined.
    #[error("blocking task failed: {0}")]
    TaskJoin(String),
}

/// Convenience Result type for robot-deploy operations.
pub type Result<T> = std::result::Result<T, Error>;
