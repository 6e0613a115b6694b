//! Bounded command execution.
//!
//! This module runs one shell command at a time per call:
//! - Captured standard output and standard error
//! - Wall-clock timeout with forced termination
//! - Optional cooperative cancellation
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use robot_deploy::execution::{BoundedRunner, Command, Outcome};
//!
//! let runner = BoundedRunner::new();
//! let cmd = Command::new("uname -a").timeout(Duration::from_secs(5));
//!
//! match runner.run(&cmd)? {
//!     Outcome::Success(output) => println!("{}", output),
//!     Outcome::Failure(failure) => eprintln!("{:?}: {}", failure.cause, failure),
//! }
//! # Ok::<(), robot_deploy::Error>(())
//! ```

mod command;
mod pipe;
mod result;
mod runner;

pub use command::{Command, Shell};
pub use result::{Completion, ExecutionResult, Failure, FailureCause, Outcome};
pub use runner::{
    BoundedRunner, CancelHandle, CommandRunner, DEFAULT_TIMEOUT, POLL_SLICE,
};
