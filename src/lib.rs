//! # robot-deploy
//!
//! Configure an operator's device and deploy service scripts to a robot,
//! driving local tools (`cp`, `sed`) and remote ones (`sshpass`, `ssh`,
//! `scp`) through a bounded process runner.
//!
//! ## Features
//!
//! - **Bounded runner**: every external command runs under a wall-clock
//!   timeout, with stdout and stderr captured and the child always reaped
//! - **Structured outcomes**: success text, or a failure whose cause is a
//!   timeout, a non-zero exit, a cancellation, or unexpected stderr
//! - **Deployment**: configure, deploy, and log retrieval sequences
//! - **HTTP API**: axum endpoints for the settings form and logs
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use robot_deploy::{BoundedRunner, Command, Outcome};
//!
//! fn main() -> robot_deploy::Result<()> {
//!     robot_deploy::logging::try_init().ok();
//!
//!     let runner = BoundedRunner::new();
//!     let cmd = Command::new("uname -a").timeout(Duration::from_secs(5));
//!
//!     match runner.run(&cmd)? {
//!         Outcome::Success(text) => print!("{}", text),
//!         Outcome::Failure(failure) => eprintln!("{}", failure),
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod deploy;
pub mod error;
pub mod execution;
pub mod logging;

// Re-export commonly used types
pub use error::{Error, Result};
pub use execution::{
    BoundedRunner, CancelHandle, Command, CommandRunner, ExecutionResult, Failure, FailureCause,
    Outcome,
};
