//! Robot deployment built on the bounded runner.
//!
//! - Device configuration: write the operator's IP into generated scripts
//! - Robot deployment: copy scripts over `sshpass`/`scp`, restart services
//! - Log retrieval: print each service log over `ssh`
//!
//! Every step is one [`crate::execution::Command`] run through a
//! [`crate::execution::CommandRunner`], so tests can substitute a fake.

mod context;
mod deployer;
mod ssh;
mod target;

pub use context::DeploymentContext;
pub use deployer::{Deployer, Report, StepReport};
pub use ssh::{shell_escape, RemoteShell};
pub use target::{DeviceSettings, RobotTarget, Secret, REDACTED};
