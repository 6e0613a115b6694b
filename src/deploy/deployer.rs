//! Multi-step deployment sequences built on the command runner.

use std::fmt;

use tracing::{info, warn};

use super::context::DeploymentContext;
use super::ssh::{copy_template, substitute_ip, RemoteShell};
use super::target::{DeviceSettings, RobotTarget, Secret};
use crate::execution::{Command, CommandRunner, Outcome};
use crate::Result;

/// Outcome of one step in a sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// Step name shown to the operator.
    pub label: String,
    /// Runner outcome, with credentials redacted.
    pub outcome: Outcome,
}

/// A titled list of steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub title: String,
    pub steps: Vec<StepReport>,
    /// Steps that were never run because an earlier one failed.
    pub skipped: usize,
}

impl Report {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            steps: Vec::new(),
            skipped: 0,
        }
    }

    /// Check if every step ran and succeeded.
    pub fn succeeded(&self) -> bool {
        self.skipped == 0 && self.steps.iter().all(|s| s.outcome.is_success())
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        for step in &self.steps {
            write!(f, "{}", step.outcome.text())?;
        }
        if self.skipped > 0 {
            writeln!(f)?;
            writeln!(f, "Skipped {} remaining step(s).", self.skipped)?;
        }
        Ok(())
    }
}

/// Runs the configuration, deployment, and log retrieval sequences.
#[derive(Debug)]
pub struct Deployer<R> {
    runner: R,
    context: DeploymentContext,
}

impl<R: CommandRunner> Deployer<R> {
    pub fn new(runner: R, context: DeploymentContext) -> Self {
        Self { runner, context }
    }

    pub fn context(&self) -> &DeploymentContext {
        &self.context
    }

    /// Run steps in order, stopping at the first failure.
    fn run_sequence(
        &self,
        report: &mut Report,
        steps: Vec<(&str, Command)>,
        secret: &Secret,
    ) -> Result<()> {
        let total = steps.len();
        for (index, (label, command)) in steps.into_iter().enumerate() {
            let outcome = self.run_step(label, &command, secret)?;
            let failed = !outcome.is_success();
            report.steps.push(StepReport {
                label: label.to_string(),
                outcome,
            });
            if failed {
                report.skipped = total - index - 1;
                warn!(
                    step = label,
                    skipped = report.skipped,
                    "step failed, aborting sequence"
                );
                break;
            }
        }
        Ok(())
    }

    fn run_step(&self, label: &str, command: &Command, secret: &Secret) -> Result<Outcome> {
        info!(step = label, command = %command.display_name(), "running step");
        let outcome = self.runner.run(command)?;
        Ok(outcome.map_text(|text| secret.redact(text)))
    }

    /// Write the device IP into the browser socket script and the robot
    /// start script.
    pub fn configure_device(&self, settings: &DeviceSettings) -> Result<Report> {
        let ctx = &self.context;
        let ip = settings.device_ip;
        let timeout = ctx.step_timeout();

        let steps: Vec<(&str, Command)> = vec![
            (
                "copy socket template",
                copy_template(&ctx.socket_template, &ctx.socket_script, 1, 4),
            ),
            (
                "write device address into socket script",
                substitute_ip(&ctx.socket_script, &ctx.socket_placeholder, ip, 2, 4),
            ),
            (
                "copy start template",
                copy_template(&ctx.start_template, &ctx.start_script, 3, 4),
            ),
            (
                "write device address into start script",
                substitute_ip(&ctx.start_script, &ctx.start_placeholder, ip, 4, 4),
            ),
        ]
        .into_iter()
        .map(|(label, cmd)| (label, cmd.timeout(timeout)))
        .collect();

        let mut report =
            Report::new("Creating configuration files using the given machine IP...");
        self.run_sequence(&mut report, steps, &settings.robot_password)?;
        Ok(report)
    }

    /// Copy the scripts to the robot and restart its services.
    pub fn deploy_to_robot(&self, target: &RobotTarget) -> Result<Report> {
        let remote = RemoteShell::new(&self.context, target);
        let steps = vec![
            ("create remote directory", remote.make_remote_dir(1, 4)),
            ("copy files", remote.copy_files(&self.context.files, 2, 4)),
            ("stop services", remote.run_script("stop.sh", 3, 4)),
            ("start services", remote.run_script("start.sh", 4, 4)),
        ];

        let mut report =
            Report::new("Copying files to the robot using the given IP and password...");
        self.run_sequence(&mut report, steps, &target.password)?;
        Ok(report)
    }

    /// Configure, then deploy when a robot target is set and configuration
    /// succeeded.
    pub fn apply_settings(&self, settings: &DeviceSettings) -> Result<Vec<Report>> {
        let mut reports = vec![self.configure_device(settings)?];

        if let Some(target) = settings.target() {
            if reports[0].succeeded() {
                reports.push(self.deploy_to_robot(&target)?);
            } else {
                warn!("configuration failed, not deploying to robot");
            }
        }

        Ok(reports)
    }

    /// Fetch every service log. Each log is fetched on its own; one failure
    /// does not stop the rest.
    pub fn robot_logs(&self, target: &RobotTarget) -> Result<Report> {
        let remote = RemoteShell::new(&self.context, target);
        let mut report = Report::new(format!("Service logs from {}", target.ip));

        for log in &self.context.logs {
            let outcome = self.run_step(log, &remote.cat_log(log), &target.password)?;
            report.steps.push(StepReport {
                label: log.clone(),
                outcome,
            });
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{Failure, FailureCause};
    use std::sync::{Arc, Mutex};

    /// Records every command and answers from a script.
    struct FakeRunner {
        seen: Mutex<Vec<Command>>,
        fail_when: Box<dyn Fn(&Command) -> bool + Send + Sync>,
    }

    impl FakeRunner {
        fn new(fail_when: impl Fn(&Command) -> bool + Send + Sync + 'static) -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                fail_when: Box::new(fail_when),
            }
        }

        fn seen(&self) -> Vec<Command> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl CommandRunner for FakeRunner {
        fn run(&self, command: &Command) -> Result<Outcome> {
            self.seen.lock().unwrap().push(command.clone());
            if (self.fail_when)(command) {
                Ok(Outcome::Failure(Failure {
                    cause: FailureCause::NonZeroExit(5),
                    diagnostics: format!("{}\nRequest failed! (code 5)", command.command_line),
                }))
            } else {
                Ok(Outcome::Success("OK\n".to_string()))
            }
        }
    }

    fn settings(robot: bool) -> DeviceSettings {
        if robot {
            DeviceSettings::parse("10.0.0.2", "10.0.0.9", "robopass").unwrap()
        } else {
            DeviceSettings::parse("10.0.0.2", "", "").unwrap()
        }
    }

    #[test]
    fn test_configure_runs_four_steps() {
        let deployer = Deployer::new(FakeRunner::new(|_| false), DeploymentContext::default());
        let report = deployer.configure_device(&settings(false)).unwrap();

        assert!(report.succeeded());
        assert_eq!(report.steps.len(), 4);
        let seen = deployer.runner.seen();
        assert!(seen[1].command_line.contains("10.0.0.2"));
        assert!(seen[3].command_line.contains("s/unknown/10.0.0.2/"));
        assert!(seen.iter().all(|c| c.timeout == Some(deployer.context().step_timeout())));
    }

    #[test]
    fn test_sequence_stops_at_first_failure() {
        let deployer = Deployer::new(
            FakeRunner::new(|c| c.command_line.starts_with("sed")),
            DeploymentContext::default(),
        );
        let report = deployer.configure_device(&settings(false)).unwrap();

        assert!(!report.succeeded());
        assert_eq!(report.steps.len(), 2);
        assert_eq!(report.skipped, 2);
        assert_eq!(deployer.runner.seen().len(), 2);
        assert!(report.to_string().contains("Skipped 2 remaining step(s)."));
    }

    #[test]
    fn test_apply_settings_without_robot_only_configures() {
        let deployer = Deployer::new(FakeRunner::new(|_| false), DeploymentContext::default());
        let reports = deployer.apply_settings(&settings(false)).unwrap();
        assert_eq!(reports.len(), 1);
    }

    #[test]
    fn test_apply_settings_with_robot_deploys() {
        let deployer = Deployer::new(FakeRunner::new(|_| false), DeploymentContext::default());
        let reports = deployer.apply_settings(&settings(true)).unwrap();

        assert_eq!(reports.len(), 2);
        assert!(reports[1].succeeded());
        let seen = deployer.runner.seen();
        assert_eq!(seen.len(), 8);
        assert!(seen[4].command_line.contains("mkdir -p /home/nao/cbsr"));
        assert!(seen[7].command_line.contains("start.sh"));
    }

    #[test]
    fn test_apply_settings_skips_deploy_after_failed_configure() {
        let deployer = Deployer::new(
            FakeRunner::new(|c| c.command_line.starts_with("cp")),
            DeploymentContext::default(),
        );
        let reports = deployer.apply_settings(&settings(true)).unwrap();
        assert_eq!(reports.len(), 1);
        assert!(deployer
            .runner
            .seen()
            .iter()
            .all(|c| !c.command_line.contains("sshpass")));
    }

    #[test]
    fn test_robot_logs_continue_after_failure() {
        let deployer = Deployer::new(
            FakeRunner::new(|c| c.command_line.contains("event_producer")),
            DeploymentContext::default(),
        );
        let target = settings(true).target().unwrap();
        let report = deployer.robot_logs(&target).unwrap();

        assert_eq!(report.steps.len(), 5);
        assert_eq!(report.skipped, 0);
        assert!(!report.steps[1].outcome.is_success());
        assert!(report.steps[4].outcome.is_success());
    }

    #[test]
    fn test_failure_text_is_redacted() {
        let deployer = Deployer::new(
            FakeRunner::new(|c| c.command_line.contains("stop.sh")),
            DeploymentContext::default(),
        );
        let target = settings(true).target().unwrap();
        let report = deployer.deploy_to_robot(&target).unwrap();

        let text = report.to_string();
        assert!(!text.contains("robopass"));
        assert!(text.contains("***"));
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_arc_dyn_runner() {
        let runner: Arc<dyn CommandRunner> = Arc::new(FakeRunner::new(|_| false));
        let deployer = Deployer::new(runner, DeploymentContext::default());
        assert!(deployer.configure_device(&settings(false)).unwrap().succeeded());
    }
}
