//! Shell command lines for local file edits and `sshpass`-driven ssh/scp.

use std::net::IpAddr;
use std::path::Path;

use super::context::DeploymentContext;
use super::target::{RobotTarget, REDACTED};
use crate::execution::Command;

/// Quote a single shell word.
pub fn shell_escape(arg: &str) -> String {
    if arg.is_empty() {
        return "''".to_string();
    }
    let escaped = arg.replace('\'', "'\\''");
    format!("'{}'", escaped)
}

/// Escape a literal for use as a `sed` search pattern delimited by `/`.
fn sed_pattern(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '\\' | '/' | '.' | '*' | '[' | ']' | '^' | '$') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn path_arg(path: &Path) -> String {
    shell_escape(&path.to_string_lossy())
}

/// Append the `OK (n/total)` marker printed when a step succeeds.
fn with_marker(command_line: String, step: usize, total: usize) -> String {
    format!("{} && echo \"OK ({}/{})\"", command_line, step, total)
}

/// `cp -f template target`, followed by the step marker.
pub fn copy_template(template: &Path, target: &Path, step: usize, total: usize) -> Command {
    Command::new(with_marker(
        format!("cp -f {} {}", path_arg(template), path_arg(target)),
        step,
        total,
    ))
}

/// In-place replacement of the first `placeholder` on each line with `ip`.
pub fn substitute_ip(
    file: &Path,
    placeholder: &str,
    ip: IpAddr,
    step: usize,
    total: usize,
) -> Command {
    let script = format!("s/{}/{}/", sed_pattern(placeholder), ip);
    Command::new(with_marker(
        format!("sed -i {} {}", shell_escape(&script), path_arg(file)),
        step,
        total,
    ))
}

/// Builds ssh and scp invocations against one robot.
#[derive(Debug)]
pub struct RemoteShell<'a> {
    context: &'a DeploymentContext,
    target: &'a RobotTarget,
}

impl<'a> RemoteShell<'a> {
    pub fn new(context: &'a DeploymentContext, target: &'a RobotTarget) -> Self {
        Self { context, target }
    }

    fn options(&self) -> String {
        self.context
            .ssh_options
            .iter()
            .map(|opt| format!("-o {}", shell_escape(opt)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn login(&self) -> String {
        format!("{}@{}", self.context.robot_user, self.target.ip)
    }

    /// `user@host:dir/` with IPv6 hosts bracketed, as scp requires.
    fn scp_destination(&self) -> String {
        let host = match self.target.ip {
            IpAddr::V4(ip) => ip.to_string(),
            IpAddr::V6(ip) => format!("[{}]", ip),
        };
        format!(
            "{}@{}:{}/",
            self.context.robot_user, host, self.context.remote_dir
        )
    }

    /// Build the real command line and its redacted twin from one template.
    fn build(&self, render: impl Fn(&str) -> String) -> Command {
        let password = shell_escape(self.target.password.expose());
        Command::new(render(&password))
            .description(render(REDACTED))
            .timeout(self.context.step_timeout())
    }

    fn ssh_line(&self, password: &str, remote: &str) -> String {
        format!(
            "sshpass -p {} ssh {} {} {}",
            password,
            self.options(),
            self.login(),
            remote
        )
    }

    /// Run `remote` on the robot.
    pub fn ssh(&self, remote: &str) -> Command {
        self.build(|password| self.ssh_line(password, remote))
    }

    /// Like [`ssh`](Self::ssh), followed by the step marker.
    pub fn ssh_step(&self, remote: &str, step: usize, total: usize) -> Command {
        self.build(|password| with_marker(self.ssh_line(password, remote), step, total))
    }

    /// Copy every file, preserving modes, into the remote directory. Stops
    /// at the first failed copy.
    pub fn copy_files(&self, files: &[impl AsRef<Path>], step: usize, total: usize) -> Command {
        self.build(|password| {
            let mut line = String::new();
            for file in files {
                line.push_str(&format!(
                    "sshpass -p {} scp {} -p {} {} && ",
                    password,
                    self.options(),
                    path_arg(file.as_ref()),
                    shell_escape(&self.scp_destination())
                ));
            }
            format!("{}echo \"OK ({}/{})\"", line, step, total)
        })
    }

    /// `mkdir -p` of the remote directory.
    pub fn make_remote_dir(&self, step: usize, total: usize) -> Command {
        let remote = shell_escape(&format!("mkdir -p {}", self.context.remote_dir));
        self.ssh_step(&remote, step, total)
    }

    /// Run a script from the remote directory in a login shell.
    pub fn run_script(&self, script: &str, step: usize, total: usize) -> Command {
        let path = format!("{}/{}", self.context.remote_dir, script);
        self.ssh_step(&format!("bash --login -c {}", shell_escape(&path)), step, total)
    }

    /// Print one service log from the remote directory.
    pub fn cat_log(&self, log: &str) -> Command {
        let path = format!("{}/{}.log", self.context.remote_dir, log);
        self.ssh(&format!("cat {}", shell_escape(&path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::target::Secret;

    fn target() -> RobotTarget {
        RobotTarget::new("192.168.0.42".parse().unwrap(), Secret::new("s3cr'et"))
    }

    #[test]
    fn test_shell_escape() {
        assert_eq!(shell_escape(""), "''");
        assert_eq!(shell_escape("plain"), "'plain'");
        assert_eq!(shell_escape("it's"), "'it'\\''s'");
    }

    #[test]
    fn test_sed_pattern_escapes_dots() {
        assert_eq!(sed_pattern("127.0.0.1"), "127\\.0\\.0\\.1");
        assert_eq!(sed_pattern("unknown"), "unknown");
        assert_eq!(sed_pattern("a/b"), "a\\/b");
    }

    #[test]
    fn test_copy_template_command() {
        let cmd = copy_template(Path::new("/a/x.template"), Path::new("/a/x"), 1, 4);
        assert_eq!(
            cmd.command_line,
            "cp -f '/a/x.template' '/a/x' && echo \"OK (1/4)\""
        );
    }

    #[test]
    fn test_substitute_ip_command() {
        let cmd = substitute_ip(
            Path::new("/a/socket.js"),
            "127.0.0.1",
            "10.1.1.7".parse().unwrap(),
            2,
            4,
        );
        assert_eq!(
            cmd.command_line,
            "sed -i 's/127\\.0\\.0\\.1/10.1.1.7/' '/a/socket.js' && echo \"OK (2/4)\""
        );
    }

    #[test]
    fn test_ssh_command_hides_password_in_description() {
        let ctx = DeploymentContext::default();
        let target = target();
        let cmd = RemoteShell::new(&ctx, &target).cat_log("tablet_consumer");

        assert!(cmd.command_line.starts_with("sshpass -p 's3cr'\\''et' ssh -o "));
        assert!(cmd
            .command_line
            .ends_with("nao@192.168.0.42 cat '/home/nao/cbsr/tablet_consumer.log'"));
        assert!(!cmd.display_name().contains("s3cr"));
        assert!(cmd.display_name().contains(REDACTED));
        assert_eq!(cmd.timeout, Some(ctx.step_timeout()));
    }

    #[test]
    fn test_ssh_options_rendered() {
        let ctx = DeploymentContext::default();
        let target = target();
        let cmd = RemoteShell::new(&ctx, &target).ssh("true");
        assert!(cmd.command_line.contains(
            "-o 'StrictHostKeyChecking=no' -o 'UserKnownHostsFile=/dev/null' -o 'LogLevel=ERROR'"
        ));
    }

    #[test]
    fn test_copy_files_chains_every_file() {
        let ctx = DeploymentContext::default();
        let target = target();
        let cmd = RemoteShell::new(&ctx, &target).copy_files(&ctx.files, 2, 4);

        assert_eq!(cmd.command_line.matches(" scp ").count(), ctx.files.len());
        assert!(cmd
            .command_line
            .contains("'nao@192.168.0.42:/home/nao/cbsr/'"));
        assert!(cmd.command_line.ends_with("echo \"OK (2/4)\""));
    }

    #[test]
    fn test_scp_destination_brackets_ipv6() {
        let ctx = DeploymentContext::default();
        let target = RobotTarget::new("fe80::2".parse().unwrap(), Secret::new("pw"));
        let remote = RemoteShell::new(&ctx, &target);
        assert_eq!(remote.scp_destination(), "nao@[fe80::2]:/home/nao/cbsr/");
    }

    #[test]
    fn test_run_script_uses_login_shell() {
        let ctx = DeploymentContext::default();
        let target = target();
        let cmd = RemoteShell::new(&ctx, &target).run_script("start.sh", 4, 4);
        assert!(cmd
            .command_line
            .contains("bash --login -c '/home/nao/cbsr/start.sh' && echo \"OK (4/4)\""));
    }
}
