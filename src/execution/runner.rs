//! Bounded command runner.

use std::process::{Child, ChildStdin, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::command::{Command, Shell};
use super::pipe::OutputStreams;
use super::result::{Completion, ExecutionResult, Outcome};
use crate::error::Error;
use crate::Result;

/// Default execution timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Longest single wait inside the polling loop.
///
/// Bounds how late the runner notices cancellation, or an exit whose pipes
/// are still held open by a grandchild.
pub const POLL_SLICE: Duration = Duration::from_millis(50);

/// Cooperative cancellation for a running invocation.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The runner kills the child at its next poll slice.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Anything that can turn a [`Command`] into an [`Outcome`].
pub trait CommandRunner: Send + Sync {
    fn run(&self, command: &Command) -> Result<Outcome>;
}

/// Runs shell commands with a wall-clock timeout and captured output.
///
/// Each call owns its child process and pipes; the runner itself holds only
/// configuration, so one instance can serve any number of threads.
#[derive(Debug, Clone)]
pub struct BoundedRunner {
    shell: Shell,
    default_timeout: Duration,
    poll_slice: Duration,
}

impl BoundedRunner {
    /// Create a runner using the platform shell and [`DEFAULT_TIMEOUT`].
    pub fn new() -> Self {
        Self {
            shell: Shell::platform_default(),
            default_timeout: DEFAULT_TIMEOUT,
            poll_slice: POLL_SLICE,
        }
    }

    /// Timeout for commands that do not set their own.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Shell for commands that do not set their own.
    pub fn with_shell(mut self, shell: Shell) -> Self {
        self.shell = shell;
        self
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Run a command and collapse the result into an [`Outcome`].
    pub fn run(&self, command: &Command) -> Result<Outcome> {
        self.execute(command).map(|result| result.outcome())
    }

    /// Run a command on tokio's blocking pool.
    pub async fn run_async(&self, command: Command) -> Result<Outcome> {
        let runner = self.clone();
        tokio::task::spawn_blocking(move || runner.run(&command))
            .await
            .map_err(|e| Error::TaskJoin(e.to_string()))?
    }

    /// Run a command and return everything captured.
    pub fn execute(&self, command: &Command) -> Result<ExecutionResult> {
        self.execute_with_cancel(command, &CancelHandle::new())
    }

    /// Run a command that can be cut short through `cancel`.
    pub fn execute_with_cancel(
        &self,
        command: &Command,
        cancel: &CancelHandle,
    ) -> Result<ExecutionResult> {
        let timeout = command.timeout.unwrap_or(self.default_timeout);
        let started = Instant::now();

        let mut handle = self.spawn(command)?;
        let pid = handle.pid();
        debug!(
            command = %command.display_name(),
            pid,
            timeout_ms = timeout.as_millis() as u64,
            "spawned command"
        );

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut remaining = timeout;
        let mut status: Option<ExitStatus>;
        let mut cancelled = false;

        loop {
            let slice_start = Instant::now();
            handle.streams().wait(remaining.min(self.poll_slice))?;

            // Sample the status before reading: output written just before
            // exit is then guaranteed to be in the pipe when we drain it.
            status = handle.try_wait()?;

            handle.streams().drain_stdout(&mut stdout)?;
            handle.streams().drain_stderr(&mut stderr)?;

            remaining = remaining.saturating_sub(slice_start.elapsed());

            if status.is_some() {
                break;
            }
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            if remaining.is_zero() {
                break;
            }
        }

        // Best-effort final read; a failure here must not hide the outcome.
        if let Err(e) = handle.streams().drain_stderr(&mut stderr) {
            warn!(pid, error = %e, "final stderr read failed");
        }
        if let Err(e) = handle.streams().drain_stdout(&mut stdout) {
            warn!(pid, error = %e, "final stdout read failed");
        }

        let completion = decide_completion(status.map(exit_code), cancelled);

        handle.close();
        drop(handle);
        let duration = started.elapsed();

        match completion {
            Completion::TimedOut => warn!(
                command = %command.display_name(),
                pid,
                timeout_ms = timeout.as_millis() as u64,
                "command timed out, killed"
            ),
            Completion::Cancelled => debug!(pid, "command cancelled, killed"),
            Completion::Exited(code) => debug!(
                pid,
                exit_code = code,
                elapsed_ms = duration.as_millis() as u64,
                "command exited"
            ),
        }

        Ok(ExecutionResult {
            pid,
            stdout,
            stderr,
            completion,
            duration,
        })
    }

    fn spawn(&self, command: &Command) -> Result<ProcessHandle> {
        let shell = command.shell.as_ref().unwrap_or(&self.shell);

        let mut proc = std::process::Command::new(&shell.program);
        proc.arg(&shell.flag)
            .arg(&command.command_line)
            .envs(&command.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &command.working_dir {
            proc.current_dir(dir);
        }

        // Own process group, so the final kill also reaches whatever the
        // shell started.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            proc.process_group(0);
        }

        let child = proc.spawn().map_err(|source| Error::Spawn {
            command: command.display_name().to_string(),
            source,
        })?;

        Ok(ProcessHandle::attach(child)?)
    }
}

impl Default for BoundedRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for BoundedRunner {
    fn run(&self, command: &Command) -> Result<Outcome> {
        BoundedRunner::run(self, command)
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for Arc<R> {
    fn run(&self, command: &Command) -> Result<Outcome> {
        (**self).run(command)
    }
}

/// An exit observed before the deadline wins, even if the budget ran out
/// in the same slice.
fn decide_completion(exit: Option<i32>, cancelled: bool) -> Completion {
    match exit {
        Some(code) => Completion::Exited(code),
        None if cancelled => Completion::Cancelled,
        None => Completion::TimedOut,
    }
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// A child process and its three pipes, owned by one invocation.
///
/// Dropping the handle kills and reaps the child, so every early return out
/// of the polling loop still releases it.
struct ProcessHandle {
    child: Child,
    stdin: Option<ChildStdin>,
    streams: OutputStreams,
    reaped: bool,
}

impl ProcessHandle {
    fn attach(mut child: Child) -> std::io::Result<Self> {
        let stdin = child.stdin.take();
        let streams = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => OutputStreams::new(stdout, stderr),
            _ => Err(std::io::Error::other("child output was not piped")),
        };

        match streams {
            Ok(streams) => Ok(Self {
                child,
                stdin,
                streams,
                reaped: false,
            }),
            Err(e) => {
                kill(&mut child);
                let _ = child.wait();
                Err(e)
            }
        }
    }

    fn pid(&self) -> u32 {
        self.child.id()
    }

    fn streams(&mut self) -> &mut OutputStreams {
        &mut self.streams
    }

    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        self.child.try_wait()
    }

    /// Kill, close stdin, reap. Safe to call on an exited child; the output
    /// pipes close when the handle drops.
    fn close(&mut self) {
        if self.reaped {
            return;
        }

        kill(&mut self.child);
        self.stdin.take();

        if let Err(e) = self.child.wait() {
            warn!(pid = self.child.id(), error = %e, "failed to reap child");
        }
        self.reaped = true;
    }
}

/// SIGKILL the child's process group, then the child itself.
fn kill(child: &mut Child) {
    #[cfg(unix)]
    {
        let pgid = child.id() as libc::pid_t;
        // SAFETY: plain syscall; ESRCH for an empty group is ignored.
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
    }
    let _ = child.kill();
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.close();
    }
}
