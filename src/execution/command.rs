//! Command representation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The shell used to interpret command lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shell {
    /// Shell executable.
    pub program: String,
    /// Flag that makes the shell run the next argument as a command line.
    pub flag: String,
}

impl Shell {
    /// Create a shell description.
    pub fn new(program: impl Into<String>, flag: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            flag: flag.into(),
        }
    }

    /// `/bin/sh -c` on Unix, `cmd.exe /C` on Windows.
    pub fn platform_default() -> Self {
        #[cfg(windows)]
        {
            Self::new("cmd.exe", "/C")
        }
        #[cfg(not(windows))]
        {
            Self::new("/bin/sh", "-c")
        }
    }
}

impl Default for Shell {
    fn default() -> Self {
        Self::platform_default()
    }
}

/// A shell command line submitted to the runner.
///
/// The command line is opaque: it is handed to the shell as-is, so quoting
/// is the caller's job.
#[derive(Debug, Clone)]
pub struct Command {
    /// The command line to execute.
    pub command_line: String,
    /// Text used in logs and errors instead of the command line.
    pub description: Option<String>,
    /// Working directory override (if any).
    pub working_dir: Option<PathBuf>,
    /// Environment variables to set.
    pub env: HashMap<String, String>,
    /// Maximum execution time.
    pub timeout: Option<Duration>,
    /// Shell override.
    pub shell: Option<Shell>,
}

impl Command {
    /// Create a new command with the given command line.
    pub fn new(command_line: impl Into<String>) -> Self {
        Self {
            command_line: command_line.into(),
            description: None,
            working_dir: None,
            env: HashMap::new(),
            timeout: None,
            shell: None,
        }
    }

    /// Set the text shown in logs in place of the raw command line.
    ///
    /// Commands that embed credentials should always set this.
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Set the working directory.
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add an environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Add multiple environment variables.
    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in vars {
            self.env.insert(k.into(), v.into());
        }
        self
    }

    /// Set the execution timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Run through a different shell.
    pub fn shell(mut self, shell: Shell) -> Self {
        self.shell = Some(shell);
        self
    }

    /// The description if set, otherwise the command line.
    pub fn display_name(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.command_line)
    }
}
