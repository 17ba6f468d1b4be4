use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Default bound for status and tool-version queries
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound for start/stop and NSSM calls
pub const CONTROL_TIMEOUT: Duration = Duration::from_secs(10);

/// A single external program call with its time bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: QUERY_TIMEOUT,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// File name of the program, used to match invocations in logs and fakes
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.to_string_lossy().into_owned())
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout and stderr joined and lowercased, for substring matching
    pub fn combined_lowercase(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr).to_lowercase()
    }

    /// The most useful error text: stderr when present, otherwise stdout
    pub fn error_text(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} timed out after {}s", .timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },
}

/// Runs external programs. The seam between the adapters and the host OS.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_builder() {
        let inv = Invocation::new("net")
            .args(["start", "woosoo-nginx"])
            .timeout(CONTROL_TIMEOUT);
        assert_eq!(inv.program_name(), "net");
        assert_eq!(inv.args, vec!["start", "woosoo-nginx"]);
        assert_eq!(inv.timeout, Duration::from_secs(10));
        assert_eq!(inv.to_string(), "net start woosoo-nginx");
    }

    #[test]
    fn test_error_text_prefers_stderr() {
        let out = CommandOutput {
            exit_code: Some(2),
            stdout: "some output\r\n".to_string(),
            stderr: "  access denied \r\n".to_string(),
        };
        assert_eq!(out.error_text(), "access denied");

        let out = CommandOutput {
            exit_code: Some(2),
            stdout: "System error 5 has occurred.\r\n".to_string(),
            stderr: String::new(),
        };
        assert_eq!(out.error_text(), "System error 5 has occurred.");
    }

    #[test]
    fn test_success_requires_zero_exit() {
        let mut out = CommandOutput::default();
        assert!(!out.success());
        out.exit_code = Some(0);
        assert!(out.success());
        out.exit_code = Some(1);
        assert!(!out.success());
    }
}
