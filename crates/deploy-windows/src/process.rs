use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use deploy_platform::process::{CommandError, CommandOutput, CommandRunner, Invocation};

/// Runs programs with tokio, killing the child if it outlives its time bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

impl TokioCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        let program = invocation.program_name();
        debug!("running {} (timeout {:?})", invocation, invocation.timeout);

        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::Launch {
                program: program.clone(),
                source,
            })?;

        // Dropping the wait future on timeout drops the child, which kills it
        match tokio::time::timeout(invocation.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let result = CommandOutput {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                };
                debug!("{} exited with {:?}", program, result.exit_code);
                Ok(result)
            }
            Ok(Err(source)) => Err(CommandError::Launch { program, source }),
            Err(_) => {
                warn!("{} timed out after {:?}", program, invocation.timeout);
                Err(CommandError::TimedOut {
                    program,
                    timeout: invocation.timeout,
                })
            }
        }
    }
}
