//! Windows service control through NSSM, `net start`/`net stop` and PowerShell.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use deploy_platform::process::{
    CommandOutput, CommandRunner, Invocation, CONTROL_TIMEOUT, QUERY_TIMEOUT,
};
use deploy_platform::service::{
    OperationOutcome, ServiceControl, ServiceDefinition, ServiceStatus,
};

use crate::process::TokioCommandRunner;
use crate::status::{interpret_status_query, status_query};

/// Interpreter that is looked up on PATH rather than under the project root
pub const PATH_RESOLVED_INTERPRETER: &str = "php";

const LOGS_DIR: &str = "logs";

#[derive(Debug, Error)]
pub enum SetupError {
    #[error(
        "NSSM not found: {}\nExpected at: bin/nssm/win64/nssm.exe or bin/nssm/win32/nssm.exe",
        .path.display()
    )]
    NssmNotFound { path: PathBuf },
}

/// NSSM location relative to the project root for the given CPU architecture.
pub fn default_nssm_path(arch: &str) -> PathBuf {
    let variant = if arch.ends_with("64") { "win64" } else { "win32" };
    ["bin", "nssm", variant, "nssm.exe"].iter().collect()
}

pub struct NssmServiceControl<R = TokioCommandRunner> {
    nssm_path: PathBuf,
    project_root: PathBuf,
    runner: R,
}

impl NssmServiceControl<TokioCommandRunner> {
    /// Locate NSSM under the project root (or at `nssm_path`) and fail fast if it is missing.
    pub fn locate(project_root: &Path, nssm_path: Option<&Path>) -> Result<Self, SetupError> {
        let relative = nssm_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_nssm_path(std::env::consts::ARCH));
        Self::with_runner(project_root, project_root.join(relative), TokioCommandRunner::new())
    }
}

impl<R: CommandRunner> NssmServiceControl<R> {
    pub fn with_runner(
        project_root: &Path,
        nssm_path: PathBuf,
        runner: R,
    ) -> Result<Self, SetupError> {
        if !nssm_path.is_file() {
            return Err(SetupError::NssmNotFound { path: nssm_path });
        }
        debug!("using NSSM at {}", nssm_path.display());
        Ok(Self {
            nssm_path,
            project_root: project_root.to_path_buf(),
            runner,
        })
    }

    pub fn nssm_path(&self) -> &Path {
        &self.nssm_path
    }

    /// Directory receiving the service's redirected stdout/stderr
    pub fn log_dir(&self, definition: &ServiceDefinition) -> PathBuf {
        self.project_root.join(LOGS_DIR).join(&definition.key)
    }

    fn nssm<I, S>(&self, args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation::new(&self.nssm_path)
            .args(args)
            .timeout(CONTROL_TIMEOUT)
    }

    async fn resolve_executable(&self, definition: &ServiceDefinition) -> Result<PathBuf, String> {
        let exe = &definition.executable;
        if exe.is_absolute() {
            return Ok(exe.clone());
        }
        if is_path_resolved_interpreter(exe) {
            let lookup = Invocation::new("where.exe")
                .arg(PATH_RESOLVED_INTERPRETER)
                .timeout(QUERY_TIMEOUT);
            let output = self.runner.run(&lookup).await.map_err(|e| e.to_string())?;
            return first_path_line(&output).ok_or_else(|| {
                format!("{} not found in PATH", PATH_RESOLVED_INTERPRETER)
            });
        }
        Ok(self.project_root.join(exe))
    }

    fn app_directory(&self, definition: &ServiceDefinition) -> PathBuf {
        let dir = &definition.working_directory;
        if dir.as_os_str().is_empty() {
            self.project_root.clone()
        } else {
            self.project_root.join(dir)
        }
    }

    /// Apply one `nssm set` parameter; returns whether it took effect.
    async fn set_parameter(&self, service_name: &str, parameter: &str, value: &str) -> bool {
        let invocation = self.nssm(["set", service_name, parameter, value]);
        match self.runner.run(&invocation).await {
            Ok(output) if output.success() => true,
            Ok(output) => {
                warn!(
                    "nssm set {} {} failed: {}",
                    service_name,
                    parameter,
                    output.error_text()
                );
                false
            }
            Err(e) => {
                warn!("nssm set {} {} failed: {}", service_name, parameter, e);
                false
            }
        }
    }
}

#[async_trait]
impl<R: CommandRunner> ServiceControl for NssmServiceControl<R> {
    async fn query_status(&self, service_name: &str) -> ServiceStatus {
        let status = interpret_status_query(self.runner.run(&status_query(service_name)).await);
        debug!("status of {}: {}", service_name, status);
        status
    }

    async fn install(&self, definition: &ServiceDefinition) -> OperationOutcome {
        let name = definition.service_name.as_str();

        let exe = match self.resolve_executable(definition).await {
            Ok(exe) => exe,
            Err(cause) => return OperationOutcome::failure(format!("Installation error: {}", cause)),
        };
        info!("installing service {} ({})", name, exe.display());

        let install = self
            .nssm(["install", name])
            .arg(exe.to_string_lossy())
            .args(definition.arguments.iter().cloned());
        match self.runner.run(&install).await {
            Ok(output) if output.success() => {}
            Ok(output) => {
                return OperationOutcome::failure(format!(
                    "Installation failed: {}",
                    output.error_text()
                ))
            }
            Err(e) => return OperationOutcome::failure(format!("Installation error: {}", e)),
        }

        // Parameters are best-effort: a failure here leaves the service installed
        let mut skipped: Vec<&str> = Vec::new();
        let app_dir = self.app_directory(definition);
        let parameters = [
            ("AppDirectory", app_dir.to_string_lossy().into_owned()),
            ("DisplayName", definition.display_name.clone()),
            ("Description", definition.description.clone()),
            ("Start", "SERVICE_AUTO_START".to_string()),
        ];
        for (parameter, value) in &parameters {
            if !self.set_parameter(name, parameter, value).await {
                skipped.push(*parameter);
            }
        }

        let log_dir = self.log_dir(definition);
        match std::fs::create_dir_all(&log_dir) {
            Ok(()) => {
                for (parameter, file) in [("AppStdout", "output.log"), ("AppStderr", "error.log")] {
                    let target = log_dir.join(file);
                    if !self
                        .set_parameter(name, parameter, &target.to_string_lossy())
                        .await
                    {
                        skipped.push(parameter);
                    }
                }
            }
            Err(e) => {
                warn!("failed to create log directory {}: {}", log_dir.display(), e);
                skipped.extend(["AppStdout", "AppStderr"]);
            }
        }
        if !self.set_parameter(name, "AppTimestampLog", "1").await {
            skipped.push("AppTimestampLog");
        }

        if skipped.is_empty() {
            info!("service installed: {}", name);
            OperationOutcome::success(format!("Service {} installed successfully", name))
        } else {
            warn!("service {} installed without: {}", name, skipped.join(", "));
            OperationOutcome::success(format!(
                "Service {} installed, but these parameters were not applied: {}",
                name,
                skipped.join(", ")
            ))
        }
    }

    async fn uninstall(&self, definition: &ServiceDefinition, stop_first: bool) -> OperationOutcome {
        let name = definition.service_name.as_str();
        info!("uninstalling service: {}", name);

        if stop_first && self.query_status(name).await == ServiceStatus::Running {
            let stopped = self.stop(definition).await;
            if !stopped.success {
                warn!("continuing removal of {} after failed stop: {}", name, stopped.message);
            }
        }

        match self.runner.run(&self.nssm(["remove", name, "confirm"])).await {
            Ok(output) if output.success() => {
                info!("service uninstalled: {}", name);
                OperationOutcome::success(format!("Service {} uninstalled successfully", name))
            }
            Ok(output) => OperationOutcome::failure(format!(
                "Uninstallation failed: {}",
                output.error_text()
            )),
            Err(e) => OperationOutcome::failure(format!("Uninstallation error: {}", e)),
        }
    }

    async fn start(&self, definition: &ServiceDefinition) -> OperationOutcome {
        let name = definition.service_name.as_str();
        info!("starting service: {}", name);
        let invocation = Invocation::new("net")
            .args(["start", name])
            .timeout(CONTROL_TIMEOUT);
        match self.runner.run(&invocation).await {
            Ok(output) => start_outcome(name, &output),
            Err(e) => OperationOutcome::failure(format!("Start error: {}", e)),
        }
    }

    async fn stop(&self, definition: &ServiceDefinition) -> OperationOutcome {
        let name = definition.service_name.as_str();
        info!("stopping service: {}", name);
        let invocation = Invocation::new("net")
            .args(["stop", name])
            .timeout(CONTROL_TIMEOUT);
        match self.runner.run(&invocation).await {
            Ok(output) => stop_outcome(name, &output),
            Err(e) => OperationOutcome::failure(format!("Stop error: {}", e)),
        }
    }

    async fn resume(&self, definition: &ServiceDefinition) -> OperationOutcome {
        let name = definition.service_name.as_str();
        info!("resuming service: {}", name);
        let invocation = Invocation::new("powershell")
            .args(["-NoProfile", "-NonInteractive", "-Command"])
            .arg(format!("Resume-Service -Name \"{}\"", name))
            .timeout(CONTROL_TIMEOUT);

        match self.runner.run(&invocation).await {
            Ok(output) if output.success() => {
                OperationOutcome::success(format!("Service {} resumed successfully", name))
            }
            Ok(output) => {
                debug!("resume of {} failed ({}), starting instead", name, output.error_text());
                self.start(definition).await
            }
            Err(e) => {
                debug!("resume of {} failed ({}), starting instead", name, e);
                self.start(definition).await
            }
        }
    }
}

/// Interpret `net start` output. "Already started" counts as success.
pub fn start_outcome(service_name: &str, output: &CommandOutput) -> OperationOutcome {
    if output.success() {
        OperationOutcome::success(format!("Service {} started successfully", service_name))
    } else if output.combined_lowercase().contains("already") {
        OperationOutcome::success(format!("Service {} already running", service_name))
    } else {
        OperationOutcome::failure(format!("Failed to start: {}", output.error_text()))
    }
}

/// Interpret `net stop` output. "Not started" and a pending stop count as success.
pub fn stop_outcome(service_name: &str, output: &CommandOutput) -> OperationOutcome {
    if output.success() {
        return OperationOutcome::success(format!("Service {} stopped successfully", service_name));
    }
    let text = output.combined_lowercase();
    if text.contains("not started") || text.contains("already stopped") {
        OperationOutcome::success(format!("Service {} already stopped", service_name))
    } else if text.contains("stop pending") || text.contains("stop_pending") {
        OperationOutcome::success(format!("Service {} stop pending", service_name))
    } else {
        OperationOutcome::failure(format!("Failed to stop: {}", output.error_text()))
    }
}

fn is_path_resolved_interpreter(exe: &Path) -> bool {
    exe.file_stem()
        .map(|stem| stem.to_string_lossy().eq_ignore_ascii_case(PATH_RESOLVED_INTERPRETER))
        .unwrap_or(false)
        && exe.components().count() == 1
}

fn first_path_line(output: &CommandOutput) -> Option<PathBuf> {
    if !output.success() {
        return None;
    }
    output
        .stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(PathBuf::from)
}
