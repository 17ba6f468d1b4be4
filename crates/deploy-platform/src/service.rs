use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;

/// A managed Windows service, as declared by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDefinition {
    /// Short logical name used on the command line (e.g. "reverb")
    pub key: String,
    /// Name registered with the Service Control Manager
    pub service_name: String,
    pub display_name: String,
    pub description: String,
    /// Executable to run; a bare interpreter name is resolved through PATH at install time
    pub executable: PathBuf,
    pub arguments: Vec<String>,
    pub working_directory: PathBuf,
}

/// Run state reported by the OS. Always queried fresh, never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Running,
    Stopped,
    Paused,
    NotInstalled,
    Unknown,
}

impl ServiceStatus {
    pub fn is_installed(self) -> bool {
        self != ServiceStatus::NotInstalled
    }

    pub fn label(self) -> &'static str {
        match self {
            ServiceStatus::Running => "Running",
            ServiceStatus::Stopped => "Stopped",
            ServiceStatus::Paused => "Paused",
            ServiceStatus::NotInstalled => "Not Installed",
            ServiceStatus::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of a lifecycle operation. Expected conditions such as "already running"
/// are reported here rather than as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationOutcome {
    pub success: bool,
    pub message: String,
}

impl OperationOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl fmt::Display for OperationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Access to the OS service database.
///
/// Implementations must never surface a raw OS fault: query failures become
/// `ServiceStatus::Unknown` and every other failure becomes a failed outcome.
#[async_trait]
pub trait ServiceControl: Send + Sync {
    /// Query the current status of a service by its registered name
    async fn query_status(&self, service_name: &str) -> ServiceStatus;

    /// Register the service and apply its parameters
    async fn install(&self, definition: &ServiceDefinition) -> OperationOutcome;

    /// Remove the service, stopping it first when `stop_first` is set and it is running
    async fn uninstall(&self, definition: &ServiceDefinition, stop_first: bool) -> OperationOutcome;

    /// Start the service
    async fn start(&self, definition: &ServiceDefinition) -> OperationOutcome;

    /// Stop the service
    async fn stop(&self, definition: &ServiceDefinition) -> OperationOutcome;

    /// Resume a paused service, falling back to a plain start
    async fn resume(&self, definition: &ServiceDefinition) -> OperationOutcome;
}
