use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use deploy_platform::host::HostProbe;
use deploy_platform::process::{CommandRunner, Invocation};

use crate::config::DeploymentConfig;
use crate::tooling::{self, ToolRequirement, ToolVerdict};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const MIN_DISK_GB: f64 = 5.0;
const MIN_RAM_GB: f64 = 4.0;
const SERVICE_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

pub const REQUIRED_PHP_EXTENSIONS: [&str; 6] =
    ["mbstring", "pdo_mysql", "openssl", "json", "curl", "bcmath"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }
}

/// Outcome of a single pre-flight check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub name: String,
    pub level: Severity,
    pub passed: bool,
    pub message: String,
    pub recommendation: String,
}

impl ValidationResult {
    fn pass(name: &str, level: Severity, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            level,
            passed: true,
            message: message.into(),
            recommendation: String::new(),
        }
    }

    fn fail(
        name: &str,
        level: Severity,
        message: impl Into<String>,
        recommendation: impl Into<String>,
    ) -> Self {
        Self {
            name: name.to_string(),
            level,
            passed: false,
            message: message.into(),
            recommendation: recommendation.into(),
        }
    }

    fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = recommendation.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ValidationSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub critical_failed: usize,
    pub can_proceed: bool,
}

pub fn summarize(results: &[ValidationResult]) -> ValidationSummary {
    let passed = results.iter().filter(|r| r.passed).count();
    let critical_failed = results
        .iter()
        .filter(|r| !r.passed && r.level == Severity::Critical)
        .count();
    ValidationSummary {
        total: results.len(),
        passed,
        failed: results.len() - passed,
        critical_failed,
        can_proceed: critical_failed == 0,
    }
}

/// Pre-flight checks for a deployment host.
pub struct SystemValidator {
    project_root: PathBuf,
    runner: Box<dyn CommandRunner>,
    host: Box<dyn HostProbe>,
    service_names: Vec<String>,
    ports: Vec<u32>,
}

impl SystemValidator {
    pub fn new(
        project_root: impl Into<PathBuf>,
        runner: Box<dyn CommandRunner>,
        host: Box<dyn HostProbe>,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            runner,
            host,
            service_names: Vec::new(),
            ports: Vec::new(),
        }
    }

    /// Managed service names reported by the existing-services check
    pub fn with_service_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.service_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Ports that must be free before the stack starts
    pub fn with_ports(mut self, ports: impl IntoIterator<Item = u32>) -> Self {
        self.ports = ports.into_iter().collect();
        self
    }

    /// Proxy and WebSocket ports from a deployment config
    pub fn with_config_ports(self, config: &DeploymentConfig) -> Self {
        self.with_ports([
            config.nginx_https_port,
            config.nginx_http_port,
            config.reverb_port,
        ])
    }

    /// Run every check in report order. Checks are independent of each other.
    pub async fn run_all_checks(&self) -> Vec<ValidationResult> {
        let results = vec![
            self.check_admin_privileges(),
            self.check_disk_space(),
            self.check_tool(&tooling::NODE, Severity::Critical).await,
            self.check_tool(&tooling::PHP, Severity::Critical).await,
            self.check_tool(&tooling::COMPOSER, Severity::Critical).await,
            self.check_config_file(),
            self.check_php_extensions().await,
            self.check_mysql(),
            self.check_write_permissions(),
            self.check_ports(),
            self.check_tool(&tooling::FLUTTER, Severity::Medium).await,
            self.check_existing_services().await,
            self.check_ram(),
            self.check_cpu(),
        ];
        let summary = summarize(&results);
        info!(
            "validation finished: {}/{} passed, {} critical failures",
            summary.passed, summary.total, summary.critical_failed
        );
        results
    }

    pub fn check_admin_privileges(&self) -> ValidationResult {
        const NAME: &str = "Administrator Privileges";
        match self.host.is_elevated() {
            Ok(true) => ValidationResult::pass(NAME, Severity::Critical, "Running as Administrator"),
            Ok(false) => ValidationResult::fail(
                NAME,
                Severity::Critical,
                "Not running as Administrator",
                "Right-click and select 'Run as Administrator'",
            ),
            Err(e) => ValidationResult::fail(
                NAME,
                Severity::Critical,
                format!("Cannot check admin status: {:#}", e),
                "Ensure running on Windows with proper permissions",
            ),
        }
    }

    pub fn check_disk_space(&self) -> ValidationResult {
        const NAME: &str = "Disk Space";
        match self.host.available_disk_bytes(&self.project_root) {
            Ok(bytes) => {
                let free_gb = bytes as f64 / GIB;
                let message = format!("{:.2} GB free (minimum: {} GB)", free_gb, MIN_DISK_GB);
                if free_gb >= MIN_DISK_GB {
                    ValidationResult::pass(NAME, Severity::Critical, message)
                } else {
                    ValidationResult::fail(
                        NAME,
                        Severity::Critical,
                        message,
                        format!("Free up at least {:.2} GB of disk space", MIN_DISK_GB - free_gb),
                    )
                }
            }
            Err(e) => ValidationResult::fail(
                NAME,
                Severity::Critical,
                format!("Cannot check disk space: {:#}", e),
                "Verify the project drive is accessible",
            ),
        }
    }

    pub async fn check_tool(&self, tool: &ToolRequirement, level: Severity) -> ValidationResult {
        let result = self.runner.run(&tool.invocation()).await;
        match tool.evaluate(result) {
            ToolVerdict::Satisfied(version) => {
                ValidationResult::pass(tool.name, level, format!("Version {}", version))
            }
            ToolVerdict::TooOld(version) => ValidationResult::fail(
                tool.name,
                level,
                format!(
                    "Version {} (requires {}+)",
                    version,
                    tool.minimum.unwrap_or_default()
                ),
                tool.recommendation,
            ),
            ToolVerdict::Unparsed if tool.unparsed_passes => {
                ValidationResult::pass(tool.name, level, "Installed (version unknown)")
            }
            ToolVerdict::Unparsed | ToolVerdict::Missing => {
                ValidationResult::fail(tool.name, level, tool.missing_message, tool.recommendation)
            }
        }
    }

    pub fn check_config_file(&self) -> ValidationResult {
        const NAME: &str = "Configuration File";
        let path = DeploymentConfig::path_in(&self.project_root);
        if path.is_file() {
            ValidationResult::pass(NAME, Severity::Critical, format!("Found: {}", path.display()))
        } else {
            ValidationResult::fail(
                NAME,
                Severity::Critical,
                format!("Not found: {}", path.display()),
                "Copy deployment.config.env.template to deployment.config.env and configure",
            )
        }
    }

    pub async fn check_php_extensions(&self) -> ValidationResult {
        const NAME: &str = "PHP Extensions";
        let invocation = Invocation::new("php").arg("-m");
        let output = match self.runner.run(&invocation).await {
            Ok(output) if output.success() => output,
            Ok(output) => {
                return ValidationResult::fail(
                    NAME,
                    Severity::High,
                    format!("Cannot list PHP modules: {}", output.error_text()),
                    "Verify PHP is installed correctly",
                )
            }
            Err(e) => {
                return ValidationResult::fail(
                    NAME,
                    Severity::High,
                    format!("Cannot check extensions: {}", e),
                    "Verify PHP is installed correctly",
                )
            }
        };

        let modules = output.stdout.to_lowercase();
        let missing: Vec<&str> = REQUIRED_PHP_EXTENSIONS
            .iter()
            .copied()
            .filter(|extension| !modules.contains(extension))
            .collect();
        if missing.is_empty() {
            ValidationResult::pass(NAME, Severity::High, "All required extensions present")
        } else {
            ValidationResult::fail(
                NAME,
                Severity::High,
                format!("Missing: {}", missing.join(", ")),
                "Enable missing extensions in php.ini",
            )
        }
    }

    pub fn check_mysql(&self) -> ValidationResult {
        const NAME: &str = "MySQL/MariaDB";
        let running = self.host.process_names().iter().any(|name| {
            let name = name.to_lowercase();
            name.contains("mysql") || name.contains("mariadb")
        });
        if running {
            ValidationResult::pass(NAME, Severity::High, "MySQL/MariaDB service running")
        } else {
            ValidationResult::fail(
                NAME,
                Severity::High,
                "MySQL/MariaDB not running",
                "Start MySQL service or install MySQL 8.0+",
            )
        }
    }

    pub fn check_write_permissions(&self) -> ValidationResult {
        const NAME: &str = "Write Permissions";
        let probe = self
            .project_root
            .join(format!(".write_test_{}", std::process::id()));
        let written = fs::write(&probe, b"test").and_then(|()| fs::remove_file(&probe));
        match written {
            Ok(()) => ValidationResult::pass(NAME, Severity::High, "Project directory is writable"),
            Err(e) => {
                debug!("write probe {} failed: {}", probe.display(), e);
                ValidationResult::fail(
                    NAME,
                    Severity::High,
                    format!("Cannot write to project directory: {}", e),
                    "Run as Administrator or check folder permissions",
                )
            }
        }
    }

    pub fn check_ports(&self) -> ValidationResult {
        const NAME: &str = "Port Availability";
        if self.ports.is_empty() {
            return ValidationResult::pass(NAME, Severity::Medium, "No ports configured");
        }
        let busy: Vec<String> = self
            .ports
            .iter()
            .filter(|port| {
                u16::try_from(**port)
                    .map(|port| self.host.port_in_use(port))
                    .unwrap_or(false)
            })
            .map(u32::to_string)
            .collect();
        if busy.is_empty() {
            let ports: Vec<String> = self.ports.iter().map(u32::to_string).collect();
            ValidationResult::pass(NAME, Severity::Medium, format!("Free: {}", ports.join(", ")))
        } else {
            ValidationResult::fail(
                NAME,
                Severity::Medium,
                format!("Ports in use: {}", busy.join(", ")),
                "Stop the process bound to these ports, or ignore if the Woosoo services are already running",
            )
        }
    }

    pub async fn check_existing_services(&self) -> ValidationResult {
        const NAME: &str = "Existing Services";
        let invocation = Invocation::new("sc")
            .args(["query", "state=", "all"])
            .timeout(SERVICE_QUERY_TIMEOUT);
        match self.runner.run(&invocation).await {
            Ok(output) if output.success() => {
                let listing = output.stdout.to_lowercase();
                let found: Vec<&str> = self
                    .service_names
                    .iter()
                    .map(String::as_str)
                    .filter(|name| listing.contains(&name.to_lowercase()))
                    .collect();
                if found.is_empty() {
                    ValidationResult::pass(
                        NAME,
                        Severity::Medium,
                        "No existing Woosoo services (fresh installation)",
                    )
                } else {
                    ValidationResult::pass(
                        NAME,
                        Severity::Medium,
                        format!("Found: {}", found.join(", ")),
                    )
                    .with_recommendation("These will be replaced during deployment")
                }
            }
            Ok(output) => ValidationResult::pass(
                NAME,
                Severity::Medium,
                format!("Cannot check services: {}", output.error_text()),
            ),
            Err(e) => ValidationResult::pass(
                NAME,
                Severity::Medium,
                format!("Cannot check services: {}", e),
            ),
        }
    }

    pub fn check_ram(&self) -> ValidationResult {
        const NAME: &str = "System RAM";
        match self.host.total_memory_bytes() {
            Ok(bytes) => {
                let total_gb = bytes as f64 / GIB;
                let message = format!("{:.2} GB total (minimum: {} GB)", total_gb, MIN_RAM_GB);
                if total_gb >= MIN_RAM_GB {
                    ValidationResult::pass(NAME, Severity::Low, message)
                } else {
                    ValidationResult::fail(
                        NAME,
                        Severity::Low,
                        message,
                        "System may be slow with less than 4GB RAM",
                    )
                }
            }
            Err(e) => ValidationResult::fail(
                NAME,
                Severity::Low,
                format!("Cannot read memory information: {:#}", e),
                "",
            ),
        }
    }

    pub fn check_cpu(&self) -> ValidationResult {
        let cores = self.host.cpu_count();
        ValidationResult::pass("CPU Cores", Severity::Low, format!("{} cores detected", cores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(level: Severity, passed: bool) -> ValidationResult {
        ValidationResult {
            name: "check".to_string(),
            level,
            passed,
            message: String::new(),
            recommendation: String::new(),
        }
    }

    #[test]
    fn test_summarize_counts() {
        let results = vec![
            result(Severity::Critical, true),
            result(Severity::High, false),
            result(Severity::Low, false),
        ];
        let summary = summarize(&results);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.critical_failed, 0);
        assert!(summary.can_proceed);
    }

    #[test]
    fn test_critical_failure_blocks() {
        let summary = summarize(&[result(Severity::Critical, false), result(Severity::Medium, true)]);
        assert_eq!(summary.critical_failed, 1);
        assert!(!summary.can_proceed);
    }

    #[test]
    fn test_empty_results_can_proceed() {
        let summary = summarize(&[]);
        assert_eq!(summary.total, 0);
        assert!(summary.can_proceed);
    }
}
