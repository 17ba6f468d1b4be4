use std::path::Path;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tempfile::TempDir;

use deploy_core::config::CONFIG_FILE_NAME;
use deploy_core::validator::{summarize, Severity, SystemValidator, ValidationResult};
use deploy_platform::host::HostProbe;
use deploy_platform::process::{CommandError, CommandOutput, CommandRunner, Invocation};

const GB: u64 = 1024 * 1024 * 1024;

/// Answers tool probes from a table of `command line suffix -> stdout`.
/// Anything not in the table fails to launch.
struct TableRunner {
    answers: Vec<(&'static str, &'static str)>,
}

impl TableRunner {
    fn healthy() -> Self {
        Self {
            answers: vec![
                ("node --version", "v20.11.1\n"),
                ("php --version", "PHP 8.2.12 (cli) (built: Oct 24 2023 21:15:15)\n"),
                ("composer --version", "Composer version 2.6.5 2023-10-06 10:11:52\n"),
                ("php -m", "[PHP Modules]\nbcmath\ncurl\njson\nmbstring\nopenssl\npdo_mysql\n"),
                ("flutter --version", "Flutter 3.16.0 • channel stable\n"),
                (
                    "sc query state= all",
                    "SERVICE_NAME: woosoo-nginx\nSERVICE_NAME: Spooler\n",
                ),
            ],
        }
    }

    fn answer(mut self, command: &'static str, stdout: &'static str) -> Self {
        self.answers.retain(|(known, _)| *known != command);
        self.answers.push((command, stdout));
        self
    }

    fn without(mut self, command: &'static str) -> Self {
        self.answers.retain(|(known, _)| *known != command);
        self
    }
}

#[async_trait]
impl CommandRunner for TableRunner {
    async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
        let line = invocation.to_string();
        match self.answers.iter().find(|(command, _)| line.ends_with(command)) {
            Some((_, stdout)) => Ok(CommandOutput {
                exit_code: Some(0),
                stdout: stdout.to_string(),
                stderr: String::new(),
            }),
            None => Err(CommandError::Launch {
                program: invocation.program_name(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            }),
        }
    }
}

struct FakeHost {
    elevated: Result<bool, &'static str>,
    disk_bytes: u64,
    memory_bytes: u64,
    processes: Vec<&'static str>,
    busy_ports: Vec<u16>,
}

impl FakeHost {
    fn healthy() -> Self {
        Self {
            elevated: Ok(true),
            disk_bytes: 50 * GB,
            memory_bytes: 16 * GB,
            processes: vec!["explorer.exe", "mysqld.exe"],
            busy_ports: Vec::new(),
        }
    }
}

impl HostProbe for FakeHost {
    fn is_elevated(&self) -> Result<bool> {
        match self.elevated {
            Ok(elevated) => Ok(elevated),
            Err(message) => bail!(message),
        }
    }

    fn available_disk_bytes(&self, _path: &Path) -> Result<u64> {
        Ok(self.disk_bytes)
    }

    fn total_memory_bytes(&self) -> Result<u64> {
        Ok(self.memory_bytes)
    }

    fn cpu_count(&self) -> usize {
        8
    }

    fn process_names(&self) -> Vec<String> {
        self.processes.iter().map(|p| p.to_string()).collect()
    }

    fn port_in_use(&self, port: u16) -> bool {
        self.busy_ports.contains(&port)
    }
}

fn project_with_config() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(CONFIG_FILE_NAME), "SERVER_IP=10.0.0.5\n").unwrap();
    dir
}

fn validator(root: &Path, runner: TableRunner, host: FakeHost) -> SystemValidator {
    SystemValidator::new(root, Box::new(runner), Box::new(host))
        .with_service_names(["woosoo-reverb", "woosoo-queue-worker", "woosoo-nginx"])
        .with_ports([8000, 8080, 6001])
}

fn find<'a>(results: &'a [ValidationResult], name: &str) -> &'a ValidationResult {
    results
        .iter()
        .find(|r| r.name == name)
        .unwrap_or_else(|| panic!("no result named {name}"))
}

#[tokio::test]
async fn test_healthy_host_passes_everything() {
    let dir = project_with_config();
    let results = validator(dir.path(), TableRunner::healthy(), FakeHost::healthy())
        .run_all_checks()
        .await;

    let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Administrator Privileges",
            "Disk Space",
            "Node.js",
            "PHP",
            "Composer",
            "Configuration File",
            "PHP Extensions",
            "MySQL/MariaDB",
            "Write Permissions",
            "Port Availability",
            "Flutter SDK",
            "Existing Services",
            "System RAM",
            "CPU Cores",
        ]
    );
    let failures: Vec<&ValidationResult> = results.iter().filter(|r| !r.passed).collect();
    assert!(failures.is_empty(), "unexpected failures: {failures:?}");

    let summary = summarize(&results);
    assert_eq!(summary.total, 14);
    assert!(summary.can_proceed);

    // The write probe leaves nothing behind
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(".write_test_"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_levels_follow_check_table() {
    let dir = project_with_config();
    let results = validator(dir.path(), TableRunner::healthy(), FakeHost::healthy())
        .run_all_checks()
        .await;
    assert_eq!(find(&results, "Node.js").level, Severity::Critical);
    assert_eq!(find(&results, "PHP Extensions").level, Severity::High);
    assert_eq!(find(&results, "Flutter SDK").level, Severity::Medium);
    assert_eq!(find(&results, "CPU Cores").level, Severity::Low);
}

#[tokio::test]
async fn test_old_node_is_critical_failure() {
    let dir = project_with_config();
    let runner = TableRunner::healthy().answer("node --version", "v16.20.2\n");
    let results = validator(dir.path(), runner, FakeHost::healthy())
        .run_all_checks()
        .await;

    let node = find(&results, "Node.js");
    assert!(!node.passed);
    assert_eq!(node.message, "Version 16.20.2 (requires 18+)");
    assert!(!node.recommendation.is_empty());

    let summary = summarize(&results);
    assert_eq!(summary.critical_failed, 1);
    assert!(!summary.can_proceed);
}

#[tokio::test]
async fn test_missing_php_fails() {
    let dir = project_with_config();
    let runner = TableRunner::healthy().without("php --version").without("php -m");
    let results = validator(dir.path(), runner, FakeHost::healthy())
        .run_all_checks()
        .await;

    let php = find(&results, "PHP");
    assert!(!php.passed);
    assert_eq!(php.message, "Not installed or not in PATH");
    assert!(!find(&results, "PHP Extensions").passed);
}

#[tokio::test]
async fn test_composer_without_version_still_passes() {
    let dir = project_with_config();
    let runner = TableRunner::healthy().answer("composer --version", "Composer (dev build)\n");
    let results = validator(dir.path(), runner, FakeHost::healthy())
        .run_all_checks()
        .await;
    let composer = find(&results, "Composer");
    assert!(composer.passed);
    assert_eq!(composer.message, "Installed (version unknown)");
}

#[tokio::test]
async fn test_missing_extensions_are_named() {
    let dir = project_with_config();
    let runner = TableRunner::healthy().answer("php -m", "[PHP Modules]\ncurl\njson\nopenssl\n");
    let result = validator(dir.path(), runner, FakeHost::healthy())
        .check_php_extensions()
        .await;
    assert!(!result.passed);
    assert_eq!(result.message, "Missing: mbstring, pdo_mysql, bcmath");
}

#[tokio::test]
async fn test_missing_flutter_is_not_critical() {
    let dir = project_with_config();
    let runner = TableRunner::healthy().without("flutter --version");
    let results = validator(dir.path(), runner, FakeHost::healthy())
        .run_all_checks()
        .await;
    let flutter = find(&results, "Flutter SDK");
    assert!(!flutter.passed);
    assert_eq!(flutter.message, "Not installed (relay device build will be skipped)");
    assert!(summarize(&results).can_proceed);
}

#[tokio::test]
async fn test_host_facts() {
    let dir = tempfile::tempdir().unwrap();
    let host = FakeHost {
        elevated: Ok(false),
        disk_bytes: 2 * GB,
        memory_bytes: 2 * GB,
        processes: vec!["explorer.exe"],
        busy_ports: vec![6001],
    };
    let results = validator(dir.path(), TableRunner::healthy(), host)
        .run_all_checks()
        .await;

    assert!(!find(&results, "Administrator Privileges").passed);
    let disk = find(&results, "Disk Space");
    assert!(!disk.passed);
    assert_eq!(disk.message, "2.00 GB free (minimum: 5 GB)");
    assert!(!find(&results, "Configuration File").passed);
    assert!(!find(&results, "MySQL/MariaDB").passed);
    assert_eq!(find(&results, "Port Availability").message, "Ports in use: 6001");
    assert!(!find(&results, "System RAM").passed);
    assert!(find(&results, "CPU Cores").passed);
    assert_eq!(find(&results, "CPU Cores").message, "8 cores detected");

    let summary = summarize(&results);
    assert_eq!(summary.critical_failed, 3);
    assert!(!summary.can_proceed);
}

#[tokio::test]
async fn test_admin_check_error_is_reported() {
    let dir = project_with_config();
    let host = FakeHost {
        elevated: Err("token query failed"),
        ..FakeHost::healthy()
    };
    let result = validator(dir.path(), TableRunner::healthy(), host).check_admin_privileges();
    assert!(!result.passed);
    assert_eq!(result.message, "Cannot check admin status: token query failed");
}

#[tokio::test]
async fn test_existing_services_always_pass() {
    let dir = project_with_config();
    let found = validator(dir.path(), TableRunner::healthy(), FakeHost::healthy())
        .check_existing_services()
        .await;
    assert!(found.passed);
    assert_eq!(found.message, "Found: woosoo-nginx");
    assert_eq!(found.recommendation, "These will be replaced during deployment");

    let runner = TableRunner::healthy().without("sc query state= all");
    let unavailable = validator(dir.path(), runner, FakeHost::healthy())
        .check_existing_services()
        .await;
    assert!(unavailable.passed);
    assert!(unavailable.message.starts_with("Cannot check services"));
}

#[tokio::test]
async fn test_service_query_uses_longer_timeout() {
    struct TimeoutRecorder;

    #[async_trait]
    impl CommandRunner for TimeoutRecorder {
        async fn run(&self, invocation: &Invocation) -> Result<CommandOutput, CommandError> {
            Err(CommandError::TimedOut {
                program: invocation.program_name(),
                timeout: invocation.timeout,
            })
        }
    }

    let dir = project_with_config();
    let result = SystemValidator::new(
        dir.path(),
        Box::new(TimeoutRecorder),
        Box::new(FakeHost::healthy()),
    )
    .check_existing_services()
    .await;
    assert_eq!(result.message, "Cannot check services: sc timed out after 10s");
}
