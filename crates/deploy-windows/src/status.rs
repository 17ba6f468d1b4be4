//! Service status queries through PowerShell `Get-Service`.
//!
//! Classification works on free text and depends on the wording PowerShell prints
//! for `ServiceControllerStatus`. The tests below pin the exact strings; revisit
//! them when moving to a new PowerShell or Windows release.

use tracing::debug;

use deploy_platform::process::{CommandError, CommandOutput, Invocation, QUERY_TIMEOUT};
use deploy_platform::service::ServiceStatus;

/// Build the status query for a registered service name.
pub fn status_query(service_name: &str) -> Invocation {
    Invocation::new("powershell")
        .args(["-NoProfile", "-NonInteractive", "-Command"])
        .arg(format!(
            "Get-Service -Name \"{}\" | Select-Object -ExpandProperty Status",
            service_name
        ))
        .timeout(QUERY_TIMEOUT)
}

/// Map the result of [`status_query`] to a status.
///
/// A non-zero exit means `Get-Service` could not find the service. Timeouts and
/// launch failures are ambiguous and become `Unknown`.
pub fn interpret_status_query(result: Result<CommandOutput, CommandError>) -> ServiceStatus {
    match result {
        Ok(output) if output.success() => classify_status(&output.stdout),
        Ok(output) => {
            debug!("status query exited with {:?}: {}", output.exit_code, output.error_text());
            ServiceStatus::NotInstalled
        }
        Err(e) => {
            debug!("status query failed: {}", e);
            ServiceStatus::Unknown
        }
    }
}

/// Classify the text printed by `Select-Object -ExpandProperty Status`.
///
/// Checked in order: running, stopped, paused. Pending states are reported as
/// `Unknown`.
pub fn classify_status(stdout: &str) -> ServiceStatus {
    let status = stdout.trim().to_lowercase();
    if status.contains("running") {
        ServiceStatus::Running
    } else if status.contains("stopped") {
        ServiceStatus::Stopped
    } else if status.contains("paused") {
        ServiceStatus::Paused
    } else {
        ServiceStatus::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_classify_steady_states() {
        assert_eq!(classify_status("Running\r\n"), ServiceStatus::Running);
        assert_eq!(classify_status("Stopped\r\n"), ServiceStatus::Stopped);
        assert_eq!(classify_status("Paused\r\n"), ServiceStatus::Paused);
    }

    #[test]
    fn test_classify_pending_states_are_unknown() {
        for pending in [
            "StartPending\r\n",
            "StopPending\r\n",
            "ContinuePending\r\n",
            "PausePending\r\n",
        ] {
            assert_eq!(classify_status(pending), ServiceStatus::Unknown, "{}", pending);
        }
    }

    #[test]
    fn test_classify_empty_output() {
        assert_eq!(classify_status(""), ServiceStatus::Unknown);
        assert_eq!(classify_status("\r\n"), ServiceStatus::Unknown);
    }

    #[test]
    fn test_missing_service_is_not_installed() {
        let output = CommandOutput {
            exit_code: Some(1),
            stdout: String::new(),
            stderr: "Get-Service : Cannot find any service with service name 'woosoo-reverb'.\r\n"
                .to_string(),
        };
        assert_eq!(interpret_status_query(Ok(output)), ServiceStatus::NotInstalled);
    }

    #[test]
    fn test_timeout_is_unknown() {
        let err = CommandError::TimedOut {
            program: "powershell".to_string(),
            timeout: Duration::from_secs(5),
        };
        assert_eq!(interpret_status_query(Err(err)), ServiceStatus::Unknown);
    }

    #[test]
    fn test_launch_failure_is_unknown() {
        let err = CommandError::Launch {
            program: "powershell".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(interpret_status_query(Err(err)), ServiceStatus::Unknown);
    }

    #[test]
    fn test_status_query_shape() {
        let inv = status_query("woosoo-nginx");
        assert_eq!(inv.program_name(), "powershell");
        assert_eq!(inv.timeout, Duration::from_secs(5));
        assert_eq!(
            inv.args.last().map(String::as_str),
            Some("Get-Service -Name \"woosoo-nginx\" | Select-Object -ExpandProperty Status")
        );
    }
}
