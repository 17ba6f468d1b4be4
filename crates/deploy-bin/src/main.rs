use std::future::Future;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, warn};

use deploy_core::orchestrator::Interrupt;

mod commands;
mod report;

#[derive(Parser, Debug)]
#[command(name = "woosoo-deploy")]
#[command(about = "Deploy and manage the Woosoo service stack on Windows")]
#[command(version)]
struct Cli {
    /// Project root containing deployment.config.env (default: current directory)
    #[arg(long, env = "WOOSOO_PROJECT_ROOT", global = true)]
    project_root: Option<PathBuf>,

    /// Path to nssm.exe (default: bin/nssm/<arch>/nssm.exe under the project root)
    #[arg(long, global = true)]
    nssm_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", env = "WOOSOO_LOG_LEVEL", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show service status and the configuration summary (default)
    Dashboard,
    /// Run pre-flight validation checks
    Check {
        /// Show recommendations for failed checks
        #[arg(short, long)]
        verbose: bool,
        /// Emit results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start a service, or `all`
    Start { service: String },
    /// Stop a service, or `all`
    Stop { service: String },
    /// Stop then start a service, or `all`
    Restart { service: String },
    /// Register a service with NSSM, or `all`
    Install { service: String },
    /// Remove a service, or `all`
    Uninstall {
        service: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        confirm: bool,
    },
    /// Show the current configuration and validate it
    Config {
        /// Emit the configuration as JSON (secrets omitted)
        #[arg(long)]
        json: bool,
    },
    /// Show version information
    Version,
}

/// Options shared by every command
#[derive(Debug, Clone)]
pub struct Workspace {
    pub project_root: PathBuf,
    pub nssm_path: Option<PathBuf>,
    pub interrupt: Interrupt,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Reports go to stdout, diagnostics to stderr
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Registry paths are joined onto the root, so it must be absolute
    let project_root = match cli.project_root {
        Some(root) => std::path::absolute(&root)
            .with_context(|| format!("invalid project root {}", root.display()))?,
        None => std::env::current_dir().context("failed to read current directory")?,
    };
    debug!(
        "woosoo-deploy v{} (project root: {})",
        env!("CARGO_PKG_VERSION"),
        project_root.display()
    );

    let workspace = Workspace {
        project_root,
        nssm_path: cli.nssm_path,
        interrupt: Interrupt::new(),
    };
    let command = cli.command.unwrap_or(Commands::Dashboard);

    let (result, interrupted) = run_to_completion(
        commands::run(command, &workspace),
        &workspace.interrupt,
        async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        },
    )
    .await;

    if interrupted {
        if let Err(e) = result {
            warn!("{:#}", e);
        }
        report::cancelled();
        return Ok(());
    }
    result
}

/// Drive `command` to completion even when `signal` fires first. The signal
/// raises `interrupt`, so no further OS calls are issued, but the one in
/// flight is never dropped. Returns the command result and whether the
/// signal fired.
async fn run_to_completion<F, S>(command: F, interrupt: &Interrupt, signal: S) -> (Result<()>, bool)
where
    F: Future<Output = Result<()>>,
    S: Future<Output = ()>,
{
    tokio::pin!(command);
    tokio::select! {
        result = &mut command => return (result, false),
        _ = signal => {
            warn!("interrupted; waiting for the current operation to finish");
            interrupt.raise();
        }
    }
    (command.await, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_waits_for_inflight_command() {
        let interrupt = Interrupt::new();
        let finished = Arc::new(AtomicBool::new(false));
        let command = {
            let finished = finished.clone();
            let interrupt = interrupt.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                // Raised by the time the call returns
                assert!(interrupt.is_raised());
                finished.store(true, Ordering::SeqCst);
                Ok(())
            }
        };

        let (result, interrupted) = run_to_completion(
            command,
            &interrupt,
            tokio::time::sleep(Duration::from_millis(200)),
        )
        .await;

        assert!(result.is_ok());
        assert!(interrupted);
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_command_without_signal_is_not_interrupted() {
        let interrupt = Interrupt::new();
        let (result, interrupted) =
            run_to_completion(async { Ok(()) }, &interrupt, std::future::pending()).await;
        assert!(result.is_ok());
        assert!(!interrupted);
        assert!(!interrupt.is_raised());
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_command_means_dashboard() {
        let cli = Cli::try_parse_from(["woosoo-deploy"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn test_uninstall_confirm_flag() {
        let cli = Cli::try_parse_from(["woosoo-deploy", "uninstall", "all", "--confirm"]).unwrap();
        match cli.command {
            Some(Commands::Uninstall { service, confirm }) => {
                assert_eq!(service, "all");
                assert!(confirm);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "woosoo-deploy",
            "check",
            "--json",
            "--project-root",
            "C:\\woosoo",
            "--nssm-path",
            "tools\\nssm.exe",
        ])
        .unwrap();
        assert_eq!(cli.project_root, Some(PathBuf::from("C:\\woosoo")));
        assert_eq!(cli.nssm_path, Some(PathBuf::from("tools\\nssm.exe")));
        assert!(matches!(cli.command, Some(Commands::Check { verbose: false, json: true })));
    }
}
