use std::path::Path;

use anyhow::{Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm};
use serde::Serialize;
use tracing::{info, warn};

use deploy_core::config::{ConfigError, DeploymentConfig};
use deploy_core::orchestrator::{Operation, ServiceOrchestrator};
use deploy_core::registry::ServiceRegistry;
use deploy_core::validator::{summarize, SystemValidator, ValidationResult, ValidationSummary};
use deploy_windows::{NssmServiceControl, SysinfoHostProbe, TokioCommandRunner};

use crate::report;
use crate::{Commands, Workspace};

/// Target name that applies a lifecycle command to every registered service
pub const ALL_SERVICES: &str = "all";

#[derive(Serialize)]
struct CheckReport<'a> {
    results: &'a [ValidationResult],
    summary: ValidationSummary,
}

#[derive(Serialize)]
struct ConfigReport<'a> {
    project_root: &'a Path,
    config: &'a DeploymentConfig,
    errors: &'a [String],
}

pub async fn run(command: Commands, workspace: &Workspace) -> Result<()> {
    match command {
        Commands::Dashboard => dashboard(workspace).await,
        Commands::Check { verbose, json } => check(workspace, verbose, json).await,
        Commands::Start { service } => lifecycle(workspace, Operation::Start, &service).await,
        Commands::Stop { service } => lifecycle(workspace, Operation::Stop, &service).await,
        Commands::Restart { service } => lifecycle(workspace, Operation::Restart, &service).await,
        Commands::Install { service } => lifecycle(workspace, Operation::Install, &service).await,
        Commands::Uninstall { service, confirm } => {
            if !confirm && !confirm_uninstall(&service).await? {
                report::cancelled();
                return Ok(());
            }
            lifecycle(workspace, Operation::Uninstall, &service).await
        }
        Commands::Config { json } => show_config(workspace, json),
        Commands::Version => {
            report::version();
            Ok(())
        }
    }
}

async fn dashboard(workspace: &Workspace) -> Result<()> {
    let loaded = match DeploymentConfig::load(&workspace.project_root) {
        Ok(config) => Some(config),
        Err(ConfigError::NotFound { path }) => {
            warn!("{} not found, using default configuration", path.display());
            None
        }
        Err(e) => return Err(e).context("failed to load configuration"),
    };
    let defaults = DeploymentConfig::default();
    let config = loaded.as_ref().unwrap_or(&defaults);

    let registry = ServiceRegistry::from_config(&workspace.project_root, config);
    let orchestrator = build_orchestrator(workspace, registry)?;
    let rows = orchestrator.status_report().await;

    report::dashboard(&workspace.project_root, &rows, loaded.as_ref());
    Ok(())
}

async fn check(workspace: &Workspace, verbose: bool, json: bool) -> Result<()> {
    // A missing or broken config is itself reported by the checks
    let config = DeploymentConfig::load(&workspace.project_root).unwrap_or_else(|e| {
        warn!("{}; checking against default ports", e);
        DeploymentConfig::default()
    });
    let registry = ServiceRegistry::from_config(&workspace.project_root, &config);

    let validator = SystemValidator::new(
        &workspace.project_root,
        Box::new(TokioCommandRunner::new()),
        Box::new(SysinfoHostProbe::new()),
    )
    .with_service_names(registry.iter().map(|definition| definition.service_name.clone()))
    .with_config_ports(&config);

    if !json {
        report::check_header();
    }
    let results = validator.run_all_checks().await;
    let summary = summarize(&results);

    if json {
        report::json(&CheckReport {
            results: &results,
            summary,
        })
    } else {
        report::check(&results, &summary, verbose);
        Ok(())
    }
}

async fn lifecycle(workspace: &Workspace, operation: Operation, target: &str) -> Result<()> {
    let config = DeploymentConfig::load(&workspace.project_root)?;
    let registry = ServiceRegistry::from_config(&workspace.project_root, &config);
    let orchestrator = build_orchestrator(workspace, registry)?;

    if let Ok(false) = deploy_windows::elevation::is_elevated() {
        report::warning("Not running as Administrator; service changes will likely be refused");
    }

    report::progress(operation, target);
    if target == ALL_SERVICES {
        let bulk = orchestrator.apply_all(operation).await;
        report::bulk(&bulk);
    } else {
        let outcome = orchestrator.apply(operation, target).await;
        report::outcome(&outcome);
    }
    Ok(())
}

fn show_config(workspace: &Workspace, json: bool) -> Result<()> {
    let config = DeploymentConfig::load(&workspace.project_root)?;
    let errors = config.validate();

    if json {
        report::json(&ConfigReport {
            project_root: &workspace.project_root,
            config: &config,
            errors: &errors,
        })
    } else {
        report::config(&workspace.project_root, &config, &errors);
        Ok(())
    }
}

fn build_orchestrator(
    workspace: &Workspace,
    registry: ServiceRegistry,
) -> Result<ServiceOrchestrator<NssmServiceControl>> {
    let control = NssmServiceControl::locate(&workspace.project_root, workspace.nssm_path.as_deref())?;
    info!("using NSSM at {}", control.nssm_path().display());
    Ok(ServiceOrchestrator::new(registry, control)
        .with_interrupt(workspace.interrupt.clone()))
}

/// Ask before removing services. Declining, Esc and Ctrl-C all count as "no".
async fn confirm_uninstall(target: &str) -> Result<bool> {
    let prompt = format!("Are you sure you want to uninstall {}?", target);
    let answer = tokio::task::spawn_blocking(move || {
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(prompt)
            .default(false)
            .interact_opt()
    })
    .await
    .context("confirmation prompt failed")?;

    match answer {
        Ok(choice) => Ok(choice.unwrap_or(false)),
        Err(dialoguer::Error::IO(e)) if e.kind() == std::io::ErrorKind::Interrupted => Ok(false),
        Err(e) => Err(e).context("confirmation prompt failed"),
    }
}
