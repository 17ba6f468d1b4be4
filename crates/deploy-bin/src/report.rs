//! Terminal rendering for command results. Everything here writes to stdout.

use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use serde::Serialize;

use deploy_core::config::DeploymentConfig;
use deploy_core::orchestrator::{BulkOutcome, Operation, StatusRow};
use deploy_core::validator::{Severity, ValidationResult, ValidationSummary};
use deploy_platform::service::{OperationOutcome, ServiceStatus};

const TITLE: &str = "WOOSOO DEPLOYMENT MANAGER";

fn header() {
    println!(
        "{} {}",
        style(TITLE).bold().cyan(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim()
    );
}

fn section(title: &str) {
    println!();
    println!("{}", style(format!("=== {} ===", title)).bold().cyan());
}

fn status_cell(status: ServiceStatus) -> String {
    let text = match status {
        ServiceStatus::Running => format!("● {}", status),
        ServiceStatus::Stopped => format!("○ {}", status),
        ServiceStatus::Paused => format!("⏸ {}", status),
        ServiceStatus::NotInstalled => format!("✕ {}", status),
        ServiceStatus::Unknown => format!("? {}", status),
    };
    match status {
        ServiceStatus::Running => style(text).green().to_string(),
        ServiceStatus::Stopped | ServiceStatus::Paused => style(text).yellow().to_string(),
        ServiceStatus::NotInstalled | ServiceStatus::Unknown => style(text).dim().to_string(),
    }
}

fn key_values(rows: &[(&str, String)]) {
    let width = rows.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    for (key, value) in rows {
        println!("  {}  {}", style(format!("{:<width$}", key)).cyan(), value);
    }
}

pub fn dashboard(project_root: &Path, rows: &[StatusRow], config: Option<&DeploymentConfig>) {
    header();

    section("Services Status");
    let key_width = rows.iter().map(|r| r.key.len()).max().unwrap_or(0).max("Service".len());
    let name_width = rows
        .iter()
        .map(|r| r.service_name.len())
        .max()
        .unwrap_or(0)
        .max("Service Name".len());
    let display_width = rows
        .iter()
        .map(|r| r.display_name.len())
        .max()
        .unwrap_or(0)
        .max("Display Name".len());

    println!(
        "  {}",
        style(format!(
            "{:<key_width$}  {:<name_width$}  {:<display_width$}  Status",
            "Service", "Service Name", "Display Name"
        ))
        .bold()
        .magenta()
    );
    for row in rows {
        println!(
            "  {}  {:<name_width$}  {:<display_width$}  {}",
            style(format!("{:<key_width$}", row.key)).cyan(),
            row.service_name,
            row.display_name,
            status_cell(row.status)
        );
    }

    match config {
        Some(config) => {
            section("Configuration");
            let mut summary = config.summary();
            summary.push(("Project Root", project_root.display().to_string()));
            key_values(&summary);
        }
        None => {
            println!();
            println!(
                "{}",
                style("⚠ Configuration not found: deployment.config.env").yellow()
            );
            println!(
                "{}",
                style("Copy deployment.config.env.template and fill in your values").dim()
            );
        }
    }

    println!();
    println!("{}", style("Use --help to see available commands").dim());
}

pub fn check_header() {
    section("Running Pre-Flight Checks");
    println!();
}

fn severity_color(result: &ValidationResult, text: String) -> String {
    if result.passed {
        return style(text).green().to_string();
    }
    match result.level {
        Severity::Critical => style(text).red().to_string(),
        Severity::High => style(text).yellow().to_string(),
        Severity::Medium | Severity::Low => style(text).blue().to_string(),
    }
}

pub fn check(results: &[ValidationResult], summary: &ValidationSummary, verbose: bool) {
    for result in results {
        let icon = if result.passed { "✓" } else { "✗" };
        let name = severity_color(result, format!("{} {}", icon, result.name));
        println!("{} - {}", name, result.message);
        if verbose && !result.passed && !result.recommendation.is_empty() {
            println!("  {}", style(format!("→ {}", result.recommendation)).dim());
        }
    }

    println!();
    println!(
        "{} {} | {} {} | {} {} | {} {}",
        style("Total:").bold(),
        summary.total,
        style("Passed:").green(),
        summary.passed,
        style("Failed:").red(),
        summary.failed,
        style("Critical:").bold().red(),
        summary.critical_failed
    );

    println!();
    if summary.can_proceed {
        println!(
            "{}",
            style("✓ All critical checks passed - ready for deployment").bold().green()
        );
    } else {
        println!(
            "{}",
            style("✗ Critical checks failed - cannot proceed").bold().red()
        );
    }
}

fn gerund(operation: Operation) -> &'static str {
    match operation {
        Operation::Install => "Installing",
        Operation::Uninstall => "Uninstalling",
        Operation::Start => "Starting",
        Operation::Stop => "Stopping",
        Operation::Restart => "Restarting",
    }
}

pub fn progress(operation: Operation, target: &str) {
    println!();
    println!("{}", style(format!("{} {}...", gerund(operation), target)).cyan());
}

fn outcome_line(prefix: Option<&str>, outcome: &OperationOutcome) -> String {
    let icon = if outcome.success { "✓" } else { "✗" };
    let text = match prefix {
        Some(key) => format!("{} {}: {}", icon, key, outcome.message),
        None => format!("{} {}", icon, outcome.message),
    };
    if outcome.success {
        style(text).green().to_string()
    } else {
        style(text).red().to_string()
    }
}

pub fn outcome(outcome: &OperationOutcome) {
    println!("{}", outcome_line(None, outcome));
}

pub fn bulk(bulk: &BulkOutcome) {
    for (key, outcome) in bulk.iter() {
        println!("{}", outcome_line(Some(key), outcome));
    }
}

pub fn config(project_root: &Path, config: &DeploymentConfig, errors: &[String]) {
    println!();
    println!("{}", style("Current Configuration:").bold().cyan());
    let mut summary = config.summary();
    summary.push(("Project Root", project_root.display().to_string()));
    key_values(&summary);

    println!();
    if errors.is_empty() {
        println!("{}", style("✓ Configuration is valid").green());
    } else {
        println!("{}", style("✗ Configuration has errors:").red());
        for error in errors {
            println!("  {}", style(format!("• {}", error)).red());
        }
    }
}

pub fn version() {
    println!();
    println!("{}", style("Woosoo Deployment Manager").bold().cyan());
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "Platform: {} ({})",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    println!();
}

pub fn warning(message: &str) {
    println!("{}", style(format!("⚠ {}", message)).yellow());
}

pub fn cancelled() {
    println!();
    println!("{}", style("Operation cancelled by user").yellow());
}

pub fn json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to serialize report")?;
    println!("{}", rendered);
    Ok(())
}
