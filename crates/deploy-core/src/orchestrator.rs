use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use deploy_platform::service::{OperationOutcome, ServiceControl, ServiceDefinition, ServiceStatus};

use crate::registry::ServiceRegistry;

/// Pause between the stop and start halves of a restart
pub const SETTLE_INTERVAL: Duration = Duration::from_secs(2);

/// Lifecycle operations the orchestrator can apply to one service or all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Install,
    Uninstall,
    Start,
    Stop,
    Restart,
}

impl Operation {
    pub fn verb(self) -> &'static str {
        match self {
            Operation::Install => "install",
            Operation::Uninstall => "uninstall",
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Restart => "restart",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Operator interrupt shared between the signal handler and the orchestrator.
/// Bulk operations stop issuing calls once it is raised; a call already handed
/// to the OS runs to completion or timeout.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One dashboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRow {
    pub key: String,
    pub service_name: String,
    pub display_name: String,
    pub status: ServiceStatus,
}

/// Per-service outcomes of a bulk operation, in registry order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    entries: Vec<(String, OperationOutcome)>,
}

impl BulkOutcome {
    fn push(&mut self, key: &str, outcome: OperationOutcome) {
        self.entries.push((key.to_string(), outcome));
    }

    pub fn get(&self, key: &str) -> Option<&OperationOutcome> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, outcome)| outcome)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OperationOutcome)> {
        self.entries.iter().map(|(key, outcome)| (key.as_str(), outcome))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn all_succeeded(&self) -> bool {
        self.entries.iter().all(|(_, outcome)| outcome.success)
    }
}

/// Applies lifecycle commands to registered services, checking preconditions
/// against freshly queried status. Operations run one at a time.
pub struct ServiceOrchestrator<C> {
    registry: ServiceRegistry,
    control: C,
    settle_interval: Duration,
    interrupt: Interrupt,
}

impl<C: ServiceControl> ServiceOrchestrator<C> {
    pub fn new(registry: ServiceRegistry, control: C) -> Self {
        Self {
            registry,
            control,
            settle_interval: SETTLE_INTERVAL,
            interrupt: Interrupt::new(),
        }
    }

    pub fn with_settle_interval(mut self, interval: Duration) -> Self {
        self.settle_interval = interval;
        self
    }

    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    pub fn control(&self) -> &C {
        &self.control
    }

    /// Current status of every registered service, in registry order.
    pub async fn status_report(&self) -> Vec<StatusRow> {
        let mut rows = Vec::with_capacity(self.registry.len());
        for definition in self.registry.iter() {
            let status = self.control.query_status(&definition.service_name).await;
            rows.push(StatusRow {
                key: definition.key.clone(),
                service_name: definition.service_name.clone(),
                display_name: definition.display_name.clone(),
                status,
            });
        }
        rows
    }

    pub async fn apply(&self, operation: Operation, key: &str) -> OperationOutcome {
        let definition = match self.registry.definition_for(key) {
            Ok(definition) => definition,
            Err(e) => {
                warn!("{} requested for {}: {}", operation, key, e);
                return OperationOutcome::failure(e.to_string());
            }
        };

        match operation {
            Operation::Install => self.install_definition(definition).await,
            Operation::Uninstall => self.uninstall_definition(definition).await,
            Operation::Start => self.start_definition(definition).await,
            Operation::Stop => self.stop_definition(definition).await,
            Operation::Restart => self.restart_definition(definition).await,
        }
    }

    /// Apply `operation` to every service in registry order. A failure never
    /// stops the remaining services; an interrupt does, leaving them out of
    /// the outcome.
    pub async fn apply_all(&self, operation: Operation) -> BulkOutcome {
        let mut bulk = BulkOutcome::default();
        for definition in self.registry.iter() {
            if self.interrupt.is_raised() {
                warn!("{} all interrupted before {}", operation, definition.key);
                break;
            }
            let outcome = self.apply(operation, &definition.key).await;
            bulk.push(&definition.key, outcome);
        }
        bulk
    }

    pub async fn install(&self, key: &str) -> OperationOutcome {
        self.apply(Operation::Install, key).await
    }

    pub async fn uninstall(&self, key: &str) -> OperationOutcome {
        self.apply(Operation::Uninstall, key).await
    }

    pub async fn start(&self, key: &str) -> OperationOutcome {
        self.apply(Operation::Start, key).await
    }

    pub async fn stop(&self, key: &str) -> OperationOutcome {
        self.apply(Operation::Stop, key).await
    }

    pub async fn restart(&self, key: &str) -> OperationOutcome {
        self.apply(Operation::Restart, key).await
    }

    pub async fn install_all(&self) -> BulkOutcome {
        self.apply_all(Operation::Install).await
    }

    pub async fn uninstall_all(&self) -> BulkOutcome {
        self.apply_all(Operation::Uninstall).await
    }

    pub async fn start_all(&self) -> BulkOutcome {
        self.apply_all(Operation::Start).await
    }

    pub async fn stop_all(&self) -> BulkOutcome {
        self.apply_all(Operation::Stop).await
    }

    pub async fn restart_all(&self) -> BulkOutcome {
        self.apply_all(Operation::Restart).await
    }

    async fn install_definition(&self, definition: &ServiceDefinition) -> OperationOutcome {
        let status = self.control.query_status(&definition.service_name).await;
        match status {
            ServiceStatus::NotInstalled => {}
            ServiceStatus::Unknown => {
                return OperationOutcome::failure(format!(
                    "Cannot install {}: status is Unknown",
                    definition.service_name
                ));
            }
            _ => {
                return OperationOutcome::failure(format!(
                    "Service {} is already installed",
                    definition.service_name
                ));
            }
        }
        info!("installing {}", definition.service_name);
        self.control.install(definition).await
    }

    async fn uninstall_definition(&self, definition: &ServiceDefinition) -> OperationOutcome {
        let status = self.control.query_status(&definition.service_name).await;
        if status == ServiceStatus::NotInstalled {
            return OperationOutcome::success(format!(
                "Service {} is not installed",
                definition.service_name
            ));
        }
        info!("uninstalling {} (status: {})", definition.service_name, status);
        self.control
            .uninstall(definition, status == ServiceStatus::Running)
            .await
    }

    async fn start_definition(&self, definition: &ServiceDefinition) -> OperationOutcome {
        let status = self.control.query_status(&definition.service_name).await;
        if status == ServiceStatus::Paused {
            info!("resuming paused service {}", definition.service_name);
            return self.control.resume(definition).await;
        }
        info!("starting {}", definition.service_name);
        self.control.start(definition).await
    }

    async fn stop_definition(&self, definition: &ServiceDefinition) -> OperationOutcome {
        info!("stopping {}", definition.service_name);
        self.control.stop(definition).await
    }

    async fn restart_definition(&self, definition: &ServiceDefinition) -> OperationOutcome {
        let stopped = self.stop_definition(definition).await;
        if !stopped.success {
            warn!("restart of {} aborted: {}", definition.service_name, stopped);
            return stopped;
        }
        tokio::time::sleep(self.settle_interval).await;
        self.start_definition(definition).await
    }
}
