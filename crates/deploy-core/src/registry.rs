use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

use deploy_platform::service::ServiceDefinition;

use crate::config::DeploymentConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown service: {0}")]
    UnknownService(String),
    #[error("duplicate service key: {0}")]
    DuplicateKey(String),
}

/// Ordered set of managed services. Declaration order drives bulk operations
/// and the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRegistry {
    definitions: Vec<ServiceDefinition>,
}

impl ServiceRegistry {
    pub fn new(definitions: Vec<ServiceDefinition>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for definition in &definitions {
            if !seen.insert(definition.key.as_str()) {
                return Err(RegistryError::DuplicateKey(definition.key.clone()));
            }
        }
        Ok(Self { definitions })
    }

    /// The Woosoo stack: Reverb, the queue worker and nginx.
    pub fn from_config(project_root: &Path, config: &DeploymentConfig) -> Self {
        let backend = project_path(project_root, &config.backend_dir);
        let php = PathBuf::from("php");

        let definitions = vec![
            ServiceDefinition {
                key: "reverb".to_string(),
                service_name: "woosoo-reverb".to_string(),
                display_name: "Woosoo Reverb WebSocket Server".to_string(),
                description: "Laravel Reverb WebSocket server for real-time communication"
                    .to_string(),
                executable: php.clone(),
                arguments: vec![
                    "artisan".to_string(),
                    "reverb:start".to_string(),
                    "--host=0.0.0.0".to_string(),
                    format!("--port={}", config.reverb_port),
                ],
                working_directory: backend.clone(),
            },
            ServiceDefinition {
                key: "queue".to_string(),
                service_name: "woosoo-queue-worker".to_string(),
                display_name: "Woosoo Queue Worker".to_string(),
                description: "Laravel queue worker for background job processing".to_string(),
                executable: php,
                arguments: vec![
                    "artisan".to_string(),
                    "queue:work".to_string(),
                    "--tries=3".to_string(),
                    "--timeout=90".to_string(),
                ],
                working_directory: backend,
            },
            ServiceDefinition {
                key: "nginx".to_string(),
                service_name: "woosoo-nginx".to_string(),
                display_name: "Woosoo Nginx Server".to_string(),
                description: "Nginx web server for Woosoo applications".to_string(),
                executable: project_path(project_root, &config.nginx_exe),
                arguments: vec![
                    "-c".to_string(),
                    project_path(project_root, &config.nginx_config)
                        .to_string_lossy()
                        .into_owned(),
                ],
                working_directory: project_root.to_path_buf(),
            },
        ];

        Self { definitions }
    }

    pub fn definition_for(&self, key: &str) -> Result<&ServiceDefinition, RegistryError> {
        self.definitions
            .iter()
            .find(|definition| definition.key == key)
            .ok_or_else(|| RegistryError::UnknownService(key.to_string()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.definitions.iter().map(|definition| definition.key.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ServiceDefinition> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

/// Join a config-relative path onto the project root. Both `/` and `\` separate
/// components so the result uses the host separator. A rooted value replaces
/// the project root.
pub fn project_path(project_root: &Path, relative: &str) -> PathBuf {
    let as_given = Path::new(relative);
    if as_given.has_root() {
        return as_given.to_path_buf();
    }
    relative
        .split(['/', '\\'])
        .filter(|component| !component.is_empty() && *component != ".")
        .fold(project_root.to_path_buf(), |path, component| path.join(component))
}
