use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

/// Name of the deployment configuration file in the project root
pub const CONFIG_FILE_NAME: &str = "deployment.config.env";

const MIN_PORT: u32 = 1024;
const MAX_PORT: u32 = 65535;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "configuration file not found: {}\nCopy deployment.config.env.template to deployment.config.env and fill in your values.",
        .path.display()
    )]
    NotFound { path: PathBuf },
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{key} must be a number, got {value:?}")]
    InvalidNumber { key: String, value: String },
}

/// Settings read from `deployment.config.env`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentConfig {
    pub deployment_env: String,
    pub server_ip: String,
    pub use_tls: bool,

    pub nginx_https_port: u32,
    pub nginx_http_port: u32,
    pub reverb_port: u32,
    pub mysql_port: u32,

    pub tls_cert_path: String,
    pub tls_key_path: String,

    pub reverb_app_id: String,
    #[serde(skip_serializing)]
    pub reverb_app_key: String,
    #[serde(skip_serializing)]
    pub reverb_app_secret: String,

    pub db_name: String,
    pub db_username: String,
    #[serde(skip_serializing)]
    pub db_password: String,
    pub db_pos_name: String,
    pub db_pos_username: String,
    #[serde(skip_serializing)]
    pub db_pos_password: String,

    pub app_name: String,
    #[serde(skip_serializing)]
    pub app_key: String,
    pub app_debug: bool,
    pub log_level: String,

    /// Paths relative to the project root; `/` and `\` are both accepted
    pub backend_dir: String,
    pub pwa_dir: String,
    pub relay_dir: String,
    pub nginx_exe: String,
    pub nginx_config: String,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            deployment_env: "production".to_string(),
            server_ip: "192.168.100.85".to_string(),
            use_tls: true,
            nginx_https_port: 8000,
            nginx_http_port: 80,
            reverb_port: 6001,
            mysql_port: 3306,
            tls_cert_path: "certs/cert.pem".to_string(),
            tls_key_path: "certs/key.pem".to_string(),
            reverb_app_id: String::new(),
            reverb_app_key: String::new(),
            reverb_app_secret: String::new(),
            db_name: "woosoo_api".to_string(),
            db_username: "root".to_string(),
            db_password: String::new(),
            db_pos_name: "krypton_woosoo".to_string(),
            db_pos_username: "root".to_string(),
            db_pos_password: String::new(),
            app_name: "Woosoo".to_string(),
            app_key: String::new(),
            app_debug: false,
            log_level: "error".to_string(),
            backend_dir: "apps/woosoo-nexus".to_string(),
            pwa_dir: "apps/tablet-ordering-pwa".to_string(),
            relay_dir: "apps/relay-device-v2".to_string(),
            nginx_exe: "bin/nginx/nginx.exe".to_string(),
            nginx_config: "configs/nginx.conf".to_string(),
        }
    }
}

impl DeploymentConfig {
    /// Location of the config file for a project root
    pub fn path_in(project_root: &Path) -> PathBuf {
        project_root.join(CONFIG_FILE_NAME)
    }

    /// Load `deployment.config.env` from the project root.
    pub fn load(project_root: &Path) -> Result<Self, ConfigError> {
        let path = Self::path_in(project_root);
        if !path.is_file() {
            return Err(ConfigError::NotFound { path });
        }
        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        debug!("loading config from {}", path.display());
        Self::parse(&contents)
    }

    /// Parse `KEY=value` text; absent keys take their defaults.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        Self::from_values(&parse_env(contents))
    }

    fn from_values(values: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let text = |key: &str, default: String| values.get(key).cloned().unwrap_or(default);
        let flag = |key: &str, default: bool| {
            values
                .get(key)
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(default)
        };
        let port = |key: &str, default: u32| -> Result<u32, ConfigError> {
            match values.get(key) {
                Some(value) => value.parse().map_err(|_| ConfigError::InvalidNumber {
                    key: key.to_string(),
                    value: value.clone(),
                }),
                None => Ok(default),
            }
        };

        Ok(Self {
            deployment_env: text("DEPLOYMENT_ENV", defaults.deployment_env),
            server_ip: text("SERVER_IP", defaults.server_ip),
            use_tls: flag("USE_TLS", defaults.use_tls),
            nginx_https_port: port("NGINX_HTTPS_PORT", defaults.nginx_https_port)?,
            nginx_http_port: port("NGINX_HTTP_PORT", defaults.nginx_http_port)?,
            reverb_port: port("REVERB_PORT", defaults.reverb_port)?,
            mysql_port: port("MYSQL_PORT", defaults.mysql_port)?,
            tls_cert_path: text("TLS_CERT_PATH", defaults.tls_cert_path),
            tls_key_path: text("TLS_KEY_PATH", defaults.tls_key_path),
            reverb_app_id: text("REVERB_APP_ID", defaults.reverb_app_id),
            reverb_app_key: text("REVERB_APP_KEY", defaults.reverb_app_key),
            reverb_app_secret: text("REVERB_APP_SECRET", defaults.reverb_app_secret),
            db_name: text("DB_NAME", defaults.db_name),
            db_username: text("DB_USERNAME", defaults.db_username),
            db_password: text("DB_PASSWORD", defaults.db_password),
            db_pos_name: text("DB_POS_NAME", defaults.db_pos_name),
            db_pos_username: text("DB_POS_USERNAME", defaults.db_pos_username),
            db_pos_password: text("DB_POS_PASSWORD", defaults.db_pos_password),
            app_name: text("APP_NAME", defaults.app_name),
            app_key: text("APP_KEY", defaults.app_key),
            app_debug: flag("APP_DEBUG", defaults.app_debug),
            log_level: text("LOG_LEVEL", defaults.log_level),
            backend_dir: text("BACKEND_DIR", defaults.backend_dir),
            pwa_dir: text("PWA_DIR", defaults.pwa_dir),
            relay_dir: text("RELAY_DIR", defaults.relay_dir),
            nginx_exe: text("NGINX_EXE", defaults.nginx_exe),
            nginx_config: text("NGINX_CONFIG", defaults.nginx_config),
        })
    }

    /// Ports the stack listens on, in the order they are reported
    pub fn ports(&self) -> [(&'static str, u32); 4] {
        [
            ("NGINX_HTTPS_PORT", self.nginx_https_port),
            ("NGINX_HTTP_PORT", self.nginx_http_port),
            ("REVERB_PORT", self.reverb_port),
            ("MYSQL_PORT", self.mysql_port),
        ]
    }

    /// Completeness and range checks. An empty list means the config is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.server_ip.is_empty() {
            errors.push("SERVER_IP is required".to_string());
        } else if self.server_ip.parse::<Ipv4Addr>().is_err() {
            errors.push(format!("Invalid IP address: {}", self.server_ip));
        }

        if self.app_key.is_empty() {
            errors.push("APP_KEY is required (generate with: php artisan key:generate)".to_string());
        }

        for (name, value) in self.ports() {
            if !(MIN_PORT..=MAX_PORT).contains(&value) {
                errors.push(format!("{} must be between {}-{}", name, MIN_PORT, MAX_PORT));
            }
        }

        errors
    }

    /// Human-readable summary for the dashboard and `config` command. Secrets are omitted.
    pub fn summary(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Environment", self.deployment_env.clone()),
            ("Server IP", self.server_ip.clone()),
            ("HTTPS Port", self.nginx_https_port.to_string()),
            ("HTTP Port", self.nginx_http_port.to_string()),
            ("WebSocket Port", self.reverb_port.to_string()),
            ("TLS Enabled", if self.use_tls { "Yes" } else { "No" }.to_string()),
            ("Database", self.db_name.clone()),
        ]
    }
}

/// Parse `KEY=value` lines. Blank lines and `#` comments are skipped, and an
/// inline comment (whitespace followed by `#`) is stripped from the value.
pub fn parse_env(contents: &str) -> HashMap<String, String> {
    let mut values = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = strip_inline_comment(line);
        if let Some((key, value)) = line.split_once('=') {
            values.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    values
}

fn strip_inline_comment(line: &str) -> &str {
    let mut previous_was_space = false;
    for (index, c) in line.char_indices() {
        if c == '#' && previous_was_space {
            return line[..index].trim_end();
        }
        previous_was_space = c.is_whitespace();
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_comments_and_blanks() {
        let values = parse_env(
            "# Woosoo deployment\n\
             \n\
             SERVER_IP=10.0.0.5   # office LAN\n\
             APP_KEY=base64:abc#def\n\
             DB_PASSWORD = s3cret \n\
             not a pair\n",
        );
        assert_eq!(values.get("SERVER_IP").map(String::as_str), Some("10.0.0.5"));
        // '#' without preceding whitespace is part of the value
        assert_eq!(values.get("APP_KEY").map(String::as_str), Some("base64:abc#def"));
        assert_eq!(values.get("DB_PASSWORD").map(String::as_str), Some("s3cret"));
        assert_eq!(values.len(), 3);
    }

    #[test]
    fn test_value_may_contain_equals() {
        let values = parse_env("APP_KEY=base64:k3y==\n");
        assert_eq!(values.get("APP_KEY").map(String::as_str), Some("base64:k3y=="));
    }

    #[test]
    fn test_missing_keys_use_defaults() {
        let config = DeploymentConfig::parse("").unwrap();
        assert_eq!(config, DeploymentConfig::default());
        assert_eq!(config.reverb_port, 6001);
        assert_eq!(config.backend_dir, "apps/woosoo-nexus");
        assert!(config.use_tls);
        assert!(!config.app_debug);
    }

    #[test]
    fn test_flags_are_case_insensitive() {
        let config = DeploymentConfig::parse("USE_TLS=FALSE\nAPP_DEBUG=True\n").unwrap();
        assert!(!config.use_tls);
        assert!(config.app_debug);
    }

    #[test]
    fn test_non_numeric_port_is_error() {
        let err = DeploymentConfig::parse("REVERB_PORT=six\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { ref key, .. } if key == "REVERB_PORT"));
    }

    #[test]
    fn test_validate_reports_problems() {
        let config = DeploymentConfig::parse(
            "SERVER_IP=10.0.0\nNGINX_HTTP_PORT=80\nREVERB_PORT=70000\n",
        )
        .unwrap();
        let errors = config.validate();
        assert_eq!(
            errors,
            vec![
                "Invalid IP address: 10.0.0".to_string(),
                "APP_KEY is required (generate with: php artisan key:generate)".to_string(),
                "NGINX_HTTP_PORT must be between 1024-65535".to_string(),
                "REVERB_PORT must be between 1024-65535".to_string(),
            ]
        );
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        let config = DeploymentConfig::parse(
            "SERVER_IP=192.168.1.20\nAPP_KEY=base64:xyz\nNGINX_HTTP_PORT=8080\n",
        )
        .unwrap();
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_summary_omits_secrets() {
        let config = DeploymentConfig::parse("DB_PASSWORD=hunter2\nAPP_KEY=base64:xyz\n").unwrap();
        let rendered = format!("{:?}", config.summary());
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("base64:xyz"));
    }
}
