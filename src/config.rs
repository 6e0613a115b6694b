//! Configuration management for robot-deploy.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::{AccessPolicy, ServerConfig};
use crate::cli::Args;
use crate::deploy::DeploymentContext;
use crate::execution::{BoundedRunner, Shell};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerSection,
    /// Command runner configuration.
    pub runner: RunnerSection,
    /// Paths, robot account and remote layout used by deployments.
    pub deploy: DeploymentContext,
    /// API keys and CORS origins.
    pub security: SecuritySection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Enable graceful shutdown.
    pub graceful_shutdown: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            graceful_shutdown: true,
        }
    }
}

/// Runner configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSection {
    /// Timeout for commands that do not set their own.
    pub default_timeout_secs: u64,
    /// Shell used to interpret command lines.
    pub shell: Shell,
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            default_timeout_secs: 60,
            shell: Shell::platform_default(),
        }
    }
}

impl RunnerSection {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }
}

/// Security configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    /// Bearer keys accepted by `POST /api/v1/execute`. Empty disables it.
    pub api_keys: Vec<String>,
    /// Browser origins allowed cross-origin access. Empty means none.
    pub allowed_origins: Vec<String>,
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace) or a full filter.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Apply overrides from a variable lookup.
    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(host) = var("ROBOT_DEPLOY_HOST") {
            self.server.host = host;
        }

        if let Some(port) = var("ROBOT_DEPLOY_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ConfigError::InvalidValue("ROBOT_DEPLOY_PORT", port))?;
        }

        if let Some(timeout) = var("ROBOT_DEPLOY_TIMEOUT") {
            self.runner.default_timeout_secs = timeout
                .parse()
                .map_err(|_| ConfigError::InvalidValue("ROBOT_DEPLOY_TIMEOUT", timeout))?;
        }

        if let Some(key) = var("ROBOT_DEPLOY_API_KEY") {
            self.add_api_key(key);
        }

        if let Some(level) = var("ROBOT_DEPLOY_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = var("RUST_LOG") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Apply CLI argument overrides. Only flags that were given override.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(host) = args.host {
            self.server.host = host.to_string();
        }

        if let Some(port) = args.port {
            self.server.port = port;
        }

        if let Some(timeout) = args.timeout {
            self.runner.default_timeout_secs = timeout;
        }

        if let Some(ref key) = args.api_key {
            self.add_api_key(key.clone());
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    fn add_api_key(&mut self, key: String) {
        if !key.is_empty() && !self.security.api_keys.contains(&key) {
            self.security.api_keys.push(key);
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env()?;
        config.apply_args(args);
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.runner.default_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "runner.default_timeout_secs",
                "0".to_string(),
            ));
        }
        Ok(())
    }

    /// Convert to ServerConfig for the API server.
    pub fn to_server_config(&self) -> Result<ServerConfig, ConfigError> {
        let host: IpAddr = self
            .server
            .host
            .parse()
            .map_err(|_| ConfigError::InvalidHost(self.server.host.clone()))?;

        let mut server_config = ServerConfig::new(host.to_string(), self.server.port);
        server_config.graceful_shutdown = self.server.graceful_shutdown;
        Ok(server_config)
    }

    /// Build the access policy described by the `security` section.
    pub fn access_policy(&self) -> AccessPolicy {
        let policy = self
            .security
            .api_keys
            .iter()
            .fold(AccessPolicy::new(), |p, key| p.with_api_key(key.as_str()));
        self.security
            .allowed_origins
            .iter()
            .fold(policy, |p, origin| p.with_allowed_origin(origin))
    }

    /// Build the runner described by the `runner` section.
    pub fn runner(&self) -> BoundedRunner {
        BoundedRunner::new()
            .with_default_timeout(self.runner.default_timeout())
            .with_shell(self.runner.shell.clone())
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// Invalid host address.
    InvalidHost(String),
    /// A value that does not parse or is out of range.
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidHost(host) => write!(f, "invalid host address: {}", host),
            Self::InvalidValue(name, value) => {
                write!(f, "invalid value for {}: '{}'", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for crate::Error {
    fn from(e: ConfigError) -> Self {
        crate::Error::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.runner.default_timeout(), Duration::from_secs(60));
        assert_eq!(config.deploy.robot_user, "nao");
        assert_eq!(config.log_filter(), "info");
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "server": {
                "host": "0.0.0.0",
                "port": 8080
            },
            "runner": {
                "default_timeout_secs": 5,
                "shell": { "program": "/bin/bash", "flag": "-c" }
            },
            "deploy": {
                "robot_user": "pepper",
                "remote_dir": "/opt/cbsr"
            }
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.runner.default_timeout_secs, 5);
        assert_eq!(config.runner.shell.program, "/bin/bash");
        assert_eq!(config.deploy.robot_user, "pepper");
        assert_eq!(config.deploy.remote_dir, "/opt/cbsr");
        assert_eq!(config.deploy.logs.len(), 5);
    }

    #[test]
    fn test_security_section_from_file() {
        let json = r#"{
            "security": {
                "api_keys": ["file-key"],
                "allowed_origins": ["http://10.0.0.2:8080"]
            }
        }"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        let policy = config.access_policy();
        assert!(policy.authorize(Some("Bearer file-key")).is_ok());
        assert!(policy.cors_layer().is_some());
    }

    #[test]
    fn test_config_partial_json() {
        let json = r#"{
            "server": {
                "port": 9000
            }
        }"#;

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_config_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_apply_vars() {
        let mut config = Config::default();
        config
            .apply_vars(vars(&[
                ("ROBOT_DEPLOY_HOST", "0.0.0.0"),
                ("ROBOT_DEPLOY_PORT", "8081"),
                ("ROBOT_DEPLOY_TIMEOUT", "15"),
                ("RUST_LOG", "debug"),
            ]))
            .unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.runner.default_timeout_secs, 15);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_api_key_from_env_and_args() {
        let mut config = Config::default();
        config
            .apply_vars(vars(&[("ROBOT_DEPLOY_API_KEY", "env-key")]))
            .unwrap();
        config.apply_args(&Args {
            api_key: Some("cli-key".to_string()),
            ..Args::default()
        });
        config.apply_args(&Args {
            api_key: Some("cli-key".to_string()),
            ..Args::default()
        });

        assert_eq!(config.security.api_keys, vec!["env-key", "cli-key"]);
        assert!(config.access_policy().execution_enabled());
    }

    #[test]
    fn test_default_access_policy_is_closed() {
        let policy = Config::default().access_policy();
        assert!(!policy.execution_enabled());
        assert!(policy.cors_layer().is_none());
    }

    #[test]
    fn test_log_level_var_wins_over_rust_log() {
        let mut config = Config::default();
        config
            .apply_vars(vars(&[
                ("ROBOT_DEPLOY_LOG_LEVEL", "warn"),
                ("RUST_LOG", "trace"),
            ]))
            .unwrap();
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_apply_vars_rejects_bad_port() {
        let mut config = Config::default();
        let err = config
            .apply_vars(vars(&[("ROBOT_DEPLOY_PORT", "http")]))
            .unwrap_err();
        assert!(err.to_string().contains("ROBOT_DEPLOY_PORT"));
    }

    #[test]
    fn test_apply_args() {
        let mut config = Config::default();
        let args = Args {
            host: Some("192.168.1.1".parse().unwrap()),
            port: Some(5000),
            timeout: Some(30),
            log_level: Some("debug".to_string()),
            ..Args::default()
        };

        config.apply_args(&args);

        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.runner.default_timeout_secs, 30);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_absent_args_keep_file_values() {
        let mut config = Config::default();
        config.server.port = 9000;
        config.apply_args(&Args::default());
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_load_rejects_zero_timeout() {
        let args = Args {
            timeout: Some(0),
            ..Args::default()
        };
        assert!(Config::load(&args).is_err());
    }

    #[test]
    fn test_to_server_config() {
        let mut config = Config::default();
        config.server.graceful_shutdown = false;
        let server_config = config.to_server_config().unwrap();

        assert_eq!(server_config.host, "127.0.0.1");
        assert_eq!(server_config.port, 3000);
        assert!(!server_config.graceful_shutdown);
    }

    #[test]
    fn test_invalid_host() {
        let mut config = Config::default();
        config.server.host = "not-an-ip".to_string();

        let result = config.to_server_config();
        assert!(result.is_err());
    }

    #[test]
    fn test_runner_from_config() {
        let mut config = Config::default();
        config.runner.default_timeout_secs = 7;
        assert_eq!(config.runner().default_timeout(), Duration::from_secs(7));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"host\""));
        assert!(json.contains("\"default_timeout_secs\""));
        assert!(json.contains("\"remote_dir\""));
    }
}
