use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::DatabricksMcpError;

/// Placeholder shown instead of secrets
pub const REDACTED: &str = "***";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub databricks: DatabricksConfig,
    pub server: ServerConfig,
    pub runtime: RuntimeConfig,
}

/// Workspace connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabricksConfig {
    pub host: String,
    pub token: String,
    pub sql_warehouse_id: Option<String>,
    pub default_catalog: String,
    pub default_schema: String,
    pub cluster_id: Option<String>,
    pub request_timeout_ms: u64,
}

impl Default for DatabricksConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            token: String::new(),
            sql_warehouse_id: None,
            default_catalog: "main".to_string(),
            default_schema: "default".to_string(),
            cluster_id: None,
            request_timeout_ms: 60000,
        }
    }
}

impl DatabricksConfig {
    /// Host must be an http(s) URL and a token must be present
    pub fn validate(&self) -> std::result::Result<(), DatabricksMcpError> {
        if self.host.trim().is_empty() {
            return Err(DatabricksMcpError::Config("DATABRICKS_HOST is required".to_string()));
        }
        if !(self.host.starts_with("https://") || self.host.starts_with("http://")) {
            return Err(DatabricksMcpError::Config(format!(
                "DATABRICKS_HOST must start with http:// or https:// (got '{}')",
                self.host
            )));
        }
        if self.token.trim().is_empty() {
            return Err(DatabricksMcpError::Config("DATABRICKS_TOKEN is required".to_string()));
        }
        Ok(())
    }
}

/// Tool server behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    pub max_results: u32,
    pub default_row_limit: u32,
    pub query_timeout_secs: u64,
    pub statement_wait_secs: u64,
    pub poll_interval_ms: u64,
    pub enable_query_validation: bool,
    pub allowed_statements: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            max_results: 1000,
            default_row_limit: 100,
            query_timeout_secs: 300,
            statement_wait_secs: 30,
            poll_interval_ms: 500,
            enable_query_validation: true,
            allowed_statements: crate::sql::DEFAULT_ALLOWED_STATEMENTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Force the container hint instead of probing
    pub in_container: Option<bool>,
    pub worker_thread_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            in_container: None,
            worker_thread_name: "dispatch-worker".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            databricks: DatabricksConfig::default(),
            server: ServerConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_or_warn<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
    match value.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("Ignoring {}={:?}: not a valid value", key, value);
            None
        }
    }
}

impl Config {
    /// Load configuration with fallback chain, then apply environment overrides
    pub fn resolve(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load(config_path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Overlay values from the environment; `lookup` is `std::env::var` in production
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DATABRICKS_HOST") {
            self.databricks.host = v.trim().trim_end_matches('/').to_string();
        }
        if let Some(v) = get("DATABRICKS_TOKEN") {
            self.databricks.token = v.trim().to_string();
        }
        if let Some(v) = get("DATABRICKS_SQL_WAREHOUSE_ID") {
            self.databricks.sql_warehouse_id = Some(v);
        }
        if let Some(v) = get("DEFAULT_CATALOG") {
            self.databricks.default_catalog = v;
        }
        if let Some(v) = get("DEFAULT_SCHEMA") {
            self.databricks.default_schema = v;
        }
        if let Some(v) = get("DATABRICKS_CLUSTER_ID") {
            self.databricks.cluster_id = Some(v);
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.log_level = Some(v.to_lowercase());
        }
        if let Some(v) = get("MAX_RESULTS").and_then(|v| parse_or_warn::<u32>("MAX_RESULTS", &v)) {
            if v == 0 {
                log::warn!("Ignoring MAX_RESULTS=0: must be at least 1");
            } else {
                self.server.max_results = v;
            }
        }
        if let Some(v) = get("QUERY_TIMEOUT").and_then(|v| parse_or_warn("QUERY_TIMEOUT", &v)) {
            self.server.query_timeout_secs = v;
        }
        if let Some(v) = get("ENABLE_QUERY_VALIDATION") {
            match parse_flag(&v) {
                Some(flag) => self.server.enable_query_validation = flag,
                None => log::warn!("Ignoring ENABLE_QUERY_VALIDATION={:?}: expected true/false", v),
            }
        }
        if let Some(v) = get("DOCKER_CONTAINER").and_then(|v| parse_flag(&v)) {
            self.runtime.in_container.get_or_insert(v);
        }
    }

    /// Copy safe to print: the token is masked
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.databricks.token.is_empty() {
            copy.databricks.token = REDACTED.to_string();
        }
        copy
    }
}
