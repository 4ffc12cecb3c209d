use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backend::ProcessTemplate;
use crate::state::ConsoleSettings;

pub const CONFIG_NAMES: [&str; 4] = [
    "caseflow.yaml",
    "caseflow.yml",
    ".caseflow.yaml",
    ".caseflow.yml",
];

pub const CONFIG_ENV: &str = "CASEFLOW_CONFIG";

/// Where the console API lives and how to authenticate against it.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Base URL of the console API, e.g. `https://bpm.example.com/console`
    pub base_url: String,

    #[serde(default)]
    pub username: Option<String>,

    /// Inline password. Prefer `password_env`.
    #[serde(default)]
    pub password: Option<String>,

    /// Environment variable holding the password
    #[serde(default)]
    pub password_env: Option<String>,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Skip TLS certificate verification (self-signed test servers)
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

fn default_timeout_ms() -> u64 {
    15_000
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// The password, read from `password_env` when set.
    pub fn resolve_password(&self) -> Result<Option<String>, ConfigError> {
        if let Some(var) = &self.password_env {
            return match std::env::var(var) {
                Ok(value) => Ok(Some(value)),
                Err(_) => Err(ConfigError::MissingSecret { var: var.clone() }),
            };
        }
        Ok(self.password.clone())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SearchConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    #[serde(default = "default_page_sizes")]
    pub page_sizes: Vec<u32>,

    /// How far back an empty search looks
    #[serde(default = "default_recent_months")]
    pub recent_months: u32,
}

fn default_page_size() -> u32 {
    10
}
fn default_page_sizes() -> Vec<u32> {
    vec![5, 10, 25, 50]
}
fn default_recent_months() -> u32 {
    3
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            page_sizes: default_page_sizes(),
            recent_months: default_recent_months(),
        }
    }
}

/// Root configuration file structure
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ConsoleConfig {
    #[serde(default = "default_version")]
    pub version: String,

    /// Label shown in the header
    #[serde(default)]
    pub name: Option<String>,

    /// Absent means demo mode
    #[serde(default)]
    pub backend: Option<BackendConfig>,

    #[serde(default)]
    pub search: SearchConfig,

    /// Process templates offered in the process monitor; empty asks the backend
    #[serde(default)]
    pub processes: Vec<ProcessTemplate>,

    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_version() -> String {
    "1".into()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: String, reason: String },
    #[error("password variable {var} is not set")]
    MissingSecret { var: String },
    #[error("no config file found, searched: {searched:?}")]
    NotFound { searched: Vec<PathBuf> },
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl ConsoleConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: ConsoleConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Look in `$CASEFLOW_CONFIG`, then `start_dir` and each parent.
    pub fn discover(start_dir: &Path) -> Result<(PathBuf, Self), ConfigError> {
        let mut searched = Vec::new();

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Ok((path.clone(), Self::load(&path)?));
            }
            searched.push(path);
        }

        let mut dir = Some(start_dir);
        while let Some(current) = dir {
            for name in &CONFIG_NAMES {
                let path = current.join(name);
                if path.exists() {
                    return Ok((path.clone(), Self::load(&path)?));
                }
                searched.push(path);
            }
            dir = current.parent();
        }

        Err(ConfigError::NotFound { searched })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(backend) = &self.backend {
            let url = backend.base_url.trim();
            if url.is_empty() {
                return Err(ConfigError::invalid("backend.base_url", "must not be empty"));
            }
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::invalid(
                    "backend.base_url",
                    format!("'{}' is not an http(s) URL", url),
                ));
            }
            if backend.timeout_ms == 0 {
                return Err(ConfigError::invalid("backend.timeout_ms", "must be positive"));
            }
            if backend.password.is_some() && backend.password_env.is_some() {
                return Err(ConfigError::invalid(
                    "backend.password",
                    "set either password or password_env, not both",
                ));
            }
        }

        if self.search.default_page_size == 0 {
            return Err(ConfigError::invalid(
                "search.default_page_size",
                "must be positive",
            ));
        }
        if self.search.page_sizes.contains(&0) {
            return Err(ConfigError::invalid(
                "search.page_sizes",
                "page sizes must be positive",
            ));
        }

        for (i, process) in self.processes.iter().enumerate() {
            if process.id.trim().is_empty() {
                return Err(ConfigError::invalid(
                    "processes",
                    format!("entry {} has an empty id", i + 1),
                ));
            }
        }

        Ok(())
    }

    pub fn is_demo(&self) -> bool {
        self.backend.is_none()
    }

    pub fn settings(&self) -> ConsoleSettings {
        ConsoleSettings {
            page_size: self.search.default_page_size,
            page_sizes: self.search.page_sizes.clone(),
            recent_months: self.search.recent_months,
            processes: self.processes.clone(),
        }
    }
}
