mod demo;
mod rest;

use std::path::PathBuf;
use std::sync::Arc;

use caseflow_core::backend::CaseBackend;
use caseflow_core::config::{ConfigError, ConsoleConfig};
use tracing::{info, warn};

pub use demo::DemoBackend;
pub use rest::RestBackend;

/// Where the session's configuration came from.
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => write!(f, "built-in defaults"),
        }
    }
}

/// Discover the config file. A missing file is not an error; a broken one is.
pub fn load_config() -> anyhow::Result<(ConfigSource, ConsoleConfig)> {
    let cwd = std::env::current_dir()?;
    match ConsoleConfig::discover(&cwd) {
        Ok((path, config)) => {
            info!(path = %path.display(), "loaded config");
            Ok((ConfigSource::File(path), config))
        }
        Err(ConfigError::NotFound { .. }) => Ok((ConfigSource::Defaults, ConsoleConfig::default())),
        Err(e) => Err(e.into()),
    }
}

/// Pick the backend: the configured REST API, or the demo data when
/// `demo` is forced or no backend section exists.
pub fn build(config: &ConsoleConfig, demo: bool) -> anyhow::Result<Arc<dyn CaseBackend>> {
    match (&config.backend, demo) {
        (Some(backend), false) => {
            let rest = RestBackend::new(backend)?;
            info!(base_url = rest.base_url(), "using REST backend");
            Ok(Arc::new(rest))
        }
        (Some(_), true) => {
            warn!("--demo given; ignoring configured backend");
            Ok(Arc::new(DemoBackend::new()))
        }
        (None, _) => {
            info!("no backend configured, running in demo mode");
            Ok(Arc::new(DemoBackend::new()))
        }
    }
}
