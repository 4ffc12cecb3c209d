use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "caseflow_core=info,caseflow_cli=info";

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into())
}

/// One-shot commands log to stderr so stdout stays parseable.
pub fn init_stderr() {
    let _ = tracing_subscriber::registry()
        .with(filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

/// The TUI owns the terminal, so its logs go to a file.
pub fn init_file(configured: Option<&Path>) -> anyhow::Result<PathBuf> {
    let path = configured
        .map(Path::to_path_buf)
        .unwrap_or_else(|| std::env::temp_dir().join("caseflow.log"));
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let _ = tracing_subscriber::registry()
        .with(filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .try_init();
    Ok(path)
}
