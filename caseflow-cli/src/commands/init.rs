//! `caseflow init` - writes a starter caseflow.yaml

use std::fs;
use std::path::Path;

use anyhow::{Context, bail};

use caseflow_core::config::{CONFIG_NAMES, ConsoleConfig};

const STARTER: &str = r#"version: "1"
name: {name}

# Remove this section to run against the built-in demo data.
backend:
  base_url: http://localhost:8080
  username: {user}
  # Read the password from the environment rather than this file.
  password_env: CASEFLOW_PASSWORD
  timeout_ms: 15000
  # Only for test servers with self-signed certificates.
  accept_invalid_certs: false

search:
  default_page_size: 10
  page_sizes: [5, 10, 25, 50]
  # An empty search lists cases created in the last N months.
  recent_months: 3

# Process templates shown in the process monitor.
# Leave empty to ask the backend for its list.
processes: []
#  - id: LoanApproval
#    title: Loan approval

# log_file: /tmp/caseflow.log
"#;

pub fn render_starter(name: &str, user: &str) -> String {
    STARTER.replace("{name}", name).replace("{user}", user)
}

/// Run the init command
pub fn run_init(yes: bool) -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("failed to get current directory")?;
    run_init_in(&cwd, yes)
}

fn run_init_in(dir: &Path, yes: bool) -> anyhow::Result<()> {
    for name in &CONFIG_NAMES {
        let path = dir.join(name);
        if path.exists() {
            if !yes {
                bail!(
                    "config file {} already exists. Use --yes to overwrite.",
                    path.display()
                );
            }
            println!("Overwriting existing config: {}", path.display());
        }
    }

    let name = dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("caseflow");
    let user = std::env::var("USER").unwrap_or_else(|_| "operator".into());
    let yaml = render_starter(name, &user);

    // never write something the loader would reject
    ConsoleConfig::from_str(&yaml).context("generated config is invalid")?;

    let path = dir.join(CONFIG_NAMES[0]);
    fs::write(&path, yaml).with_context(|| format!("failed to write {}", path.display()))?;

    println!("Created {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. Point backend.base_url at your case console API");
    println!("  2. export CASEFLOW_PASSWORD=...");
    println!("  3. caseflow doctor");
    println!("  4. caseflow");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starter_config_loads() {
        let config = ConsoleConfig::from_str(&render_starter("ops-desk", "jdoe")).unwrap();
        assert_eq!(config.name.as_deref(), Some("ops-desk"));
        let backend = config.backend.unwrap();
        assert_eq!(backend.username.as_deref(), Some("jdoe"));
        assert_eq!(backend.password_env.as_deref(), Some("CASEFLOW_PASSWORD"));
        assert_eq!(config.search.recent_months, 3);
        assert!(config.processes.is_empty());
    }

    #[test]
    fn refuses_to_overwrite_without_yes() {
        let dir = std::env::temp_dir().join(format!("caseflow-init-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("caseflow.yaml"), "version: \"1\"\n").unwrap();

        assert!(run_init_in(&dir, false).is_err());
        run_init_in(&dir, true).unwrap();
        let written = fs::read_to_string(dir.join("caseflow.yaml")).unwrap();
        assert!(written.contains("password_env"));

        fs::remove_dir_all(&dir).unwrap();
    }
}
