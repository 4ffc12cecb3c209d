use std::fs::OpenOptions;
use std::time::Instant;

use caseflow_core::backend::{CaseBackend, SearchQuery};
use caseflow_core::config::ConsoleConfig;

use crate::backends::{self, ConfigSource};

#[derive(Debug)]
pub struct Check {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub hint: Option<String>,
}

impl Check {
    fn ok(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: message.into(),
            hint: None,
        }
    }

    fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: message.into(),
            hint: None,
        }
    }

    fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

pub async fn run_doctor(demo: bool) -> anyhow::Result<()> {
    println!("Caseflow Doctor\n");

    let mut checks: Vec<Check> = Vec::new();

    println!("Configuration:");
    let config = match backends::load_config() {
        Ok((ConfigSource::File(path), config)) => {
            checks.push(Check::ok("config", path.display().to_string()));
            config
        }
        Ok((ConfigSource::Defaults, config)) => {
            checks.push(
                Check::ok("config", "not found, using defaults (demo mode)")
                    .with_hint("Run `caseflow init` to create one"),
            );
            config
        }
        Err(e) => {
            checks.push(Check::fail("config", e.to_string()));
            print_all(&checks);
            return summarize(&checks);
        }
    };
    checks.extend(config_checks(&config));
    print_all(&checks);
    println!();

    println!("Backend:");
    let mut backend_checks = Vec::new();
    match backends::build(&config, demo) {
        Ok(backend) => backend_checks.extend(connectivity_checks(backend.as_ref()).await),
        Err(e) => backend_checks.push(Check::fail("client", e.to_string())),
    }
    print_all(&backend_checks);
    println!();
    checks.extend(backend_checks);

    summarize(&checks)
}

fn print_all(checks: &[Check]) {
    for check in checks {
        print_check(check);
    }
}

fn print_check(check: &Check) {
    let icon = if check.passed { "✓" } else { "✗" };
    let color = if check.passed { "\x1b[32m" } else { "\x1b[31m" };
    let reset = "\x1b[0m";

    println!(
        "  {}{}{} {}: {}",
        color, icon, reset, check.name, check.message
    );

    if let Some(hint) = &check.hint {
        println!("    └─ {}", hint);
    }
}

fn summarize(checks: &[Check]) -> anyhow::Result<()> {
    let failed: Vec<_> = checks.iter().filter(|c| !c.passed).collect();
    if failed.is_empty() {
        println!("All checks passed!");
        return Ok(());
    }

    println!("Issues found:");
    for check in &failed {
        println!("  - {}: {}", check.name, check.message);
        if let Some(hint) = &check.hint {
            println!("    Hint: {}", hint);
        }
    }
    anyhow::bail!("{} check(s) failed", failed.len())
}

fn config_checks(config: &ConsoleConfig) -> Vec<Check> {
    let mut checks = Vec::new();

    match &config.backend {
        None => checks.push(Check::ok("backend", "none configured (demo data)")),
        Some(backend) => {
            checks.push(Check::ok("base_url", backend.base_url.clone()));
            match (&backend.username, backend.resolve_password()) {
                (None, _) => checks.push(
                    Check::ok("auth", "anonymous")
                        .with_hint("Set backend.username if the API requires basic auth"),
                ),
                (Some(user), Ok(Some(_))) => {
                    checks.push(Check::ok("auth", format!("basic auth as {}", user)))
                }
                (Some(user), Ok(None)) => checks.push(
                    Check::fail("auth", format!("no password for {}", user))
                        .with_hint("Set backend.password_env to a variable holding the password"),
                ),
                (Some(_), Err(e)) => checks.push(
                    Check::fail("auth", e.to_string()).with_hint("Export the variable and retry"),
                ),
            }
            if backend.accept_invalid_certs {
                checks.push(
                    Check::ok("tls", "certificate verification DISABLED")
                        .with_hint("Only use accept_invalid_certs against test servers"),
                );
            }
        }
    }

    let search = &config.search;
    if search.page_sizes.contains(&search.default_page_size) || search.page_sizes.is_empty() {
        checks.push(Check::ok(
            "page sizes",
            format!("{:?}, default {}", search.page_sizes, search.default_page_size),
        ));
    } else {
        checks.push(
            Check::fail(
                "page sizes",
                format!(
                    "default {} is not one of {:?}",
                    search.default_page_size, search.page_sizes
                ),
            )
            .with_hint("Add the default to search.page_sizes"),
        );
    }

    if let Some(path) = &config.log_file {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(_) => checks.push(Check::ok("log file", path.display().to_string())),
            Err(e) => checks.push(Check::fail(
                "log file",
                format!("{}: {}", path.display(), e),
            )),
        }
    }

    checks
}

async fn connectivity_checks(backend: &dyn CaseBackend) -> Vec<Check> {
    let mut checks = vec![Check::ok("kind", backend.name())];

    let started = Instant::now();
    let query = SearchQuery {
        case_number: None,
        created_after: None,
        page: 1,
        page_size: 1,
    };
    match backend.search_cases(&query).await {
        Ok(_) => checks.push(Check::ok(
            "case search",
            format!("ok in {} ms", started.elapsed().as_millis()),
        )),
        Err(e) if e.is_transport() => checks.push(
            Check::fail("case search", e.to_string())
                .with_hint("Check backend.base_url, credentials and network access"),
        ),
        Err(e) => checks.push(
            Check::fail("case search", e.to_string())
                .with_hint("The API is reachable but reported an error"),
        ),
    }

    match backend.process_templates().await {
        Ok(templates) => checks.push(Check::ok(
            "processes",
            format!("{} template(s)", templates.len()),
        )),
        Err(e) => checks.push(Check::fail("processes", e.to_string())),
    }

    checks
}
