mod backends;
mod commands;
mod logging;
mod tui;
mod ui;

use clap::{Parser, Subcommand};
use tracing::info;

use caseflow_core::console::Console;

use commands::oneshot::{self, Output};

#[derive(Parser)]
#[command(name = "caseflow")]
#[command(about = "Inspect case workflows and remediate stuck activities", long_about = None)]
struct Cli {
    /// Use the built-in demo data even if a backend is configured
    #[arg(long, global = true)]
    demo: bool,

    /// Machine-readable output for one-shot commands
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter caseflow.yaml
    Init {
        #[arg(short, long)]
        yes: bool,
    },
    /// Check configuration and backend connectivity
    Doctor,
    /// Interactive console (default)
    Tui,
    /// Search cases by case number; without a term, list recent cases
    Search {
        term: Option<String>,
        #[arg(short, long, default_value_t = 1)]
        page: u32,
        #[arg(short, long)]
        size: Option<u32>,
    },
    /// Show the workflows attached to a case
    Workflows {
        /// Case number or object id
        case: String,
    },
    /// Restart a workflow
    Restart {
        workflow: String,
        #[arg(long)]
        case: String,
    },
    /// Retry a failed or halted activity
    Retry {
        workflow: String,
        activity: String,
        #[arg(long)]
        case: String,
    },
    /// Print the event trail of an activity
    Log { case: String, activity: String },
    /// List process templates
    Processes,
    /// List running instances of a process
    Instances {
        process: String,
        #[arg(short, long, default_value_t = 1)]
        page: u32,
        #[arg(short, long)]
        size: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Tui);

    match command {
        Commands::Init { yes } => {
            logging::init_stderr();
            return commands::run_init(yes);
        }
        Commands::Doctor => {
            logging::init_stderr();
            return commands::run_doctor(cli.demo).await;
        }
        Commands::Tui => return run_tui(cli.demo).await,
        _ => logging::init_stderr(),
    }

    let size = match &command {
        Commands::Search { size, .. } | Commands::Instances { size, .. } => *size,
        _ => None,
    };
    let console = open_console(cli.demo, size)?;
    let out = Output { json: cli.json };

    match command {
        Commands::Search { term, page, .. } => {
            oneshot::search(&console, &out, term.as_deref().unwrap_or(""), page).await
        }
        Commands::Workflows { case } => oneshot::workflows(&console, &out, &case).await,
        Commands::Restart { workflow, case } => {
            oneshot::restart(&console, &out, &workflow, &case).await
        }
        Commands::Retry {
            workflow,
            activity,
            case,
        } => oneshot::retry(&console, &out, &workflow, &activity, &case).await,
        Commands::Log { case, activity } => oneshot::log(&console, &out, &case, &activity).await,
        Commands::Processes => oneshot::processes(&console, &out).await,
        Commands::Instances { process, page, .. } => {
            oneshot::instances(&console, &out, &process, page).await
        }
        Commands::Init { .. } | Commands::Doctor | Commands::Tui => Ok(()),
    }
}

fn open_console(demo: bool, size: Option<u32>) -> anyhow::Result<Console> {
    let (source, config) = backends::load_config()?;
    info!(source = %source, "configuration");
    let mut settings = config.settings();
    if let Some(size) = size {
        anyhow::ensure!(size > 0, "--size must be at least 1");
        settings.page_size = size;
    }
    let backend = backends::build(&config, demo)?;
    Ok(Console::new(backend, settings))
}

async fn run_tui(demo: bool) -> anyhow::Result<()> {
    let (source, config) = backends::load_config()?;
    let log_path = logging::init_file(config.log_file.as_deref())?;
    info!(source = %source, log = %log_path.display(), "starting console");

    let backend = backends::build(&config, demo)?;
    let title = match (&config.name, backend.name()) {
        (Some(name), kind) => format!("{} ({})", name, kind),
        (None, kind) => kind.to_string(),
    };
    let console = Console::new(backend, config.settings());
    tui::run_tui(console, title).await
}
