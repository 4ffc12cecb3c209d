//! Interactive console.

mod app;
mod draw;

use std::io;
use std::time::{Duration, SystemTime};

use crossterm::{
    event::{self, Event as CEvent},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{debug, info};

use caseflow_core::console::Console;
use caseflow_core::notices::NoticeLevel;

use app::{Action, App};

fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

pub async fn run_tui(console: Console, title: String) -> anyhow::Result<()> {
    let mut terminal = setup_terminal()?;
    let result = event_loop(&mut terminal, console, &title).await;
    restore_terminal(terminal)?;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    console: Console,
    title: &str,
) -> anyhow::Result<()> {
    info!(backend = console.backend_name(), "console started");
    let state = console.state();
    let mut events = console.subscribe();
    let mut app = App::new();
    let mut seen_notice: Option<SystemTime> = None;

    // recent cases on startup
    perform(&console, Action::Search(String::new()));

    loop {
        loop {
            match events.try_recv() {
                Ok(env) => debug!(id = env.id, "event applied"),
                Err(TryRecvError::Lagged(n)) => debug!(skipped = n, "event stream lagged"),
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }

        {
            let snapshot = state.read().await;
            let latest = snapshot.notices.latest().map(|n| n.at);
            if latest.is_some() && latest != seen_notice {
                seen_notice = latest;
                app.show_toast();
            }
            app.clamp(&snapshot);
            terminal.draw(|f| draw::draw(f, &app, &snapshot, title))?;
        }

        if app.should_quit {
            break;
        }

        if !event::poll(Duration::from_millis(50))? {
            continue;
        }
        let CEvent::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != event::KeyEventKind::Press {
            continue;
        }

        let actions = {
            let snapshot = state.read().await;
            app.handle_key(key, &snapshot)
        };
        for action in actions {
            perform(&console, action);
        }
    }

    info!("console closed");
    Ok(())
}

/// Run an action in the background; results arrive through the state.
fn perform(console: &Console, action: Action) {
    let console = console.clone();
    tokio::spawn(async move {
        match action {
            Action::Search(term) => console.search(&term).await,
            Action::ClearSearch => console.clear_search().await,
            Action::NextPage => {
                console.next_page().await;
            }
            Action::PrevPage => {
                console.prev_page().await;
            }
            Action::CyclePageSize => {
                console.cycle_page_size().await;
            }
            Action::SelectCase(case) => console.select_case(case).await,
            Action::Reload => {
                if !console.reload().await {
                    console
                        .notify(NoticeLevel::Info, "select a case first")
                        .await;
                }
            }
            Action::SelectWorkflow(index) => {
                console.select_workflow(index).await;
            }
            Action::SelectActivity(index) => {
                console.select_activity(index).await;
            }
            Action::Restart(workflow_id) => {
                console.restart_workflow(&workflow_id).await;
            }
            Action::Retry {
                workflow_id,
                activity_id,
            } => {
                console.retry_activity(&workflow_id, &activity_id).await;
            }
            Action::LoadProcesses => console.load_processes().await,
            Action::SelectProcess(id) => console.select_process(&id).await,
            Action::InstancesPage(page) => {
                console.change_instances_page(page).await;
            }
            Action::Notice(text) => console.notify(NoticeLevel::Warn, text).await,
        }
    });
}
