//! Non-interactive subcommands: query, act, print, exit.

use anyhow::{anyhow, bail};
use serde_json::json;

use caseflow_core::activity_log::activity_log;
use caseflow_core::console::Console;
use caseflow_core::dispatch::DispatchOutcome;
use caseflow_core::inspection::ViewPhase;
use caseflow_core::model::{Case, WorkflowInstance, display_time};
use caseflow_core::search::PagePhase;

pub struct Output {
    pub json: bool,
}

impl Output {
    fn emit(&self, value: serde_json::Value, text: impl FnOnce() -> String) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(&value)?);
        } else {
            print!("{}", text());
        }
        Ok(())
    }
}

fn clip(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

pub async fn search(console: &Console, out: &Output, term: &str, page: u32) -> anyhow::Result<()> {
    console.search_at(term, page).await;

    let state = console.state();
    let state = state.read().await;
    let pager = state.search.pager();
    if let PagePhase::Failed { message } = pager.phase() {
        bail!("{}", message);
    }

    let cursor = pager.cursor();
    let total = pager
        .total_estimate()
        .map(|t| t.to_string())
        .unwrap_or_else(|| "0".into());
    let value = json!({
        "term": state.search.term(),
        "page": cursor.page,
        "page_size": cursor.page_size,
        "has_more": cursor.has_more,
        "total": total,
        "cases": pager.items(),
    });

    out.emit(value, || {
        let mut text = String::new();
        if pager.items().is_empty() {
            text.push_str("No cases found.\n");
            return text;
        }
        text.push_str(&format!(
            "{:>4}  {:<10} {:<18} {:<10} {:<16} {}\n",
            "#", "CASE", "ID", "OFFICE", "CREATED", "SUBJECT"
        ));
        for (i, case) in pager.items().iter().enumerate() {
            text.push_str(&format!(
                "{:>4}  {:<10} {:<18} {:<10} {:<16} {}\n",
                pager.row_number(i),
                case.case_number,
                case.id,
                case.office.as_deref().unwrap_or("-"),
                display_time(case.created_at.as_deref()),
                clip(case.subject.as_deref().unwrap_or(""), 40),
            ));
        }
        if let Some((from, to)) = pager.range() {
            text.push_str(&format!(
                "\nShowing {}-{} of {} results (page {})\n",
                from, to, total, cursor.page
            ));
        }
        text
    })
}

/// Repository object ids are 16 hex digits, e.g. `0b00000000001001`.
fn looks_like_object_id(arg: &str) -> bool {
    arg.len() == 16 && arg.chars().all(|c| c.is_ascii_hexdigit())
}

/// Accept either a case number or a repository object id.
async fn resolve_case(console: &Console, arg: &str) -> anyhow::Result<Case> {
    console.search_at(arg, 1).await;
    let state = console.state();
    let state = state.read().await;
    if let PagePhase::Failed { message } = state.search.pager().phase() {
        bail!("case lookup failed: {}", message);
    }

    let found = state
        .search
        .cases()
        .iter()
        .find(|c| c.case_number.eq_ignore_ascii_case(arg) || c.id == arg)
        .cloned();
    match found {
        Some(case) => Ok(case),
        None if looks_like_object_id(arg) => Ok(Case {
            id: arg.to_string(),
            case_number: arg.to_string(),
            ..Default::default()
        }),
        None => bail!("case {} not found", arg),
    }
}

async fn inspect(console: &Console, case_arg: &str) -> anyhow::Result<()> {
    let case = resolve_case(console, case_arg).await?;
    console.select_case(case).await;
    let state = console.state();
    let state = state.read().await;
    if let ViewPhase::Error { message } = state.inspection.phase() {
        bail!("{}", message);
    }
    Ok(())
}

fn workflow_text(wf: &WorkflowInstance) -> String {
    let status = wf.status();
    let mut text = format!(
        "{} {} [{}] {}  supervisor {}  started {}\n",
        status.icon(),
        wf.id,
        status.label(),
        wf.process_name,
        wf.supervisor.as_deref().unwrap_or("-"),
        display_time(wf.started_at.as_deref()),
    );
    for act in &wf.activities {
        let act_status = act.status();
        text.push_str(&format!(
            "    {:>3}  {} {:<24} {:<10} {:<12} {}{}\n",
            act.sequence,
            act_status.icon(),
            clip(&act.display_name(), 24),
            act_status.label(),
            act.performer.as_deref().unwrap_or("-"),
            act.id,
            if act.is_retryable() { "  (retryable)" } else { "" },
        ));
    }
    text
}

pub async fn workflows(console: &Console, out: &Output, case_arg: &str) -> anyhow::Result<()> {
    inspect(console, case_arg).await?;
    let state = console.state();
    let state = state.read().await;
    let inspection = &state.inspection;
    let case = inspection.case().ok_or_else(|| anyhow!("no case selected"))?;

    let value = json!({
        "case": case,
        "count": inspection.workflows().len(),
        "workflows": inspection
            .workflows()
            .iter()
            .map(|wf| json!({
                "workflow": wf,
                "status": wf.status().label(),
            }))
            .collect::<Vec<_>>(),
    });
    out.emit(value, || {
        if inspection.is_empty() {
            return format!("Case {} has no workflows.\n", case.case_number);
        }
        let mut text = format!(
            "Case {} ({} workflow(s))\n\n",
            case.case_number,
            inspection.workflows().len()
        );
        for wf in inspection.workflows() {
            text.push_str(&workflow_text(wf));
            text.push('\n');
        }
        text
    })
}

async fn report(
    console: &Console,
    out: &Output,
    outcome: DispatchOutcome,
    what: String,
) -> anyhow::Result<()> {
    let notice = {
        let state = console.state();
        let state = state.read().await;
        state.notices.latest().map(|n| n.text.clone())
    };
    match outcome {
        DispatchOutcome::Succeeded => out.emit(
            json!({"ok": true, "command": &what, "message": &notice}),
            || format!("{}\n", notice.as_deref().unwrap_or(&what)),
        ),
        DispatchOutcome::Rejected => Err(anyhow!("{} is already in progress", what)),
        DispatchOutcome::Failed(err) => Err(anyhow::Error::new(err).context(what)),
    }
}

pub async fn restart(
    console: &Console,
    out: &Output,
    workflow_id: &str,
    case_arg: &str,
) -> anyhow::Result<()> {
    inspect(console, case_arg).await?;
    if console.state().read().await.inspection.workflow(workflow_id).is_none() {
        bail!("workflow {} does not belong to case {}", workflow_id, case_arg);
    }
    let outcome = console.restart_workflow(workflow_id).await;
    report(console, out, outcome, format!("restart workflow {}", workflow_id)).await
}

pub async fn retry(
    console: &Console,
    out: &Output,
    workflow_id: &str,
    activity_id: &str,
    case_arg: &str,
) -> anyhow::Result<()> {
    inspect(console, case_arg).await?;
    let enabled = console.retry_enabled(workflow_id, activity_id).await;
    if !enabled {
        let state = console.state();
        let state = state.read().await;
        return match state.inspection.find_activity(workflow_id, activity_id) {
            Some(act) => Err(anyhow!(
                "activity {} is {} and cannot be retried",
                activity_id,
                act.status().label().to_lowercase()
            )),
            None => Err(anyhow!(
                "activity {} not found in workflow {} of case {}",
                activity_id,
                workflow_id,
                case_arg
            )),
        };
    }
    let outcome = console.retry_activity(workflow_id, activity_id).await;
    report(
        console,
        out,
        outcome,
        format!("retry activity {} of {}", activity_id, workflow_id),
    )
    .await
}

pub async fn log(
    console: &Console,
    out: &Output,
    case_arg: &str,
    activity_id: &str,
) -> anyhow::Result<()> {
    inspect(console, case_arg).await?;
    let state = console.state();
    let state = state.read().await;
    let act = state
        .inspection
        .workflows()
        .iter()
        .find_map(|wf| wf.activity(activity_id))
        .ok_or_else(|| anyhow!("activity {} not found in case {}", activity_id, case_arg))?;

    let lines = activity_log(act);
    out.emit(json!({"activity": act, "log": lines}), || {
        lines.iter().map(|l| format!("{}\n", l)).collect()
    })
}

pub async fn processes(console: &Console, out: &Output) -> anyhow::Result<()> {
    console.load_processes().await;
    let state = console.state();
    let state = state.read().await;
    if let Some(err) = state.processes.templates_error() {
        bail!("{}", err);
    }
    let templates = state.processes.templates();
    out.emit(json!(templates), || {
        templates
            .iter()
            .map(|t| format!("{:<20} {}\n", t.id, t.display_name()))
            .collect()
    })
}

pub async fn instances(
    console: &Console,
    out: &Output,
    process: &str,
    page: u32,
) -> anyhow::Result<()> {
    console.select_process(process).await;
    if page > 1 {
        console.change_instances_page(page).await;
    }

    let state = console.state();
    let state = state.read().await;
    let pager = state.processes.pager();
    if let PagePhase::Failed { message } = pager.phase() {
        bail!("{}", message);
    }
    let total = pager
        .total_estimate()
        .map(|t| t.to_string())
        .unwrap_or_else(|| "0".into());

    out.emit(
        json!({
            "process": process,
            "page": pager.cursor().page,
            "page_size": pager.cursor().page_size,
            "has_more": pager.cursor().has_more,
            "total": total,
            "instances": pager.items(),
        }),
        || {
            if pager.items().is_empty() {
                return format!("No running instances of {}.\n", process);
            }
            let mut text = String::new();
            for (i, wf) in pager.items().iter().enumerate() {
                text.push_str(&format!(
                    "{:>4}  {} {:<18} {:<10} {:<10} {}\n",
                    pager.row_number(i),
                    wf.status().icon(),
                    wf.id,
                    wf.status().label(),
                    wf.supervisor.as_deref().unwrap_or("-"),
                    display_time(wf.started_at.as_deref()),
                ));
            }
            text.push_str(&format!("\n{} instance(s)\n", total));
            text
        },
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use caseflow_core::backend::{
        BackendError, CaseBackend, CommandAck, Page, ProcessTemplate, SearchPage, SearchQuery,
    };
    use caseflow_core::state::ConsoleSettings;

    use super::*;
    use crate::backends::DemoBackend;

    fn demo_console() -> Console {
        let demo = DemoBackend::new().with_latency(Duration::ZERO);
        Console::new(Arc::new(demo), ConsoleSettings::default())
    }

    /// Every call fails as if the repository were unreachable.
    struct Unreachable;

    fn down(operation: &str) -> BackendError {
        BackendError::transport(operation, "connection refused")
    }

    #[async_trait]
    impl CaseBackend for Unreachable {
        fn name(&self) -> &'static str {
            "unreachable"
        }

        async fn search_cases(&self, _query: &SearchQuery) -> Result<SearchPage, BackendError> {
            Err(down("search cases"))
        }

        async fn workflows_for_case(
            &self,
            _case_id: &str,
        ) -> Result<Vec<WorkflowInstance>, BackendError> {
            Err(down("load workflows"))
        }

        async fn restart_workflow(&self, _workflow_id: &str) -> Result<CommandAck, BackendError> {
            Err(down("restart workflow"))
        }

        async fn retry_activity(
            &self,
            _workflow_id: &str,
            _activity_id: &str,
        ) -> Result<CommandAck, BackendError> {
            Err(down("retry activity"))
        }

        async fn process_templates(&self) -> Result<Vec<ProcessTemplate>, BackendError> {
            Err(down("list processes"))
        }

        async fn running_workflows(
            &self,
            _process_id: &str,
            _page: u32,
            _page_size: u32,
        ) -> Result<Page<WorkflowInstance>, BackendError> {
            Err(down("list instances"))
        }
    }

    #[tokio::test]
    async fn known_case_number_resolves() {
        let console = demo_console();
        let case = resolve_case(&console, "c-1001").await.unwrap();
        assert_eq!(case.case_number, "C-1001");
        assert_eq!(case.id, "0b00000000001001");
    }

    #[tokio::test]
    async fn unknown_case_number_is_not_found() {
        let console = demo_console();
        let err = resolve_case(&console, "C-9999").await.unwrap_err();
        assert_eq!(err.to_string(), "case C-9999 not found");

        let out = Output { json: true };
        assert!(workflows(&console, &out, "C-9999").await.is_err());
        assert!(console.state().read().await.inspection.case().is_none());
    }

    #[tokio::test]
    async fn object_id_is_used_directly() {
        let console = demo_console();
        let case = resolve_case(&console, "0b00000000001002").await.unwrap();
        assert_eq!(case.id, "0b00000000001002");
    }

    #[tokio::test]
    async fn failed_lookup_is_reported_not_empty() {
        let console = Console::new(Arc::new(Unreachable), ConsoleSettings::default());
        let err = resolve_case(&console, "C-1001").await.unwrap_err();
        assert!(err.to_string().starts_with("case lookup failed"), "{}", err);
    }

    #[tokio::test]
    async fn workflow_load_failure_is_an_error() {
        let console = demo_console();
        let out = Output { json: true };
        let err = workflows(&console, &out, "C-1013").await.unwrap_err();
        assert!(err.to_string().contains("502"), "{}", err);
    }

    #[test]
    fn clip_marks_truncation() {
        assert_eq!(clip("Verify documents", 8), "Verify …");
        assert_eq!(clip("Intake", 8), "Intake");
    }
}
