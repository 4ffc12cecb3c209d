//! The operator session: issues backend calls and folds their answers into
//! shared state.
//!
//! Every operation follows the same shape. Take the write lock to issue a
//! ticket, drop it while the backend call is pending, then reduce the
//! settled event and broadcast it so views can redraw.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use chrono::{Local, NaiveDate};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};

use crate::activity_log::{ActivityLogLine, activity_log};
use crate::backend::CaseBackend;
use crate::dispatch::{ActionKind, DispatchOutcome, RemedialCommand};
use crate::inspection::LoadTicket;
use crate::model::Case;
use crate::notices::NoticeLevel;
use crate::processes::InstancesRequest;
use crate::reducer::{ConsoleEvent, EventEnvelope, reduce};
use crate::search::SearchRequest;
use crate::state::{ConsoleSettings, ConsoleState};

#[derive(Clone)]
pub struct Console {
    backend: Arc<dyn CaseBackend>,
    state: Arc<RwLock<ConsoleState>>,
    event_tx: broadcast::Sender<EventEnvelope>,
    next_id: Arc<AtomicU64>,
}

impl Console {
    pub fn new(backend: Arc<dyn CaseBackend>, settings: ConsoleSettings) -> Self {
        let (event_tx, _) = broadcast::channel(1_000);
        Self {
            backend,
            state: Arc::new(RwLock::new(ConsoleState::new(settings))),
            event_tx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn state(&self) -> Arc<RwLock<ConsoleState>> {
        self.state.clone()
    }

    /// Settled events, after they have been applied to the state.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.event_tx.subscribe()
    }

    async fn emit(&self, event: ConsoleEvent) {
        let env = EventEnvelope {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            at: SystemTime::now(),
            event,
        };
        {
            let mut state = self.state.write().await;
            reduce(&mut state, &env);
        }
        let _ = self.event_tx.send(env);
    }

    pub async fn notify(&self, level: NoticeLevel, text: impl Into<String>) {
        self.emit(ConsoleEvent::Notice {
            level,
            text: text.into(),
        })
        .await;
    }

    // Search

    /// Search by case number; an empty term lists recent cases.
    pub async fn search(&self, term: &str) {
        let req = self.state.write().await.search.search(term, today());
        self.run_search(req).await;
    }

    pub async fn search_at(&self, term: &str, page: u32) {
        let req = self.state.write().await.search.search_at(term, page, today());
        self.run_search(req).await;
    }

    pub async fn change_page(&self, page: u32) -> bool {
        let req = self.state.write().await.search.change_page(page, today());
        match req {
            Some(req) => {
                self.run_search(req).await;
                true
            }
            None => false,
        }
    }

    pub async fn next_page(&self) -> bool {
        let page = {
            let state = self.state.read().await;
            let pager = state.search.pager();
            if !pager.has_next() || pager.is_loading() {
                return false;
            }
            pager.cursor().page + 1
        };
        self.change_page(page).await
    }

    pub async fn prev_page(&self) -> bool {
        let page = {
            let state = self.state.read().await;
            let pager = state.search.pager();
            if !pager.has_prev() || pager.is_loading() {
                return false;
            }
            pager.cursor().page - 1
        };
        self.change_page(page).await
    }

    pub async fn change_page_size(&self, page_size: u32) -> bool {
        let req = self
            .state
            .write()
            .await
            .search
            .change_page_size(page_size, today());
        match req {
            Some(req) => {
                self.run_search(req).await;
                true
            }
            None => false,
        }
    }

    /// Step to the next configured page size.
    pub async fn cycle_page_size(&self) -> bool {
        let next = {
            let state = self.state.read().await;
            state
                .settings
                .next_page_size(state.search.pager().cursor().page_size)
        };
        self.change_page_size(next).await
    }

    pub async fn clear_search(&self) {
        let mut state = self.state.write().await;
        state.search.clear();
        state.inspection.clear();
    }

    async fn run_search(&self, req: SearchRequest) {
        debug!(seq = req.ticket.seq, page = req.ticket.page, query = ?req.query, "searching cases");
        let result = self.backend.search_cases(&req.query).await;
        if let Err(err) = &result {
            warn!(error = %err, "case search failed");
        }
        self.emit(ConsoleEvent::SearchSettled {
            ticket: req.ticket,
            result,
        })
        .await;
    }

    // Inspection

    pub async fn select_case(&self, case: Case) {
        let ticket = self.state.write().await.inspection.select_case(case);
        self.load_workflows(ticket).await;
    }

    /// Re-fetch workflows for the inspected case. `false` if none is selected.
    pub async fn reload(&self) -> bool {
        let ticket = self.state.write().await.inspection.reload();
        match ticket {
            Some(ticket) => {
                self.load_workflows(ticket).await;
                true
            }
            None => false,
        }
    }

    pub async fn select_workflow(&self, index: usize) -> bool {
        self.state.write().await.inspection.select_workflow(index)
    }

    pub async fn select_activity(&self, index: usize) -> bool {
        self.state.write().await.inspection.select_activity(index)
    }

    async fn load_workflows(&self, ticket: LoadTicket) {
        debug!(case_id = %ticket.case_id, seq = ticket.seq, "loading workflows");
        let result = self.backend.workflows_for_case(&ticket.case_id).await;
        if let Err(err) = &result {
            warn!(case_id = %ticket.case_id, error = %err, "workflow load failed");
        }
        self.emit(ConsoleEvent::WorkflowsSettled { ticket, result })
            .await;
    }

    /// Log trail for an activity of the inspected case.
    pub async fn activity_log(
        &self,
        workflow_id: &str,
        activity_id: &str,
    ) -> Option<Vec<ActivityLogLine>> {
        let state = self.state.read().await;
        state
            .inspection
            .find_activity(workflow_id, activity_id)
            .map(activity_log)
    }

    // Remedial commands

    /// Whether the retry action should be offered for this activity.
    pub async fn retry_enabled(&self, workflow_id: &str, activity_id: &str) -> bool {
        let state = self.state.read().await;
        state.inspection.retry_enabled(workflow_id, activity_id)
            && !state.in_flight.is_busy(ActionKind::Retry, activity_id)
    }

    pub async fn restart_workflow(&self, workflow_id: &str) -> DispatchOutcome {
        self.dispatch(RemedialCommand::RestartWorkflow {
            workflow_id: workflow_id.to_string(),
        })
        .await
    }

    pub async fn retry_activity(&self, workflow_id: &str, activity_id: &str) -> DispatchOutcome {
        self.dispatch(RemedialCommand::RetryActivity {
            workflow_id: workflow_id.to_string(),
            activity_id: activity_id.to_string(),
        })
        .await
    }

    /// Send `command` unless the same one is already awaiting a reply.
    /// The in-flight entry is released whatever the outcome; on success
    /// the inspected case is reloaded.
    pub async fn dispatch(&self, command: RemedialCommand) -> DispatchOutcome {
        let key = command.key();
        let acquired = self.state.write().await.in_flight.try_acquire(&key);
        if !acquired {
            debug!(key = %key, "command already in flight");
            self.notify(
                NoticeLevel::Warn,
                format!("{} is already in progress", command),
            )
            .await;
            return DispatchOutcome::Rejected;
        }

        info!(command = %command, backend = self.backend.name(), "dispatching");
        let result = command.send(self.backend.as_ref()).await;
        self.emit(ConsoleEvent::CommandSettled {
            command: command.clone(),
            result: result.clone(),
        })
        .await;

        match result {
            Ok(_) => {
                self.reload().await;
                DispatchOutcome::Succeeded
            }
            Err(err) => {
                warn!(command = %command, error = %err, "command failed");
                DispatchOutcome::Failed(err)
            }
        }
    }

    // Processes

    /// Load process templates. Configured templates take precedence.
    pub async fn load_processes(&self) {
        let configured = {
            let state = self.state.read().await;
            state.settings.processes.clone()
        };
        let result = if configured.is_empty() {
            self.backend.process_templates().await
        } else {
            Ok(configured)
        };
        self.emit(ConsoleEvent::TemplatesSettled { result }).await;
    }

    pub async fn select_process(&self, process_id: &str) {
        let req = self.state.write().await.processes.select_process(process_id);
        self.load_instances(req).await;
    }

    pub async fn change_instances_page(&self, page: u32) -> bool {
        let req = self.state.write().await.processes.change_page(page);
        match req {
            Some(req) => {
                self.load_instances(req).await;
                true
            }
            None => false,
        }
    }

    pub async fn change_instances_page_size(&self, page_size: u32) -> bool {
        let req = self
            .state
            .write()
            .await
            .processes
            .change_page_size(page_size);
        match req {
            Some(req) => {
                self.load_instances(req).await;
                true
            }
            None => false,
        }
    }

    async fn load_instances(&self, req: InstancesRequest) {
        debug!(process = %req.process_id, page = req.ticket.page, "listing running workflows");
        let result = self
            .backend
            .running_workflows(&req.process_id, req.ticket.page, req.ticket.page_size)
            .await;
        self.emit(ConsoleEvent::InstancesSettled {
            ticket: req.ticket,
            process_id: req.process_id,
            result,
        })
        .await;
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::backend::{
        BackendError, CommandAck, Page, ProcessTemplate, SearchPage, SearchQuery,
    };
    use crate::dispatch::ActionKey;
    use crate::inspection::ViewPhase;
    use crate::model::{Activity, RawState, WorkflowInstance};
    use crate::status::CanonicalStatus;

    /// Backend whose calls can be held open until a test releases them.
    #[derive(Default)]
    struct ScriptedBackend {
        workflows: Mutex<HashMap<String, Vec<WorkflowInstance>>>,
        search_gates: Mutex<HashMap<String, Arc<Notify>>>,
        restart_gate: Option<Arc<Notify>>,
        restart_started: Arc<Notify>,
        fail_retry: bool,
        restarts: Mutex<u32>,
        workflow_loads: Mutex<u32>,
    }

    impl ScriptedBackend {
        fn with_case(case_id: &str, workflows: Vec<WorkflowInstance>) -> Self {
            let backend = Self::default();
            backend
                .workflows
                .lock()
                .unwrap()
                .insert(case_id.to_string(), workflows);
            backend
        }

        fn gate_search(&self, term: &str) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            self.search_gates
                .lock()
                .unwrap()
                .insert(term.to_string(), gate.clone());
            gate
        }

        fn restarts(&self) -> u32 {
            *self.restarts.lock().unwrap()
        }

        fn workflow_loads(&self) -> u32 {
            *self.workflow_loads.lock().unwrap()
        }
    }

    #[async_trait]
    impl CaseBackend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn search_cases(&self, query: &SearchQuery) -> Result<SearchPage, BackendError> {
            let term = query.case_number.clone().unwrap_or_default();
            let gate = self.search_gates.lock().unwrap().get(&term).cloned();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            Ok(Page::new(
                vec![Case {
                    id: format!("0b-{}", term),
                    case_number: term,
                    ..Default::default()
                }],
                false,
            ))
        }

        async fn workflows_for_case(
            &self,
            case_id: &str,
        ) -> Result<Vec<WorkflowInstance>, BackendError> {
            *self.workflow_loads.lock().unwrap() += 1;
            Ok(self
                .workflows
                .lock()
                .unwrap()
                .get(case_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn restart_workflow(&self, _workflow_id: &str) -> Result<CommandAck, BackendError> {
            *self.restarts.lock().unwrap() += 1;
            self.restart_started.notify_one();
            if let Some(gate) = &self.restart_gate {
                gate.notified().await;
            }
            Ok(CommandAck::ok())
        }

        async fn retry_activity(
            &self,
            workflow_id: &str,
            activity_id: &str,
        ) -> Result<CommandAck, BackendError> {
            if self.fail_retry {
                return Err(BackendError::transport("retry", "connection refused"));
            }
            let mut all = self.workflows.lock().unwrap();
            for wf in all.values_mut().flatten() {
                if wf.id != workflow_id {
                    continue;
                }
                for act in &mut wf.activities {
                    if act.id == activity_id {
                        act.state = RawState::Numeric(2);
                    }
                }
                wf.state = RawState::Numeric(1);
            }
            Ok(CommandAck::ok())
        }

        async fn process_templates(&self) -> Result<Vec<ProcessTemplate>, BackendError> {
            Ok(vec![ProcessTemplate {
                id: "LoanApproval".into(),
                title: None,
            }])
        }

        async fn running_workflows(
            &self,
            _process_id: &str,
            _page: u32,
            _page_size: u32,
        ) -> Result<Page<WorkflowInstance>, BackendError> {
            Ok(Page::new(vec![WorkflowInstance::default()], false))
        }
    }

    fn activity(id: &str, seq: i64, code: i64) -> Activity {
        Activity {
            id: id.into(),
            sequence: seq,
            name: Some(format!("step {}", seq)),
            state: RawState::Numeric(code),
            ..Default::default()
        }
    }

    fn case_1001() -> (Case, Vec<WorkflowInstance>) {
        let case = Case {
            id: "0b1001".into(),
            case_number: "C-1001".into(),
            ..Default::default()
        };
        let workflows = vec![
            WorkflowInstance {
                id: "WF-A".into(),
                state: RawState::Numeric(1),
                activities: vec![activity("act-1", 1, 2)],
                ..Default::default()
            },
            WorkflowInstance {
                id: "WF-B".into(),
                state: RawState::Numeric(4),
                activities: vec![activity("act-1b", 1, 2), activity("act-2", 2, 5)],
                ..Default::default()
            },
        ];
        (case, workflows)
    }

    fn console(backend: Arc<ScriptedBackend>) -> Console {
        Console::new(backend, ConsoleSettings::default())
    }

    #[tokio::test]
    async fn retry_reloads_and_keeps_selection() {
        let (case, workflows) = case_1001();
        let backend = Arc::new(ScriptedBackend::with_case("0b1001", workflows));
        let console = console(backend.clone());

        console.select_case(case).await;
        assert!(console.select_workflow(1).await);
        assert!(console.retry_enabled("WF-B", "act-2").await);

        let outcome = console.retry_activity("WF-B", "act-2").await;
        assert_eq!(outcome, DispatchOutcome::Succeeded);
        assert_eq!(backend.workflow_loads(), 2);

        let state = console.state();
        let state = state.read().await;
        assert_eq!(state.inspection.phase(), &ViewPhase::Loaded);
        assert_eq!(state.inspection.selected_workflow().unwrap().id, "WF-B");
        let act = state.inspection.find_activity("WF-B", "act-2").unwrap();
        assert_eq!(act.status(), CanonicalStatus::Finished);
        assert!(state.in_flight.is_empty());
        assert_eq!(state.notices.latest().unwrap().level, NoticeLevel::Success);
    }

    #[tokio::test]
    async fn failed_retry_releases_without_reload() {
        let (case, workflows) = case_1001();
        let mut backend = ScriptedBackend::with_case("0b1001", workflows);
        backend.fail_retry = true;
        let backend = Arc::new(backend);
        let console = console(backend.clone());

        console.select_case(case).await;
        let outcome = console.retry_activity("WF-B", "act-2").await;
        assert!(matches!(outcome, DispatchOutcome::Failed(ref e) if e.is_transport()));
        assert_eq!(backend.workflow_loads(), 1);

        let state = console.state();
        let state = state.read().await;
        assert!(state.in_flight.is_empty());
        assert_eq!(state.inspection.phase(), &ViewPhase::Loaded);
        assert_eq!(state.inspection.workflows().len(), 2);
        assert_eq!(state.notices.latest().unwrap().level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn duplicate_restart_is_rejected_while_in_flight() {
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(ScriptedBackend {
            restart_gate: Some(gate.clone()),
            ..Default::default()
        });
        let console = console(backend.clone());

        let first = {
            let console = console.clone();
            tokio::spawn(async move { console.restart_workflow("WF-A").await })
        };
        backend.restart_started.notified().await;

        assert!(
            console
                .state()
                .read()
                .await
                .in_flight
                .contains(&ActionKey::new(ActionKind::Restart, "WF-A"))
        );
        assert_eq!(
            console.restart_workflow("WF-A").await,
            DispatchOutcome::Rejected
        );
        assert_eq!(backend.restarts(), 1);

        gate.notify_one();
        assert_eq!(first.await.unwrap(), DispatchOutcome::Succeeded);
        assert!(console.state().read().await.in_flight.is_empty());

        gate.notify_one();
        assert_eq!(
            console.restart_workflow("WF-A").await,
            DispatchOutcome::Succeeded
        );
        assert_eq!(backend.restarts(), 2);
    }

    #[tokio::test]
    async fn slow_search_does_not_overwrite_newer_results() {
        let backend = Arc::new(ScriptedBackend::default());
        let gate = backend.gate_search("C-1");
        let console = console(backend.clone());

        let slow = {
            let console = console.clone();
            tokio::spawn(async move { console.search("C-1").await })
        };
        // let the first search take its ticket before the second is issued
        while !console.state().read().await.search.pager().is_loading() {
            tokio::task::yield_now().await;
        }
        console.search("C-2").await;
        gate.notify_one();
        slow.await.unwrap();

        let state = console.state();
        let state = state.read().await;
        assert_eq!(state.search.term(), "C-2");
        assert_eq!(state.search.cases()[0].case_number, "C-2");
    }

    #[tokio::test]
    async fn configured_templates_skip_the_backend() {
        let backend = Arc::new(ScriptedBackend::default());
        let console = Console::new(
            backend,
            ConsoleSettings {
                processes: vec![ProcessTemplate {
                    id: "AccountOpening".into(),
                    title: None,
                }],
                ..Default::default()
            },
        );
        let mut events = console.subscribe();
        console.load_processes().await;
        assert!(matches!(
            events.recv().await.unwrap().event,
            ConsoleEvent::TemplatesSettled { .. }
        ));

        console.select_process("AccountOpening").await;
        let state = console.state();
        let state = state.read().await;
        assert_eq!(state.processes.templates()[0].id, "AccountOpening");
        assert_eq!(state.processes.instances().len(), 1);
    }

    #[tokio::test]
    async fn activity_log_reads_the_inspected_case() {
        let (case, workflows) = case_1001();
        let backend = Arc::new(ScriptedBackend::with_case("0b1001", workflows));
        let console = console(backend);
        console.select_case(case).await;

        let lines = console.activity_log("WF-B", "act-2").await.unwrap();
        assert_eq!(lines.last().unwrap().level, crate::activity_log::LogLevel::Error);
        assert!(console.activity_log("WF-B", "missing").await.is_none());
    }
}
