//! TUI-local state and key handling. Everything shared with the backend
//! lives in `ConsoleState`; this only tracks cursors, focus and overlays.

use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use caseflow_core::activity_log::LogFilterMode;
use caseflow_core::dispatch::ActionKind;
use caseflow_core::model::Case;
use caseflow_core::state::ConsoleState;

const TOAST_TTL: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Cases,
    Processes,
}

impl Tab {
    pub fn all() -> [Tab; 2] {
        [Tab::Cases, Tab::Processes]
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tab::Cases => "Cases",
            Tab::Processes => "Processes",
        }
    }

    fn toggle(self) -> Self {
        match self {
            Tab::Cases => Tab::Processes,
            Tab::Processes => Tab::Cases,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    CaseList,
    Workflows,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    /// Editing the search term
    Search,
    /// Log trail of one activity
    Log {
        workflow_id: String,
        activity_id: String,
    },
    Help,
}

/// Work the event loop performs against the console.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    Search(String),
    ClearSearch,
    NextPage,
    PrevPage,
    CyclePageSize,
    SelectCase(Case),
    Reload,
    SelectWorkflow(usize),
    SelectActivity(usize),
    Restart(String),
    Retry { workflow_id: String, activity_id: String },
    LoadProcesses,
    SelectProcess(String),
    InstancesPage(u32),
    /// Local-only message for the notices bar
    Notice(String),
}

#[derive(Debug, Default)]
pub struct App {
    pub tab: Tab,
    pub focus: Focus,
    pub mode: Mode,
    pub input: String,
    pub case_cursor: usize,
    pub process_cursor: usize,
    pub log_filter: LogFilterMode,
    pub toast_until: Option<Instant>,
    pub should_quit: bool,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the latest notice on screen for a while.
    pub fn show_toast(&mut self) {
        self.toast_until = Some(Instant::now() + TOAST_TTL);
    }

    pub fn toast_visible(&self) -> bool {
        self.toast_until.is_some_and(|t| Instant::now() < t)
    }

    /// Keep cursors inside the current lists.
    pub fn clamp(&mut self, state: &ConsoleState) {
        let cases = state.search.cases().len();
        self.case_cursor = self.case_cursor.min(cases.saturating_sub(1));
        let templates = state.processes.templates().len();
        self.process_cursor = self.process_cursor.min(templates.saturating_sub(1));
    }

    pub fn handle_key(&mut self, key: KeyEvent, state: &ConsoleState) -> Vec<Action> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return Vec::new();
        }

        match self.mode.clone() {
            Mode::Search => self.handle_search_input(key),
            Mode::Log { .. } => {
                self.handle_log_key(key);
                Vec::new()
            }
            Mode::Help => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                    self.mode = Mode::Normal;
                }
                Vec::new()
            }
            Mode::Normal => self.handle_normal_key(key, state),
        }
    }

    fn handle_search_input(&mut self, key: KeyEvent) -> Vec<Action> {
        match key.code {
            KeyCode::Enter => {
                self.mode = Mode::Normal;
                self.focus = Focus::CaseList;
                self.case_cursor = 0;
                vec![Action::Search(self.input.trim().to_string())]
            }
            KeyCode::Esc => {
                self.mode = Mode::Normal;
                Vec::new()
            }
            KeyCode::Backspace => {
                self.input.pop();
                Vec::new()
            }
            KeyCode::Char(c) => {
                self.input.push(c);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn handle_log_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('l') | KeyCode::Enter => {
                self.mode = Mode::Normal
            }
            KeyCode::Char('f') => self.log_filter = self.log_filter.cycle(),
            _ => {}
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent, state: &ConsoleState) -> Vec<Action> {
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                return Vec::new();
            }
            KeyCode::Char('?') => {
                self.mode = Mode::Help;
                return Vec::new();
            }
            KeyCode::Tab => {
                self.tab = self.tab.toggle();
                if self.tab == Tab::Processes && state.processes.templates().is_empty() {
                    return vec![Action::LoadProcesses];
                }
                return Vec::new();
            }
            _ => {}
        }

        match self.tab {
            Tab::Cases => match self.focus {
                Focus::CaseList => self.case_list_key(key, state),
                Focus::Workflows => self.workflows_key(key, state),
            },
            Tab::Processes => self.processes_key(key, state),
        }
    }

    fn case_list_key(&mut self, key: KeyEvent, state: &ConsoleState) -> Vec<Action> {
        let cases = state.search.cases();
        match key.code {
            KeyCode::Char('/') => {
                self.mode = Mode::Search;
                self.input = state.search.term().to_string();
                Vec::new()
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.case_cursor + 1 < cases.len() {
                    self.case_cursor += 1;
                }
                Vec::new()
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.case_cursor = self.case_cursor.saturating_sub(1);
                Vec::new()
            }
            KeyCode::Enter | KeyCode::Right => match cases.get(self.case_cursor) {
                Some(case) => {
                    self.focus = Focus::Workflows;
                    vec![Action::SelectCase(case.clone())]
                }
                None => Vec::new(),
            },
            KeyCode::Char(']') | KeyCode::PageDown => {
                self.case_cursor = 0;
                vec![Action::NextPage]
            }
            KeyCode::Char('[') | KeyCode::PageUp => {
                self.case_cursor = 0;
                vec![Action::PrevPage]
            }
            KeyCode::Char('s') => {
                self.case_cursor = 0;
                vec![Action::CyclePageSize]
            }
            KeyCode::Char('r') => vec![Action::Search(state.search.term().to_string())],
            KeyCode::Char('c') => {
                self.input.clear();
                self.case_cursor = 0;
                vec![Action::ClearSearch]
            }
            _ => Vec::new(),
        }
    }

    fn workflows_key(&mut self, key: KeyEvent, state: &ConsoleState) -> Vec<Action> {
        let view = &state.inspection;
        let wf_index = view.selected_index();
        let act_index = view.selected_activity_index();
        let wf_count = view.workflows().len();
        let act_count = view
            .selected_workflow()
            .map(|wf| wf.activities.len())
            .unwrap_or(0);

        match key.code {
            KeyCode::Esc | KeyCode::Backspace => {
                self.focus = Focus::CaseList;
                Vec::new()
            }
            KeyCode::Left | KeyCode::Char('h') if wf_index > 0 => {
                vec![Action::SelectWorkflow(wf_index - 1)]
            }
            KeyCode::Right | KeyCode::Char('l') if wf_index + 1 < wf_count => {
                vec![Action::SelectWorkflow(wf_index + 1)]
            }
            KeyCode::Down | KeyCode::Char('j') if act_index + 1 < act_count => {
                vec![Action::SelectActivity(act_index + 1)]
            }
            KeyCode::Up | KeyCode::Char('k') if act_index > 0 => {
                vec![Action::SelectActivity(act_index - 1)]
            }
            KeyCode::Char('r') => vec![Action::Reload],
            KeyCode::Char('R') => match view.selected_workflow() {
                Some(wf) => vec![Action::Restart(wf.id.clone())],
                None => Vec::new(),
            },
            KeyCode::Char('t') => {
                let (Some(wf), Some(act)) = (view.selected_workflow(), view.selected_activity())
                else {
                    return Vec::new();
                };
                if !view.retry_enabled(&wf.id, &act.id) {
                    return vec![Action::Notice(format!(
                        "{} is {}; only failed or halted activities can be retried",
                        act.display_name(),
                        act.status().label().to_lowercase()
                    ))];
                }
                if state.in_flight.is_busy(ActionKind::Retry, &act.id) {
                    return vec![Action::Notice(format!(
                        "retry of {} is already in progress",
                        act.display_name()
                    ))];
                }
                vec![Action::Retry {
                    workflow_id: wf.id.clone(),
                    activity_id: act.id.clone(),
                }]
            }
            KeyCode::Enter | KeyCode::Char('L') => {
                if let (Some(wf), Some(act)) = (view.selected_workflow(), view.selected_activity())
                {
                    self.mode = Mode::Log {
                        workflow_id: wf.id.clone(),
                        activity_id: act.id.clone(),
                    };
                }
                Vec::new()
            }
            KeyCode::Char('/') => {
                self.focus = Focus::CaseList;
                self.mode = Mode::Search;
                self.input = state.search.term().to_string();
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn processes_key(&mut self, key: KeyEvent, state: &ConsoleState) -> Vec<Action> {
        let templates = state.processes.templates();
        let pager = state.processes.pager();
        match key.code {
            KeyCode::Down | KeyCode::Char('j') => {
                if self.process_cursor + 1 < templates.len() {
                    self.process_cursor += 1;
                }
                Vec::new()
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.process_cursor = self.process_cursor.saturating_sub(1);
                Vec::new()
            }
            KeyCode::Enter => match templates.get(self.process_cursor) {
                Some(t) => vec![Action::SelectProcess(t.id.clone())],
                None => Vec::new(),
            },
            KeyCode::Char(']') | KeyCode::PageDown if pager.has_next() && !pager.is_loading() => {
                vec![Action::InstancesPage(pager.cursor().page + 1)]
            }
            KeyCode::Char('[') | KeyCode::PageUp if pager.has_prev() && !pager.is_loading() => {
                vec![Action::InstancesPage(pager.cursor().page - 1)]
            }
            KeyCode::Char('r') => vec![Action::LoadProcesses],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caseflow_core::backend::Page;
    use caseflow_core::dispatch::ActionKey;
    use caseflow_core::model::{Activity, RawState, WorkflowInstance};
    use caseflow_core::state::ConsoleSettings;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn inspected_state(activity_code: i64) -> ConsoleState {
        let mut state = ConsoleState::new(ConsoleSettings::default());
        let today = chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let req = state.search.search("C-1001", today);
        let case = Case {
            id: "0b1001".into(),
            case_number: "C-1001".into(),
            ..Default::default()
        };
        state
            .search
            .apply(req.ticket, Ok(Page::new(vec![case.clone()], false)));
        let ticket = state.inspection.select_case(case);
        state.inspection.apply(
            &ticket,
            Ok(vec![WorkflowInstance {
                id: "WF-B".into(),
                state: RawState::Numeric(4),
                activities: vec![Activity {
                    id: "act-2".into(),
                    sequence: 2,
                    state: RawState::Numeric(activity_code),
                    ..Default::default()
                }],
                ..Default::default()
            }]),
        );
        state
    }

    #[test]
    fn retry_key_only_acts_on_retryable_activity() {
        let mut app = App::new();
        app.focus = Focus::Workflows;

        let failed = inspected_state(5);
        assert_eq!(
            app.handle_key(key(KeyCode::Char('t')), &failed),
            vec![Action::Retry {
                workflow_id: "WF-B".into(),
                activity_id: "act-2".into(),
            }]
        );

        let running = inspected_state(1);
        let actions = app.handle_key(key(KeyCode::Char('t')), &running);
        assert!(matches!(actions.as_slice(), [Action::Notice(_)]));
    }

    #[test]
    fn retry_key_waits_for_pending_retry() {
        let mut app = App::new();
        app.focus = Focus::Workflows;
        let mut state = inspected_state(5);
        assert!(
            state
                .in_flight
                .try_acquire(&ActionKey::new(ActionKind::Retry, "act-2"))
        );
        let actions = app.handle_key(key(KeyCode::Char('t')), &state);
        assert!(matches!(actions.as_slice(), [Action::Notice(text)] if text.contains("in progress")));
    }

    #[test]
    fn restart_acts_on_active_workflow() {
        let mut app = App::new();
        app.focus = Focus::Workflows;
        let state = inspected_state(2);
        assert_eq!(
            app.handle_key(key(KeyCode::Char('R')), &state),
            vec![Action::Restart("WF-B".into())]
        );
    }

    #[test]
    fn search_mode_collects_input() {
        let mut app = App::new();
        let state = ConsoleState::new(ConsoleSettings::default());
        assert!(app.handle_key(key(KeyCode::Char('/')), &state).is_empty());
        assert_eq!(app.mode, Mode::Search);
        for c in "C-10".chars() {
            app.handle_key(key(KeyCode::Char(c)), &state);
        }
        app.handle_key(key(KeyCode::Backspace), &state);
        assert_eq!(
            app.handle_key(key(KeyCode::Enter), &state),
            vec![Action::Search("C-1".into())]
        );
        assert_eq!(app.mode, Mode::Normal);
    }

    #[test]
    fn enter_on_case_moves_focus_to_workflows() {
        let mut app = App::new();
        let state = inspected_state(2);
        let actions = app.handle_key(key(KeyCode::Enter), &state);
        assert!(matches!(actions.as_slice(), [Action::SelectCase(c)] if c.case_number == "C-1001"));
        assert_eq!(app.focus, Focus::Workflows);
    }

    #[test]
    fn log_overlay_cycles_filter() {
        let mut app = App::new();
        app.focus = Focus::Workflows;
        let state = inspected_state(5);
        app.handle_key(key(KeyCode::Enter), &state);
        assert!(matches!(app.mode, Mode::Log { .. }));
        app.handle_key(key(KeyCode::Char('f')), &state);
        assert_eq!(app.log_filter, LogFilterMode::WarnAndAbove);
        app.handle_key(key(KeyCode::Esc), &state);
        assert_eq!(app.mode, Mode::Normal);
    }
}
