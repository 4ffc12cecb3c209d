//! Per-case workflow inspection: every workflow attached to the selected
//! case, with its ordered activities and the operator's selection.

use tracing::debug;

use crate::backend::BackendError;
use crate::model::{Activity, ActivityId, Case, CaseId, WorkflowId, WorkflowInstance};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ViewPhase {
    #[default]
    Idle,
    Loading,
    /// Loaded, possibly with zero workflows
    Loaded,
    Error {
        message: String,
    },
}

/// Identifies one workflow-set load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadTicket {
    pub seq: u64,
    pub case_id: CaseId,
}

#[derive(Clone, Debug, Default)]
pub struct Inspection {
    case: Option<Case>,
    phase: ViewPhase,
    workflows: Vec<WorkflowInstance>,
    selected: usize,
    selected_id: Option<WorkflowId>,
    selected_activity: usize,
    selected_activity_id: Option<ActivityId>,
    issued: u64,
}

impl Inspection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn case(&self) -> Option<&Case> {
        self.case.as_ref()
    }

    pub fn phase(&self) -> &ViewPhase {
        &self.phase
    }

    pub fn workflows(&self) -> &[WorkflowInstance] {
        &self.workflows
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, ViewPhase::Loading)
    }

    /// Loaded with no workflows attached. A valid state, not an error.
    pub fn is_empty(&self) -> bool {
        self.phase == ViewPhase::Loaded && self.workflows.is_empty()
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected_workflow(&self) -> Option<&WorkflowInstance> {
        self.workflows.get(self.selected)
    }

    pub fn selected_activity_index(&self) -> usize {
        self.selected_activity
    }

    pub fn selected_activity(&self) -> Option<&Activity> {
        self.selected_workflow()
            .and_then(|wf| wf.activities.get(self.selected_activity))
    }

    pub fn workflow(&self, id: &str) -> Option<&WorkflowInstance> {
        self.workflows.iter().find(|wf| wf.id == id)
    }

    /// Find an activity in any loaded workflow.
    pub fn find_activity(&self, workflow_id: &str, activity_id: &str) -> Option<&Activity> {
        self.workflow(workflow_id)
            .and_then(|wf| wf.activity(activity_id))
    }

    /// Begin inspecting `case`. Discards whatever the previous case showed.
    pub fn select_case(&mut self, case: Case) -> LoadTicket {
        self.workflows.clear();
        self.selected = 0;
        self.selected_id = None;
        self.selected_activity = 0;
        self.selected_activity_id = None;
        self.case = Some(case);
        self.begin_load()
    }

    /// Re-fetch the current case, keeping the selection by identifier.
    pub fn reload(&mut self) -> Option<LoadTicket> {
        if self.case.is_none() {
            return None;
        }
        Some(self.begin_load())
    }

    pub fn clear(&mut self) {
        *self = Self {
            issued: self.issued,
            ..Self::default()
        };
    }

    /// Apply a workflow-set response. Responses for a case that is no
    /// longer selected are dropped; otherwise the last one to arrive wins.
    pub fn apply(
        &mut self,
        ticket: &LoadTicket,
        result: Result<Vec<WorkflowInstance>, BackendError>,
    ) -> bool {
        let current = self.case.as_ref().map(|c| c.id.as_str());
        if current != Some(ticket.case_id.as_str()) {
            debug!(
                case_id = %ticket.case_id,
                seq = ticket.seq,
                "discarding workflows for a case that is no longer selected"
            );
            return false;
        }

        match result {
            Ok(mut workflows) => {
                for wf in &mut workflows {
                    wf.sort_activities();
                }
                self.workflows = workflows;
                self.resolve_selection();
                self.phase = ViewPhase::Loaded;
            }
            Err(err) => {
                // keep the selected ids so a later successful load re-resolves them
                self.workflows.clear();
                self.selected = 0;
                self.phase = ViewPhase::Error {
                    message: err.to_string(),
                };
            }
        }
        true
    }

    /// Select a workflow tab. Local only; all workflows are already loaded.
    pub fn select_workflow(&mut self, index: usize) -> bool {
        let Some(wf) = self.workflows.get(index) else {
            return false;
        };
        self.selected = index;
        self.selected_id = Some(wf.id.clone());
        self.selected_activity = 0;
        self.selected_activity_id = wf.activities.first().map(|a| a.id.clone());
        true
    }

    pub fn next_workflow(&mut self) {
        if !self.workflows.is_empty() {
            self.select_workflow((self.selected + 1) % self.workflows.len());
        }
    }

    pub fn prev_workflow(&mut self) {
        if !self.workflows.is_empty() {
            let len = self.workflows.len();
            self.select_workflow((self.selected + len - 1) % len);
        }
    }

    pub fn select_activity(&mut self, index: usize) -> bool {
        let Some(id) = self
            .selected_workflow()
            .and_then(|wf| wf.activities.get(index))
            .map(|a| a.id.clone())
        else {
            return false;
        };
        self.selected_activity_id = Some(id);
        self.selected_activity = index;
        true
    }

    pub fn next_activity(&mut self) {
        self.select_activity(self.selected_activity + 1);
    }

    pub fn prev_activity(&mut self) {
        if self.selected_activity > 0 {
            self.select_activity(self.selected_activity - 1);
        }
    }

    /// Whether retry is offered for this activity.
    pub fn retry_enabled(&self, workflow_id: &str, activity_id: &str) -> bool {
        self.find_activity(workflow_id, activity_id)
            .is_some_and(Activity::is_retryable)
    }

    fn begin_load(&mut self) -> LoadTicket {
        self.issued += 1;
        self.phase = ViewPhase::Loading;
        let case_id = self
            .case
            .as_ref()
            .map(|c| c.id.clone())
            .unwrap_or_default();
        LoadTicket {
            seq: self.issued,
            case_id,
        }
    }

    fn resolve_selection(&mut self) {
        let by_id = self
            .selected_id
            .as_deref()
            .and_then(|id| self.workflows.iter().position(|wf| wf.id == id));
        self.selected = by_id.unwrap_or(0);
        self.selected_id = self.workflows.get(self.selected).map(|wf| wf.id.clone());

        let activities = self
            .workflows
            .get(self.selected)
            .map(|wf| wf.activities.as_slice())
            .unwrap_or_default();
        let activity_by_id = self
            .selected_activity_id
            .as_deref()
            .and_then(|id| activities.iter().position(|a| a.id == id));
        // Workflow changed underneath us: start from its first activity.
        self.selected_activity = match (by_id, activity_by_id) {
            (Some(_), Some(pos)) => pos,
            (Some(_), None) => self.selected_activity.min(activities.len().saturating_sub(1)),
            (None, _) => 0,
        };
        self.selected_activity_id = activities.get(self.selected_activity).map(|a| a.id.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawState;
    use crate::status::CanonicalStatus;

    fn case(id: &str) -> Case {
        Case {
            id: id.into(),
            case_number: format!("C-{}", id),
            ..Default::default()
        }
    }

    fn activity(id: &str, seq: i64, code: i64) -> Activity {
        Activity {
            id: id.into(),
            sequence: seq,
            state: RawState::Numeric(code),
            ..Default::default()
        }
    }

    fn workflow(id: &str, code: i64, activities: Vec<Activity>) -> WorkflowInstance {
        WorkflowInstance {
            id: id.into(),
            process_name: format!("proc-{}", id),
            state: RawState::Numeric(code),
            activities,
            ..Default::default()
        }
    }

    #[test]
    fn load_walks_idle_loading_loaded() {
        let mut view = Inspection::new();
        assert_eq!(view.phase(), &ViewPhase::Idle);

        let ticket = view.select_case(case("1001"));
        assert!(view.is_loading());

        view.apply(&ticket, Ok(vec![workflow("WF-A", 1, vec![])]));
        assert_eq!(view.phase(), &ViewPhase::Loaded);
        assert_eq!(view.selected_index(), 0);
        assert_eq!(view.selected_workflow().unwrap().id, "WF-A");
    }

    #[test]
    fn empty_result_is_loaded_not_error() {
        let mut view = Inspection::new();
        let ticket = view.select_case(case("1001"));
        view.apply(&ticket, Ok(vec![]));
        assert_eq!(view.phase(), &ViewPhase::Loaded);
        assert!(view.is_empty());
        assert!(view.selected_workflow().is_none());
    }

    #[test]
    fn application_error_is_error_with_message() {
        let mut view = Inspection::new();
        let ticket = view.select_case(case("1001"));
        view.apply(
            &ticket,
            Err(BackendError::application("workflow load failed")),
        );
        assert_eq!(
            view.phase(),
            &ViewPhase::Error {
                message: "workflow load failed".into()
            }
        );
        assert!(!view.is_empty());
    }

    #[test]
    fn activities_are_sorted_by_sequence() {
        let mut view = Inspection::new();
        let ticket = view.select_case(case("1001"));
        view.apply(
            &ticket,
            Ok(vec![workflow(
                "WF-A",
                1,
                vec![activity("a3", 3, 1), activity("a1", 1, 2), activity("a2", 2, 2)],
            )]),
        );
        let seqs: Vec<i64> = view.workflows()[0]
            .activities
            .iter()
            .map(|a| a.sequence)
            .collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn reload_keeps_selection_by_id_after_reorder() {
        let mut view = Inspection::new();
        let ticket = view.select_case(case("1001"));
        view.apply(
            &ticket,
            Ok(vec![workflow("WF-A", 1, vec![]), workflow("WF-B", 5, vec![])]),
        );
        assert!(view.select_workflow(1));

        let ticket = view.reload().unwrap();
        view.apply(
            &ticket,
            Ok(vec![
                workflow("WF-C", 1, vec![]),
                workflow("WF-B", 1, vec![]),
                workflow("WF-A", 1, vec![]),
            ]),
        );
        assert_eq!(view.selected_index(), 1);
        assert_eq!(view.selected_workflow().unwrap().id, "WF-B");

        let ticket = view.reload().unwrap();
        view.apply(
            &ticket,
            Ok(vec![workflow("WF-A", 1, vec![]), workflow("WF-B", 1, vec![])]),
        );
        assert_eq!(view.selected_index(), 1);
        assert_eq!(view.selected_workflow().unwrap().id, "WF-B");
    }

    #[test]
    fn vanished_workflow_falls_back_to_first() {
        let mut view = Inspection::new();
        let ticket = view.select_case(case("1001"));
        view.apply(
            &ticket,
            Ok(vec![workflow("WF-A", 1, vec![]), workflow("WF-B", 5, vec![])]),
        );
        view.select_workflow(1);

        let ticket = view.reload().unwrap();
        view.apply(
            &ticket,
            Ok(vec![workflow("WF-A", 1, vec![]), workflow("WF-B2", 1, vec![])]),
        );
        assert_eq!(view.selected_index(), 0);
        assert_eq!(view.selected_workflow().unwrap().id, "WF-A");
    }

    #[test]
    fn response_for_previous_case_is_dropped() {
        let mut view = Inspection::new();
        let first = view.select_case(case("1001"));
        let second = view.select_case(case("1002"));

        assert!(!view.apply(&first, Ok(vec![workflow("WF-A", 1, vec![])])));
        assert!(view.is_loading());

        assert!(view.apply(&second, Ok(vec![workflow("WF-Z", 1, vec![])])));
        assert_eq!(view.selected_workflow().unwrap().id, "WF-Z");
    }

    #[test]
    fn overlapping_reloads_last_arrival_wins() {
        let mut view = Inspection::new();
        let ticket = view.select_case(case("1001"));
        view.apply(&ticket, Ok(vec![workflow("WF-A", 1, vec![])]));

        let older = view.reload().unwrap();
        let newer = view.reload().unwrap();
        assert!(view.apply(&newer, Ok(vec![workflow("WF-A", 2, vec![])])));
        assert!(view.apply(&older, Ok(vec![workflow("WF-A", 4, vec![])])));
        assert_eq!(
            view.selected_workflow().unwrap().status(),
            CanonicalStatus::Halted
        );
    }

    #[test]
    fn failed_reload_keeps_selection_for_the_next_success() {
        let mut view = Inspection::new();
        let ticket = view.select_case(case("1001"));
        let both = || {
            vec![
                workflow("WF-A", 1, vec![]),
                workflow("WF-B", 5, vec![activity("b1", 1, 2), activity("b2", 2, 5)]),
            ]
        };
        view.apply(&ticket, Ok(both()));
        assert!(view.select_workflow(1));
        assert!(view.select_activity(1));

        let older = view.reload().unwrap();
        let newer = view.reload().unwrap();
        assert!(view.apply(&older, Err(BackendError::transport("load workflows", "timed out"))));
        assert!(view.selected_workflow().is_none());
        assert!(view.apply(&newer, Ok(both())));

        assert_eq!(view.phase(), &ViewPhase::Loaded);
        assert_eq!(view.selected_workflow().unwrap().id, "WF-B");
        assert_eq!(view.selected_activity().unwrap().id, "b2");
    }

    #[test]
    fn selecting_workflow_is_local_and_bounded() {
        let mut view = Inspection::new();
        let ticket = view.select_case(case("1001"));
        view.apply(
            &ticket,
            Ok(vec![workflow("WF-A", 1, vec![]), workflow("WF-B", 1, vec![])]),
        );
        assert!(!view.select_workflow(2));
        view.next_workflow();
        assert_eq!(view.selected_index(), 1);
        view.next_workflow();
        assert_eq!(view.selected_index(), 0);
        view.prev_workflow();
        assert_eq!(view.selected_index(), 1);
        assert_eq!(view.phase(), &ViewPhase::Loaded);
    }

    #[test]
    fn retry_offered_only_for_failed_or_halted() {
        let mut view = Inspection::new();
        let ticket = view.select_case(case("1001"));
        view.apply(
            &ticket,
            Ok(vec![workflow(
                "WF-A",
                1,
                vec![activity("a1", 1, 2), activity("a2", 2, 5), activity("a3", 3, 4)],
            )]),
        );
        assert!(!view.retry_enabled("WF-A", "a1"));
        assert!(view.retry_enabled("WF-A", "a2"));
        assert!(view.retry_enabled("WF-A", "a3"));
        assert!(!view.retry_enabled("WF-A", "missing"));
    }

    #[test]
    fn activity_selection_survives_reload() {
        let mut view = Inspection::new();
        let ticket = view.select_case(case("1001"));
        view.apply(
            &ticket,
            Ok(vec![workflow(
                "WF-A",
                1,
                vec![activity("a1", 1, 2), activity("a2", 2, 5)],
            )]),
        );
        view.next_activity();
        assert_eq!(view.selected_activity().unwrap().id, "a2");

        let ticket = view.reload().unwrap();
        view.apply(
            &ticket,
            Ok(vec![workflow(
                "WF-A",
                1,
                vec![activity("a2", 2, 2), activity("a1", 1, 2)],
            )]),
        );
        assert_eq!(view.selected_activity().unwrap().id, "a2");
        assert_eq!(
            view.selected_activity().unwrap().status(),
            CanonicalStatus::Finished
        );
    }
}
