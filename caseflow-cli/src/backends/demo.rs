//! Seeded in-memory backend used when no backend is configured.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use caseflow_core::backend::{
    BackendError, CaseBackend, CommandAck, Page, ProcessTemplate, SearchPage, SearchQuery,
};
use caseflow_core::model::{Activity, Case, RawState, WorkflowInstance};
use caseflow_core::status::CanonicalStatus;

/// Case whose workflow load always fails, to exercise the error view
const BROKEN_CASE: &str = "C-1013";

const PROCESSES: [(&str, &str); 3] = [
    ("LoanApproval", "Loan approval"),
    ("AccountOpening", "Account opening"),
    ("KycReview", "KYC review"),
];

const STEPS: [&str; 4] = ["Intake", "Verify documents", "Credit check", "Approve"];

struct DemoStore {
    cases: Vec<Case>,
    workflows: BTreeMap<String, Vec<WorkflowInstance>>,
}

pub struct DemoBackend {
    latency: Duration,
    store: Mutex<DemoStore>,
}

impl DemoBackend {
    pub fn new() -> Self {
        Self::seeded(Utc::now())
    }

    #[cfg(test)]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn seeded(now: DateTime<Utc>) -> Self {
        let offices = ["HO", "RO-North", "RO-South", "RO-East"];
        let departments = ["Retail Lending", "Operations", "Compliance"];
        let mut cases = Vec::new();
        let mut workflows = BTreeMap::new();

        for n in 0..36u32 {
            let number = format!("C-{}", 1001 + n);
            let case_id = format!("0b{:014x}", 0x1001 + n);
            // every fifth case is older than the default lookback
            let age_days = if n % 5 == 4 { 120 + i64::from(n) } else { i64::from(n) * 2 };
            let created = now - chrono::Duration::days(age_days);

            cases.push(Case {
                id: case_id.clone(),
                case_number: number.clone(),
                subject: Some(format!("{} for customer {}", PROCESSES[n as usize % 3].1, 5000 + n)),
                description: None,
                office: Some(offices[n as usize % offices.len()].to_string()),
                department: Some(departments[n as usize % departments.len()].to_string()),
                functions: Some("case-management".to_string()),
                created_at: Some(created.to_rfc3339()),
            });

            let wfs = if number == "C-1001" {
                scenario_workflows(&created)
            } else {
                generated_workflows(n, &created)
            };
            workflows.insert(case_id, wfs);
        }

        Self {
            latency: Duration::from_millis(150),
            store: Mutex::new(DemoStore { cases, workflows }),
        }
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, DemoStore>, BackendError> {
        self.store
            .lock()
            .map_err(|_| BackendError::application("demo store is poisoned"))
    }
}

impl Default for DemoBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn activity(wf: &str, seq: i64, code: i64, created: &DateTime<Utc>) -> Activity {
    Activity {
        id: format!("{}-act-{}", wf, seq),
        sequence: seq,
        name: STEPS.get(seq as usize - 1).map(|s| s.to_string()),
        performer: if code == 0 {
            None
        } else {
            Some(format!("ops{}", seq))
        },
        state: RawState::Numeric(code),
        created_at: Some((*created + chrono::Duration::hours(seq)).to_rfc3339()),
    }
}

/// C-1001: WF-A is running cleanly, WF-B is stuck on a failed second step.
fn scenario_workflows(created: &DateTime<Utc>) -> Vec<WorkflowInstance> {
    vec![
        WorkflowInstance {
            id: "WF-A".into(),
            process_name: "LoanApproval".into(),
            supervisor: Some("jdoe".into()),
            started_at: Some(created.to_rfc3339()),
            state: RawState::Numeric(1),
            activities: vec![
                activity("WF-A", 1, 2, created),
                activity("WF-A", 2, 1, created),
            ],
        },
        WorkflowInstance {
            id: "WF-B".into(),
            process_name: "KycReview".into(),
            supervisor: Some("asmith".into()),
            started_at: Some(created.to_rfc3339()),
            state: RawState::Numeric(4),
            // out of order on purpose; the view sorts by sequence
            activities: vec![
                activity("WF-B", 3, 0, created),
                activity("WF-B", 1, 2, created),
                activity("WF-B", 2, 5, created),
            ],
        },
    ]
}

fn generated_workflows(n: u32, created: &DateTime<Utc>) -> Vec<WorkflowInstance> {
    let count = (n % 3) as usize;
    (0..count)
        .map(|i| {
            let id = format!("4d{:014x}", 0x1001 * 4 + n * 4 + i as u32);
            let (wf_state, failing) = match (n + i as u32) % 6 {
                0 => (RawState::Numeric(2), None),
                1 | 2 => (RawState::Numeric(1), None),
                3 => (RawState::Numeric(4), Some(4)),
                4 => (RawState::from("paused"), Some(4)),
                _ => (RawState::Numeric(4), Some(5)),
            };
            let finished_steps = 1 + (n as i64 + i as i64) % 3;
            let mut activities: Vec<Activity> = (1..=finished_steps)
                .map(|seq| activity(&id, seq, 2, created))
                .collect();
            let next_seq = finished_steps + 1;
            match (failing, &wf_state) {
                (Some(code), _) => activities.push(activity(&id, next_seq, code, created)),
                (None, RawState::Numeric(1)) => {
                    activities.push(activity(&id, next_seq, 1, created))
                }
                _ => {}
            }
            WorkflowInstance {
                id,
                process_name: PROCESSES[(n as usize + i) % 3].0.to_string(),
                supervisor: Some("ops".into()),
                started_at: Some(created.to_rfc3339()),
                state: wf_state,
                activities,
            }
        })
        .collect()
}

fn created_on_or_after(case: &Case, since: Option<NaiveDate>) -> bool {
    let Some(since) = since else {
        return true;
    };
    case.created_at
        .as_deref()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .is_some_and(|at| at.date_naive() >= since)
}

fn overfetch<T: Clone>(rows: &[T], page: u32, page_size: u32) -> Page<T> {
    let size = page_size.max(1) as usize;
    let offset = (page.max(1) as usize - 1) * size;
    let window: Vec<T> = rows.iter().skip(offset).take(size + 1).cloned().collect();
    Page::from_overfetch(window, size)
}

#[async_trait]
impl CaseBackend for DemoBackend {
    fn name(&self) -> &'static str {
        "demo"
    }

    async fn search_cases(&self, query: &SearchQuery) -> Result<SearchPage, BackendError> {
        self.pause().await;
        let store = self.lock()?;
        let needle = query.case_number.as_deref().map(str::to_ascii_lowercase);

        let mut matches: Vec<Case> = store
            .cases
            .iter()
            .filter(|c| match &needle {
                Some(needle) => c.case_number.to_ascii_lowercase().contains(needle.as_str()),
                None => created_on_or_after(c, query.created_after),
            })
            .cloned()
            .collect();
        // newest first
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(overfetch(&matches, query.page, query.page_size))
    }

    async fn workflows_for_case(
        &self,
        case_id: &str,
    ) -> Result<Vec<WorkflowInstance>, BackendError> {
        self.pause().await;
        let store = self.lock()?;
        let broken = store
            .cases
            .iter()
            .any(|c| c.id == case_id && c.case_number == BROKEN_CASE);
        if broken {
            return Err(BackendError::transport(
                "load workflows",
                "status 502 Bad Gateway: repository unavailable",
            ));
        }
        Ok(store.workflows.get(case_id).cloned().unwrap_or_default())
    }

    async fn restart_workflow(&self, workflow_id: &str) -> Result<CommandAck, BackendError> {
        self.pause().await;
        let mut store = self.lock()?;
        let Some(wf) = store
            .workflows
            .values_mut()
            .flatten()
            .find(|wf| wf.id == workflow_id)
        else {
            return Ok(CommandAck::rejected(format!("workflow {} not found", workflow_id)));
        };

        if wf.status() == CanonicalStatus::Finished {
            return Ok(CommandAck::rejected("workflow already finished"));
        }
        wf.state = RawState::Numeric(1);
        for act in &mut wf.activities {
            if act.is_retryable() {
                act.state = RawState::Numeric(1);
            }
        }
        Ok(CommandAck {
            ok: true,
            message: Some("workflow restarted".into()),
        })
    }

    async fn retry_activity(
        &self,
        workflow_id: &str,
        activity_id: &str,
    ) -> Result<CommandAck, BackendError> {
        self.pause().await;
        let mut store = self.lock()?;
        let Some(wf) = store
            .workflows
            .values_mut()
            .flatten()
            .find(|wf| wf.id == workflow_id)
        else {
            return Ok(CommandAck::rejected(format!("workflow {} not found", workflow_id)));
        };
        let Some(act) = wf.activities.iter_mut().find(|a| a.id == activity_id) else {
            return Ok(CommandAck::rejected(format!("activity {} not found", activity_id)));
        };
        if !act.is_retryable() {
            return Ok(CommandAck::rejected("activity is not in a retryable state"));
        }

        act.state = RawState::Numeric(2);
        let blocked = wf.activities.iter().any(Activity::is_retryable);
        if !blocked {
            wf.state = RawState::Numeric(1);
        }
        Ok(CommandAck::ok())
    }

    async fn process_templates(&self) -> Result<Vec<ProcessTemplate>, BackendError> {
        self.pause().await;
        Ok(PROCESSES
            .iter()
            .map(|(id, title)| ProcessTemplate {
                id: id.to_string(),
                title: Some(title.to_string()),
            })
            .collect())
    }

    async fn running_workflows(
        &self,
        process_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Page<WorkflowInstance>, BackendError> {
        self.pause().await;
        let store = self.lock()?;
        let running: Vec<WorkflowInstance> = store
            .workflows
            .values()
            .flatten()
            .filter(|wf| wf.process_name == process_id)
            .filter(|wf| {
                !matches!(
                    wf.status(),
                    CanonicalStatus::Finished | CanonicalStatus::Terminated
                )
            })
            .cloned()
            .collect();
        Ok(overfetch(&running, page, page_size))
    }
}
