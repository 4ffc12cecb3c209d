//! Remedial commands and the in-flight set that serializes them per target.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backend::{BackendError, CaseBackend, CommandAck};
use crate::model::{ActivityId, WorkflowId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Restart,
    Retry,
}

impl ActionKind {
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Restart => "restart",
            ActionKind::Retry => "retry",
        }
    }
}

/// `(kind, target)` pair guarded by the in-flight set.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActionKey {
    pub kind: ActionKind,
    pub target: String,
}

impl ActionKey {
    pub fn new(kind: ActionKind, target: impl Into<String>) -> Self {
        Self {
            kind,
            target: target.into(),
        }
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.label(), self.target)
    }
}

/// Commands an operator can issue against the process engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum RemedialCommand {
    RestartWorkflow {
        workflow_id: WorkflowId,
    },
    RetryActivity {
        workflow_id: WorkflowId,
        activity_id: ActivityId,
    },
}

impl RemedialCommand {
    pub fn key(&self) -> ActionKey {
        match self {
            RemedialCommand::RestartWorkflow { workflow_id } => {
                ActionKey::new(ActionKind::Restart, workflow_id.clone())
            }
            RemedialCommand::RetryActivity { activity_id, .. } => {
                ActionKey::new(ActionKind::Retry, activity_id.clone())
            }
        }
    }

    pub fn workflow_id(&self) -> &str {
        match self {
            RemedialCommand::RestartWorkflow { workflow_id }
            | RemedialCommand::RetryActivity { workflow_id, .. } => workflow_id,
        }
    }

    /// Send the command; `ok: false` replies come back as errors.
    pub async fn send(&self, backend: &dyn CaseBackend) -> Result<CommandAck, BackendError> {
        match self {
            RemedialCommand::RestartWorkflow { workflow_id } => backend
                .restart_workflow(workflow_id)
                .await?
                .into_result("restart"),
            RemedialCommand::RetryActivity {
                workflow_id,
                activity_id,
            } => backend
                .retry_activity(workflow_id, activity_id)
                .await?
                .into_result("retry"),
        }
    }
}

impl fmt::Display for RemedialCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemedialCommand::RestartWorkflow { workflow_id } => {
                write!(f, "restart workflow {}", workflow_id)
            }
            RemedialCommand::RetryActivity {
                workflow_id,
                activity_id,
            } => write!(f, "retry activity {} of {}", activity_id, workflow_id),
        }
    }
}

/// Commands currently awaiting a reply. At most one entry per key.
#[derive(Clone, Debug, Default)]
pub struct InFlight {
    keys: BTreeSet<ActionKey>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`. Returns `false` if it is already in flight.
    pub fn try_acquire(&mut self, key: &ActionKey) -> bool {
        self.keys.insert(key.clone())
    }

    pub fn release(&mut self, key: &ActionKey) -> bool {
        self.keys.remove(key)
    }

    pub fn contains(&self, key: &ActionKey) -> bool {
        self.keys.contains(key)
    }

    pub fn is_busy(&self, kind: ActionKind, target: &str) -> bool {
        self.keys
            .iter()
            .any(|k| k.kind == kind && k.target == target)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionKey> {
        self.keys.iter()
    }
}

/// What happened to a dispatched command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Same command already in flight; nothing was sent
    Rejected,
    Succeeded,
    Failed(BackendError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_entry_per_key() {
        let mut in_flight = InFlight::new();
        let restart = ActionKey::new(ActionKind::Restart, "WF-A");

        assert!(in_flight.try_acquire(&restart));
        assert!(!in_flight.try_acquire(&restart));
        assert_eq!(in_flight.len(), 1);

        assert!(in_flight.release(&restart));
        assert!(!in_flight.release(&restart));
        assert!(in_flight.try_acquire(&restart));
    }

    #[test]
    fn keys_are_scoped_by_kind_and_target() {
        let mut in_flight = InFlight::new();
        assert!(in_flight.try_acquire(&ActionKey::new(ActionKind::Retry, "act-1")));
        assert!(in_flight.try_acquire(&ActionKey::new(ActionKind::Retry, "act-2")));
        assert!(in_flight.try_acquire(&ActionKey::new(ActionKind::Restart, "act-1")));
        assert_eq!(in_flight.len(), 3);
        assert!(in_flight.is_busy(ActionKind::Retry, "act-2"));
        assert!(!in_flight.is_busy(ActionKind::Restart, "act-2"));
    }

    #[test]
    fn command_keys() {
        let restart = RemedialCommand::RestartWorkflow {
            workflow_id: "WF-A".into(),
        };
        let retry = RemedialCommand::RetryActivity {
            workflow_id: "WF-B".into(),
            activity_id: "act-9".into(),
        };
        assert_eq!(restart.key(), ActionKey::new(ActionKind::Restart, "WF-A"));
        assert_eq!(retry.key(), ActionKey::new(ActionKind::Retry, "act-9"));
        assert_eq!(retry.workflow_id(), "WF-B");
        assert_eq!(retry.to_string(), "retry activity act-9 of WF-B");
    }
}
