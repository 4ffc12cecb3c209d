//! Normalization of engine runtime-state codes.

use serde::{Deserialize, Serialize};

use crate::model::RawState;

/// The console's closed set of runtime states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalStatus {
    Dormant,
    Running,
    Finished,
    Terminated,
    Halted,
    Failed,
    Unknown,
}

impl CanonicalStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CanonicalStatus::Dormant => "Dormant",
            CanonicalStatus::Running => "Running",
            CanonicalStatus::Finished => "Finished",
            CanonicalStatus::Terminated => "Terminated",
            CanonicalStatus::Halted => "Halted",
            CanonicalStatus::Failed => "Failed",
            CanonicalStatus::Unknown => "Unknown",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            CanonicalStatus::Dormant => "○",
            CanonicalStatus::Running => "●",
            CanonicalStatus::Finished => "✓",
            CanonicalStatus::Terminated => "⊘",
            CanonicalStatus::Halted => "‖",
            CanonicalStatus::Failed => "✗",
            CanonicalStatus::Unknown => "?",
        }
    }

    /// Whether an operator may retry an activity in this state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CanonicalStatus::Failed | CanonicalStatus::Halted)
    }
}

impl std::fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Map a raw state code to its canonical status. Total: every input,
/// documented or not, yields a status.
pub fn classify(raw: &RawState) -> CanonicalStatus {
    match raw {
        RawState::Numeric(0) => CanonicalStatus::Dormant,
        RawState::Numeric(1) => CanonicalStatus::Running,
        RawState::Numeric(2) => CanonicalStatus::Finished,
        RawState::Numeric(3) => CanonicalStatus::Terminated,
        RawState::Numeric(4) => CanonicalStatus::Halted,
        RawState::Numeric(5) => CanonicalStatus::Failed,
        RawState::Numeric(_) => CanonicalStatus::Unknown,
        RawState::Textual(text) => classify_text(text),
        RawState::Absent => CanonicalStatus::Unknown,
    }
}

fn classify_text(text: &str) -> CanonicalStatus {
    match text.to_ascii_lowercase().as_str() {
        "running" | "active" => CanonicalStatus::Running,
        "halted" | "paused" => CanonicalStatus::Halted,
        "failed" => CanonicalStatus::Failed,
        "finished" | "completed" => CanonicalStatus::Finished,
        "terminated" => CanonicalStatus::Terminated,
        _ => CanonicalStatus::Unknown,
    }
}
