//! Case, workflow and activity records as the console API reports them.
//!
//! Field names follow the property maps the repository returns, so a
//! `Case` can be deserialized straight from `{"r_object_id": ..., ...}`.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::status::{CanonicalStatus, classify};

pub type CaseId = String;
pub type WorkflowId = String;
pub type ActivityId = String;

/// Engine-reported runtime state code.
///
/// Source objects report this inconsistently: sometimes an integer,
/// sometimes a string, sometimes nothing at all.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RawState {
    Numeric(i64),
    Textual(String),
    #[default]
    Absent,
}

impl RawState {
    pub fn status(&self) -> CanonicalStatus {
        classify(self)
    }
}

impl fmt::Display for RawState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawState::Numeric(code) => write!(f, "{}", code),
            RawState::Textual(text) => write!(f, "{}", text),
            RawState::Absent => write!(f, "-"),
        }
    }
}

impl From<i64> for RawState {
    fn from(code: i64) -> Self {
        RawState::Numeric(code)
    }
}

impl From<&str> for RawState {
    fn from(text: &str) -> Self {
        RawState::Textual(text.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRepr {
    Int(i64),
    Float(f64),
    Text(String),
    Other(serde::de::IgnoredAny),
}

impl<'de> Deserialize<'de> for RawState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = Option::<RawRepr>::deserialize(deserializer)?;
        Ok(match repr {
            Some(RawRepr::Int(code)) => RawState::Numeric(code),
            Some(RawRepr::Float(value))
                if value.fract() == 0.0 && value.abs() < i64::MAX as f64 =>
            {
                RawState::Numeric(value as i64)
            }
            Some(RawRepr::Float(value)) => RawState::Textual(value.to_string()),
            Some(RawRepr::Text(text)) => RawState::Textual(text),
            Some(RawRepr::Other(_)) | None => RawState::Absent,
        })
    }
}

impl Serialize for RawState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RawState::Numeric(code) => serializer.serialize_i64(*code),
            RawState::Textual(text) => serializer.serialize_str(text),
            RawState::Absent => serializer.serialize_none(),
        }
    }
}

/// A business case that workflow instances are attached to.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Case {
    #[serde(rename = "r_object_id")]
    pub id: CaseId,
    /// Case number (`object_name` in the repository)
    #[serde(rename = "object_name", default)]
    pub case_number: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Owning office (head office / regional office code)
    #[serde(rename = "ho_ro", default)]
    pub office: Option<String>,
    #[serde(rename = "department_name", default)]
    pub department: Option<String>,
    #[serde(default)]
    pub functions: Option<String>,
    #[serde(rename = "r_creation_date", default)]
    pub created_at: Option<String>,
}

/// One step of a workflow instance.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    #[serde(rename = "r_object_id")]
    pub id: ActivityId,
    /// Ordering key within the parent workflow
    #[serde(rename = "r_act_seqno", default)]
    pub sequence: i64,
    #[serde(rename = "r_act_name", default)]
    pub name: Option<String>,
    #[serde(rename = "r_performer_name", default)]
    pub performer: Option<String>,
    #[serde(rename = "r_runtime_state", default)]
    pub state: RawState,
    #[serde(rename = "r_creation_date", default)]
    pub created_at: Option<String>,
}

impl Activity {
    pub fn status(&self) -> CanonicalStatus {
        self.state.status()
    }

    pub fn is_retryable(&self) -> bool {
        self.status().is_retryable()
    }

    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("activity #{}", self.sequence),
        }
    }
}

/// A running or completed execution of a process attached to a case.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInstance {
    #[serde(rename = "r_object_id")]
    pub id: WorkflowId,
    #[serde(rename = "object_name", default)]
    pub process_name: String,
    #[serde(rename = "supervisor_name", default)]
    pub supervisor: Option<String>,
    #[serde(rename = "r_start_date", default)]
    pub started_at: Option<String>,
    #[serde(rename = "r_runtime_state", default)]
    pub state: RawState,
    #[serde(default)]
    pub activities: Vec<Activity>,
}

impl WorkflowInstance {
    pub fn status(&self) -> CanonicalStatus {
        self.state.status()
    }

    /// Sort activities by sequence number, ascending. Stable, so
    /// duplicate sequence numbers keep the backend's order.
    pub fn sort_activities(&mut self) {
        self.activities.sort_by_key(|a| a.sequence);
    }

    pub fn activity(&self, id: &str) -> Option<&Activity> {
        self.activities.iter().find(|a| a.id == id)
    }
}

/// Render a backend timestamp for display.
///
/// RFC 3339 values are shortened to minutes; anything else is shown as-is.
pub fn display_time(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return "-".to_string();
    };
    match chrono::DateTime::parse_from_rfc3339(raw) {
        Ok(at) => at.format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_state_accepts_every_shape() {
        let parse = |json: &str| serde_json::from_str::<RawState>(json).unwrap();
        assert_eq!(parse("5"), RawState::Numeric(5));
        assert_eq!(parse("2.0"), RawState::Numeric(2));
        assert_eq!(parse("1.5"), RawState::Textual("1.5".into()));
        assert_eq!(parse("\"running\""), RawState::Textual("running".into()));
        assert_eq!(parse("null"), RawState::Absent);
        assert_eq!(parse("true"), RawState::Absent);
        assert_eq!(parse("[1, 2]"), RawState::Absent);
    }

    #[test]
    fn workflow_from_repository_properties() {
        let json = serde_json::json!({
            "r_object_id": "4d01",
            "object_name": "LoanApproval",
            "supervisor_name": "dmadmin",
            "r_start_date": "2024-03-01T09:30:00.000+00:00",
            "r_runtime_state": 1,
            "activities": [
                { "r_object_id": "4a02", "r_act_seqno": 2, "r_runtime_state": "failed" },
                { "r_object_id": "4a01", "r_act_seqno": 1 }
            ]
        });
        let mut wf: WorkflowInstance = serde_json::from_value(json).unwrap();
        wf.sort_activities();

        assert_eq!(wf.process_name, "LoanApproval");
        assert_eq!(wf.status(), CanonicalStatus::Running);
        assert_eq!(wf.activities[0].id, "4a01");
        assert_eq!(wf.activities[0].state, RawState::Absent);
        assert_eq!(wf.activities[1].status(), CanonicalStatus::Failed);
        assert!(wf.activities[1].is_retryable());
    }

    #[test]
    fn case_tolerates_missing_fields() {
        let case: Case = serde_json::from_str(r#"{"r_object_id": "0b01"}"#).unwrap();
        assert_eq!(case.id, "0b01");
        assert!(case.case_number.is_empty());
        assert!(case.office.is_none());
    }

    #[test]
    fn display_time_falls_back_to_raw() {
        assert_eq!(
            display_time(Some("2024-03-01T09:30:00.000+00:00")),
            "2024-03-01 09:30"
        );
        assert_eq!(display_time(Some("03/01/2024")), "03/01/2024");
        assert_eq!(display_time(None), "-");
    }
}
