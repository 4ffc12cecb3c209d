//! Event trail for a single activity.
//!
//! Synthesized locally from the activity record. A deployment with a real
//! log store would fetch the trail here instead, behind the same function.

use serde::Serialize;

use crate::model::{Activity, display_time};
use crate::status::CanonicalStatus;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debug => write!(f, "DEBUG"),
            Self::Info => write!(f, "INFO"),
            Self::Warn => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFilterMode {
    #[default]
    All,
    WarnAndAbove,
    ErrorOnly,
}

impl LogFilterMode {
    pub fn cycle(self) -> Self {
        match self {
            Self::All => Self::WarnAndAbove,
            Self::WarnAndAbove => Self::ErrorOnly,
            Self::ErrorOnly => Self::All,
        }
    }

    pub fn matches(&self, level: LogLevel) -> bool {
        match self {
            Self::All => true,
            Self::WarnAndAbove => level >= LogLevel::Warn,
            Self::ErrorOnly => level == LogLevel::Error,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::WarnAndAbove => "WARN+",
            Self::ErrorOnly => "ERROR",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActivityLogLine {
    pub level: LogLevel,
    pub text: String,
}

impl ActivityLogLine {
    fn new(level: LogLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

impl std::fmt::Display for ActivityLogLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:<5}] {}", self.level, self.text)
    }
}

/// Ordered log lines for `activity`: creation, assignment, state, and a
/// closing failure annotation when the activity failed.
pub fn activity_log(activity: &Activity) -> Vec<ActivityLogLine> {
    let status = activity.status();
    let mut lines = Vec::with_capacity(4);

    lines.push(ActivityLogLine::new(
        LogLevel::Info,
        format!(
            "{} created at {}",
            activity.display_name(),
            display_time(activity.created_at.as_deref())
        ),
    ));

    lines.push(match activity.performer.as_deref() {
        Some(performer) if !performer.is_empty() => {
            ActivityLogLine::new(LogLevel::Info, format!("assigned to {}", performer))
        }
        _ => ActivityLogLine::new(LogLevel::Warn, "no performer assigned"),
    });

    let state_level = match status {
        CanonicalStatus::Halted | CanonicalStatus::Terminated | CanonicalStatus::Unknown => {
            LogLevel::Warn
        }
        CanonicalStatus::Failed => LogLevel::Error,
        _ => LogLevel::Info,
    };
    lines.push(ActivityLogLine::new(
        state_level,
        format!("state {} (code {})", status.label().to_lowercase(), activity.state),
    ));

    if status == CanonicalStatus::Failed {
        lines.push(ActivityLogLine::new(
            LogLevel::Error,
            format!(
                "activity #{} failed; the workflow is waiting for a retry",
                activity.sequence
            ),
        ));
    }

    lines
}

/// `activity_log` filtered by level.
pub fn filtered_log(activity: &Activity, mode: LogFilterMode) -> Vec<ActivityLogLine> {
    activity_log(activity)
        .into_iter()
        .filter(|line| mode.matches(line.level))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawState;

    fn activity(code: RawState, performer: Option<&str>) -> Activity {
        Activity {
            id: "4a01".into(),
            sequence: 3,
            name: Some("Review".into()),
            performer: performer.map(str::to_string),
            state: code,
            created_at: Some("2024-03-01T09:30:00Z".into()),
        }
    }

    #[test]
    fn running_activity_has_three_lines() {
        let lines = activity_log(&activity(RawState::Numeric(1), Some("jdoe")));
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "Review created at 2024-03-01 09:30",
                "assigned to jdoe",
                "state running (code 1)",
            ]
        );
        assert!(lines.iter().all(|l| l.level == LogLevel::Info));
    }

    #[test]
    fn failed_activity_ends_with_failure_annotation() {
        let lines = activity_log(&activity(RawState::Numeric(5), Some("jdoe")));
        assert_eq!(lines.len(), 4);
        let last = lines.last().unwrap();
        assert_eq!(last.level, LogLevel::Error);
        assert!(last.text.contains("failed"));
    }

    #[test]
    fn missing_fields_still_produce_a_trail() {
        let mut bare = activity(RawState::Absent, None);
        bare.name = None;
        bare.created_at = None;
        let lines = activity_log(&bare);
        assert_eq!(lines[0].text, "activity #3 created at -");
        assert_eq!(lines[1].level, LogLevel::Warn);
        assert_eq!(lines[2].text, "state unknown (code -)");
    }

    #[test]
    fn filter_mode_cycle() {
        let mode = LogFilterMode::All;
        assert_eq!(mode.cycle(), LogFilterMode::WarnAndAbove);
        assert_eq!(mode.cycle().cycle(), LogFilterMode::ErrorOnly);
        assert_eq!(mode.cycle().cycle().cycle(), LogFilterMode::All);
    }

    #[test]
    fn filtered_log_keeps_errors_only() {
        let failed = activity(RawState::from("failed"), None);
        let errors = filtered_log(&failed, LogFilterMode::ErrorOnly);
        assert_eq!(errors.len(), 2);
        let warn_up = filtered_log(&failed, LogFilterMode::WarnAndAbove);
        assert_eq!(warn_up.len(), 3);
    }

    #[test]
    fn display_pads_level() {
        let line = ActivityLogLine::new(LogLevel::Info, "assigned to jdoe");
        assert_eq!(line.to_string(), "[INFO ] assigned to jdoe");
    }
}
