use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Case, WorkflowInstance};

/// Failure of a backend call.
///
/// `Transport` covers network errors, timeouts and non-2xx replies;
/// `Application` is a well-formed error payload from the backend.
/// An empty result is never an error.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("{operation} failed: {message}")]
    Transport { operation: String, message: String },
    #[error("{message}")]
    Application { message: String },
}

impl BackendError {
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        BackendError::Transport {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn application(message: impl Into<String>) -> Self {
        BackendError::Application {
            message: message.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, BackendError::Transport { .. })
    }
}

/// One page of results plus the "there is more" signal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, has_more: bool) -> Self {
        Self { items, has_more }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            has_more: false,
        }
    }

    /// Build a page from a query that asked for `page_size + 1` rows.
    /// The extra row only signals that another page exists.
    pub fn from_overfetch(mut rows: Vec<T>, page_size: usize) -> Self {
        let has_more = rows.len() > page_size;
        rows.truncate(page_size);
        Self {
            items: rows,
            has_more,
        }
    }
}

pub type SearchPage = Page<Case>;

/// Case search request as sent to the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// `None` asks for recent cases instead of a case-number match
    pub case_number: Option<String>,
    /// Lower bound on creation date for the recent-cases query
    pub created_after: Option<NaiveDate>,
    pub page: u32,
    pub page_size: u32,
}

/// Reply to a remedial command.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandAck {
    pub ok: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl CommandAck {
    pub fn ok() -> Self {
        Self {
            ok: true,
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
        }
    }

    /// Treat `ok: false` as an application-level failure.
    pub fn into_result(self, operation: &str) -> Result<CommandAck, BackendError> {
        if self.ok {
            Ok(self)
        } else {
            let message = self
                .message
                .unwrap_or_else(|| format!("{} was refused by the engine", operation));
            Err(BackendError::application(message))
        }
    }
}

/// A process definition whose running instances can be monitored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessTemplate {
    /// Identifier passed back when listing instances
    #[serde(rename = "object_name", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

impl ProcessTemplate {
    pub fn display_name(&self) -> &str {
        match &self.title {
            Some(title) if !title.is_empty() => title,
            _ => &self.id,
        }
    }
}

/// The process-engine-backed API the console talks to.
///
/// Implementations:
/// - `RestBackend` (cli): HTTP client for the console API
/// - `DemoBackend` (cli): seeded in-memory engine for demos
#[async_trait]
pub trait CaseBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search_cases(&self, query: &SearchQuery) -> Result<SearchPage, BackendError>;

    /// All workflow instances attached to a case, each with its activities.
    async fn workflows_for_case(&self, case_id: &str)
    -> Result<Vec<WorkflowInstance>, BackendError>;

    async fn restart_workflow(&self, workflow_id: &str) -> Result<CommandAck, BackendError>;

    async fn retry_activity(
        &self,
        workflow_id: &str,
        activity_id: &str,
    ) -> Result<CommandAck, BackendError>;

    async fn process_templates(&self) -> Result<Vec<ProcessTemplate>, BackendError>;

    async fn running_workflows(
        &self,
        process_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Page<WorkflowInstance>, BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overfetch_row_sets_has_more() {
        let page = Page::from_overfetch(vec![1, 2, 3, 4], 3);
        assert_eq!(page.items, vec![1, 2, 3]);
        assert!(page.has_more);

        let page = Page::from_overfetch(vec![1, 2, 3], 3);
        assert_eq!(page.items.len(), 3);
        assert!(!page.has_more);
    }

    #[test]
    fn refused_ack_becomes_application_error() {
        let err = CommandAck::rejected("workflow is locked")
            .into_result("restart")
            .unwrap_err();
        assert_eq!(err, BackendError::application("workflow is locked"));
        assert!(!err.is_transport());

        let err = CommandAck::default().into_result("retry").unwrap_err();
        assert_eq!(err.to_string(), "retry was refused by the engine");
    }

    #[test]
    fn transport_error_names_the_operation() {
        let err = BackendError::transport("search cases", "connection refused");
        assert_eq!(err.to_string(), "search cases failed: connection refused");
        assert!(err.is_transport());
    }
}
