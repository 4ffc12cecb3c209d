//! HTTP transport for the case console API.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use caseflow_core::backend::{
    BackendError, CaseBackend, CommandAck, Page, ProcessTemplate, SearchPage, SearchQuery,
};
use caseflow_core::config::BackendConfig;
use caseflow_core::model::{Case, WorkflowInstance};

pub struct RestBackend {
    http: Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl RestBackend {
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let password = config.resolve_password()?;
        let http = Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .user_agent(concat!("caseflow/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(user) => req.basic_auth(user, self.password.as_deref()),
            None => req,
        }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        operation: &str,
        req: RequestBuilder,
    ) -> Result<T, BackendError> {
        let response = self
            .authorize(req)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| BackendError::transport(operation, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::transport(
                operation,
                format!("status {}: {}", status, truncate(&body, 200)),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::transport(operation, format!("bad response body: {}", e)))
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    cases: Vec<Case>,
    #[serde(default, rename = "hasNext")]
    has_next: bool,
    #[serde(default)]
    error: Option<String>,
}

impl SearchResponse {
    fn into_page(self) -> Result<SearchPage, BackendError> {
        match self.error {
            Some(message) => Err(BackendError::application(message)),
            None => Ok(Page::new(self.cases, self.has_next)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WorkflowsResponse {
    #[serde(default)]
    workflows: Vec<WorkflowInstance>,
    #[serde(default)]
    error: Option<String>,
}

impl WorkflowsResponse {
    fn into_workflows(self) -> Result<Vec<WorkflowInstance>, BackendError> {
        match self.error {
            Some(message) => Err(BackendError::application(message)),
            None => Ok(self.workflows),
        }
    }
}

/// Repository collection: `{entries: [{content: {properties}}], links: [{rel}]}`.
#[derive(Debug, Deserialize)]
struct EntryFeed<T> {
    #[serde(default)]
    entries: Vec<Entry<T>>,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Entry<T> {
    content: Option<EntryContent<T>>,
}

#[derive(Debug, Deserialize)]
struct EntryContent<T> {
    properties: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(default)]
    rel: String,
}

impl<T> EntryFeed<T> {
    fn into_page(self) -> Page<T> {
        let has_more = self.links.iter().any(|l| l.rel == "next");
        let items = self
            .entries
            .into_iter()
            .filter_map(|e| e.content.and_then(|c| c.properties))
            .collect();
        Page::new(items, has_more)
    }
}

#[async_trait]
impl CaseBackend for RestBackend {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn search_cases(&self, query: &SearchQuery) -> Result<SearchPage, BackendError> {
        let mut params: Vec<(&str, String)> = vec![
            ("page", query.page.to_string()),
            ("size", query.page_size.to_string()),
        ];
        if let Some(number) = &query.case_number {
            params.push(("caseNumber", number.clone()));
        }
        if let Some(since) = query.created_after {
            params.push(("createdAfter", since.format("%Y-%m-%d").to_string()));
        }
        debug!(?params, "GET /api/cases/search");

        let req = self.http.get(self.url("/api/cases/search")).query(&params);
        let body: SearchResponse = self.fetch("search cases", req).await?;
        body.into_page()
    }

    async fn workflows_for_case(
        &self,
        case_id: &str,
    ) -> Result<Vec<WorkflowInstance>, BackendError> {
        let req = self
            .http
            .get(self.url(&format!("/api/cases/{}/workflows", case_id)));
        let body: WorkflowsResponse = self.fetch("load workflows", req).await?;
        body.into_workflows()
    }

    async fn restart_workflow(&self, workflow_id: &str) -> Result<CommandAck, BackendError> {
        let req = self
            .http
            .post(self.url(&format!("/api/workflows/{}/restart", workflow_id)));
        self.fetch("restart", req).await
    }

    async fn retry_activity(
        &self,
        workflow_id: &str,
        activity_id: &str,
    ) -> Result<CommandAck, BackendError> {
        let req = self.http.post(self.url(&format!(
            "/api/workflows/{}/activities/{}/retry",
            workflow_id, activity_id
        )));
        self.fetch("retry", req).await
    }

    async fn process_templates(&self) -> Result<Vec<ProcessTemplate>, BackendError> {
        let req = self.http.get(self.url("/api/workflows/processes"));
        self.fetch("list processes", req).await
    }

    async fn running_workflows(
        &self,
        process_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<Page<WorkflowInstance>, BackendError> {
        let req = self.http.get(self.url("/api/workflows/instances")).query(&[
            ("processName", process_id.to_string()),
            ("page", page.to_string()),
            ("size", page_size.to_string()),
        ]);
        let feed: EntryFeed<WorkflowInstance> = self.fetch("list instances", req).await?;
        Ok(feed.into_page())
    }
}
