//! Running instances per process template.

use crate::backend::{BackendError, Page, ProcessTemplate};
use crate::model::WorkflowInstance;
use crate::search::{PageTicket, Paginator};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstancesRequest {
    pub ticket: PageTicket,
    pub process_id: String,
}

#[derive(Clone, Debug)]
pub struct ProcessMonitor {
    templates: Vec<ProcessTemplate>,
    templates_error: Option<String>,
    selected: Option<String>,
    pager: Paginator<WorkflowInstance>,
}

impl ProcessMonitor {
    pub fn new(page_size: u32) -> Self {
        Self {
            templates: Vec::new(),
            templates_error: None,
            selected: None,
            pager: Paginator::new(page_size),
        }
    }

    pub fn templates(&self) -> &[ProcessTemplate] {
        &self.templates
    }

    pub fn templates_error(&self) -> Option<&str> {
        self.templates_error.as_deref()
    }

    pub fn set_templates(&mut self, result: Result<Vec<ProcessTemplate>, BackendError>) {
        match result {
            Ok(templates) => {
                self.templates = templates;
                self.templates_error = None;
            }
            Err(err) => {
                self.templates.clear();
                self.templates_error = Some(err.to_string());
            }
        }
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected_template(&self) -> Option<&ProcessTemplate> {
        let id = self.selected.as_deref()?;
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn pager(&self) -> &Paginator<WorkflowInstance> {
        &self.pager
    }

    pub fn instances(&self) -> &[WorkflowInstance] {
        self.pager.items()
    }

    /// Select a process and list its first page.
    pub fn select_process(&mut self, process_id: &str) -> InstancesRequest {
        self.selected = Some(process_id.to_string());
        let ticket = self.pager.issue(1);
        InstancesRequest {
            ticket,
            process_id: process_id.to_string(),
        }
    }

    pub fn change_page(&mut self, page: u32) -> Option<InstancesRequest> {
        let process_id = self.selected.clone()?;
        if page == 0 {
            return None;
        }
        let ticket = self.pager.issue(page);
        Some(InstancesRequest { ticket, process_id })
    }

    pub fn change_page_size(&mut self, page_size: u32) -> Option<InstancesRequest> {
        let process_id = self.selected.clone()?;
        if page_size == 0 {
            return None;
        }
        let ticket = self.pager.resize(page_size);
        Some(InstancesRequest { ticket, process_id })
    }

    pub fn apply(
        &mut self,
        ticket: PageTicket,
        result: Result<Page<WorkflowInstance>, BackendError>,
    ) -> bool {
        self.pager.apply(ticket, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instances(n: usize) -> Vec<WorkflowInstance> {
        (0..n)
            .map(|i| WorkflowInstance {
                id: format!("4d{:02}", i),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn paging_requires_a_selected_process() {
        let mut monitor = ProcessMonitor::new(10);
        assert!(monitor.change_page(2).is_none());

        let req = monitor.select_process("LoanApproval");
        assert_eq!(req.ticket.page, 1);
        assert!(monitor.apply(req.ticket, Ok(Page::new(instances(10), true))));

        let next = monitor.change_page(2).unwrap();
        assert_eq!(next.process_id, "LoanApproval");
        assert_eq!(next.ticket.page, 2);
    }

    #[test]
    fn switching_process_drops_old_pages() {
        let mut monitor = ProcessMonitor::new(10);
        let old = monitor.select_process("LoanApproval");
        let new = monitor.select_process("AccountOpening");

        assert!(!monitor.apply(old.ticket, Ok(Page::new(instances(10), true))));
        assert!(monitor.apply(new.ticket, Ok(Page::new(instances(2), false))));
        assert_eq!(monitor.instances().len(), 2);
        assert_eq!(monitor.pager().total_estimate().unwrap().to_string(), "2");
    }

    #[test]
    fn template_errors_are_kept_for_display() {
        let mut monitor = ProcessMonitor::new(10);
        monitor.set_templates(Err(BackendError::transport("list processes", "timed out")));
        assert!(monitor.templates().is_empty());
        assert_eq!(
            monitor.templates_error(),
            Some("list processes failed: timed out")
        );

        monitor.set_templates(Ok(vec![ProcessTemplate {
            id: "LoanApproval".into(),
            title: None,
        }]));
        assert!(monitor.templates_error().is_none());
        monitor.select_process("LoanApproval");
        assert_eq!(
            monitor.selected_template().map(|t| t.display_name()),
            Some("LoanApproval")
        );
    }
}
