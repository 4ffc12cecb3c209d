use crate::backend::ProcessTemplate;
use crate::dispatch::InFlight;
use crate::inspection::Inspection;
use crate::notices::Notices;
use crate::processes::ProcessMonitor;
use crate::search::{CaseSearch, DEFAULT_PAGE_SIZE};

const MAX_NOTICES: usize = 50;

/// Knobs the session is created with.
#[derive(Clone, Debug)]
pub struct ConsoleSettings {
    pub page_size: u32,
    /// Page sizes the operator can cycle through
    pub page_sizes: Vec<u32>,
    /// Lookback window for the recent-cases query; 0 disables it
    pub recent_months: u32,
    /// Preconfigured process templates; empty means ask the backend
    pub processes: Vec<ProcessTemplate>,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            page_sizes: vec![5, 10, 25, 50],
            recent_months: 3,
            processes: Vec::new(),
        }
    }
}

impl ConsoleSettings {
    /// The page size after `current` in the configured cycle.
    pub fn next_page_size(&self, current: u32) -> u32 {
        if self.page_sizes.is_empty() {
            return current;
        }
        match self.page_sizes.iter().position(|s| *s == current) {
            Some(pos) => self.page_sizes[(pos + 1) % self.page_sizes.len()],
            None => self.page_sizes[0],
        }
    }
}

/// Everything one operator session owns.
#[derive(Debug)]
pub struct ConsoleState {
    pub settings: ConsoleSettings,
    pub search: CaseSearch,
    pub inspection: Inspection,
    pub processes: ProcessMonitor,
    pub in_flight: InFlight,
    pub notices: Notices,
    pub last_event_id: u64,
}

impl ConsoleState {
    pub fn new(settings: ConsoleSettings) -> Self {
        let mut processes = ProcessMonitor::new(settings.page_size);
        if !settings.processes.is_empty() {
            processes.set_templates(Ok(settings.processes.clone()));
        }
        Self {
            search: CaseSearch::new(settings.page_size, settings.recent_months),
            inspection: Inspection::new(),
            processes,
            in_flight: InFlight::new(),
            notices: Notices::new(MAX_NOTICES),
            last_event_id: 0,
            settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_cycle_wraps() {
        let settings = ConsoleSettings::default();
        assert_eq!(settings.next_page_size(10), 25);
        assert_eq!(settings.next_page_size(50), 5);
        assert_eq!(settings.next_page_size(7), 5);
    }

    #[test]
    fn configured_processes_seed_the_monitor() {
        let settings = ConsoleSettings {
            processes: vec![ProcessTemplate {
                id: "LoanApproval".into(),
                title: Some("Loan approval".into()),
            }],
            ..Default::default()
        };
        let state = ConsoleState::new(settings);
        assert_eq!(state.processes.templates().len(), 1);
        assert_eq!(state.search.pager().cursor().page_size, 10);
    }
}
