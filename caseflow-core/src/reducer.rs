use std::time::SystemTime;

use tracing::debug;

use crate::backend::{BackendError, CommandAck, Page, ProcessTemplate, SearchPage};
use crate::dispatch::RemedialCommand;
use crate::inspection::LoadTicket;
use crate::model::WorkflowInstance;
use crate::notices::NoticeLevel;
use crate::search::PageTicket;
use crate::state::ConsoleState;

/// Something the backend answered, or something the operator should hear about.
#[derive(Clone, Debug)]
pub enum ConsoleEvent {
    SearchSettled {
        ticket: PageTicket,
        result: Result<SearchPage, BackendError>,
    },
    WorkflowsSettled {
        ticket: LoadTicket,
        result: Result<Vec<WorkflowInstance>, BackendError>,
    },
    TemplatesSettled {
        result: Result<Vec<ProcessTemplate>, BackendError>,
    },
    InstancesSettled {
        ticket: PageTicket,
        process_id: String,
        result: Result<Page<WorkflowInstance>, BackendError>,
    },
    CommandSettled {
        command: RemedialCommand,
        result: Result<CommandAck, BackendError>,
    },
    Notice {
        level: NoticeLevel,
        text: String,
    },
}

#[derive(Clone, Debug)]
pub struct EventEnvelope {
    pub id: u64,
    pub at: SystemTime,
    pub event: ConsoleEvent,
}

pub fn reduce(state: &mut ConsoleState, env: &EventEnvelope) {
    state.last_event_id = env.id;

    match &env.event {
        ConsoleEvent::SearchSettled { ticket, result } => {
            let applied = state.search.apply(*ticket, result.clone());
            // errors from superseded searches are dropped silently
            if applied {
                if let Err(err) = result {
                    state.notices.push(NoticeLevel::Error, err.to_string());
                }
            }
        }
        ConsoleEvent::WorkflowsSettled { ticket, result } => {
            let applied = state.inspection.apply(ticket, result.clone());
            if applied {
                if let Err(err) = result {
                    state.notices.push(NoticeLevel::Error, err.to_string());
                }
            }
        }
        ConsoleEvent::TemplatesSettled { result } => {
            if let Err(err) = result {
                state.notices.push(NoticeLevel::Error, err.to_string());
            }
            state.processes.set_templates(result.clone());
        }
        ConsoleEvent::InstancesSettled {
            ticket,
            process_id,
            result,
        } => {
            if state.processes.selected() != Some(process_id.as_str()) {
                debug!(process_id = %process_id, "discarding instances for an unselected process");
                return;
            }
            let applied = state.processes.apply(*ticket, result.clone());
            if applied {
                if let Err(err) = result {
                    state.notices.push(NoticeLevel::Error, err.to_string());
                }
            }
        }
        ConsoleEvent::CommandSettled { command, result } => {
            state.in_flight.release(&command.key());
            match result {
                Ok(ack) => {
                    let text = match ack.message.as_deref() {
                        Some(msg) if !msg.is_empty() => format!("{}: {}", command, msg),
                        _ => format!("{} succeeded", command),
                    };
                    state.notices.push(NoticeLevel::Success, text);
                }
                Err(err) => {
                    state
                        .notices
                        .push(NoticeLevel::Error, format!("{} failed: {}", command, err));
                }
            }
        }
        ConsoleEvent::Notice { level, text } => {
            state.notices.push(*level, text.clone());
        }
    }
}
