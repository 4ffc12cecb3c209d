use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{
        Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table,
        TableState, Tabs, Wrap,
    },
};

use caseflow_core::activity_log::filtered_log;
use caseflow_core::inspection::ViewPhase;
use caseflow_core::model::{WorkflowInstance, display_time};
use caseflow_core::search::{PagePhase, Paginator};
use caseflow_core::state::ConsoleState;

use super::app::{App, Focus, Mode, Tab};
use crate::ui::styles;

pub fn draw(f: &mut Frame, app: &App, state: &ConsoleState, title: &str) {
    let area = f.area();
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(5),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(area);

    draw_header(f, app, state, title, outer[0]);
    match app.tab {
        Tab::Cases => draw_cases_tab(f, app, state, outer[1]),
        Tab::Processes => draw_processes_tab(f, app, state, outer[1]),
    }
    draw_notice_bar(f, app, state, outer[2]);
    draw_key_bar(f, app, outer[3]);

    match &app.mode {
        Mode::Log {
            workflow_id,
            activity_id,
        } => draw_log_overlay(f, app, state, workflow_id, activity_id, area),
        Mode::Help => draw_help(f, area),
        Mode::Normal | Mode::Search => {}
    }
}

fn draw_header(f: &mut Frame, app: &App, state: &ConsoleState, title: &str, area: Rect) {
    let mut spans = vec![
        Span::styled(" caseflow ", styles::accent_bold()),
        Span::styled(title.to_string(), styles::text()),
        Span::raw("  "),
    ];
    for tab in Tab::all() {
        spans.push(Span::styled(
            format!(" {} ", tab.label()),
            styles::tab(tab == app.tab),
        ));
    }
    if !state.in_flight.is_empty() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("{} command(s) pending", state.in_flight.len()),
            styles::warn(),
        ));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_cases_tab(f: &mut Frame, app: &App, state: &ConsoleState, area: Rect) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(38), Constraint::Percentage(62)])
        .split(area);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3), Constraint::Length(1)])
        .split(cols[0]);

    draw_search_bar(f, app, state, left[0]);
    draw_case_list(f, app, state, left[1]);
    f.render_widget(
        Paragraph::new(pager_footer(state.search.pager())),
        left[2],
    );
    draw_inspection(f, app, state, cols[1]);
}

fn draw_search_bar(f: &mut Frame, app: &App, state: &ConsoleState, area: Rect) {
    let editing = app.mode == Mode::Search;
    let block = Block::default()
        .title(" Case number ")
        .borders(Borders::ALL)
        .border_style(styles::border(editing));

    let text = if editing {
        Line::from(vec![
            Span::styled("/", styles::key_hint()),
            Span::styled(app.input.clone(), styles::text()),
        ])
    } else if state.search.term().is_empty() {
        Line::from(Span::styled(
            format!(
                "recent cases (last {} months)  / to search",
                state.settings.recent_months
            ),
            styles::text_muted(),
        ))
    } else {
        Line::from(Span::styled(state.search.term().to_string(), styles::text()))
    };

    f.render_widget(Paragraph::new(text).block(block), area);
    if editing {
        f.set_cursor_position((area.x + 2 + app.input.chars().count() as u16, area.y + 1));
    }
}

fn draw_case_list(f: &mut Frame, app: &App, state: &ConsoleState, area: Rect) {
    let focused = app.focus == Focus::CaseList && app.mode == Mode::Normal;
    let block = Block::default()
        .title(" Cases ")
        .borders(Borders::ALL)
        .border_style(styles::border(focused));

    let pager = state.search.pager();
    let placeholder = match pager.phase() {
        PagePhase::Idle => Some(("Press / to search".to_string(), styles::text_muted())),
        PagePhase::Loading if pager.items().is_empty() => {
            Some(("Loading...".to_string(), styles::text_dim()))
        }
        PagePhase::Failed { message } => Some((message.clone(), styles::error())),
        PagePhase::Ready if pager.items().is_empty() => {
            Some(("No cases found".to_string(), styles::text_muted()))
        }
        _ => None,
    };
    if let Some((text, style)) = placeholder {
        f.render_widget(
            Paragraph::new(Span::styled(text, style))
                .wrap(Wrap { trim: true })
                .block(block),
            area,
        );
        return;
    }

    let items: Vec<ListItem> = state
        .search
        .cases()
        .iter()
        .enumerate()
        .map(|(i, case)| {
            let subject = case.subject.as_deref().unwrap_or("");
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:>4} ", pager.row_number(i)), styles::text_muted()),
                Span::styled(format!("{:<10} ", case.case_number), styles::text()),
                Span::styled(subject.to_string(), styles::text_dim()),
            ]))
        })
        .collect();

    let mut list_state = ListState::default().with_selected(Some(app.case_cursor));
    let list = List::new(items)
        .block(block)
        .highlight_style(styles::selection())
        .highlight_symbol("▶ ");
    f.render_stateful_widget(list, area, &mut list_state);
}

/// "Showing 11-20 of 30+" style footer for a paged listing.
fn pager_footer<T>(pager: &Paginator<T>) -> Line<'static> {
    let cursor = pager.cursor();
    let mut spans = Vec::new();
    match (pager.range(), pager.total_estimate()) {
        (Some((start, end)), Some(total)) => spans.push(Span::styled(
            format!(" Showing {}-{} of {}", start, end, total),
            styles::text_dim(),
        )),
        (None, Some(total)) => spans.push(Span::styled(
            format!(" {} results", total),
            styles::text_dim(),
        )),
        _ if pager.is_loading() => spans.push(Span::styled(" loading", styles::text_dim())),
        _ => spans.push(Span::styled(" -", styles::text_muted())),
    }
    spans.push(Span::styled(
        format!("  page {} · {}/page", cursor.page, cursor.page_size),
        styles::text_muted(),
    ));
    if pager.has_prev() {
        spans.push(Span::styled("  [ prev", styles::key_hint()));
    }
    if pager.has_next() {
        spans.push(Span::styled("  ] next", styles::key_hint()));
    }
    Line::from(spans)
}

fn draw_inspection(f: &mut Frame, app: &App, state: &ConsoleState, area: Rect) {
    let focused = app.focus == Focus::Workflows && app.mode == Mode::Normal;
    let view = &state.inspection;
    let title = match view.case() {
        Some(case) => format!(" Workflows: {} ", case.case_number),
        None => " Workflows ".to_string(),
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(styles::border(focused));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let message = match view.phase() {
        ViewPhase::Idle => Some((
            "Select a case to inspect its workflows".to_string(),
            styles::text_muted(),
        )),
        ViewPhase::Loading if view.workflows().is_empty() => {
            Some(("Loading workflows...".to_string(), styles::text_dim()))
        }
        ViewPhase::Error { message } => Some((message.clone(), styles::error())),
        ViewPhase::Loaded if view.is_empty() => Some((
            "No workflows are attached to this case".to_string(),
            styles::text_muted(),
        )),
        _ => None,
    };
    if let Some((text, style)) = message {
        f.render_widget(
            Paragraph::new(Span::styled(text, style)).wrap(Wrap { trim: true }),
            inner,
        );
        return;
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Min(3)])
        .split(inner);

    let titles: Vec<Line> = view
        .workflows()
        .iter()
        .map(|wf| {
            let status = wf.status();
            Line::from(vec![
                Span::styled(status.icon(), styles::status(status)),
                Span::raw(" "),
                Span::raw(wf.process_name.clone()),
            ])
        })
        .collect();
    f.render_widget(
        Tabs::new(titles)
            .select(view.selected_index())
            .style(styles::text_dim())
            .highlight_style(styles::tab(true))
            .divider("│"),
        rows[0],
    );

    if let Some(wf) = view.selected_workflow() {
        f.render_widget(Paragraph::new(workflow_summary(wf)), rows[1]);
        draw_activity_table(f, wf, view.selected_activity_index(), state, rows[2]);
    }
}

fn workflow_summary(wf: &WorkflowInstance) -> Line<'static> {
    let status = wf.status();
    Line::from(vec![
        Span::styled(format!("{} ", status.label()), styles::status(status)),
        Span::styled(format!("{}  ", wf.id), styles::text_muted()),
        Span::styled(
            format!("supervisor {}  ", wf.supervisor.as_deref().unwrap_or("-")),
            styles::text_dim(),
        ),
        Span::styled(
            format!("started {}", display_time(wf.started_at.as_deref())),
            styles::text_dim(),
        ),
    ])
}

fn draw_activity_table(
    f: &mut Frame,
    wf: &WorkflowInstance,
    selected: usize,
    state: &ConsoleState,
    area: Rect,
) {
    if wf.activities.is_empty() {
        f.render_widget(
            Paragraph::new(Span::styled("No activities", styles::text_muted())),
            area,
        );
        return;
    }

    let header = Row::new(["#", "Activity", "Performer", "Status", "Created", ""])
        .style(styles::text_muted());
    let rows: Vec<Row> = wf
        .activities
        .iter()
        .map(|act| {
            let status = act.status();
            let marker = if state
                .in_flight
                .is_busy(caseflow_core::dispatch::ActionKind::Retry, &act.id)
            {
                Span::styled("retrying", styles::warn())
            } else if act.is_retryable() {
                Span::styled("t retry", styles::key_hint())
            } else {
                Span::raw("")
            };
            Row::new(vec![
                Cell::from(act.sequence.to_string()),
                Cell::from(act.display_name()),
                Cell::from(act.performer.clone().unwrap_or_else(|| "-".into())),
                Cell::from(Span::styled(
                    format!("{} {}", status.icon(), status.label()),
                    styles::status(status),
                )),
                Cell::from(display_time(act.created_at.as_deref())),
                Cell::from(marker),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(4),
        Constraint::Min(14),
        Constraint::Length(14),
        Constraint::Length(13),
        Constraint::Length(17),
        Constraint::Length(9),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .row_highlight_style(styles::selection())
        .highlight_symbol("▶ ");
    let mut table_state = TableState::default().with_selected(Some(selected));
    f.render_stateful_widget(table, area, &mut table_state);
}

fn draw_processes_tab(f: &mut Frame, app: &App, state: &ConsoleState, area: Rect) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(32), Constraint::Min(20)])
        .split(area);
    let monitor = &state.processes;

    let block = Block::default()
        .title(" Processes ")
        .borders(Borders::ALL)
        .border_style(styles::border(true));
    if let Some(err) = monitor.templates_error() {
        f.render_widget(
            Paragraph::new(Span::styled(err.to_string(), styles::error()))
                .wrap(Wrap { trim: true })
                .block(block),
            cols[0],
        );
    } else {
        let items: Vec<ListItem> = monitor
            .templates()
            .iter()
            .map(|t| {
                let style = if monitor.selected() == Some(t.id.as_str()) {
                    styles::accent_bold()
                } else {
                    styles::text()
                };
                ListItem::new(Span::styled(t.display_name().to_string(), style))
            })
            .collect();
        let mut list_state = ListState::default().with_selected(Some(app.process_cursor));
        f.render_stateful_widget(
            List::new(items)
                .block(block)
                .highlight_style(styles::selection())
                .highlight_symbol("▶ "),
            cols[0],
            &mut list_state,
        );
    }

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(cols[1]);
    let title = match monitor.selected_template() {
        Some(t) => format!(" Running: {} ", t.display_name()),
        None => " Running instances ".to_string(),
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(styles::border(false));

    let pager = monitor.pager();
    match pager.phase() {
        PagePhase::Failed { message } => f.render_widget(
            Paragraph::new(Span::styled(message.clone(), styles::error())).block(block),
            right[0],
        ),
        PagePhase::Idle => f.render_widget(
            Paragraph::new(Span::styled(
                "Enter on a process lists its running instances",
                styles::text_muted(),
            ))
            .block(block),
            right[0],
        ),
        _ => {
            let header = Row::new(["#", "Workflow", "Supervisor", "Status", "Started"])
                .style(styles::text_muted());
            let rows: Vec<Row> = monitor
                .instances()
                .iter()
                .enumerate()
                .map(|(i, wf)| {
                    let status = wf.status();
                    Row::new(vec![
                        Cell::from(pager.row_number(i).to_string()),
                        Cell::from(wf.id.clone()),
                        Cell::from(wf.supervisor.clone().unwrap_or_else(|| "-".into())),
                        Cell::from(Span::styled(status.label(), styles::status(status))),
                        Cell::from(display_time(wf.started_at.as_deref())),
                    ])
                })
                .collect();
            let widths = [
                Constraint::Length(5),
                Constraint::Min(16),
                Constraint::Length(14),
                Constraint::Length(11),
                Constraint::Length(17),
            ];
            f.render_widget(Table::new(rows, widths).header(header).block(block), right[0]);
        }
    }
    f.render_widget(Paragraph::new(pager_footer(pager)), right[1]);
}

fn draw_notice_bar(f: &mut Frame, app: &App, state: &ConsoleState, area: Rect) {
    let line = match state.notices.latest() {
        Some(notice) if app.toast_visible() => Line::from(Span::styled(
            format!(" {}", notice.text),
            styles::notice(notice.level),
        )),
        _ => Line::from(""),
    };
    f.render_widget(Paragraph::new(line), area);
}

fn draw_key_bar(f: &mut Frame, app: &App, area: Rect) {
    let hints: &[(&str, &str)] = match (&app.mode, app.tab, app.focus) {
        (Mode::Search, _, _) => &[("Enter", "search"), ("Esc", "cancel")],
        (Mode::Log { .. }, _, _) => &[("f", "filter"), ("Esc", "close")],
        (Mode::Help, _, _) => &[("Esc", "close")],
        (Mode::Normal, Tab::Processes, _) => &[
            ("j/k", "move"),
            ("Enter", "list"),
            ("[ ]", "page"),
            ("r", "reload"),
            ("Tab", "cases"),
            ("q", "quit"),
        ],
        (Mode::Normal, Tab::Cases, Focus::CaseList) => &[
            ("/", "search"),
            ("Enter", "inspect"),
            ("[ ]", "page"),
            ("s", "page size"),
            ("c", "clear"),
            ("?", "help"),
            ("q", "quit"),
        ],
        (Mode::Normal, Tab::Cases, Focus::Workflows) => &[
            ("h/l", "workflow"),
            ("j/k", "activity"),
            ("R", "restart"),
            ("t", "retry"),
            ("L", "log"),
            ("r", "reload"),
            ("Esc", "cases"),
        ],
    };
    let mut spans = Vec::new();
    for (key, label) in hints {
        spans.push(Span::styled(format!(" {} ", key), styles::key_hint()));
        spans.push(Span::styled(format!("{} ", label), styles::text_dim()));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_log_overlay(
    f: &mut Frame,
    app: &App,
    state: &ConsoleState,
    workflow_id: &str,
    activity_id: &str,
    area: Rect,
) {
    let rect = centered(area, 80, 60);
    f.render_widget(Clear, rect);

    let activity = state.inspection.find_activity(workflow_id, activity_id);
    let title = match activity {
        Some(act) => format!(" Log: {} [{}] ", act.display_name(), app.log_filter.label()),
        None => " Log ".to_string(),
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(styles::border(true));

    let lines: Vec<Line> = match activity {
        Some(act) => {
            let log = filtered_log(act, app.log_filter);
            if log.is_empty() {
                vec![Line::from(Span::styled(
                    "No lines match the filter",
                    styles::text_muted(),
                ))]
            } else {
                log.into_iter()
                    .map(|line| {
                        Line::from(vec![
                            Span::styled(format!("{:<5} ", line.level), styles::log_level(line.level)),
                            Span::styled(line.text, styles::text()),
                        ])
                    })
                    .collect()
            }
        }
        None => vec![Line::from(Span::styled(
            "Activity is no longer part of the inspected case",
            styles::warn(),
        ))],
    };
    f.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: false }).block(block),
        rect,
    );
}

fn draw_help(f: &mut Frame, area: Rect) {
    let rect = centered(area, 60, 70);
    f.render_widget(Clear, rect);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border(true))
        .title(" Help - Press ? or Esc to close ");

    let entries = [
        ("Tab", "Switch between cases and processes"),
        ("/", "Search by case number"),
        ("Enter", "Inspect the selected case"),
        ("[ ]", "Previous / next page"),
        ("s", "Cycle page size"),
        ("c", "Clear search"),
        ("h/l", "Previous / next workflow"),
        ("j/k", "Move selection"),
        ("R", "Restart the active workflow"),
        ("t", "Retry the selected activity"),
        ("L", "Show the activity log"),
        ("r", "Reload"),
        ("q", "Quit"),
    ];
    let lines: Vec<Line> = entries
        .iter()
        .map(|(key, text)| {
            Line::from(vec![
                Span::styled(format!("  {:<7}", key), styles::key_hint()),
                Span::styled(*text, styles::text()),
            ])
        })
        .collect();
    f.render_widget(Paragraph::new(lines).block(block), rect);
}

fn centered(area: Rect, pct_x: u16, pct_y: u16) -> Rect {
    let width = (area.width * pct_x / 100).max(20).min(area.width);
    let height = (area.height * pct_y / 100).max(6).min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}
