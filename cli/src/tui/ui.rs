use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Row, Table, Wrap},
    Frame,
};
use taskdeck_core::{format_due, Field, Status, TaskFormController};
use unicode_width::UnicodeWidthStr;

use crate::tui::app::{App, InputMode};

fn status_style(status: Status) -> Style {
    match status {
        Status::Completed => Style::default().fg(Color::Green),
        Status::InProgress => Style::default().fg(Color::Cyan),
        Status::Pending => Style::default(),
    }
}

pub fn draw(f: &mut Frame, app: &mut App) {
    let size = f.area();

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(1),    // Content
            Constraint::Length(1), // Error / notice
            Constraint::Length(1), // Footer/Help
        ])
        .split(size);

    let header = Paragraph::new("TASKDECK")
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_type(BorderType::Rounded));
    f.render_widget(header, main_chunks[0]);

    let content_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(60),
            Constraint::Percentage(40),
        ])
        .split(main_chunks[1]);

    draw_task_list(f, app, content_chunks[0]);
    draw_detail_view(f, app, content_chunks[1]);
    draw_status_line(f, app, main_chunks[2]);

    let help = match app.input_mode() {
        InputMode::Normal if app.workspace.list().row_actions_enabled() => {
            "j/k: Navigate | space: Toggle | s: Advance | a: Add | e: Edit | d: Delete | g: Refresh | q: Quit"
        }
        InputMode::Normal => "j/k: Navigate | space: Toggle | s: Advance | a: Add | g: Refresh | q: Quit",
        InputMode::Form => "Tab/Shift-Tab: Field | ←/→: Cursor or Status | Enter: Save | Esc: Cancel",
        InputMode::ConfirmDelete => "y: Delete | n/Esc: Keep",
    };
    let footer = Paragraph::new(help)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    f.render_widget(footer, main_chunks[3]);

    match app.input_mode() {
        InputMode::Form => draw_form(f, app, size),
        InputMode::ConfirmDelete => draw_confirm(f, size),
        InputMode::Normal => {}
    }
}

fn draw_task_list(f: &mut Frame, app: &mut App, area: Rect) {
    let list = app.workspace.list();
    let title = if list.is_loading() { " Tasks (loading...) " } else { " My Tasks " };
    let block = Block::default().title(title).borders(Borders::ALL).border_type(BorderType::Rounded);

    if list.tasks().is_empty() {
        let message = if list.is_loading() {
            "Loading..."
        } else {
            "No tasks found. Add a new task to get started!"
        };
        let empty = Paragraph::new(message)
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(empty, area);
        return;
    }

    let rows: Vec<Row> = list.tasks().iter().map(|task| {
        let (status_icon, title_style) = match task.status {
            Status::Completed => ("✔", Style::default().add_modifier(Modifier::CROSSED_OUT)),
            Status::InProgress => ("◐", Style::default().add_modifier(Modifier::BOLD)),
            Status::Pending => ("☐", Style::default().add_modifier(Modifier::BOLD)),
        };
        let due_str = task.due_date.map(format_due).unwrap_or_else(|| "-".to_string());

        Row::new(vec![
            Span::styled(status_icon, status_style(task.status)),
            Span::styled(task.title.clone(), title_style),
            Span::styled(task.status.label(), status_style(task.status)),
            Span::raw(due_str),
        ])
    }).collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(3),  // Status icon
            Constraint::Min(10),    // Title
            Constraint::Length(12), // Status
            Constraint::Length(13), // Due
        ]
    )
    .header(Row::new(vec!["St", "Task", "Status", "Due"]).style(Style::default().fg(Color::Yellow)))
    .block(block)
    .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol(">> ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn draw_detail_view(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().title(" Detail ").borders(Borders::ALL).border_type(BorderType::Rounded);
    let Some(task) = app.selected_task() else {
        f.render_widget(block, area);
        return;
    };

    let mut detail_text = vec![
        Line::from(vec![
            Span::styled("Title: ", Style::default().fg(Color::Blue)),
            Span::styled(&task.title, Style::default().add_modifier(Modifier::BOLD)),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("ID: ", Style::default().fg(Color::DarkGray)),
            Span::raw(task.id.to_string()),
        ]),
        Line::from(vec![
            Span::styled("Status: ", Style::default().fg(Color::Blue)),
            Span::styled(task.status.label(), status_style(task.status)),
        ]),
    ];

    if let Some(due) = task.due_date {
        detail_text.push(Line::from(vec![
            Span::styled("Due: ", Style::default().fg(Color::Blue)),
            Span::raw(format_due(due)),
        ]));
    }

    if let Some(desc) = task.description.as_deref().filter(|d| !d.is_empty()) {
        detail_text.push(Line::from(""));
        detail_text.push(Line::from(Span::styled("Description:", Style::default().fg(Color::Blue))));
        detail_text.push(Line::from(desc));
    }

    let detail = Paragraph::new(detail_text)
        .block(block)
        .wrap(Wrap { trim: true });
    f.render_widget(detail, area);
}

fn draw_status_line(f: &mut Frame, app: &App, area: Rect) {
    let line = if let Some(failed) = app.workspace.list().last_error() {
        let hint = if failed.error.is_retryable() { "  (r: retry, x: dismiss)" } else { "  (x: dismiss)" };
        Line::from(vec![
            Span::styled(failed.message(), Style::default().fg(Color::Red)),
            Span::styled(hint, Style::default().fg(Color::DarkGray)),
        ])
    } else if let Some(notice) = &app.notice {
        Line::from(Span::styled(notice.as_str(), Style::default().fg(Color::Yellow)))
    } else {
        Line::from("")
    };
    f.render_widget(Paragraph::new(line), area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn draw_confirm(f: &mut Frame, area: Rect) {
    let popup = centered_rect(50, 5, area);
    f.render_widget(Clear, popup);
    let body = Paragraph::new(vec![
        Line::from("Are you sure you want to delete this task?"),
        Line::from(Span::styled("y: yes   n: no", Style::default().fg(Color::DarkGray))),
    ])
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .title(" Delete ")
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::Red)),
    );
    f.render_widget(body, popup);
}

fn draw_form(f: &mut Frame, app: &App, area: Rect) {
    let Some(form) = app.workspace.active_form() else { return };

    let popup = centered_rect(64, 16, area);
    f.render_widget(Clear, popup);

    let block = Block::default()
        .title(format!(" {} ", form.title()))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(popup);
    f.render_widget(block, popup);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Length(3), // Description
            Constraint::Length(3), // Status
            Constraint::Length(3), // Due Date
            Constraint::Length(1), // Save state / error
            Constraint::Min(0),
        ])
        .split(inner);

    for (field, chunk) in Field::ALL.iter().zip(chunks.iter()) {
        draw_form_field(f, app, form, *field, *chunk);
    }

    let state_line = if form.is_submitting() {
        Line::from(Span::styled("Saving...", Style::default().fg(Color::Yellow)))
    } else if let Some(err) = form.last_error() {
        Line::from(Span::styled(format!("Could not save: {}", err), Style::default().fg(Color::Red)))
    } else {
        Line::from("")
    };
    f.render_widget(Paragraph::new(state_line), chunks[4]);
}

fn draw_form_field(f: &mut Frame, app: &App, form: &TaskFormController, field: Field, area: Rect) {
    let focused = app.focus == field;
    let error = form.errors().get(field);

    let border_style = if form.is_submitting() {
        Style::default().fg(Color::DarkGray)
    } else if error.is_some() {
        Style::default().fg(Color::Red)
    } else if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };

    let title = match error {
        Some(message) => format!(" {} - {} ", field.label(), message),
        None => format!(" {} ", field.label()),
    };

    let value = form.draft().get(field);
    let text = if field == Field::Status {
        format!("< {} >", value)
    } else {
        value.to_string()
    };

    let input = Paragraph::new(text)
        .style(if form.is_submitting() { Style::default().fg(Color::DarkGray) } else { Style::default() })
        .block(Block::default().title(title).borders(Borders::ALL).border_style(border_style));
    f.render_widget(input, area);

    if focused && field != Field::Status && !form.is_submitting() {
        let before: String = value.chars().take(app.cursor_position).collect();
        let x = area.x + 1 + before.width() as u16;
        f.set_cursor_position((x.min(area.right().saturating_sub(2)), area.y + 1));
    }
}
