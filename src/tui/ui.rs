use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use super::app::{App, AppMode, SettingsField};
use crate::core::{FailureKind, Job, SessionState};

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

fn fg(color: Color) -> Style {
    Style::default().fg(color)
}

fn bold(color: Color) -> Style {
    fg(color).add_modifier(Modifier::BOLD)
}

fn boxed(title: &str) -> Block<'_> {
    Block::default().borders(Borders::ALL).title(title)
}

fn status_color(status: &str) -> Color {
    match status {
        "completed" => Color::Green,
        "failed" => Color::Red,
        "running" => Color::Yellow,
        "queued" => Color::Blue,
        _ => Color::Gray,
    }
}

/// Draw the current screen, then the session overlay if any
pub fn draw(frame: &mut Frame, app: &App) {
    match app.mode {
        AppMode::Main | AppMode::Input => draw_main(frame, app),
        AppMode::JobDetail => draw_job_detail(frame, app),
        AppMode::Settings => draw_settings(frame, app),
    }

    match app.session.state() {
        SessionState::Idle => {}
        SessionState::Submitting { .. } => draw_generating(frame, app),
        SessionState::Succeeded { image_urls } => draw_result(frame, app, image_urls),
        SessionState::Failed { error } => {
            let prompt = app.session.last_request().map(|r| r.prompt_preview(60));
            draw_failed(frame, &error.to_string(), error.kind(), prompt)
        }
    }
}

fn draw_main(frame: &mut Frame, app: &App) {
    let [top, history, status, help] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(10),
        Constraint::Length(3),
        Constraint::Length(2),
    ])
    .areas(frame.area());

    if app.mode == AppMode::Input {
        draw_prompt_box(frame, app, top);
    } else {
        let banner = Line::from(vec![
            Span::styled("AI Painter", bold(Color::Magenta)),
            Span::styled(" - Stable Diffusion text-to-image", fg(Color::Gray)),
        ]);
        frame.render_widget(
            Paragraph::new(banner).block(boxed("").border_style(fg(Color::Magenta))),
            top,
        );
    }

    draw_history(frame, app, history);
    draw_status(frame, app, status);

    let keys = if app.mode == AppMode::Input {
        "Enter: Generate | Esc: Cancel"
    } else {
        "i: New prompt | Enter: View | R: Run again | s: Settings | d: Delete | r: Refresh | q: Quit"
    };
    draw_keys(frame, keys, help);
}

/// Prompt entry; shows the placeholder dimmed while empty
fn draw_prompt_box(frame: &mut Frame, app: &App, area: Rect) {
    let text = if app.input.is_empty() {
        Span::styled(app.session.placeholder(), fg(Color::DarkGray))
    } else {
        Span::styled(app.input.as_str(), fg(Color::White))
    };
    let block = boxed("Prompt (Enter to generate, Esc to cancel)").border_style(fg(Color::Cyan));
    frame.render_widget(Paragraph::new(Line::from(text)).block(block), area);

    let col = (app.cursor_pos as u16).min(area.width.saturating_sub(3));
    frame.set_cursor_position((area.x + 1 + col, area.y + 1));
}

fn history_row(job: &Job, selected: bool) -> ListItem<'_> {
    let id_style = if selected { bold(Color::Cyan) } else { fg(Color::White) };
    let status = job.status_name();
    ListItem::new(Line::from(vec![
        Span::styled(format!("{:<12} ", job.id), id_style),
        Span::styled(format!("{:<10} ", status), fg(status_color(status))),
        Span::styled(format!("{:<12} ", job.request.model_id()), fg(Color::DarkGray)),
        Span::raw(job.prompt_preview(50)),
    ]))
}

fn draw_history(frame: &mut Frame, app: &App, area: Rect) {
    let rows: Vec<ListItem> = app
        .jobs
        .iter()
        .enumerate()
        .map(|(i, job)| history_row(job, i == app.selected_job))
        .collect();

    let title = format!("History ({})", app.jobs.len());
    let list = List::new(rows)
        .block(boxed(&title))
        .highlight_style(bold(Color::White).bg(Color::DarkGray));

    let mut state = ListState::default()
        .with_selected((!app.jobs.is_empty()).then_some(app.selected_job));
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_status(frame: &mut Frame, app: &App, area: Rect) {
    let (text, color) = match (&app.error_message, &app.status_message) {
        (Some(err), _) => (err.as_str(), Color::Red),
        (None, Some(msg)) => (msg.as_str(), Color::Green),
        (None, None) if app.session.is_submitting() => ("Generating...", Color::Yellow),
        (None, None) => ("Ready", Color::Gray),
    };
    frame.render_widget(Paragraph::new(text).style(fg(color)).block(boxed("Status")), area);
}

fn draw_keys(frame: &mut Frame, keys: &str, area: Rect) {
    frame.render_widget(Paragraph::new(keys).style(fg(Color::DarkGray)), area);
}

/// A rectangle of `percent_x` by `height` centered in `area`
fn centered_rect(percent_x: u16, height: u16, area: Rect) -> Rect {
    let height = height.min(area.height);
    let width = (u32::from(area.width) * u32::from(percent_x.min(100)) / 100) as u16;
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

/// Clear `area` and draw a bordered popup over whatever is below
fn draw_popup(frame: &mut Frame, area: Rect, title: &str, color: Color, lines: Vec<Line>) {
    let popup = Paragraph::new(lines)
        .block(boxed(title).border_style(fg(color)))
        .wrap(Wrap { trim: false });
    frame.render_widget(Clear, area);
    frame.render_widget(popup, area);
}

fn draw_generating(frame: &mut Frame, app: &App) {
    let prompt = app
        .active_job
        .as_ref()
        .map(|job| job.prompt_preview(80))
        .unwrap_or_default();

    let lines = vec![
        Line::from(vec![
            Span::styled(SPINNER[app.tick % SPINNER.len()], fg(Color::Magenta)),
            Span::styled(" Painting...", bold(Color::Yellow)),
        ]),
        Line::default(),
        Line::from(prompt),
        Line::default(),
        Line::styled("Esc: Cancel", fg(Color::DarkGray)),
    ];
    let area = centered_rect(60, 7, frame.area());
    draw_popup(frame, area, "Generating", Color::Magenta, lines);
}

fn draw_result(frame: &mut Frame, app: &App, image_urls: &[String]) {
    let mut lines = vec![Line::styled("Image ready", bold(Color::Green)), Line::default()];
    lines.extend(image_urls.iter().map(|url| Line::styled(url.as_str(), fg(Color::Cyan))));

    if let Some(path) = app.active_image_path() {
        lines.push(Line::default());
        lines.push(Line::from(vec![
            Span::styled("Saved to: ", fg(Color::Gray)),
            Span::raw(path),
        ]));
    }
    lines.push(Line::default());
    lines.push(Line::styled("n: New prompt | Enter/Esc: Close", fg(Color::DarkGray)));

    let area = centered_rect(80, 12, frame.area());
    draw_popup(frame, area, "Result", Color::Green, lines);
}

fn draw_failed(frame: &mut Frame, message: &str, kind: FailureKind, prompt: Option<String>) {
    let mut lines = vec![
        Line::styled(format!("Generation failed ({})", kind), bold(Color::Red)),
        Line::default(),
        Line::from(message),
    ];
    if let Some(prompt) = prompt {
        lines.push(Line::from(vec![Span::styled("Prompt: ", fg(Color::Gray)), Span::raw(prompt)]));
    }
    lines.push(Line::default());
    lines.push(Line::styled("r/Enter: Retry | Esc: Cancel", fg(Color::DarkGray)));
    let area = centered_rect(70, 10, frame.area());
    draw_popup(frame, area, "Error", Color::Red, lines);
}

fn labeled<'a>(label: &'static str, value: impl Into<std::borrow::Cow<'a, str>>) -> Line<'a> {
    Line::from(vec![Span::styled(label, fg(Color::Gray)), Span::raw(value)])
}

fn draw_job_detail(frame: &mut Frame, app: &App) {
    let Some(job) = &app.current_job else {
        return;
    };

    let [top, body, help] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(10),
        Constraint::Length(2),
    ])
    .areas(frame.area());

    let header = Line::from(vec![
        Span::styled("Job: ", fg(Color::Gray)),
        Span::styled(job.id.as_str(), bold(Color::Cyan)),
    ]);
    frame.render_widget(Paragraph::new(header).block(boxed("")), top);

    let req = &job.request;
    let mut lines = vec![
        Line::from(vec![
            Span::styled("Status: ", fg(Color::Gray)),
            Span::styled(job.status.to_string(), fg(status_color(job.status_name()))),
        ]),
        labeled("Model: ", req.model_id()),
        labeled("Created: ", job.created_at.format("%Y-%m-%d %H:%M:%S").to_string()),
        labeled(
            "Parameters: ",
            format!(
                "{}x{}, guidance {}, {} steps, {} sample(s)",
                req.width(),
                req.height(),
                req.guidance_scale(),
                req.inference_steps(),
                req.sample_count()
            ),
        ),
        Line::default(),
        Line::styled("Prompt:", bold(Color::Cyan)),
        Line::from(req.prompt()),
    ];

    if let Some(neg) = req.negative_prompt() {
        lines.push(Line::default());
        lines.push(Line::styled("Negative prompt:", bold(Color::Cyan)));
        lines.push(Line::from(neg));
    }

    if !job.images.is_empty() {
        lines.push(Line::default());
        lines.push(Line::styled("Images:", bold(Color::Cyan)));
        for img in &job.images {
            lines.push(Line::from(format!("  [{}] {}", img.index, img.url)));
            if let Some(path) = &img.path {
                lines.push(Line::styled(format!("      {}", path), fg(Color::Green)));
            }
        }
    }

    if let Some(parent) = &job.parent_id {
        lines.push(Line::default());
        lines.push(labeled("Retry of: ", parent.as_str()));
    }

    let details = Paragraph::new(lines)
        .block(boxed("Details"))
        .wrap(Wrap { trim: true });
    frame.render_widget(details, body);

    draw_keys(frame, "e: Edit prompt | Esc/q: Back", help);
}

fn settings_row(app: &App, index: usize, field: &SettingsField) -> ListItem<'static> {
    let selected = index == app.settings_selected;
    let editing = selected && app.settings_editing;

    let value = if editing {
        format!("{}▏", app.settings_edit_buffer)
    } else {
        app.get_settings_value(field)
    };
    let hint = match app.get_settings_options(field) {
        Some(_) if selected && !editing => "  (Enter: cycle, e: edit)",
        _ => "",
    };

    ListItem::new(Line::from(vec![
        Span::styled(
            format!("{:<20}", field.label()),
            if selected { bold(Color::Cyan) } else { fg(Color::White) },
        ),
        Span::styled(value, fg(if editing { Color::Yellow } else { Color::Gray })),
        Span::styled(hint, fg(Color::DarkGray)),
    ]))
}

fn draw_settings(frame: &mut Frame, app: &App) {
    let [top, body, status, help] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(10),
        Constraint::Length(3),
        Constraint::Length(2),
    ])
    .areas(frame.area());

    frame.render_widget(
        Paragraph::new("Settings").style(bold(Color::Cyan)).block(boxed("")),
        top,
    );

    let rows: Vec<ListItem> = SettingsField::all()
        .iter()
        .enumerate()
        .map(|(i, field)| settings_row(app, i, field))
        .collect();
    let list = List::new(rows)
        .block(boxed("Saved to the config file on exit"))
        .highlight_style(Style::default().bg(Color::DarkGray));
    let mut state = ListState::default().with_selected(Some(app.settings_selected));
    frame.render_stateful_widget(list, body, &mut state);

    draw_status(frame, app, status);

    let keys = if app.settings_editing {
        "Enter: Save | Esc: Cancel"
    } else {
        "↑↓: Navigate | Enter: Edit/Cycle | e: Edit | Esc/q: Back"
    };
    draw_keys(frame, keys, help);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_centered_rect_fits() {
        let area = Rect::new(0, 0, 100, 40);
        let popup = centered_rect(60, 7, area);
        assert_eq!(popup, Rect::new(20, 16, 60, 7));

        let tiny = centered_rect(50, 20, Rect::new(0, 0, 10, 5));
        assert_eq!(tiny.height, 5);
        assert!(tiny.x + tiny.width <= 10);
    }

    #[test]
    fn test_status_colors() {
        assert_eq!(status_color("completed"), Color::Green);
        assert_eq!(status_color("failed"), Color::Red);
        assert_eq!(status_color("cancelled"), Color::Gray);
    }
}
