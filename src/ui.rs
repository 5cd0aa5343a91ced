pub mod notifications;
pub mod progress;
pub mod screen;

use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Widget, Wrap},
    Frame,
};

use unicode_width::UnicodeWidthChar;

use posecheck::{
    controller::DeviceStatus,
    orchestrator::{Outcome, GENERIC_FAILURE},
    session::SessionState,
};

use crate::{
    ui::{
        notifications::kind_style,
        progress::{elapsed_caption, gauge_ratio},
        screen::current_screen,
    },
    App, Focus,
};

const HORIZONTAL_MARGIN: u16 = 2;
const VERTICAL_MARGIN: u16 = 1;
const RECENT_NOTIFICATIONS: usize = 4;

pub fn draw(app: &mut App, f: &mut Frame) {
    let state = app.state;
    current_screen(&state).render(app, f);
}

/// Cut `text` to at most `width` terminal columns, marking the cut with an ellipsis
fn fit_width(text: &str, width: usize) -> String {
    let mut used = 0;
    let mut out = String::new();
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            out.pop();
            out.push('…');
            return out;
        }
        used += w;
        out.push(c);
    }
    out
}

fn panel(title: String, focused: bool) -> Block<'static> {
    let border = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(title)
}

impl Widget for &App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Min(8),
                Constraint::Length(RECENT_NOTIFICATIONS as u16 + 2),
                Constraint::Length(1), // help
            ])
            .split(area);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
            .split(rows[0]);

        let left = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(4), Constraint::Length(4)])
            .split(columns[0]);

        render_exercises(self, left[0], buf);
        render_sensors(self, left[1], buf);
        render_session(self, columns[1], buf);
        render_recent(self, rows[1], buf);

        let help = if self.start_enabled() {
            "(↑/↓) exercise  (tab) time  (enter) start  (s) scan  (r) devices  (n) notifications  (esc) quit"
        } else {
            "(x) stop  (n) notifications  (esc) quit"
        };
        Paragraph::new(Span::styled(
            help,
            Style::default().add_modifier(Modifier::DIM),
        ))
        .alignment(Alignment::Center)
        .render(rows[2], buf);
    }
}

fn render_exercises(app: &App, area: Rect, buf: &mut Buffer) {
    // borders and the selection marker
    let width = area.width.saturating_sub(4) as usize;
    let lines: Vec<Line> = app
        .controller
        .catalog
        .all()
        .iter()
        .enumerate()
        .map(|(idx, exercise)| {
            let title = fit_width(&exercise.title, width);
            if idx == app.selected {
                Line::from(Span::styled(
                    format!("> {title}"),
                    Style::default().add_modifier(Modifier::BOLD),
                ))
            } else {
                Line::from(format!("  {title}"))
            }
        })
        .collect();

    Paragraph::new(lines)
        .block(panel(
            "Exercises".to_string(),
            app.focus == Focus::Exercises,
        ))
        .render(area, buf);
}

fn render_sensors(app: &App, area: Rect, buf: &mut Buffer) {
    let required = app
        .selected_exercise()
        .map(|e| e.required_sensors.as_slice())
        .unwrap_or_default();

    let title = match app.controller.device_status() {
        DeviceStatus::Unknown | DeviceStatus::Ready => "Sensors".to_string(),
        DeviceStatus::Listing => "Sensors (listing…)".to_string(),
        DeviceStatus::Scanning => "Sensors (scanning…)".to_string(),
        DeviceStatus::Unavailable(_) => "Sensors (unavailable)".to_string(),
    };

    let sensors = app.controller.registry.sensors();
    let line = if sensors.is_empty() {
        Line::from(Span::styled(
            "no sensors known",
            Style::default().add_modifier(Modifier::DIM),
        ))
    } else {
        Line::from(
            sensors
                .iter()
                .flat_map(|sensor| {
                    let (dot, colour) = if sensor.online {
                        ("●", Color::Green)
                    } else {
                        ("○", Color::DarkGray)
                    };
                    let mut style = Style::default().fg(colour);
                    if required.contains(&sensor.name) {
                        style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
                    }
                    [
                        Span::styled(format!("{dot} {}", sensor.name), style),
                        Span::raw("  "),
                    ]
                })
                .collect::<Vec<Span>>(),
        )
    };

    Paragraph::new(line)
        .block(panel(title, false))
        .wrap(Wrap { trim: true })
        .render(area, buf);
}

fn render_session(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // time budget
            Constraint::Length(3), // gauge
            Constraint::Min(3),    // body
        ])
        .split(area);

    let input_style = if app.start_enabled() {
        Style::default()
    } else {
        Style::default().add_modifier(Modifier::DIM)
    };
    Paragraph::new(Span::styled(app.time_input.clone(), input_style))
        .block(panel(
            "Time budget (s)".to_string(),
            app.focus == Focus::TimeBudget,
        ))
        .render(chunks[0], buf);

    let orchestrator = app.controller.orchestrator();
    let state = orchestrator.state();

    let gauge = match orchestrator.session() {
        Some(session) if state == SessionState::Sampling => Gauge::default()
            .gauge_style(Style::default().fg(Color::Magenta))
            .ratio(gauge_ratio(session.progress_percent()))
            .label(elapsed_caption(
                session.elapsed_secs(),
                session.budget.secs(),
            )),
        _ => Gauge::default().ratio(0.0).label(state.to_string()),
    };
    gauge.block(Block::default().borders(Borders::ALL)).render(chunks[1], buf);

    let Some(exercise) = orchestrator
        .session()
        .map(|s| &s.exercise)
        .or_else(|| app.selected_exercise())
    else {
        return;
    };

    let mut lines: Vec<Line> = Vec::new();
    match (state, orchestrator.session(), orchestrator.last_outcome()) {
        (SessionState::Sampling, Some(session), _) => {
            lines.push(Line::from(Span::styled(
                session.display(),
                Style::default().add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(format!("score {}", session.running_score())));
        }
        (SessionState::Starting | SessionState::AwaitingReady, _, _) => {
            lines.push(Line::from(Span::styled(
                "Connecting sensors…",
                Style::default().fg(Color::Yellow),
            )));
        }
        (SessionState::Completed, _, Some(Outcome::Completed(summary))) => {
            lines.push(Line::from(Span::styled(
                summary.result.clone(),
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )));
        }
        (
            SessionState::Failed,
            _,
            Some(Outcome::Failed {
                error,
                interrupted: true,
                ..
            }),
        ) => {
            lines.push(Line::from(Span::styled(
                GENERIC_FAILURE,
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )));
            lines.push(Line::from(Span::styled(
                error.to_string(),
                Style::default().add_modifier(Modifier::DIM),
            )));
        }
        (SessionState::Failed, _, Some(Outcome::Failed { error, .. })) => {
            lines.push(Line::from(Span::styled(
                error.to_string(),
                Style::default().fg(Color::Red),
            )));
        }
        _ => {}
    }
    if !lines.is_empty() {
        lines.push(Line::from(""));
    }
    lines.extend(
        exercise
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| Line::from(format!("{}. {step}", i + 1))),
    );

    Paragraph::new(lines)
        .block(panel(format!("{} [{}]", exercise.title, state), false))
        .wrap(Wrap { trim: true })
        .render(chunks[2], buf);
}

fn render_recent(app: &App, area: Rect, buf: &mut Buffer) {
    let log = &app.controller.notifications;
    let lines: Vec<Line> = log
        .entries()
        .iter()
        .rev()
        .take(RECENT_NOTIFICATIONS)
        .rev()
        .map(|n| {
            Line::from(vec![
                Span::styled(format!("[{}] ", n.kind), kind_style(n.kind)),
                Span::raw(n.message.clone()),
            ])
        })
        .collect();

    Paragraph::new(lines)
        .block(panel(format!("Notifications ({})", log.len()), false))
        .wrap(Wrap { trim: true })
        .render(area, buf);
}
