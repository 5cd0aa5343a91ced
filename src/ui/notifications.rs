use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame,
};

use posecheck::notify::{Notification, NotificationKind};

use crate::App;

pub fn kind_style(kind: NotificationKind) -> Style {
    match kind {
        NotificationKind::Exception => Style::default().fg(Color::Red),
        NotificationKind::Complete => Style::default().fg(Color::Green),
        NotificationKind::Data => Style::default().fg(Color::Cyan),
        NotificationKind::Message => Style::default(),
    }
}

/// Pure presenter for a single notification row
pub fn present_row(notification: &Notification, selected: bool) -> Row<'static> {
    let row = Row::new(vec![
        Cell::from(notification.posted_at.format("%H:%M:%S").to_string())
            .style(Style::default().add_modifier(Modifier::DIM)),
        Cell::from(notification.kind.to_string()).style(
            kind_style(notification.kind).add_modifier(Modifier::BOLD),
        ),
        Cell::from(notification.message.clone()),
    ]);
    if selected {
        row.style(Style::default().add_modifier(Modifier::REVERSED))
    } else {
        row
    }
}

/// Render the Notifications screen
pub fn render_notifications(app: &mut App, f: &mut Frame) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([
            Constraint::Length(3), // Title
            Constraint::Min(0),    // Table
            Constraint::Length(2), // Instructions
        ])
        .split(area);

    let entries = app.controller.notifications.entries();
    let title = Paragraph::new(format!("Notifications ({})", entries.len()))
        .block(Block::default().borders(Borders::ALL))
        .style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center);
    f.render_widget(title, chunks[0]);

    if entries.is_empty() {
        let empty = Paragraph::new("Nothing to show.")
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Gray));
        f.render_widget(empty, chunks[1]);
    } else {
        let view = &mut app.notifications_state;
        let table_height = chunks[1].height.saturating_sub(3) as usize; // borders + header

        // Keep the selection visible
        if view.selected < view.scroll_offset {
            view.scroll_offset = view.selected;
        } else if table_height > 0 && view.selected >= view.scroll_offset + table_height {
            view.scroll_offset = view.selected + 1 - table_height;
        }

        let header = Row::new(vec![
            Cell::from("Time"),
            Cell::from("Kind"),
            Cell::from("Message"),
        ])
        .style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

        let rows: Vec<Row> = entries
            .iter()
            .enumerate()
            .skip(view.scroll_offset)
            .take(table_height)
            .map(|(idx, n)| present_row(n, idx == view.selected))
            .collect();

        let widths = [
            Constraint::Length(10),
            Constraint::Length(11),
            Constraint::Min(20),
        ];
        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::default().borders(Borders::ALL))
            .column_spacing(1);
        f.render_widget(table, chunks[1]);
    }

    let instructions = Paragraph::new("(↑/↓) select  (d) dismiss  (c) clear all  (b/esc) back")
        .alignment(Alignment::Center)
        .wrap(ratatui::widgets::Wrap { trim: true });
    f.render_widget(instructions, chunks[2]);
}
