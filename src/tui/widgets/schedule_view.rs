use chrono::{Duration, NaiveDate};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Row, Table};
use std::collections::BTreeMap;

use crate::Config;
use crate::models::{ScheduleSlot, Task};
use crate::tui::widgets::color::parse_color;

pub fn render_schedule_view(
    f: &mut Frame,
    area: Rect,
    week: &BTreeMap<NaiveDate, Vec<Task>>,
    slots: &[ScheduleSlot],
    today: NaiveDate,
    config: &Config,
) {
    let fg_color = parse_color(&config.get_active_theme().fg);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    let mut lines = Vec::new();
    for (date, tasks) in week {
        let day_style = if *date == today {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(fg_color).add_modifier(Modifier::BOLD)
        };
        lines.push(Line::styled(date.format("%A %m-%d").to_string(), day_style));
        if tasks.is_empty() {
            lines.push(Line::styled("   -", Style::default().fg(Color::DarkGray)));
        }
        for task in tasks {
            let mark = if task.completed { "✓" } else { "○" };
            lines.push(Line::from(vec![
                Span::raw(format!("   {} ", mark)),
                Span::styled(task.title.clone(), Style::default().fg(fg_color)),
                Span::styled(format!(" ({})", task.priority), Style::default().fg(Color::DarkGray)),
            ]));
        }
    }
    let week_view = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("This Week"))
        .wrap(ratatui::widgets::Wrap { trim: false });
    f.render_widget(week_view, columns[0]);

    let rows: Vec<Row> = slots
        .iter()
        .map(|slot| {
            let end = slot.suggested_start + Duration::minutes(i64::from(slot.duration_minutes));
            Row::new(vec![
                format!("{}-{}", slot.suggested_start.format("%H:%M"), end.format("%H:%M")),
                slot.task.title.clone(),
            ])
        })
        .collect();
    let title = if slots.is_empty() { "Suggested Plan (no pending tasks)" } else { "Suggested Plan" };
    let table = Table::new(rows, [Constraint::Length(11), Constraint::Min(5)])
        .header(Row::new(vec!["Time", "Task"]).style(Style::default().add_modifier(Modifier::BOLD)))
        .style(Style::default().fg(fg_color))
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(table, columns[1]);
}
